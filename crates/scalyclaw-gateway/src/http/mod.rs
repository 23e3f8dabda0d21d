pub mod agents;
pub mod chat;
pub mod config;
pub mod health;
pub mod jobs;
pub mod memory;
pub mod models;
pub mod notifications;
pub mod openai_compat;
pub mod scheduler;
pub mod skills;
pub mod ui;
pub mod vault;
pub mod webhooks;
