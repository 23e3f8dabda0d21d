//! Telegram context interface — re-exported from the shared pipeline.
//!
//! `TelegramAppContext` is an alias for `scalyclaw_agent::pipeline::MessageContext`.
//! All channel adapters share the same trait, defined once in `scalyclaw-agent`.

pub use scalyclaw_agent::pipeline::MessageContext as TelegramAppContext;
