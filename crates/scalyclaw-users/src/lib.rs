//! `scalyclaw-users` — translates external channel identities into
//! first-class ScalyClaw users, with role/permission gating and per-user
//! token budgets (spec.md §4.13 "Users").

pub mod db;
pub mod error;
pub mod identity;
pub mod permissions;
pub mod resolver;
pub mod types;

pub use error::{Result, UserError};
pub use resolver::{ResolvedUser, UserResolver};
pub use types::User;
