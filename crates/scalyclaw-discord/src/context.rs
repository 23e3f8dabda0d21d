//! Discord context interface — re-exported from the shared pipeline.
//!
//! `DiscordAppContext` is now an alias for `scalyclaw_agent::pipeline::MessageContext`.
//! All channel adapters share the same trait, defined once in `scalyclaw-agent` to
//! avoid circular dependencies.

pub use scalyclaw_agent::pipeline::MessageContext as DiscordAppContext;
