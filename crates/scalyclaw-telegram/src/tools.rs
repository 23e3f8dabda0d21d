//! Tool re-export for the Telegram adapter.
//!
//! All tools are shared — implemented once in `scalyclaw-agent` and re-exported here
//! following the same thin-wrapper pattern as `scalyclaw-discord/src/tools.rs`.

pub use scalyclaw_agent::tools::build::build_tools;
