//! Shared context interface for all channel adapters.
//!
//! `MessageContext` is the single trait that every channel host (gateway, discord,
//! future telegram, etc.) must implement. It replaces the old `DiscordAppContext`
//! and lets the pipeline crate stay channel-agnostic.

use scalyclaw_memory::manager::MemoryManager;
use scalyclaw_scheduler::SchedulerManager;
use scalyclaw_terminal::manager::TerminalManager;

use crate::runtime::AgentRuntime;

/// Minimal context interface required by the shared message pipeline.
///
/// Implemented by `AppState` in `scalyclaw-gateway` and any future channel host.
/// Defined here (in `scalyclaw-agent`) to avoid circular dependency: all channel
/// crates depend on `scalyclaw-agent`; `scalyclaw-agent` depends only on `scalyclaw-core`,
/// `scalyclaw-memory`, `scalyclaw-scheduler`, and `scalyclaw-terminal`.
pub trait MessageContext: Send + Sync {
    fn agent(&self) -> &AgentRuntime;
    fn memory(&self) -> &MemoryManager;
    fn terminal(&self) -> &tokio::sync::Mutex<TerminalManager>;
    fn scheduler(&self) -> &SchedulerManager;
}
