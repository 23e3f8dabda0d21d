//! Shared message pipeline — channel-agnostic agentic turn processing.
//!
//! `orchestrator::run_orchestrator` is the core agentic loop (spec.md
//! §4.7); channel adapters that want progress narration streamed to the
//! user call it directly, everyone else calls the simpler
//! `process_message_non_streaming` wrapper.

pub mod compact;
pub mod context;
pub mod history;
pub mod orchestrator;
pub mod process;
pub mod slash;

#[allow(deprecated)]
pub use compact::compact_session_if_needed;
pub use context::MessageContext;
pub use orchestrator::{
    run_orchestrator, OrchestratorError, OrchestratorInput, RoundCompleteHook, RoundSummary,
    SendToChannel, StopPredicate, StopReason,
};
pub use process::{process_message_non_streaming, ProcessedMessage};
