//! Session compaction — deliberately absent.
//!
//! The teacher's version deleted old turns after extracting facts with a
//! cheap model. Under the append-only `messages` table (no per-session
//! delete, pruned only by an explicit `/clear`), there is nothing to
//! compact: `pipeline::history::trim_to_budget` already bounds what the
//! orchestrator sends to the model on each turn. This stub remains only so
//! channel hosts that haven't been migrated off the old fire-and-forget
//! call site still compile; it does nothing.

use std::sync::Arc;

use super::context::MessageContext;

#[deprecated(note = "message history is trimmed per-turn by pipeline::history; there is nothing left to compact")]
pub async fn compact_session_if_needed<C: MessageContext + 'static>(_ctx: Arc<C>, _session_key: String) {}
