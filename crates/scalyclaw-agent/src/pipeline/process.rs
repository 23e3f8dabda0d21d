//! Non-streaming entry point — thin adapter over the orchestrator
//! (spec.md §4.7) for channel hosts that just want a request/response call
//! with no progress narration.
//!
//! Channel adapters (gateway, discord, telegram) call
//! `process_message_non_streaming` for the common non-streaming path and only
//! add their own channel-specific formatting on top.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::provider::ProviderError;

use super::context::MessageContext;
use super::orchestrator::{run_orchestrator, OrchestratorError, OrchestratorInput};

/// Result of a completed non-streaming pipeline turn.
pub struct ProcessedMessage {
    pub content: String,
    pub model: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub stop_reason: String,
}

/// Run one orchestrator turn and collect its final reply, discarding
/// intermediate progress narration (callers that want to stream narration
/// to the user should call `run_orchestrator` directly instead).
///
/// # Arguments
/// - `ctx` — shared host context (gateway `AppState`, discord `Arc<C>`, etc.)
/// - `session_key` — unique key for this user/channel conversation
/// - `channel_name` — label stored alongside conversation rows (e.g. `"discord"`)
/// - `content` — the user's message text
/// - `user_context` — optional pre-rendered user memory context string
/// - `model_override` — optional per-request model ID (overrides the weighted pool)
/// - `channel_id` — optional channel ID for reminder delivery (Discord: `ChannelId.get()`, WS: `None`)
/// - `cancel` — optional cancellation token; when cancelled the round loop exits early
/// - `attachment_blocks` — optional multimodal content blocks (images, files) appended
///   to the user turn
#[allow(clippy::too_many_arguments)]
pub async fn process_message_non_streaming<C: MessageContext + 'static>(
    ctx: &Arc<C>,
    session_key: &str,
    channel_name: &str,
    content: &str,
    user_context: Option<&str>,
    model_override: Option<&str>,
    channel_id: Option<u64>,
    cancel: Option<CancellationToken>,
    attachment_blocks: Option<Vec<serde_json::Value>>,
) -> Result<ProcessedMessage, ProviderError> {
    let input = OrchestratorInput {
        channel_id: session_key.to_string(),
        user_text: content.to_string(),
        user_context: user_context.map(String::from),
        model_override: model_override.map(String::from),
        channel_label: channel_name.to_string(),
        discord_channel_id: channel_id,
        attachment_blocks,
        send_to_channel: Arc::new(|_text| Box::pin(async move {})),
        on_round_complete: None,
        stop_predicate: None,
        abort: cancel,
    };

    match run_orchestrator(ctx, input).await {
        Ok(content) => Ok(ProcessedMessage {
            content,
            model: ctx.agent().get_model().await,
            tokens_in: 0,
            tokens_out: 0,
            stop_reason: "end_turn".to_string(),
        }),
        Err(OrchestratorError::Provider(e)) => Err(e),
        Err(other) => Err(ProviderError::Unavailable(other.to_string())),
    }
}
