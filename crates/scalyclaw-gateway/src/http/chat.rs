//! Chat HTTP surface (spec.md §6 "chat"): `POST /chat` (legacy synchronous
//! terminal endpoint, kept for first-run/scripting use), `POST /api/chat`
//! (enqueues onto the `messages` queue and awaits completion via the shared
//! progress subscriber), `GET|DELETE /api/messages`, `GET
//! /api/buffered-responses`.
//!
//! Auth: `Authorization: Bearer <token>` header (same token as WebSocket).

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use scalyclaw_agent::pipeline::process_message_non_streaming;
use scalyclaw_agent::provider::ProviderError;
use scalyclaw_queue::EnqueueOptions;

use crate::app::AppState;

/// `POST /api/chat` waits up to this long for the enqueued job to finish
/// (spec.md §6 "enqueues and awaits via shared progress subscriber, 120s cap").
const API_CHAT_TIMEOUT_MS: u64 = 120_000;
const MESSAGES_QUEUE: &str = "messages";

#[derive(Deserialize)]
pub struct ChatRequest {
    /// The message to send to the AI agent.
    pub message: String,
    /// Optional session key suffix. Defaults to `"default"`.
    /// Full key becomes `http:terminal:{session_id}`.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Optional per-request model override.
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Serialize)]
pub struct ChatReply {
    pub reply: String,
    pub model: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
}

#[derive(Serialize)]
pub struct ChatError {
    pub error: String,
}

/// POST /chat — full-pipeline non-streaming terminal chat (legacy, in-process).
///
/// Requires `Authorization: Bearer <token>` when auth mode is `token`.
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatReply>, (StatusCode, Json<ChatError>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }

    if req.message.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ChatError {
                error: "message cannot be empty".to_string(),
            }),
        ));
    }

    if req.message.trim().eq_ignore_ascii_case("/stop") {
        let report = crate::stop::execute_stop(state.as_ref()).await;
        return Ok(Json(ChatReply {
            reply: report,
            model: "gateway".to_string(),
            tokens_in: 0,
            tokens_out: 0,
        }));
    }

    let session_suffix = req.session_id.as_deref().unwrap_or("default");
    let session_key = format!("http:terminal:{session_suffix}");

    let cancel = CancellationToken::new();
    state
        .active_operations
        .insert(session_key.clone(), cancel.clone());

    let result = process_message_non_streaming(
        &state,
        &session_key,
        "terminal",
        &req.message,
        None,
        req.model.as_deref(),
        None,
        Some(cancel),
        None,
    )
    .await;

    state.active_operations.remove(&session_key);

    match result {
        Ok(r) => Ok(Json(ChatReply {
            reply: r.content,
            model: r.model,
            tokens_in: r.tokens_in,
            tokens_out: r.tokens_out,
        })),
        Err(ProviderError::Cancelled) => Ok(Json(ChatReply {
            reply: "Operation cancelled by /stop.".to_string(),
            model: "gateway".to_string(),
            tokens_in: 0,
            tokens_out: 0,
        })),
        Err(e) => {
            warn!(error = %e, "POST /chat failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ChatError {
                    error: e.to_string(),
                }),
            ))
        }
    }
}

#[derive(Deserialize)]
pub struct ApiChatRequest {
    pub text: String,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Serialize)]
pub struct ApiChatReply {
    pub response: String,
    #[serde(rename = "jobId")]
    pub job_id: String,
}

/// POST /api/chat — enqueues one `messages` job and awaits its result via
/// `QueueFabric::wait_until_finished` (spec.md §6). `MessageProcessor` (see
/// `queue_consumers.rs`) runs the actual orchestrator turn.
pub async fn api_chat_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ApiChatRequest>,
) -> Result<Json<ApiChatReply>, (StatusCode, Json<ChatError>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    if req.text.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ChatError {
                error: "text cannot be empty".to_string(),
            }),
        ));
    }

    let channel_id = req.channel_id.as_deref().unwrap_or("default");
    let session_key = format!("http:terminal:{channel_id}");

    let payload = json!({
        "session_key": session_key,
        "channel_name": "http",
        "text": req.text,
        "model": req.model,
    });

    let job_id = state
        .queue
        .enqueue(
            MESSAGES_QUEUE,
            "chat",
            payload,
            EnqueueOptions {
                channel_id: Some(channel_id.to_string()),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| internal_error(e.to_string()))?;

    let result = state
        .queue
        .wait_until_finished(MESSAGES_QUEUE, &job_id, API_CHAT_TIMEOUT_MS)
        .await
        .map_err(|e| internal_error(e.to_string()))?;

    let response = result
        .get("response")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    Ok(Json(ApiChatReply { response, job_id }))
}

#[derive(Deserialize)]
pub struct MessagesQuery {
    #[serde(default = "default_channel")]
    pub channel_id: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_channel() -> String {
    "default".to_string()
}
fn default_limit() -> usize {
    50
}

/// GET /api/messages — recent transcript rows for a channel.
pub async fn list_messages_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<MessagesQuery>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ChatError>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let messages = state
        .memory
        .get_channel_messages(&q.channel_id, q.limit)
        .map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(json!({ "messages": messages })))
}

/// DELETE /api/messages — clears the transcript for a channel.
pub async fn clear_messages_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<MessagesQuery>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ChatError>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let deleted = state
        .memory
        .clear_channel_messages(&q.channel_id)
        .map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(json!({ "deleted": deleted })))
}

#[derive(Deserialize)]
pub struct BufferedQuery {
    #[serde(default = "default_channel")]
    pub channel_id: String,
}

/// GET /api/buffered-responses — drain notifications buffered while a
/// channel adapter was unreachable (see `InternalProcessor` in
/// `queue_consumers.rs`).
pub async fn buffered_responses_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<BufferedQuery>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ChatError>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let responses = state
        .notifications
        .remove(&q.channel_id)
        .map(|(_, msgs)| msgs)
        .unwrap_or_default();
    Ok(Json(json!({ "responses": responses })))
}

fn unauthorized() -> (StatusCode, Json<ChatError>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ChatError {
            error: "Unauthorized. Set 'Authorization: Bearer <your-token>' header.".to_string(),
        }),
    )
}

fn internal_error(error: String) -> (StatusCode, Json<ChatError>) {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ChatError { error }))
}

/// Returns true if the request is authorised.
pub(crate) fn check_auth(state: &AppState, headers: &HeaderMap) -> bool {
    use scalyclaw_core::config::AuthMode;

    let config = state.config.read().unwrap();
    match &config.gateway.auth.mode {
        AuthMode::None => true,
        AuthMode::Token => {
            let expected = match &config.gateway.auth.token {
                Some(t) => t.as_str(),
                None => return false,
            };
            extract_bearer(headers)
                .map(|t| t == expected)
                .unwrap_or(false)
        }
        _ => false,
    }
}

pub(crate) fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}
