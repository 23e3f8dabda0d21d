//! The orchestrator — the core agentic loop (spec.md §4.7).
//!
//! Grounded on the teacher's `process_message_non_streaming` (prompt
//! assembly, history envelopes, model resolution) and `tools::tool_loop::
//! run_tool_loop` (the raw-message tool-call/tool-result JSON shape), with
//! three behavioural changes: tool calls within a round execute
//! concurrently, the model comes from a two-tier weighted pool instead of a
//! single override-or-default, and history is trimmed to a token budget
//! instead of capped at a fixed turn count.

use std::sync::Arc;

use chrono::Utc;
use futures_util::future::BoxFuture;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use scalyclaw_core::types::{Message as StoredMessage, MessageRole, UsageCallType, UsageLog};
use scalyclaw_memory::types::SearchOptions;

use crate::budget;
use crate::model_pool;
use crate::provider::{ChatRequest, ProviderError, ToolCall};
use crate::tools::tool_loop::execute_tool_calls_concurrent;

use super::context::MessageContext;
use super::history::{context_window_for, trim_to_budget, CHARS_PER_TOKEN, RESERVED_FRACTION};

/// Oldest-first history fetched before trimming. Generous enough that
/// `trim_to_budget` — not this cap — is what actually bounds the window.
const HISTORY_FETCH_LIMIT: usize = 500;

/// Callback invoked with a narration or final string to deliver to the
/// channel. Boxed so channel adapters can close over their own WS/Discord/
/// terminal sink.
pub type SendToChannel = Arc<dyn Fn(String) -> BoxFuture<'static, ()> + Send + Sync>;

/// Fired once per completed round with a short summary, before the stop
/// predicate is consulted.
pub type RoundCompleteHook = Arc<dyn Fn(RoundSummary) -> BoxFuture<'static, ()> + Send + Sync>;

/// Polled after each round. `Some` ends the loop early.
pub type StopPredicate = Arc<dyn Fn() -> Option<StopReason> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    Budget,
}

#[derive(Debug, Clone)]
pub struct RoundSummary {
    pub round: u32,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub tool_calls: Vec<String>,
}

/// Everything the orchestrator needs for one turn (spec.md §4.7 "Input:").
pub struct OrchestratorInput {
    /// Channel-scoped session identifier; doubles as the `messages.channel`
    /// key and the scheduler/reminder routing key.
    pub channel_id: String,
    pub user_text: String,
    pub user_context: Option<String>,
    pub model_override: Option<String>,
    /// Adapter label stored alongside transcript rows (e.g. `"discord"`, `"ws"`).
    pub channel_label: String,
    pub discord_channel_id: Option<u64>,
    pub attachment_blocks: Option<Vec<serde_json::Value>>,
    pub send_to_channel: SendToChannel,
    pub on_round_complete: Option<RoundCompleteHook>,
    pub stop_predicate: Option<StopPredicate>,
    pub abort: Option<CancellationToken>,
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("budget exceeded: day ${current_day:.2}, month ${current_month:.2}")]
    BudgetExceeded { current_day: f64, current_month: f64 },
    #[error("model selection failed: no orchestrator or global model pool is configured")]
    NoModelAvailable,
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Memory(#[from] scalyclaw_memory::error::MemoryError),
}

/// Run one full orchestrator turn. Returns the final assistant text, empty
/// if it was already delivered as progress narration.
pub async fn run_orchestrator<C: MessageContext + 'static>(
    ctx: &Arc<C>,
    input: OrchestratorInput,
) -> Result<String, OrchestratorError> {
    // Step 1 — fail fast on budget.
    let status = budget::check(ctx.agent().budget_config(), ctx.memory(), budget::default_pricing)?;
    for alert in &status.alerts {
        warn!(channel = %input.channel_id, alert = %alert, "budget alert");
    }
    if !status.allowed {
        return Err(OrchestratorError::BudgetExceeded {
            current_day: status.current_day_cost,
            current_month: status.current_month_cost,
        });
    }

    let history = ctx.memory().get_channel_messages(&input.channel_id, HISTORY_FETCH_LIMIT)?;
    let now = Utc::now();
    let session_info = crate::prompt::SessionInfo {
        session_key: input.channel_id.clone(),
        turn_count: history.len() as u32,
        timestamp: now.format("%Y-%m-%d %H:%M UTC").to_string(),
    };

    // Step 2 — system prompt build and memory search run concurrently.
    let memory_search = async {
        if input.user_text.trim().chars().count() < 10 {
            return Vec::new();
        }
        match ctx.memory().search_memory(&input.user_text, SearchOptions { top_k: 5, ..Default::default() }) {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, "memory search failed, continuing without memories");
                Vec::new()
            }
        }
    };
    let build_prompt = async {
        let builder = ctx.agent().prompt().await;
        builder.build_prompt(input.user_context.as_deref(), Some(&session_info))
    };
    let (mut system_prompt, memories) = tokio::join!(build_prompt, memory_search);

    // Step 3 — fold memory hits into the volatile tier.
    if !memories.is_empty() {
        let mut section = String::from("\n\n## Relevant Memories\n");
        for hit in &memories {
            section.push_str(&format!("- {}: {}\n", hit.memory.subject, hit.memory.content));
        }
        system_prompt.volatile_tier.push_str(&section);
    }
    let system_text = system_prompt.to_plain_text();

    // Step 5 — select a model (computed ahead of the step-4 history trim
    // below since trimming needs to know the context window it's trimming
    // against).
    let model = input
        .model_override
        .clone()
        .or_else(|| model_pool::select_model(ctx.agent().orchestrator_models(), ctx.agent().global_models()))
        .ok_or(OrchestratorError::NoModelAvailable)?;

    // Step 4 — trim history to the model's context budget.
    let mut chars_per_token = CHARS_PER_TOKEN;
    let window_tokens = context_window_for(&model) as f64;
    let mut budget_chars = (window_tokens * (1.0 - RESERVED_FRACTION) * chars_per_token) as usize;
    let trimmed = trim_to_budget(&history, budget_chars);

    let tools = crate::tools::build::build_tools(
        Arc::clone(ctx),
        &input.channel_label,
        input.discord_channel_id,
        Some(&input.channel_id),
    );
    let tool_defs = crate::tools::build::tool_definitions(&tools);

    let mut raw_messages: Vec<serde_json::Value> = trimmed
        .iter()
        .map(|m| json!({ "role": m.role.to_string(), "content": m.content.clone() }))
        .collect();
    let user_turn = format_envelope(&input.channel_label, &now, &input.user_text);
    match &input.attachment_blocks {
        Some(blocks) => {
            let mut content_parts: Vec<serde_json::Value> =
                vec![json!({ "type": "text", "text": user_turn })];
            content_parts.extend(blocks.clone());
            raw_messages.push(json!({ "role": "user", "content": content_parts }));
        }
        None => raw_messages.push(json!({ "role": "user", "content": user_turn })),
    }

    let mut chars_used: usize = raw_messages.iter().map(approx_json_chars).sum::<usize>() + system_text.len();

    // Step 6 — the bounded round loop.
    let max_iterations = ctx.agent().max_iterations();
    let mut final_content = String::new();
    let mut last_progress_text = String::new();
    let mut total_tokens_in: u32 = 0;
    let mut total_tokens_out: u32 = 0;
    let mut cumulative_input_tokens: u32 = 0;
    let ceiling_tokens = window_tokens as u32;
    let mut round: u32 = 0;
    let mut stop_reason: Option<StopReason> = None;

    while round < max_iterations {
        if input.abort.as_ref().is_some_and(|t| t.is_cancelled()) {
            stop_reason = Some(StopReason::Cancelled);
            break;
        }

        let req = ChatRequest {
            model: model.clone(),
            system: system_text.clone(),
            system_prompt: Some(system_prompt.clone()),
            messages: Vec::new(),
            max_tokens: 4096,
            stream: false,
            thinking: None,
            tools: tool_defs.clone(),
            raw_messages: Some(raw_messages.clone()),
        };

        let response = match &input.abort {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => {
                    stop_reason = Some(StopReason::Cancelled);
                    break;
                }
                r = ctx.agent().provider().send(&req) => r?,
            },
            None => ctx.agent().provider().send(&req).await?,
        };

        total_tokens_in += response.tokens_in;
        total_tokens_out += response.tokens_out;
        cumulative_input_tokens += response.tokens_in;

        // Calibrate the char-per-token estimate once, from round one's real counts.
        if round == 0 && response.tokens_in > 0 {
            let sent_chars = chars_used as f64;
            chars_per_token = (sent_chars / response.tokens_in as f64).clamp(1.5, 8.0);
            budget_chars = (window_tokens * (1.0 - RESERVED_FRACTION) * chars_per_token) as usize;
        }

        if response.tool_calls.is_empty() {
            final_content = response.content;
            break;
        }

        if cumulative_input_tokens > ceiling_tokens {
            info!(channel = %input.channel_id, round, "orchestrator: per-turn ceiling crossed, exiting without overwriting content");
            stop_reason = Some(StopReason::Budget);
            break;
        }

        let narration = if !response.content.is_empty() {
            response.content.clone()
        } else if round == 0 {
            describe_tool_calls(&response.tool_calls)
        } else {
            String::new()
        };
        if !narration.is_empty() && narration != last_progress_text {
            (input.send_to_channel)(narration.clone()).await;
            last_progress_text = narration;
        }

        let mut assistant_content: Vec<serde_json::Value> = Vec::new();
        if !response.content.is_empty() {
            assistant_content.push(json!({ "type": "text", "text": response.content }));
        }
        for call in &response.tool_calls {
            assistant_content.push(json!({
                "type": "tool_use",
                "id": call.id.clone(),
                "name": call.name.clone(),
                "input": call.input.clone(),
            }));
        }
        let assistant_msg = json!({ "role": "assistant", "content": assistant_content });
        chars_used += approx_json_chars(&assistant_msg);
        raw_messages.push(assistant_msg);

        let remaining_budget = budget_chars.saturating_sub(chars_used);
        let tool_results = execute_tool_calls_concurrent(&tools, &response.tool_calls, remaining_budget).await;

        let tool_result_content: Vec<serde_json::Value> = tool_results
            .iter()
            .map(|r| {
                json!({
                    "type": "tool_result",
                    "tool_use_id": r.tool_use_id.clone(),
                    "content": r.content.clone(),
                    "is_error": r.is_error,
                })
            })
            .collect();
        let tool_msg = json!({ "role": "user", "content": tool_result_content });
        chars_used += approx_json_chars(&tool_msg);
        raw_messages.push(tool_msg);

        if let Some(hook) = &input.on_round_complete {
            hook(RoundSummary {
                round,
                tokens_in: response.tokens_in,
                tokens_out: response.tokens_out,
                tool_calls: response.tool_calls.iter().map(|c| c.name.clone()).collect(),
            })
            .await;
        }

        if let Some(predicate) = &input.stop_predicate {
            if let Some(reason) = predicate() {
                stop_reason = Some(reason);
                break;
            }
        }

        round += 1;
    }

    if let Some(reason) = stop_reason {
        info!(channel = %input.channel_id, ?reason, round, "orchestrator: loop stopped early");
    }

    // Step 7 — record usage once, persist the transcript, and dedup the reply.
    let provider_name = ctx.agent().provider().name().to_string();
    let _ = ctx.memory().record_usage(&UsageLog {
        id: 0,
        timestamp: Utc::now(),
        model: model.clone(),
        provider: provider_name,
        input_tokens: total_tokens_in,
        output_tokens: total_tokens_out,
        call_type: UsageCallType::Orchestrator,
        agent_id: None,
        channel_id: Some(input.channel_id.clone()),
    });
    info!(
        channel = %input.channel_id, model = %model,
        tokens_in = total_tokens_in, tokens_out = total_tokens_out, rounds = round,
        "orchestrator: turn complete"
    );

    if !final_content.is_empty() || !input.user_text.is_empty() {
        let stored_now = Utc::now();
        let _ = ctx.memory().store_message(&StoredMessage {
            id: 0,
            channel: input.channel_id.clone(),
            role: MessageRole::User,
            content: input.user_text.clone(),
            metadata: None,
            created_at: stored_now,
        });
        if !final_content.is_empty() {
            let _ = ctx.memory().store_message(&StoredMessage {
                id: 0,
                channel: input.channel_id.clone(),
                role: MessageRole::Assistant,
                content: final_content.clone(),
                metadata: None,
                created_at: Utc::now(),
            });
        }
    }

    // Edge case: drop the final content if it's already been delivered as
    // progress narration, so the caller doesn't resend it.
    if !last_progress_text.is_empty() && final_content == last_progress_text {
        return Ok(String::new());
    }

    // Edge case: never manufacture a placebo message when the cap was hit
    // with nothing useful to show — `final_content` is already empty here.
    Ok(final_content)
}

/// Deterministic narration for a round with no model text (spec.md §4.7
/// step 6, "on round one with no text, a deterministic summary").
fn describe_tool_calls(calls: &[ToolCall]) -> String {
    calls.iter().map(describe_tool_call).collect::<Vec<_>>().join(", ")
}

fn describe_tool_call(call: &ToolCall) -> String {
    match call.name.as_str() {
        "knowledge_search" => {
            let query = call.input.get("query").and_then(|v| v.as_str()).unwrap_or("");
            format!("Searching memory for \"{query}\"")
        }
        "reminder" => {
            let message = call.input.get("message").and_then(|v| v.as_str()).unwrap_or("");
            format!("Scheduling \"{message}\"")
        }
        other => format!("Running `{other}`"),
    }
}

/// Wrap a message with a `[channel YYYY-MM-DD HH:MM UTC]` envelope so the
/// model can see when each turn occurred.
fn format_envelope(channel: &str, at: &chrono::DateTime<Utc>, content: &str) -> String {
    format!("[{} {}] {}", channel, at.format("%Y-%m-%d %H:%M UTC"), content)
}

/// Rough char-count of a JSON value's string content, used to track the
/// running context budget without re-serializing on every round.
fn approx_json_chars(value: &serde_json::Value) -> usize {
    value.to_string().len()
}
