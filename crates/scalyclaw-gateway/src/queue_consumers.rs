//! `Processor` implementations the gateway runs over the queue fabric
//! (spec.md §4.5, §4.10, §4.11): `messages` (one full orchestrator turn per
//! job, request/reply via `QueueFabric::wait_until_finished`) and `internal`
//! (scheduler-fired reminder/task delivery).

use std::sync::Arc;

use async_trait::async_trait;
use scalyclaw_agent::pipeline::process_message_non_streaming;
use scalyclaw_agent::provider::ProviderError;
use scalyclaw_queue::{Processor, QueueJob};
use scalyclaw_scheduler::Recurrence;
use serde_json::json;
use tracing::warn;

use crate::app::AppState;

/// Runs one full orchestrator turn per `messages` job. The payload mirrors
/// `process_message_non_streaming`'s parameters so `POST /api/chat` and any
/// future channel adapter can enqueue the same shape (spec.md §6 "chat").
pub struct MessageProcessor {
    pub app: Arc<AppState>,
}

#[async_trait]
impl Processor for MessageProcessor {
    async fn process(&self, job: &QueueJob) -> Result<serde_json::Value, String> {
        let session_key = job
            .payload
            .get("session_key")
            .and_then(|v| v.as_str())
            .ok_or("missing 'session_key' field")?;
        let channel_name = job
            .payload
            .get("channel_name")
            .and_then(|v| v.as_str())
            .unwrap_or("http");
        let text = job
            .payload
            .get("text")
            .and_then(|v| v.as_str())
            .ok_or("missing 'text' field")?;
        let model = job.payload.get("model").and_then(|v| v.as_str());

        match process_message_non_streaming(
            &self.app,
            session_key,
            channel_name,
            text,
            None,
            model,
            None,
            None,
            None,
        )
        .await
        {
            Ok(r) => Ok(json!({
                "response": r.content,
                "model": r.model,
                "tokens_in": r.tokens_in,
                "tokens_out": r.tokens_out,
            })),
            Err(ProviderError::Cancelled) => Ok(json!({ "response": "Operation cancelled by /stop." })),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// Delivers a fired reminder/task to its channel, then reports completion
/// back to the scheduler so one-shot jobs terminalise and recurrent jobs
/// advance `next_run` (spec.md §4.10).
pub struct InternalProcessor {
    pub app: Arc<AppState>,
}

#[async_trait]
impl Processor for InternalProcessor {
    async fn process(&self, job: &QueueJob) -> Result<serde_json::Value, String> {
        let scheduled_job_id = job
            .payload
            .get("scheduled_job_id")
            .and_then(|v| v.as_str())
            .ok_or("missing 'scheduled_job_id' field")?;
        let channel_id = job
            .payload
            .get("channel_id")
            .and_then(|v| v.as_str())
            .unwrap_or(&job.queue);
        let description = job
            .payload
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or("");

        if let Err(e) = self.app.send_to_channel(channel_id, channel_id, description) {
            warn!(job_id = %job.id, error = %e, "internal job: channel delivery failed, buffering as notification");
            self.app
                .notifications
                .entry(channel_id.to_string())
                .or_default()
                .push(description.to_string());
        }

        let recurrence = job.repeat.as_ref().map(|r| match r {
            scalyclaw_queue::RepeatSpec::Cron { pattern, tz } => {
                Recurrence::Cron { cron: pattern.clone(), timezone: tz.clone() }
            }
            scalyclaw_queue::RepeatSpec::Every { every_ms } => {
                Recurrence::Interval { interval_ms: *every_ms, timezone: None }
            }
        });

        self.app
            .scheduler
            .handle_fired(scheduled_job_id, recurrence.as_ref())
            .await
            .map_err(|e| e.to_string())?;

        Ok(json!({ "delivered": true }))
    }
}
