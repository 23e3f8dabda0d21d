//! `reminder` tool — schedule a proactive reminder via the scheduler engine.
//!
//! The AI calls this tool when the user asks "remind me in 2 hours", "send me
//! a heart image at midnight", etc. The tool creates a `ScheduledJob` through
//! `SchedulerManager`; the internal queue fires it and the delivery router
//! routes it to the appropriate channel.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use scalyclaw_core::reminder::ReminderAction;
use scalyclaw_scheduler::Recurrence;

use crate::pipeline::context::MessageContext;

use super::{Tool, ToolResult};

/// AI tool that creates, lists, and removes scheduled reminders.
pub struct ReminderTool<C: MessageContext + 'static> {
    ctx: Arc<C>,
    /// Delivery channel name stored in the reminder action (e.g. `"discord"`, `"ws"`, `"terminal"`).
    channel_name: String,
    /// Discord channel ID to deliver to, or `None` for WS broadcast.
    channel_id: Option<u64>,
    /// Session key for HTTP/terminal notification routing.
    session_key: Option<String>,
}

impl<C: MessageContext + 'static> ReminderTool<C> {
    pub fn new(
        ctx: Arc<C>,
        channel_name: &str,
        channel_id: Option<u64>,
        session_key: Option<&str>,
    ) -> Self {
        Self {
            ctx,
            channel_name: channel_name.to_string(),
            channel_id,
            session_key: session_key.map(String::from),
        }
    }

    /// Routing key used as `ScheduledJob::channel_id` — the scheduler treats
    /// this as an opaque string, the delivery router is what understands it.
    fn routing_channel_id(&self) -> String {
        self.session_key
            .clone()
            .unwrap_or_else(|| match self.channel_id {
                Some(id) => format!("{}:{}", self.channel_name, id),
                None => self.channel_name.clone(),
            })
    }

    fn build_action(&self, message: String, input: &Value) -> Result<String, String> {
        let action = ReminderAction {
            channel: self.channel_name.clone(),
            channel_id: self.channel_id,
            message,
            image_url: input.get("image_url").and_then(|v| v.as_str()).map(String::from),
            bash_command: input.get("bash_command").and_then(|v| v.as_str()).map(String::from),
            session_key: self.session_key.clone(),
        };
        serde_json::to_string(&action).map_err(|e| format!("serialization error: {e}"))
    }

    async fn add_reminder(&self, input: &Value) -> ToolResult {
        let message = match input.get("message").and_then(|v| v.as_str()) {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => return ToolResult::error("'message' is required for the add action"),
        };

        let description = match self.build_action(message, input) {
            Ok(d) => d,
            Err(e) => return ToolResult::error(e),
        };

        let channel_id = self.routing_channel_id();

        let result = if let Some(recurring) = input.get("recurring").and_then(|v| v.as_str()) {
            match Self::parse_recurring(recurring) {
                Ok(recurrence) => {
                    self.ctx
                        .scheduler()
                        .create_recurrent_reminder(&channel_id, &description, recurrence)
                        .await
                }
                Err(msg) => return ToolResult::error(msg),
            }
        } else if let Some(fire_at) = input.get("fire_at").and_then(|v| v.as_str()) {
            let dt = match chrono::DateTime::parse_from_rfc3339(fire_at) {
                Ok(dt) => dt.with_timezone(&chrono::Utc),
                Err(e) => return ToolResult::error(format!("invalid fire_at datetime: {e}")),
            };
            let delay_ms = (dt - chrono::Utc::now()).num_milliseconds().max(0) as u64;
            self.ctx.scheduler().create_reminder(&channel_id, &description, delay_ms).await
        } else if let Some(secs) = input.get("fire_in_seconds").and_then(|v| v.as_i64()) {
            if secs <= 0 {
                return ToolResult::error("fire_in_seconds must be a positive integer");
            }
            self.ctx
                .scheduler()
                .create_reminder(&channel_id, &description, secs as u64 * 1000)
                .await
        } else {
            return ToolResult::error(
                "one of 'fire_at', 'fire_in_seconds', or 'recurring' is required for add",
            );
        };

        match result {
            Ok(job) => ToolResult::success(format!(
                "Reminder scheduled!\n- Job ID: {}\n- Fires at: {}",
                job.id,
                job.next_run.map(|t| t.to_rfc3339()).unwrap_or_else(|| "unknown".to_string()),
            )),
            Err(e) => ToolResult::error(format!("failed to schedule reminder: {e}")),
        }
    }

    async fn list_reminders(&self) -> ToolResult {
        match self.ctx.scheduler().list_all_scheduled_jobs().await {
            Ok(jobs) => {
                let jobs: Vec<_> = jobs.into_iter().filter(|j| j.job_type.is_reminder()).collect();
                if jobs.is_empty() {
                    return ToolResult::success("No reminders scheduled.");
                }
                let mut out = format!("Scheduled reminders ({}):\n", jobs.len());
                for job in &jobs {
                    out.push_str(&format!(
                        "- ID: {} | Type: {} | Next: {} | Status: {}\n",
                        job.id,
                        job.job_type,
                        job.next_run.map(|t| t.to_rfc3339()).unwrap_or_else(|| "N/A".to_string()),
                        job.state,
                    ));
                }
                ToolResult::success(out)
            }
            Err(e) => ToolResult::error(format!("failed to list reminders: {e}")),
        }
    }

    async fn remove_reminder(&self, input: &Value) -> ToolResult {
        let job_id = match input.get("job_id").and_then(|v| v.as_str()) {
            Some(id) if !id.is_empty() => id,
            _ => return ToolResult::error("'job_id' is required for the remove action"),
        };

        match self.ctx.scheduler().cancel_reminder(job_id, &self.routing_channel_id()).await {
            Ok(()) => ToolResult::success(format!("Reminder '{job_id}' removed.")),
            Err(e) => ToolResult::error(format!("failed to remove reminder: {e}")),
        }
    }

    /// Parse `"daily|HH:MM"` or `"interval|N"` (seconds) into a [`Recurrence`].
    fn parse_recurring(s: &str) -> Result<Recurrence, String> {
        let mut parts = s.splitn(2, '|');
        let kind = parts.next().unwrap_or("");
        let rest = parts.next().unwrap_or("");

        match kind {
            "daily" => {
                let mut time = rest.splitn(2, ':');
                let hour: u8 = time
                    .next()
                    .unwrap_or("")
                    .parse()
                    .map_err(|_| "daily|HH:MM — invalid hour".to_string())?;
                let minute: u8 = time
                    .next()
                    .unwrap_or("")
                    .parse()
                    .map_err(|_| "daily|HH:MM — invalid minute".to_string())?;
                if hour > 23 || minute > 59 {
                    return Err(format!(
                        "daily|HH:MM — time {hour:02}:{minute:02} is out of range"
                    ));
                }
                Ok(Recurrence::Cron {
                    cron: format!("0 {minute} {hour} * * *"),
                    timezone: None,
                })
            }
            "interval" => {
                let secs: u64 = rest
                    .parse()
                    .map_err(|_| "interval|N — N must be a positive integer".to_string())?;
                if secs == 0 {
                    return Err("interval|N — N must be greater than 0".to_string());
                }
                Ok(Recurrence::Interval {
                    interval_ms: secs * 1000,
                    timezone: None,
                })
            }
            other => Err(format!(
                "unknown recurring type '{other}': use 'daily|HH:MM' or 'interval|N'"
            )),
        }
    }
}

#[async_trait]
impl<C: MessageContext + 'static> Tool for ReminderTool<C> {
    fn name(&self) -> &str {
        "reminder"
    }

    fn description(&self) -> &str {
        "ALWAYS use this tool when the user asks to be reminded, notified, or \
         woken up at a future time. The reminder is delivered to the user's \
         channel after the specified delay. Do NOT respond with reminder text \
         directly; call this tool instead. \
         Actions: 'add' (create), 'list' (view all), 'remove' (cancel by job_id)."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["add", "list", "remove"],
                    "description": "Operation: add a new reminder, list all reminders, or remove one."
                },
                "message": {
                    "type": "string",
                    "description": "Text to deliver when the reminder fires. Required for add."
                },
                "fire_at": {
                    "type": "string",
                    "description": "ISO-8601 UTC datetime when to fire (e.g. '2026-10-20T13:00:00Z'). Mutually exclusive with fire_in_seconds."
                },
                "fire_in_seconds": {
                    "type": "integer",
                    "description": "Seconds from now when to fire the reminder. Mutually exclusive with fire_at."
                },
                "recurring": {
                    "type": "string",
                    "description": "Optional recurrence pattern: 'daily|HH:MM' (UTC) or 'interval|N' (every N seconds). Overrides fire_at/fire_in_seconds."
                },
                "image_url": {
                    "type": "string",
                    "description": "Optional image URL to include (Discord auto-embeds bare image URLs)."
                },
                "bash_command": {
                    "type": "string",
                    "description": "Optional shell command to run at fire-time (e.g. 'free -h'). \
                                    Its stdout is appended to the message in a code block. \
                                    Use this when the reminder should report live system data."
                },
                "job_id": {
                    "type": "string",
                    "description": "Job ID returned by a previous add. Required for remove."
                }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, input: Value) -> ToolResult {
        let action = match input.get("action").and_then(|v| v.as_str()) {
            Some(a) => a,
            None => return ToolResult::error("missing required field 'action'"),
        };

        match action {
            "add" => self.add_reminder(&input).await,
            "list" => self.list_reminders().await,
            "remove" => self.remove_reminder(&input).await,
            other => ToolResult::error(format!(
                "unknown action '{other}': must be 'add', 'list', or 'remove'"
            )),
        }
    }
}
