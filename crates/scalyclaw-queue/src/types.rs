use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// spec.md §3 "QueueJob" states: waiting → active → {completed, failed,
/// delayed}; repeats re-enter waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Waiting,
    Active,
    Completed,
    Failed,
    Delayed,
}

/// Either a cron pattern or a plain interval, with an optional timezone —
/// spec.md §4.5 `enqueue(..., repeat:{pattern|every, tz})`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RepeatSpec {
    Cron { pattern: String, tz: Option<String> },
    Every { every_ms: u64 },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnqueueOptions {
    #[serde(default)]
    pub attempts: Option<u32>,
    #[serde(default)]
    pub backoff_ms: Option<u64>,
    #[serde(default)]
    pub delay_ms: Option<u64>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub repeat: Option<RepeatSpec>,
    /// Permits channel-scoped bulk cancellation (spec.md §3 "A `channelId`
    /// field in payload permits channel-scoped bulk cancellation").
    #[serde(default)]
    pub channel_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueJob {
    pub id: String,
    pub queue: String,
    pub name: String,
    pub payload: serde_json::Value,
    pub state: JobState,
    pub attempts_made: u32,
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub priority: i32,
    pub repeat: Option<RepeatSpec>,
    pub channel_id: Option<String>,
    pub cancelled: bool,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
