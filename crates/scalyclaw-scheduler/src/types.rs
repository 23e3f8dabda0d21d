use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// spec.md §3 "ScheduledJob": `state` ∈ {active, completed, cancelled, failed}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduledJobState {
    Active,
    Completed,
    Cancelled,
    Failed,
}

impl std::fmt::Display for ScheduledJobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for ScheduledJobState {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown scheduled job state: {other}")),
        }
    }
}

/// `type` ∈ {reminder, recurrent-reminder, task, recurrent-task}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScheduledJobType {
    Reminder,
    RecurrentReminder,
    Task,
    RecurrentTask,
}

impl ScheduledJobType {
    pub fn is_recurrent(self) -> bool {
        matches!(self, Self::RecurrentReminder | Self::RecurrentTask)
    }

    pub fn is_reminder(self) -> bool {
        matches!(self, Self::Reminder | Self::RecurrentReminder)
    }

    pub fn is_task(self) -> bool {
        matches!(self, Self::Task | Self::RecurrentTask)
    }
}

impl std::fmt::Display for ScheduledJobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reminder => write!(f, "reminder"),
            Self::RecurrentReminder => write!(f, "recurrent-reminder"),
            Self::Task => write!(f, "task"),
            Self::RecurrentTask => write!(f, "recurrent-task"),
        }
    }
}

impl std::str::FromStr for ScheduledJobType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "reminder" => Ok(Self::Reminder),
            "recurrent-reminder" => Ok(Self::RecurrentReminder),
            "task" => Ok(Self::Task),
            "recurrent-task" => Ok(Self::RecurrentTask),
            other => Err(format!("unknown scheduled job type: {other}")),
        }
    }
}

/// Either a cron pattern or a plain millisecond interval, with an optional
/// IANA timezone name (spec.md §4.10 `{cron|intervalMs, timezone}`). The
/// timezone is carried for display/audit purposes only — recurrence itself
/// is computed in UTC, matching the teacher's all-UTC `compute_next_run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recurrence {
    Cron { cron: String, timezone: Option<String> },
    Interval { interval_ms: u64, timezone: Option<String> },
}

/// A persisted scheduled job: a `scheduled:<id>` KV hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: String,
    pub state: ScheduledJobState,
    pub job_type: ScheduledJobType,
    pub channel_id: String,
    pub description: String,
    pub cron_pattern: Option<String>,
    pub next_run: Option<DateTime<Utc>>,
    pub timezone: Option<String>,
    pub created_at: DateTime<Utc>,
}
