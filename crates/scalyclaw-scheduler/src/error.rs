use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("key-value store error: {0}")]
    Kv(#[from] scalyclaw_kv::KvError),

    #[error("queue error: {0}")]
    Queue(#[from] scalyclaw_queue::QueueError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("scheduled job not found: {id}")]
    JobNotFound { id: String },

    #[error("scheduled job {id} is a {actual}, not a {expected}")]
    WrongKind {
        id: String,
        expected: &'static str,
        actual: String,
    },

    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
