use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Key-value store error: {0}")]
    Kv(#[from] scalyclaw_kv::KvError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Job not found: {id}")]
    JobNotFound { id: String },

    #[error("Invalid repeat spec: {0}")]
    InvalidRepeat(String),

    #[error("Timed out after {ms}ms waiting for job {id}")]
    WaitTimeout { id: String, ms: u64 },

    #[error("Job {id} failed: {reason}")]
    JobFailed { id: String, reason: String },
}

pub type Result<T> = std::result::Result<T, QueueError>;
