use thiserror::Error;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No value found for key: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, KvError>;
