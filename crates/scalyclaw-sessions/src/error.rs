use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("key-value store error: {0}")]
    Kv(#[from] scalyclaw_kv::KvError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
