use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("terminal error: {0}")]
    Terminal(#[from] scalyclaw_terminal::TerminalError),

    #[error("skill not found: {0}")]
    SkillNotFound(String),

    #[error("skill manifest invalid: {0}")]
    InvalidManifest(String),

    #[error("path escapes the worker root: {0}")]
    PathTraversal(String),

    #[error("unsupported job name: {0}")]
    UnsupportedJob(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WorkerError>;
