use thiserror::Error;

/// Errors that can occur within any channel adapter.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The underlying transport could not be established.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A message could not be delivered to the remote endpoint.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// The channel rejected the supplied credentials or token.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// An operation exceeded its allowed time budget.
    #[error("Operation timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The channel-specific configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// No adapter is registered under the requested name.
    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    /// The progress fabric's underlying key-value store failed.
    #[error("key-value store error: {0}")]
    Kv(#[from] scalyclaw_kv::KvError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
