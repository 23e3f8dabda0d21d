use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Key-value store error: {0}")]
    Kv(#[from] scalyclaw_kv::KvError),

    #[error("Secret not found: {0}")]
    NotFound(String),

    #[error("Encryption failed")]
    EncryptFailed,

    #[error("Decryption failed — wrong key or corrupted ciphertext")]
    DecryptFailed,

    #[error("Malformed ciphertext envelope: {0}")]
    MalformedEnvelope(String),

    #[error("I/O error reading password file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VaultError>;
