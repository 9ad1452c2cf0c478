use thiserror::Error;

#[derive(Debug, Error)]
pub enum MajordomoError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Secret not found: {name}")]
    SecretNotFound { name: String },

    #[error("Vault access error: {0}")]
    Vault(String),

    #[error("Session bridge error: {0}")]
    Session(String),

    #[error("Channel error ({channel}): {reason}")]
    Channel { channel: String, reason: String },

    #[error("Rate limited: {reason}")]
    RateLimited { reason: String },

    #[error("Peer protocol violation: {0}")]
    PeerProtocol(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request timeout after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MajordomoError {
    /// Short error code string sent to clients in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            MajordomoError::Config(_) => "CONFIG_ERROR",
            MajordomoError::AuthFailed(_) => "AUTH_FAILED",
            MajordomoError::SecretNotFound { .. } => "SECRET_NOT_FOUND",
            MajordomoError::Vault(_) => "VAULT_ERROR",
            MajordomoError::Session(_) => "SESSION_ERROR",
            MajordomoError::Channel { .. } => "CHANNEL_ERROR",
            MajordomoError::RateLimited { .. } => "RATE_LIMITED",
            MajordomoError::PeerProtocol(_) => "PEER_PROTOCOL_ERROR",
            MajordomoError::Serialization(_) => "SERIALIZATION_ERROR",
            MajordomoError::Io(_) => "IO_ERROR",
            MajordomoError::Timeout { .. } => "TIMEOUT",
            MajordomoError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, MajordomoError>;
