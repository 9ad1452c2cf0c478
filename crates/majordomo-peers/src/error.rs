use thiserror::Error;

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("unknown peer: {0}")]
    UnknownPeer(String),

    #[error("envelope signature invalid")]
    BadSignature,

    #[error("envelope unsigned")]
    Unsigned,

    #[error("envelope timestamp outside the freshness window")]
    StaleTimestamp,

    #[error("replayed nonce")]
    ReplayedNonce,

    #[error("bad key material: {0}")]
    BadKey(String),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("relay not configured")]
    NoRelay,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PeerError {
    /// Protocol violations get 4xx-class responses and are never injected.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            PeerError::BadSignature
                | PeerError::Unsigned
                | PeerError::StaleTimestamp
                | PeerError::ReplayedNonce
        )
    }
}

pub type Result<T> = std::result::Result<T, PeerError>;
