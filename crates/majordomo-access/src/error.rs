use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("state file error: {0}")]
    State(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AccessError>;
