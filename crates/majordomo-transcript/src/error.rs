use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("transcript directory missing: {0}")]
    DirMissing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("watcher error: {0}")]
    Watcher(String),
}

pub type Result<T> = std::result::Result<T, TranscriptError>;
