use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("tmux session not found: {0}")]
    SessionMissing(String),

    #[error("tmux spawn failed: {0}")]
    Spawn(String),

    #[error("tmux command failed ({command}): {stderr}")]
    Command { command: String, stderr: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;
