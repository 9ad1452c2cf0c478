use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid schedule for task {name}: {reason}")]
    InvalidSchedule { name: String, reason: String },

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("task {name} failed: {reason}")]
    TaskFailed { name: String, reason: String },

    #[error("state file error: {0}")]
    State(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
