use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("no mail provider available")]
    NoProvider,

    #[error("provider {provider} failed: {reason}")]
    Provider { provider: String, reason: String },

    #[error("invalid triage pattern {pattern:?}: {reason}")]
    Pattern { pattern: String, reason: String },
}

pub type Result<T> = std::result::Result<T, EmailError>;
