use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel not connected: {0}")]
    NotConnected(String),

    #[error("no adapter registered for channel: {0}")]
    AdapterMissing(String),

    #[error("send failed ({channel}): {reason}")]
    Send { channel: String, reason: String },

    #[error("a voice request is already pending")]
    VoiceBusy,

    #[error("no voice response within {secs}s")]
    VoiceTimeout { secs: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
