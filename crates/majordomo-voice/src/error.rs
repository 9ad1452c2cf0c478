use thiserror::Error;

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("Claude did not respond within 30 seconds")]
    ResponseTimeout,

    #[error("a voice request is already in flight")]
    Busy,

    #[error("speech-to-text failed: {0}")]
    Stt(String),

    #[error("text-to-speech failed: {0}")]
    Tts(String),

    #[error("could not inject transcript into the session")]
    InjectFailed,
}

pub type Result<T> = std::result::Result<T, VoiceError>;
