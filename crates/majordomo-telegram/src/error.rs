use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Telegram API error: {0}")]
    Api(String),

    #[error("access control error: {0}")]
    Access(#[from] majordomo_access::AccessError),

    #[error("bot token unavailable: {0}")]
    Token(String),
}

pub type Result<T> = std::result::Result<T, TelegramError>;
