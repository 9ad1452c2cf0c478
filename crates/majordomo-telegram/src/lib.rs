//! Telegram channel adapter.
//!
//! Wraps a teloxide `Bot` and drives the long-polling event loop. Inbound
//! messages pass through access control before anything reaches the session
//! pane; outbound assistant responses are chunked and MarkdownV2-escaped.

pub mod adapter;
pub mod context;
pub mod error;
pub mod handler;
pub mod send;
pub mod typing;

pub use adapter::TelegramAdapter;
pub use context::TelegramContext;
pub use error::{Result, TelegramError};
