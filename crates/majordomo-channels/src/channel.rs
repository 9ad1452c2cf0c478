use async_trait::async_trait;

use crate::{
    error::ChannelError,
    types::{ChannelStatus, MailSummary},
};

/// Common interface implemented by every channel adapter (Telegram, email,
/// voice). A new adapter adds only a registration to the router and the HTTP
/// multiplexer — no core changes.
///
/// Implementations must be `Send + Sync` so they can live behind the router
/// and be driven from multiple Tokio tasks.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Stable lowercase identifier for this channel (e.g. `"telegram"`).
    fn name(&self) -> &str;

    /// Deliver one outbound message to the channel's active recipient.
    async fn send_message(&self, text: &str) -> Result<(), ChannelError>;

    /// Begin the channel's "typing…" signal, if it has one. Default: no-op.
    async fn start_typing(&self) {}

    /// Clear the typing signal. Must be idempotent. Default: no-op.
    async fn stop_typing(&self) {}

    /// Return the current runtime status without blocking.
    fn status(&self) -> ChannelStatus;
}

/// Extra capabilities offered by mail-backed adapters.
#[async_trait]
pub trait Mailbox: Send + Sync {
    async fn list_unread(&self) -> Result<Vec<MailSummary>, ChannelError>;

    async fn mark_read(&self, id: &str) -> Result<(), ChannelError>;

    async fn move_to(&self, id: &str, folder: &str) -> Result<(), ChannelError>;
}
