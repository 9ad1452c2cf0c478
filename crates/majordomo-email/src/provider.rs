use async_trait::async_trait;

use majordomo_channels::MailSummary;

use crate::error::Result;

/// An outbound email composed by the daemon.
#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Contract implemented by each configured mail backend (IMAP, JMAP,
/// Graph, …). Providers are tried in config order; the first to succeed
/// wins.
#[async_trait]
pub trait MailProvider: Send + Sync {
    /// Provider name from config (used in logs and failover messages).
    fn name(&self) -> &str;

    /// The mailbox address this provider serves.
    fn address(&self) -> &str;

    async fn fetch_unread(&self) -> Result<Vec<MailSummary>>;

    async fn send(&self, mail: &OutgoingMail) -> Result<()>;

    async fn mark_read(&self, id: &str) -> Result<()>;

    async fn move_to(&self, id: &str, folder: &str) -> Result<()>;
}
