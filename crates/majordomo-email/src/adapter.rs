//! The email adapter — [`Channel`] + [`Mailbox`] over an ordered provider
//! list with failover.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::{debug, warn};

use majordomo_channels::{Channel, ChannelError, ChannelStatus, MailSummary, Mailbox};

use crate::error::EmailError;
use crate::provider::{MailProvider, OutgoingMail};

pub struct EmailAdapter {
    providers: Vec<Arc<dyn MailProvider>>,
    /// Recipient of assistant responses while an `email:<addr>` channel is
    /// selected.
    active_recipient: RwLock<Option<String>>,
}

/// Providers are tried in config order; the first success wins and the last
/// failure is what the caller sees.
macro_rules! failover {
    ($self:expr, $what:literal, $p:ident => $call:expr) => {{
        let mut last_err = EmailError::NoProvider;
        let mut ok = None;
        for $p in &$self.providers {
            match $call.await {
                Ok(out) => {
                    debug!(provider = $p.name(), concat!("mail ", $what, " ok"));
                    ok = Some(out);
                    break;
                }
                Err(e) => {
                    warn!(
                        provider = $p.name(),
                        error = %e,
                        concat!("mail ", $what, " failed, trying next provider")
                    );
                    last_err = e;
                }
            }
        }
        ok.ok_or(last_err)
    }};
}

impl EmailAdapter {
    pub fn new(providers: Vec<Arc<dyn MailProvider>>) -> Self {
        Self {
            providers,
            active_recipient: RwLock::new(None),
        }
    }

    /// Called when the channel selection switches to `email:<addr>`.
    pub fn set_active_recipient(&self, addr: Option<String>) {
        *self
            .active_recipient
            .write()
            .expect("recipient lock poisoned") = addr;
    }

    pub fn has_providers(&self) -> bool {
        !self.providers.is_empty()
    }
}

#[async_trait]
impl Channel for EmailAdapter {
    fn name(&self) -> &str {
        "email"
    }

    async fn send_message(&self, text: &str) -> Result<(), ChannelError> {
        let to = self
            .active_recipient
            .read()
            .expect("recipient lock poisoned")
            .clone()
            .ok_or_else(|| ChannelError::NotConnected("no active email recipient".into()))?;

        let mail = OutgoingMail {
            to,
            subject: "Re: your message".to_string(),
            body: text.to_string(),
        };
        failover!(self, "send", p => p.send(&mail))
            .map_err(into_channel_error)
    }

    fn status(&self) -> ChannelStatus {
        if self.providers.is_empty() {
            ChannelStatus::Error("no providers configured".into())
        } else {
            ChannelStatus::Connected
        }
    }
}

#[async_trait]
impl Mailbox for EmailAdapter {
    async fn list_unread(&self) -> Result<Vec<MailSummary>, ChannelError> {
        failover!(self, "fetch", p => p.fetch_unread())
            .map_err(into_channel_error)
    }

    async fn mark_read(&self, id: &str) -> Result<(), ChannelError> {
        failover!(self, "mark_read", p => p.mark_read(id))
            .map_err(into_channel_error)
    }

    async fn move_to(&self, id: &str, folder: &str) -> Result<(), ChannelError> {
        failover!(self, "move", p => p.move_to(id, folder))
            .map_err(into_channel_error)
    }
}

fn into_channel_error(e: EmailError) -> ChannelError {
    ChannelError::Send {
        channel: "email".into(),
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use std::sync::Mutex;

    struct FakeProvider {
        name: &'static str,
        fail: bool,
        sent: Mutex<Vec<OutgoingMail>>,
        moved: Mutex<Vec<(String, String)>>,
    }

    impl FakeProvider {
        fn new(name: &'static str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                fail,
                sent: Mutex::new(Vec::new()),
                moved: Mutex::new(Vec::new()),
            })
        }

        fn err(&self) -> EmailError {
            EmailError::Provider {
                provider: self.name.to_string(),
                reason: "unavailable".to_string(),
            }
        }
    }

    #[async_trait]
    impl MailProvider for FakeProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn address(&self) -> &str {
            "me@example.com"
        }

        async fn fetch_unread(&self) -> Result<Vec<MailSummary>> {
            if self.fail {
                return Err(self.err());
            }
            Ok(vec![MailSummary {
                id: "m1".into(),
                from: "a@b.c".into(),
                subject: format!("via {}", self.name),
                snippet: String::new(),
                received_at: "2025-06-01T00:00:00Z".into(),
            }])
        }

        async fn send(&self, mail: &OutgoingMail) -> Result<()> {
            if self.fail {
                return Err(self.err());
            }
            self.sent.lock().unwrap().push(mail.clone());
            Ok(())
        }

        async fn mark_read(&self, _id: &str) -> Result<()> {
            if self.fail {
                return Err(self.err());
            }
            Ok(())
        }

        async fn move_to(&self, id: &str, folder: &str) -> Result<()> {
            if self.fail {
                return Err(self.err());
            }
            self.moved
                .lock()
                .unwrap()
                .push((id.to_string(), folder.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn failover_uses_the_next_provider_in_order() {
        let bad = FakeProvider::new("graph", true);
        let good = FakeProvider::new("imap", false);
        let adapter = EmailAdapter::new(vec![bad, good]);

        let unread = adapter.list_unread().await.unwrap();
        assert_eq!(unread[0].subject, "via imap");
    }

    #[tokio::test]
    async fn send_requires_an_active_recipient() {
        let provider = FakeProvider::new("imap", false);
        let adapter = EmailAdapter::new(vec![provider.clone()]);

        assert!(adapter.send_message("hello").await.is_err());

        adapter.set_active_recipient(Some("boss@example.com".into()));
        adapter.send_message("hello").await.unwrap();
        let sent = provider.sent.lock().unwrap();
        assert_eq!(sent[0].to, "boss@example.com");
        assert_eq!(sent[0].body, "hello");
    }

    #[tokio::test]
    async fn all_providers_failing_surfaces_the_last_error() {
        let adapter = EmailAdapter::new(vec![
            FakeProvider::new("graph", true),
            FakeProvider::new("imap", true),
        ]);
        let err = adapter.list_unread().await.unwrap_err();
        assert!(err.to_string().contains("imap"));
    }

    #[tokio::test]
    async fn move_to_reaches_the_provider() {
        let provider = FakeProvider::new("imap", false);
        let adapter = EmailAdapter::new(vec![provider.clone()]);
        adapter.move_to("m9", "Junk").await.unwrap();
        assert_eq!(
            provider.moved.lock().unwrap()[0],
            ("m9".to_string(), "Junk".to_string())
        );
    }

    #[tokio::test]
    async fn empty_provider_list_reports_error_status() {
        let adapter = EmailAdapter::new(vec![]);
        assert!(matches!(adapter.status(), ChannelStatus::Error(_)));
        assert!(adapter.list_unread().await.is_err());
    }
}
