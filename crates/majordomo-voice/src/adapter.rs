//! Voice client registration and the proactive-notification queue.
//!
//! The satellite client registers itself, then polls for queued spoken
//! notifications; the actual utterance round trip lives in
//! [`crate::pipeline::VoicePipeline`].

use std::collections::VecDeque;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use majordomo_channels::{Channel, ChannelError, ChannelStatus};

/// Cap on queued notifications while the client is away.
const NOTIFY_CAP: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct ClientRegistration {
    pub client_id: String,
    pub registered_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct VoiceAdapter {
    client: RwLock<Option<ClientRegistration>>,
    notifications: Mutex<VecDeque<String>>,
}

impl VoiceAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_client(&self, client_id: &str) {
        info!(client_id, "voice client registered");
        *self.client.write().expect("voice client poisoned") = Some(ClientRegistration {
            client_id: client_id.to_string(),
            registered_at: Utc::now(),
        });
    }

    pub fn client(&self) -> Option<ClientRegistration> {
        self.client.read().expect("voice client poisoned").clone()
    }

    /// Queue a message for the client to speak on its next poll.
    pub fn queue_notification(&self, text: &str) {
        let mut queue = self.notifications.lock().expect("notify queue poisoned");
        if queue.len() >= NOTIFY_CAP {
            queue.pop_front();
        }
        queue.push_back(text.to_string());
    }

    /// Drain everything queued, oldest first.
    pub fn drain_notifications(&self) -> Vec<String> {
        self.notifications
            .lock()
            .expect("notify queue poisoned")
            .drain(..)
            .collect()
    }
}

#[async_trait]
impl Channel for VoiceAdapter {
    fn name(&self) -> &str {
        "voice"
    }

    async fn send_message(&self, text: &str) -> Result<(), ChannelError> {
        if self.client().is_none() {
            return Err(ChannelError::NotConnected("no voice client".into()));
        }
        self.queue_notification(text);
        Ok(())
    }

    fn status(&self) -> ChannelStatus {
        if self.client().is_some() {
            ChannelStatus::Connected
        } else {
            ChannelStatus::Disconnected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_requires_a_registered_client() {
        let adapter = VoiceAdapter::new();
        assert!(adapter.send_message("hello").await.is_err());
        assert!(matches!(adapter.status(), ChannelStatus::Disconnected));

        adapter.register_client("kitchen-satellite");
        adapter.send_message("dinner time").await.unwrap();
        assert_eq!(adapter.drain_notifications(), vec!["dinner time"]);
        assert!(adapter.drain_notifications().is_empty());
    }

    #[test]
    fn notification_queue_drops_oldest_at_cap() {
        let adapter = VoiceAdapter::new();
        for i in 0..55 {
            adapter.queue_notification(&format!("n{i}"));
        }
        let drained = adapter.drain_notifications();
        assert_eq!(drained.len(), 50);
        assert_eq!(drained[0], "n5");
    }
}
