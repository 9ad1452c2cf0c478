//! The single pending-voice slot, modeled as a one-shot mailbox.
//!
//! One producer (the `/voice/transcribe` handler installs a resolver and
//! awaits it) and one consumer (the transcript stream delivers the next
//! assistant message). A hard deadline always resolves the wait, either with
//! the text or with a timeout error, and clears the slot.

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::debug;

use majordomo_core::config::VOICE_WAIT_SECS;

use crate::error::ChannelError;

#[derive(Default)]
pub struct PendingVoice {
    slot: Mutex<Option<oneshot::Sender<String>>>,
}

impl PendingVoice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a resolver. Fails with [`ChannelError::VoiceBusy`] when a
    /// request is already outstanding.
    pub fn register(&self) -> Result<oneshot::Receiver<String>, ChannelError> {
        let mut slot = self.slot.lock().expect("voice slot poisoned");
        if slot.is_some() {
            return Err(ChannelError::VoiceBusy);
        }
        let (tx, rx) = oneshot::channel();
        *slot = Some(tx);
        Ok(rx)
    }

    /// Deliver the assistant's text to the waiting caller, if any.
    /// Returns true when a waiter consumed the message.
    pub fn resolve(&self, text: &str) -> bool {
        let tx = self.slot.lock().expect("voice slot poisoned").take();
        match tx {
            Some(tx) => tx.send(text.to_string()).is_ok(),
            None => false,
        }
    }

    pub fn clear(&self) {
        self.slot.lock().expect("voice slot poisoned").take();
    }

    pub fn is_pending(&self) -> bool {
        self.slot.lock().expect("voice slot poisoned").is_some()
    }

    /// Register and wait for the next assistant message with the standard
    /// 30-second deadline.
    pub async fn await_response(&self) -> Result<String, ChannelError> {
        self.await_response_within(Duration::from_secs(VOICE_WAIT_SECS))
            .await
    }

    /// Register and wait with an explicit deadline. On timeout the slot is
    /// cleared so the next request can proceed.
    pub async fn await_response_within(
        &self,
        deadline: Duration,
    ) -> Result<String, ChannelError> {
        let rx = self.register()?;
        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(text)) => Ok(text),
            // Sender dropped (slot cleared elsewhere) — treat as timeout.
            Ok(Err(_)) | Err(_) => {
                self.clear();
                debug!("pending voice wait expired");
                Err(ChannelError::VoiceTimeout {
                    secs: deadline.as_secs(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_delivers_to_waiter() {
        let pending = std::sync::Arc::new(PendingVoice::new());
        let p2 = std::sync::Arc::clone(&pending);

        let waiter = tokio::spawn(async move {
            p2.await_response_within(Duration::from_secs(5)).await
        });

        // Let the waiter install its resolver.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(pending.is_pending());
        assert!(pending.resolve("the answer"));

        assert_eq!(waiter.await.unwrap().unwrap(), "the answer");
        assert!(!pending.is_pending());
    }

    #[tokio::test]
    async fn second_registration_is_busy() {
        let pending = PendingVoice::new();
        let _rx = pending.register().unwrap();
        assert!(matches!(pending.register(), Err(ChannelError::VoiceBusy)));
    }

    #[tokio::test]
    async fn timeout_clears_the_slot() {
        let pending = PendingVoice::new();
        let err = pending
            .await_response_within(Duration::from_millis(30))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::VoiceTimeout { .. }));
        assert!(!pending.is_pending());
        // A new registration succeeds after the timeout.
        assert!(pending.register().is_ok());
    }

    #[test]
    fn resolve_without_waiter_is_false() {
        let pending = PendingVoice::new();
        assert!(!pending.resolve("nobody listening"));
    }
}
