//! Outbound routing — decides which adapter receives the current assistant
//! response and coordinates typing indicators.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::{
    channel::Channel,
    error::{ChannelError, Result},
    pending::PendingVoice,
    types::Selection,
};

/// Ceiling after which a typing indicator is cleared even without an
/// explicit typing-done notification.
const TYPING_CEILING: Duration = Duration::from_secs(60);

/// Holds the "current channel" and the adapter registry.
pub struct Router {
    selection_path: PathBuf,
    current: RwLock<Selection>,
    adapters: RwLock<HashMap<String, Arc<dyn Channel>>>,
    pending_voice: PendingVoice,
}

impl Router {
    /// Restore the persisted selection (default: telegram) and start with an
    /// empty adapter registry.
    pub fn new(selection_path: PathBuf) -> Self {
        let current = std::fs::read_to_string(&selection_path)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(Selection::Telegram);
        info!(channel = %current, "router starting");

        Self {
            selection_path,
            current: RwLock::new(current),
            adapters: RwLock::new(HashMap::new()),
            pending_voice: PendingVoice::new(),
        }
    }

    pub fn register(&self, adapter: Arc<dyn Channel>) {
        let name = adapter.name().to_string();
        info!(channel = %name, "registering channel adapter");
        self.adapters
            .write()
            .expect("adapter registry poisoned")
            .insert(name, adapter);
    }

    pub fn adapter(&self, name: &str) -> Option<Arc<dyn Channel>> {
        self.adapters
            .read()
            .expect("adapter registry poisoned")
            .get(name)
            .cloned()
    }

    /// Update the current channel and persist it.
    pub fn set_channel(&self, selection: Selection) {
        debug!(channel = %selection, "channel switched");
        if let Err(e) = std::fs::write(&self.selection_path, selection.to_string()) {
            warn!(error = %e, "failed to persist channel selection");
        }
        *self.current.write().expect("selection poisoned") = selection;
    }

    pub fn channel(&self) -> Selection {
        self.current.read().expect("selection poisoned").clone()
    }

    pub fn pending_voice(&self) -> &PendingVoice {
        &self.pending_voice
    }

    /// Deliver one assistant message to the active channel.
    ///
    /// In the voice channel a pending wait consumes the message; without a
    /// waiter the text falls back to the chat adapter so it is not lost.
    pub async fn route_assistant_message(&self, text: &str) -> Result<()> {
        let selection = self.channel();

        if selection == Selection::Voice {
            if self.pending_voice.resolve(text) {
                debug!("assistant message resolved pending voice wait");
                return Ok(());
            }
            warn!("voice channel active but no pending wait — falling back to chat");
            return self.send_via("telegram", text).await;
        }

        self.send_via(selection.adapter_name(), text).await
    }

    /// Ask the chat adapter to show its typing signal, auto-cleared after
    /// [`TYPING_CEILING`] unless [`Router::stop_typing`] arrives first.
    pub fn start_typing(self: &Arc<Self>) {
        let Some(adapter) = self.adapter(self.channel().adapter_name()) else {
            return;
        };
        tokio::spawn(async move {
            adapter.start_typing().await;
            tokio::time::sleep(TYPING_CEILING).await;
            adapter.stop_typing().await;
        });
    }

    /// Explicit typing-done notification from the transcript stream.
    pub async fn stop_typing(&self) {
        if let Some(adapter) = self.adapter(self.channel().adapter_name()) {
            adapter.stop_typing().await;
        }
    }

    async fn send_via(&self, name: &str, text: &str) -> Result<()> {
        let adapter = self
            .adapter(name)
            .ok_or_else(|| ChannelError::AdapterMissing(name.to_string()))?;
        adapter.stop_typing().await;
        adapter.send_message(text).await
    }
}
