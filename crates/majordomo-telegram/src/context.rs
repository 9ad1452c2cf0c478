//! Shared inbound flow — used by both the long-polling handler and the
//! gateway webhook ingress.

use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{info, warn};

use majordomo_access::{AccessControl, InboundDecision, SenderKey};
use majordomo_access::control::{SLOW_DOWN_REPLY, THIRD_PARTY_TAG};
use majordomo_channels::{Router, Selection};
use majordomo_session::SessionBridge;

use crate::send::send_response;

/// Sent to the originating channel when an inject fails.
pub const INJECT_APOLOGY: &str = "Sorry — I couldn't reach my session just now. Please try again in a moment.";

pub struct TelegramContext {
    pub bot: Bot,
    pub access: Arc<AccessControl>,
    pub bridge: Arc<SessionBridge>,
    pub router: Arc<Router>,
    pub primary_chat_id: i64,
}

impl TelegramContext {
    /// Process one inbound Telegram message, wherever it arrived from.
    pub async fn handle_inbound(&self, chat_id: i64, username: &str, text: &str) {
        if chat_id == self.primary_chat_id {
            self.handle_primary(text).await;
        } else {
            self.handle_third_party(chat_id, username, text).await;
        }
    }

    /// The primary human: approval commands are intercepted; everything else
    /// goes straight into the session.
    async fn handle_primary(&self, text: &str) {
        match self.access.handle_primary_reply(text) {
            Ok(Some(outcome)) => {
                send_response(&self.bot, ChatId(self.primary_chat_id), &outcome.reply).await;
                for held in outcome.released {
                    let tagged = format!("{THIRD_PARTY_TAG}\n{held}");
                    if !self.bridge.inject_text(&tagged, true).await {
                        warn!("failed to inject released message");
                    }
                }
                return;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "approval reply handling failed");
                return;
            }
        }

        // Replies should come back on this channel.
        self.router.set_channel(Selection::Telegram);
        self.router.start_typing();

        if !self.bridge.inject_text(text, true).await {
            send_response(&self.bot, ChatId(self.primary_chat_id), INJECT_APOLOGY).await;
        }
    }

    /// Unsolicited senders go through classification and rate limiting.
    async fn handle_third_party(&self, chat_id: i64, username: &str, text: &str) {
        let key = SenderKey::new("telegram", chat_id.to_string());
        let decision = match self.access.check_inbound(&key, username, text) {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, sender = %key, "access check failed — dropping");
                return;
            }
        };

        match decision {
            InboundDecision::Inject { third_party } => {
                let payload = if third_party {
                    format!("{THIRD_PARTY_TAG}\n[Telegram] {username}: {text}")
                } else {
                    format!("[Telegram] {username}: {text}")
                };
                if !self.bridge.inject_text(&payload, true).await {
                    self.reply_limited(chat_id, INJECT_APOLOGY).await;
                }
            }
            InboundDecision::SilentDrop => {
                info!(sender = %key, "blocked sender dropped silently");
            }
            InboundDecision::Decline { reply } => {
                self.reply_limited(chat_id, &reply).await;
            }
            InboundDecision::Held { prompt } => {
                // The approval prompt goes to the primary on this channel.
                send_response(&self.bot, ChatId(self.primary_chat_id), &prompt).await;
            }
            InboundDecision::RateLimited { notify } => {
                if notify {
                    self.reply_limited(chat_id, SLOW_DOWN_REPLY).await;
                }
            }
        }
    }

    /// Reply to a third party, honoring the outgoing token bucket.
    async fn reply_limited(&self, chat_id: i64, text: &str) {
        let key = SenderKey::new("telegram", chat_id.to_string());
        if !self.access.allow_outgoing(&key) {
            warn!(recipient = %key, "outgoing rate limit — reply suppressed");
            return;
        }
        send_response(&self.bot, ChatId(chat_id), text).await;
    }
}
