//! The Telegram adapter: long-polling dispatcher plus the outbound
//! [`Channel`] surface used by the router.

use std::sync::Arc;

use async_trait::async_trait;
use teloxide::prelude::*;
use tokio::sync::Mutex;
use tracing::info;

use majordomo_channels::{Channel, ChannelError, ChannelStatus};

use crate::context::TelegramContext;
use crate::handler::handle_message;
use crate::send::send_response;
use crate::typing::TypingHandle;

pub struct TelegramAdapter {
    bot: Bot,
    primary_chat_id: i64,
    typing: Mutex<Option<TypingHandle>>,
}

impl TelegramAdapter {
    pub fn new(bot: Bot, primary_chat_id: i64) -> Self {
        Self {
            bot,
            primary_chat_id,
            typing: Mutex::new(None),
        }
    }

    /// Drive the long-polling loop. Never returns — runs for the lifetime
    /// of the process.
    pub async fn run_polling(ctx: Arc<TelegramContext>) {
        info!("telegram: starting long-polling dispatcher");
        let bot = ctx.bot.clone();
        let handler = Update::filter_message().endpoint(handle_message);

        Dispatcher::builder(bot, handler)
            .dependencies(dptree::deps![ctx])
            .default_handler(|_upd| async {})
            .build()
            .dispatch()
            .await;
    }
}

#[async_trait]
impl Channel for TelegramAdapter {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send_message(&self, text: &str) -> Result<(), ChannelError> {
        send_response(&self.bot, ChatId(self.primary_chat_id), text).await;
        Ok(())
    }

    async fn start_typing(&self) {
        let mut guard = self.typing.lock().await;
        if guard.is_none() {
            *guard = Some(TypingHandle::start(
                self.bot.clone(),
                ChatId(self.primary_chat_id),
            ));
        }
    }

    async fn stop_typing(&self) {
        if let Some(handle) = self.typing.lock().await.take() {
            handle.stop();
        }
    }

    fn status(&self) -> ChannelStatus {
        ChannelStatus::Connected
    }
}
