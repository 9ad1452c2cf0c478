//! teloxide message handler for the long-polling dispatcher.

use std::sync::Arc;

use teloxide::prelude::*;

use crate::context::TelegramContext;

pub async fn handle_message(
    _bot: Bot,
    ctx: Arc<TelegramContext>,
    msg: Message,
) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        // Media, stickers, etc. are ignored in this channel.
        return Ok(());
    };

    let username = msg
        .from
        .as_ref()
        .and_then(|u| u.username.clone())
        .unwrap_or_default();

    ctx.handle_inbound(msg.chat.id.0, &username, text).await;
    Ok(())
}
