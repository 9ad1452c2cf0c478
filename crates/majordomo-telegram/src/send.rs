//! Message sending helpers.
//!
//! Telegram caps messages at 4096 characters; we stop at 4000 so a closing
//! code fence always fits. MarkdownV2 is tried first with a plain-text
//! fallback when Telegram rejects the escaping.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::warn;

const CHUNK_MAX: usize = 4_000;
/// Pause between consecutive chunks so we stay under Telegram's send rate.
const INTER_CHUNK_DELAY: Duration = Duration::from_millis(100);

/// Split `text` into sendable chunks on line boundaries, keeping fenced code
/// blocks valid: an open fence is closed at a chunk boundary and reopened
/// with its language in the next chunk.
pub fn split_message(text: &str) -> Vec<String> {
    if text.len() <= CHUNK_MAX {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut open_fence: Option<String> = None;

    for line in text.split('\n') {
        let added = line.len() + if current.is_empty() { 0 } else { 1 };
        if !current.is_empty() && current.len() + added > CHUNK_MAX {
            if open_fence.is_some() {
                current.push_str("\n```");
            }
            chunks.push(std::mem::take(&mut current));
            if let Some(lang) = &open_fence {
                current.push_str("```");
                current.push_str(lang);
                current.push('\n');
            }
        }

        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);

        if let Some(rest) = line.trim_start().strip_prefix("```") {
            open_fence = match open_fence {
                Some(_) => None,
                None => Some(rest.trim().to_string()),
            };
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    // A single line longer than the cap still has to be broken somewhere.
    let mut out = Vec::new();
    for chunk in chunks {
        if chunk.len() <= CHUNK_MAX {
            out.push(chunk);
            continue;
        }
        let mut rest = chunk.as_str();
        while rest.len() > CHUNK_MAX {
            let cut = rest[..CHUNK_MAX]
                .rfind(char::is_whitespace)
                .unwrap_or(CHUNK_MAX);
            out.push(rest[..cut].to_string());
            rest = rest[cut..].trim_start();
        }
        if !rest.is_empty() {
            out.push(rest.to_string());
        }
    }
    out
}

/// Escape the characters MarkdownV2 treats as markup.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    for ch in text.chars() {
        if matches!(
            ch,
            '_' | '*' | '[' | ']' | '(' | ')' | '~' | '`' | '>' | '#' | '+' | '-' | '=' | '|'
                | '{' | '}' | '.' | '!'
        ) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Send `text` to `chat_id`, chunked, MarkdownV2 with plain fallback.
pub async fn send_response(bot: &Bot, chat_id: ChatId, text: &str) {
    let chunks = split_message(text);
    let count = chunks.len();
    for (i, chunk) in chunks.into_iter().enumerate() {
        let rendered = bot
            .send_message(chat_id, escape_markdown_v2(&chunk))
            .parse_mode(ParseMode::MarkdownV2)
            .await;

        if rendered.is_err() {
            if let Err(e) = bot.send_message(chat_id, &chunk).await {
                warn!(error = %e, chunk = i, "telegram send failed in both modes");
            }
        }

        if i + 1 < count {
            tokio::time::sleep(INTER_CHUNK_DELAY).await;
        }
    }
}
