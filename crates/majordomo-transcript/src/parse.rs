//! Incremental parsing of transcript JSONL lines.
//!
//! A transcript line is one JSON object per message/event. We care only about
//! assistant text messages; everything else (tool use, progress, summaries)
//! is skipped without being counted as a parse error.

use serde_json::Value;

use crate::stream::AssistantMessage;

/// Message-id keys observed across Claude CLI versions, checked in order.
const ID_KEYS: [&str; 4] = ["messageId", "message_id", "id", "uuid"];

/// Outcome of parsing a single transcript line.
#[derive(Debug)]
pub enum ParsedLine {
    /// An assistant text message worth emitting.
    Assistant(AssistantMessage),
    /// Valid JSON that is not an assistant text message.
    Other,
    /// Not valid JSON (counted in stream stats).
    Invalid,
}

/// Parse one transcript line.
pub fn parse_line(line: &str) -> ParsedLine {
    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(_) => return ParsedLine::Invalid,
    };

    if value.get("type").and_then(Value::as_str) != Some("assistant") {
        return ParsedLine::Other;
    }

    let text = match extract_text(&value) {
        Some(t) if !t.is_empty() => t,
        _ => return ParsedLine::Other,
    };

    let message_id = match extract_message_id(&value) {
        Some(id) => id,
        None => return ParsedLine::Other,
    };

    ParsedLine::Assistant(AssistantMessage { text, message_id })
}

/// Pull the assistant text out of the nested `message.content` shape, with a
/// flat `text` field as a fallback for older recordings.
fn extract_text(value: &Value) -> Option<String> {
    let message = value.get("message");

    if let Some(content) = message.and_then(|m| m.get("content")) {
        match content {
            Value::String(s) => return Some(s.trim().to_string()),
            Value::Array(blocks) => {
                let joined: Vec<&str> = blocks
                    .iter()
                    .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                    .filter_map(|b| b.get("text").and_then(Value::as_str))
                    .collect();
                if !joined.is_empty() {
                    return Some(joined.join("\n").trim().to_string());
                }
                return None;
            }
            _ => return None,
        }
    }

    value
        .get("text")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
}

/// Different recordings use slightly different key names for the message id;
/// tolerate the known synonyms, preferring the nested message object.
fn extract_message_id(value: &Value) -> Option<String> {
    for holder in [value.get("message"), Some(value)].into_iter().flatten() {
        for key in ID_KEYS {
            if let Some(id) = holder.get(key).and_then(Value::as_str) {
                if !id.is_empty() {
                    return Some(id.to_string());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistant_text_block_parses() {
        let line = r#"{"type":"assistant","message":{"id":"msg_1","content":[{"type":"text","text":"hello"}]}}"#;
        match parse_line(line) {
            ParsedLine::Assistant(m) => {
                assert_eq!(m.text, "hello");
                assert_eq!(m.message_id, "msg_1");
            }
            other => panic!("expected assistant, got {other:?}"),
        }
    }

    #[test]
    fn multiple_text_blocks_join() {
        let line = r#"{"type":"assistant","message":{"id":"m","content":[{"type":"text","text":"a"},{"type":"tool_use","name":"x"},{"type":"text","text":"b"}]}}"#;
        match parse_line(line) {
            ParsedLine::Assistant(m) => assert_eq!(m.text, "a\nb"),
            other => panic!("expected assistant, got {other:?}"),
        }
    }

    #[test]
    fn message_id_synonyms_are_tolerated() {
        for key in ["messageId", "message_id", "id", "uuid"] {
            let line = format!(
                r#"{{"type":"assistant","{key}":"m-7","message":{{"content":"ok"}}}}"#
            );
            match parse_line(&line) {
                ParsedLine::Assistant(m) => assert_eq!(m.message_id, "m-7", "key {key}"),
                other => panic!("key {key}: expected assistant, got {other:?}"),
            }
        }
    }

    #[test]
    fn tool_only_content_is_other() {
        let line = r#"{"type":"assistant","message":{"id":"m","content":[{"type":"tool_use","name":"bash"}]}}"#;
        assert!(matches!(parse_line(line), ParsedLine::Other));
    }

    #[test]
    fn non_assistant_is_other() {
        let line = r#"{"type":"user","message":{"id":"m","content":"hi"}}"#;
        assert!(matches!(parse_line(line), ParsedLine::Other));
    }

    #[test]
    fn garbage_is_invalid() {
        assert!(matches!(parse_line("{not json"), ParsedLine::Invalid));
    }
}
