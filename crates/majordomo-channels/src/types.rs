use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Runtime connection state of a channel adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    Connected,
    Connecting,
    Disconnected,
    Error(String),
}

/// Which outbound channel receives the current assistant response.
///
/// Persisted as a single short string; written by adapters when the human
/// switches modality, read by the router on every outbound send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Voice,
    Telegram,
    /// Telegram, but every assistant message is forwarded, not just finals.
    TelegramVerbose,
    Email(String),
}

impl Selection {
    /// Registry key of the adapter that serves this selection.
    pub fn adapter_name(&self) -> &str {
        match self {
            Selection::Voice => "voice",
            Selection::Telegram | Selection::TelegramVerbose => "telegram",
            Selection::Email(_) => "email",
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Voice => write!(f, "voice"),
            Selection::Telegram => write!(f, "telegram"),
            Selection::TelegramVerbose => write!(f, "telegram-verbose"),
            Selection::Email(addr) => write!(f, "email:{addr}"),
        }
    }
}

impl FromStr for Selection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "voice" => Ok(Selection::Voice),
            "telegram" => Ok(Selection::Telegram),
            "telegram-verbose" => Ok(Selection::TelegramVerbose),
            other => match other.strip_prefix("email:") {
                Some(addr) if !addr.is_empty() => Ok(Selection::Email(addr.to_string())),
                _ => Err(format!("unknown channel selection: {other:?}")),
            },
        }
    }
}

/// Minimal view of an unread message returned by mailbox adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailSummary {
    pub id: String,
    pub from: String,
    pub subject: String,
    pub snippet: String,
    /// ISO-8601 receive time as reported by the provider.
    pub received_at: String,
}
