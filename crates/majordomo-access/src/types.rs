use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trust tier of a sender at the moment of classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Blocked,
    Safe,
    Approved,
    Denied,
    Unknown,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tier::Blocked => "blocked",
            Tier::Safe => "safe",
            Tier::Approved => "approved",
            Tier::Denied => "denied",
            Tier::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// `(channel, sender id)` pair — the unit every list and limiter keys on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SenderKey {
    pub channel: String,
    pub id: String,
}

impl SenderKey {
    pub fn new(channel: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for SenderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.channel, self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovedSender {
    pub id: String,
    pub channel: String,
    pub name: String,
    pub approved_at: DateTime<Utc>,
    /// Expired entries behave as unknown on the next classification.
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: String,
}

impl ApprovedSender {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|t| t <= now).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeniedSender {
    pub id: String,
    pub channel: String,
    pub name: String,
    pub denied_at: DateTime<Utc>,
    /// Consecutive denials; reaching the auto-block threshold blocks.
    pub count: u32,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedSender {
    pub id: String,
    pub channel: String,
    pub name: String,
    pub blocked_at: DateTime<Utc>,
    /// Who blocked: "primary" or "auto".
    pub by: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingSender {
    pub id: String,
    pub channel: String,
    pub name: String,
    pub requested_at: DateTime<Utc>,
    pub message_preview: String,
}

/// Long-term trusted identity, kept in a separate higher-trust file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafeSender {
    pub id: String,
    pub channel: String,
    #[serde(default)]
    pub name: String,
}

/// Persisted classification state (`{approved, denied, blocked, pending}`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessState {
    #[serde(default)]
    pub approved: Vec<ApprovedSender>,
    #[serde(default)]
    pub denied: Vec<DeniedSender>,
    #[serde(default)]
    pub blocked: Vec<BlockedSender>,
    #[serde(default)]
    pub pending: Vec<PendingSender>,
}
