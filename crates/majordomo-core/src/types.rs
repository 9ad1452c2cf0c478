use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether the Claude session is free to accept proactive input.
///
/// Authoritative source: hook events from the Claude runtime. `Stop` means
/// the response finished (idle); every other event means work in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    Idle,
    Busy,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentState::Idle => write!(f, "idle"),
            AgentState::Busy => write!(f, "busy"),
        }
    }
}

/// Point-in-time view of the agent state, safe to hand out across tasks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub state: AgentState,
    /// When the last hook event arrived; `None` before the first event.
    pub updated_at: Option<DateTime<Utc>>,
}

impl AgentSnapshot {
    pub fn is_idle(&self) -> bool {
        self.state == AgentState::Idle
    }
}

/// Process-wide identity, built once at startup from config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub name: String,
    pub role: String,
    /// Names of configured peers, for status reporting.
    pub peers: Vec<String>,
}

/// What a peer last told us about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerStatus {
    Idle,
    Busy,
    Unknown,
}

impl fmt::Display for PeerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerStatus::Idle => write!(f, "idle"),
            PeerStatus::Busy => write!(f, "busy"),
            PeerStatus::Unknown => write!(f, "unknown"),
        }
    }
}
