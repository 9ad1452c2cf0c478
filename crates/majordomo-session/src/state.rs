//! Agent idle/busy tracking, driven by hook events from the Claude runtime.

use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use majordomo_core::config::AGENT_STATE_STALE_SECS;
use majordomo_core::types::{AgentSnapshot, AgentState};

/// Hook event name that marks the end of a response.
pub const STOP_EVENT: &str = "Stop";

/// Tracks `{state, updated_at}` from hook events.
///
/// A `Stop` event transitions to idle; any other event transitions to busy.
/// Two fallbacks apply: before the first event the state is idle (fresh
/// start), and a busy state older than ten minutes is forced back to idle
/// (the hook pipeline may have broken).
#[derive(Debug)]
pub struct AgentStateTracker {
    inner: RwLock<Inner>,
}

#[derive(Debug, Clone, Copy)]
struct Inner {
    state: AgentState,
    updated_at: Option<DateTime<Utc>>,
}

impl AgentStateTracker {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                state: AgentState::Idle,
                updated_at: None,
            }),
        }
    }

    /// Record a hook event from the Claude runtime.
    pub fn update(&self, hook_event: &str) {
        let state = if hook_event == STOP_EVENT {
            AgentState::Idle
        } else {
            AgentState::Busy
        };
        let mut inner = self.inner.write().expect("agent state poisoned");
        inner.state = state;
        inner.updated_at = Some(Utc::now());
        debug!(event = hook_event, %state, "agent state updated");
    }

    /// Whether proactive injection is currently permitted.
    pub fn is_idle(&self) -> bool {
        self.snapshot().is_idle()
    }

    /// Current state with the staleness fallback applied.
    pub fn snapshot(&self) -> AgentSnapshot {
        let inner = *self.inner.read().expect("agent state poisoned");

        if inner.state == AgentState::Busy {
            if let Some(updated_at) = inner.updated_at {
                let age = Utc::now().signed_duration_since(updated_at);
                if age > Duration::seconds(AGENT_STATE_STALE_SECS as i64) {
                    warn!(
                        age_secs = age.num_seconds(),
                        "busy state stale — forcing idle (hook pipeline broken?)"
                    );
                    let mut w = self.inner.write().expect("agent state poisoned");
                    w.state = AgentState::Idle;
                    return AgentSnapshot {
                        state: AgentState::Idle,
                        updated_at: w.updated_at,
                    };
                }
            }
        }

        AgentSnapshot {
            state: inner.state,
            updated_at: inner.updated_at,
        }
    }

    #[cfg(test)]
    fn force(&self, state: AgentState, updated_at: Option<DateTime<Utc>>) {
        let mut inner = self.inner.write().unwrap();
        inner.state = state;
        inner.updated_at = updated_at;
    }
}

impl Default for AgentStateTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_tracker_is_idle() {
        let tracker = AgentStateTracker::new();
        assert!(tracker.is_idle());
        assert!(tracker.snapshot().updated_at.is_none());
    }

    #[test]
    fn stop_event_means_idle() {
        let tracker = AgentStateTracker::new();
        tracker.update("PreToolUse");
        assert!(!tracker.is_idle());
        tracker.update("Stop");
        assert!(tracker.is_idle());
    }

    #[test]
    fn any_other_event_means_busy() {
        let tracker = AgentStateTracker::new();
        for event in ["UserPromptSubmit", "PreToolUse", "PostToolUse", "SubagentStop"] {
            tracker.update("Stop");
            tracker.update(event);
            assert!(!tracker.is_idle(), "event {event} should mean busy");
        }
    }

    #[test]
    fn stale_busy_falls_back_to_idle() {
        let tracker = AgentStateTracker::new();
        tracker.force(
            AgentState::Busy,
            Some(Utc::now() - Duration::seconds(AGENT_STATE_STALE_SECS as i64 + 1)),
        );
        assert!(tracker.is_idle());
        // The forced transition sticks.
        assert_eq!(tracker.snapshot().state, AgentState::Idle);
    }

    #[test]
    fn recent_busy_is_not_stale() {
        let tracker = AgentStateTracker::new();
        tracker.force(AgentState::Busy, Some(Utc::now() - Duration::seconds(60)));
        assert!(!tracker.is_idle());
    }
}
