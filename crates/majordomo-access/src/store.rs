//! Persistence for classification state.
//!
//! One JSON file for `{approved, denied, blocked, pending}`, a separate
//! higher-trust file for safe senders. Rewrites go through a temp file and
//! atomic rename; the safe list is read-only from the daemon's point of view.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::Utc;
use tracing::{info, warn};

use crate::error::Result;
use crate::types::{AccessState, SafeSender, SenderKey, Tier};

pub struct AccessStore {
    state_path: PathBuf,
    state: RwLock<AccessState>,
    safe: Vec<SafeSender>,
}

impl AccessStore {
    /// Load both files; missing files mean empty lists, not errors.
    pub fn open(state_path: PathBuf, safe_path: &Path) -> Result<Self> {
        let state = match std::fs::read_to_string(&state_path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => AccessState::default(),
            Err(e) => return Err(e.into()),
        };

        let safe = match std::fs::read_to_string(safe_path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        info!(
            approved = state.approved.len(),
            denied = state.denied.len(),
            blocked = state.blocked.len(),
            pending = state.pending.len(),
            safe = safe.len(),
            "access state loaded"
        );

        Ok(Self {
            state_path,
            state: RwLock::new(state),
            safe,
        })
    }

    /// Classification order: blocked → safe → approved (not expired) →
    /// denied → unknown. Expired approvals fall through to unknown; the
    /// periodic audit removes them.
    pub fn classify(&self, key: &SenderKey) -> Tier {
        let state = self.state.read().expect("access state poisoned");
        let now = Utc::now();

        if state
            .blocked
            .iter()
            .any(|b| b.channel == key.channel && b.id == key.id)
        {
            return Tier::Blocked;
        }
        if self
            .safe
            .iter()
            .any(|s| s.channel == key.channel && s.id == key.id)
        {
            return Tier::Safe;
        }
        if state
            .approved
            .iter()
            .any(|a| a.channel == key.channel && a.id == key.id && !a.is_expired(now))
        {
            return Tier::Approved;
        }
        if state
            .denied
            .iter()
            .any(|d| d.channel == key.channel && d.id == key.id)
        {
            return Tier::Denied;
        }
        Tier::Unknown
    }

    /// Run `mutate` against the state and persist the result atomically.
    pub fn update<R>(&self, mutate: impl FnOnce(&mut AccessState) -> R) -> Result<R> {
        let mut state = self.state.write().expect("access state poisoned");
        let out = mutate(&mut state);
        self.persist(&state)?;
        Ok(out)
    }

    pub fn snapshot(&self) -> AccessState {
        self.state.read().expect("access state poisoned").clone()
    }

    /// Remove expired approvals; returns what was dropped for reporting.
    pub fn prune_expired(&self) -> Result<Vec<String>> {
        self.update(|state| {
            let now = Utc::now();
            let mut dropped = Vec::new();
            state.approved.retain(|a| {
                if a.is_expired(now) {
                    dropped.push(format!("{}:{} ({})", a.channel, a.id, a.name));
                    false
                } else {
                    true
                }
            });
            dropped
        })
    }

    fn persist(&self, state: &AccessState) -> Result<()> {
        if let Some(parent) = self.state_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.state_path.with_extension("json.tmp");
        let raw = serde_json::to_vec_pretty(state)?;
        std::fs::write(&tmp, raw)?;
        if let Err(e) = std::fs::rename(&tmp, &self.state_path) {
            warn!(error = %e, "access state rename failed");
            return Err(e.into());
        }
        Ok(())
    }
}
