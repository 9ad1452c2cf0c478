//! The process-wide peer cache.
//!
//! One module-private value; mutation happens only through the update
//! functions below, called from the heartbeat task and inbound peer
//! handlers. Everything else takes snapshots.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use majordomo_core::config::PeerConfig;
use majordomo_core::types::PeerStatus;

/// Registration status with the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    Pending,
    Active,
    Revoked,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeerEntry {
    pub config: PeerConfig,
    /// Base64 Ed25519 public key, once learned.
    pub public_key: Option<String>,
    pub key_status: KeyStatus,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub last_known_status: PeerStatus,
    pub latency_ms: Option<u64>,
}

pub struct PeerRegistry {
    peers: RwLock<HashMap<String, PeerEntry>>,
}

impl PeerRegistry {
    pub fn new(configs: &[PeerConfig]) -> Self {
        let peers = configs
            .iter()
            .map(|cfg| {
                let key_status = if cfg.public_key.is_some() {
                    KeyStatus::Active
                } else {
                    KeyStatus::Pending
                };
                (
                    cfg.name.clone(),
                    PeerEntry {
                        public_key: cfg.public_key.clone(),
                        key_status,
                        config: cfg.clone(),
                        last_heartbeat: None,
                        last_known_status: PeerStatus::Unknown,
                        latency_ms: None,
                    },
                )
            })
            .collect();
        Self {
            peers: RwLock::new(peers),
        }
    }

    pub fn get(&self, name: &str) -> Option<PeerEntry> {
        self.peers
            .read()
            .expect("peer cache poisoned")
            .get(name)
            .cloned()
    }

    pub fn snapshot(&self) -> Vec<PeerEntry> {
        let mut entries: Vec<PeerEntry> = self
            .peers
            .read()
            .expect("peer cache poisoned")
            .values()
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.config.name.cmp(&b.config.name));
        entries
    }

    /// Record a successful state exchange. Returns true when the peer's
    /// status changed (callers use this for change-only logging).
    pub fn update_peer_state(
        &self,
        name: &str,
        status: PeerStatus,
        latency_ms: Option<u64>,
    ) -> bool {
        let mut peers = self.peers.write().expect("peer cache poisoned");
        let Some(entry) = peers.get_mut(name) else {
            debug!(peer = name, "state update for unconfigured peer ignored");
            return false;
        };
        let changed = entry.last_known_status != status;
        entry.last_known_status = status;
        entry.last_heartbeat = Some(Utc::now());
        entry.latency_ms = latency_ms;
        changed
    }

    /// Record that the peer could not be reached (status becomes unknown).
    pub fn mark_unreachable(&self, name: &str) -> bool {
        let mut peers = self.peers.write().expect("peer cache poisoned");
        let Some(entry) = peers.get_mut(name) else {
            return false;
        };
        let changed = entry.last_known_status != PeerStatus::Unknown;
        entry.last_known_status = PeerStatus::Unknown;
        entry.latency_ms = None;
        changed
    }

    /// Learn or replace a peer's public key (from config or the relay).
    pub fn set_public_key(&self, name: &str, key: String, status: KeyStatus) {
        let mut peers = self.peers.write().expect("peer cache poisoned");
        if let Some(entry) = peers.get_mut(name) {
            entry.public_key = Some(key);
            entry.key_status = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(name: &str) -> PeerConfig {
        PeerConfig {
            name: name.to_string(),
            host: format!("{name}.local"),
            port: 18710,
            fallback_ip: None,
            public_key: None,
            teams: Vec::new(),
        }
    }

    #[test]
    fn update_reports_change_only_on_transition() {
        let reg = PeerRegistry::new(&[cfg("r2")]);
        assert!(reg.update_peer_state("r2", PeerStatus::Idle, Some(12)));
        assert!(!reg.update_peer_state("r2", PeerStatus::Idle, Some(15)));
        assert!(reg.update_peer_state("r2", PeerStatus::Busy, Some(15)));

        let entry = reg.get("r2").unwrap();
        assert_eq!(entry.last_known_status, PeerStatus::Busy);
        assert!(entry.last_heartbeat.is_some());
    }

    #[test]
    fn unreachable_resets_to_unknown() {
        let reg = PeerRegistry::new(&[cfg("r2")]);
        reg.update_peer_state("r2", PeerStatus::Idle, Some(9));
        assert!(reg.mark_unreachable("r2"));
        assert!(!reg.mark_unreachable("r2"));
        assert_eq!(reg.get("r2").unwrap().last_known_status, PeerStatus::Unknown);
    }

    #[test]
    fn unconfigured_peer_updates_are_ignored() {
        let reg = PeerRegistry::new(&[cfg("r2")]);
        assert!(!reg.update_peer_state("ghost", PeerStatus::Idle, None));
        assert!(reg.get("ghost").is_none());
    }

    #[test]
    fn snapshot_is_name_sorted() {
        let reg = PeerRegistry::new(&[cfg("zelda"), cfg("alpha")]);
        let snap = reg.snapshot();
        let names: Vec<&str> = snap.iter().map(|e| e.config.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zelda"]);
    }
}
