//! Heartbeat / state exchange with peers.
//!
//! We POST our state to each peer's `/agent/status`; the peer answers with
//! its own. Both sides update their caches. Log and audit entries are
//! written only on state change or once per hour, to keep noise low.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use majordomo_core::config::PeerConfig;
use majordomo_core::types::PeerStatus;
use majordomo_core::vault::SecretValue;

use crate::audit::{AuditLog, AuditRecord, Direction};
use crate::error::{PeerError, Result};
use crate::registry::PeerRegistry;

/// Heartbeats get a hard 15-second budget.
const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(15);
/// Unchanged state is still recorded this often, for uptime stats.
const UPTIME_LOG_INTERVAL_SECS: i64 = 3_600;

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: PeerStatus,
}

pub struct Heartbeater {
    http: reqwest::Client,
    registry: Arc<PeerRegistry>,
    audit: Arc<AuditLog>,
    bearer: SecretValue,
    agent_name: String,
    last_logged: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl Heartbeater {
    pub fn new(
        registry: Arc<PeerRegistry>,
        audit: Arc<AuditLog>,
        bearer: SecretValue,
        agent_name: impl Into<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(HEARTBEAT_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            registry,
            audit,
            bearer,
            agent_name: agent_name.into(),
            last_logged: Mutex::new(HashMap::new()),
        })
    }

    /// One heartbeat round across all configured peers. Returns a summary
    /// line for the scheduler's task record.
    pub async fn run_once(&self, our_status: PeerStatus) -> String {
        let peers = self.registry.snapshot();
        let total = peers.len();
        let mut reachable = 0usize;

        for entry in peers {
            let peer = &entry.config;
            match self.exchange(peer, our_status).await {
                Ok((status, latency_ms)) => {
                    reachable += 1;
                    let changed =
                        self.registry
                            .update_peer_state(&peer.name, status, Some(latency_ms));
                    if changed {
                        info!(peer = %peer.name, %status, latency_ms, "peer state changed");
                    }
                    if self.should_record(&peer.name, changed) {
                        self.audit.append(
                            &AuditRecord::now(Direction::Heartbeat, &peer.name, "status")
                                .with_latency(latency_ms),
                        );
                    }
                }
                Err(e) => {
                    let changed = self.registry.mark_unreachable(&peer.name);
                    if changed {
                        warn!(peer = %peer.name, error = %e, "peer became unreachable");
                    } else {
                        debug!(peer = %peer.name, error = %e, "peer still unreachable");
                    }
                    if self.should_record(&peer.name, changed) {
                        self.audit.append(
                            &AuditRecord::now(Direction::Heartbeat, &peer.name, "status")
                                .with_error(&e.to_string()),
                        );
                    }
                }
            }
        }

        format!("{reachable}/{total} peers reachable")
    }

    /// POST our state; retry the configured fallback IP before declaring
    /// the peer unreachable.
    async fn exchange(
        &self,
        peer: &PeerConfig,
        our_status: PeerStatus,
    ) -> Result<(PeerStatus, u64)> {
        match self.post_status(&peer.host, peer.port, our_status).await {
            Ok(out) => Ok(out),
            Err(primary_err) => match &peer.fallback_ip {
                Some(ip) => self.post_status(ip, peer.port, our_status).await,
                None => Err(primary_err),
            },
        }
    }

    async fn post_status(
        &self,
        host: &str,
        port: u16,
        our_status: PeerStatus,
    ) -> Result<(PeerStatus, u64)> {
        let url = format!("http://{host}:{port}/agent/status");
        let started = Instant::now();
        let resp = self
            .http
            .post(&url)
            .bearer_auth(self.bearer.expose())
            .json(&serde_json::json!({
                "from": self.agent_name,
                "status": our_status,
            }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(PeerError::Delivery(format!(
                "status exchange returned {}",
                resp.status()
            )));
        }
        let body: StatusResponse = resp.json().await?;
        Ok((body.status, started.elapsed().as_millis() as u64))
    }

    /// Change-only recording with an hourly uptime line.
    fn should_record(&self, peer: &str, changed: bool) -> bool {
        let mut last = self.last_logged.lock().expect("heartbeat log map poisoned");
        let now = Utc::now();
        let due = match last.get(peer) {
            Some(at) => (now - *at).num_seconds() >= UPTIME_LOG_INTERVAL_SECS,
            None => true,
        };
        if changed || due {
            last.insert(peer.to_string(), now);
            true
        } else {
            false
        }
    }
}
