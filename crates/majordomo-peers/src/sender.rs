//! Outbound delivery: LAN direct first, fallback IP second, relay last.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ed25519_dalek::SigningKey;
use tracing::{debug, warn};

use majordomo_core::config::PeerConfig;
use majordomo_core::vault::SecretValue;

use crate::audit::{AuditLog, AuditRecord, Direction};
use crate::envelope::Envelope;
use crate::error::{PeerError, Result};
use crate::relay::RelayClient;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const TOTAL_TIMEOUT: Duration = Duration::from_secs(10);

/// How an envelope ultimately reached the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPath {
    Lan,
    LanFallback,
    Relay,
}

pub struct PeerSender {
    http: reqwest::Client,
    bearer: SecretValue,
    signing: SigningKey,
    relay: Option<RelayClient>,
    audit: Arc<AuditLog>,
}

impl PeerSender {
    pub fn new(
        bearer: SecretValue,
        signing: SigningKey,
        relay: Option<RelayClient>,
        audit: Arc<AuditLog>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(TOTAL_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            bearer,
            signing,
            relay,
            audit,
        })
    }

    /// Sign and deliver one envelope, trying LAN → fallback IP → relay.
    pub async fn send(&self, peer: &PeerConfig, mut envelope: Envelope) -> Result<DeliveryPath> {
        envelope.sign(&self.signing)?;
        let started = Instant::now();

        match self.post_lan(&peer.host, peer.port, &envelope).await {
            Ok(()) => {
                self.audit_ok(&envelope, started);
                return Ok(DeliveryPath::Lan);
            }
            Err(e) => debug!(peer = %peer.name, error = %e, "LAN delivery failed"),
        }

        if let Some(ip) = &peer.fallback_ip {
            match self.post_lan(ip, peer.port, &envelope).await {
                Ok(()) => {
                    self.audit_ok(&envelope, started);
                    return Ok(DeliveryPath::LanFallback);
                }
                Err(e) => debug!(peer = %peer.name, error = %e, "fallback IP delivery failed"),
            }
        }

        if let Some(relay) = &self.relay {
            match relay.send(&envelope).await {
                Ok(()) => {
                    self.audit_ok(&envelope, started);
                    return Ok(DeliveryPath::Relay);
                }
                Err(e) => {
                    warn!(peer = %peer.name, error = %e, "relay delivery failed");
                    self.audit_err(&envelope, &e);
                    return Err(e);
                }
            }
        }

        let err = PeerError::Delivery(format!("{} unreachable and no relay", peer.name));
        self.audit_err(&envelope, &err);
        Err(err)
    }

    async fn post_lan(&self, host: &str, port: u16, envelope: &Envelope) -> Result<()> {
        let url = format!("http://{host}:{port}/agent/message");
        let resp = self
            .http
            .post(&url)
            .bearer_auth(self.bearer.expose())
            .json(envelope)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(PeerError::Delivery(format!(
                "peer returned {}",
                resp.status()
            )));
        }
        Ok(())
    }

    fn audit_ok(&self, envelope: &Envelope, started: Instant) {
        self.audit.append(
            &AuditRecord::now(Direction::Send, &envelope.to, &envelope.kind.to_string())
                .with_message(&envelope.message_id, envelope.payload_text())
                .with_latency(started.elapsed().as_millis() as u64),
        );
    }

    fn audit_err(&self, envelope: &Envelope, error: &PeerError) {
        self.audit.append(
            &AuditRecord::now(Direction::Send, &envelope.to, &envelope.kind.to_string())
                .with_message(&envelope.message_id, envelope.payload_text())
                .with_error(&error.to_string()),
        );
    }
}
