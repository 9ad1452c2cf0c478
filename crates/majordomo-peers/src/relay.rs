//! Relay client — the optional central queue used when direct LAN delivery
//! fails.
//!
//! Envelopes are signed before they reach the relay; the relay verifies and
//! queues them (TTL 7 days, 100 per agent). We poll our inbox on a fixed
//! interval, verify each envelope ourselves, and ack what we took.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::envelope::Envelope;
use crate::error::{PeerError, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const TOTAL_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct InboxResponse {
    #[serde(default)]
    messages: Vec<Envelope>,
}

pub struct RelayClient {
    http: reqwest::Client,
    base_url: String,
    agent: String,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>, agent: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(TOTAL_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            agent: agent.into(),
        })
    }

    /// Hand a signed envelope to the relay for queued delivery.
    pub async fn send(&self, envelope: &Envelope) -> Result<()> {
        let url = format!("{}/relay/send", self.base_url);
        let resp = self.http.post(&url).json(envelope).send().await?;
        if !resp.status().is_success() {
            return Err(PeerError::Delivery(format!(
                "relay send returned {}",
                resp.status()
            )));
        }
        debug!(to = %envelope.to, message_id = %envelope.message_id, "envelope relayed");
        Ok(())
    }

    /// Fetch everything queued for us. Does not ack.
    pub async fn poll(&self) -> Result<Vec<Envelope>> {
        let url = format!("{}/relay/inbox/{}", self.base_url, self.agent);
        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(PeerError::Delivery(format!(
                "relay poll returned {}",
                resp.status()
            )));
        }
        let inbox: InboxResponse = resp.json().await?;
        Ok(inbox.messages)
    }

    /// Acknowledge processed envelopes so the relay drops them.
    pub async fn ack(&self, message_ids: &[String]) -> Result<()> {
        if message_ids.is_empty() {
            return Ok(());
        }
        let url = format!("{}/relay/inbox/{}/ack", self.base_url, self.agent);
        let resp = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "messageIds": message_ids }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(PeerError::Delivery(format!(
                "relay ack returned {}",
                resp.status()
            )));
        }
        Ok(())
    }
}
