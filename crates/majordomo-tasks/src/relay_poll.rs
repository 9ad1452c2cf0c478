//! Relay inbox drain — fetch queued envelopes, verify them, and hand them
//! to the same local pipeline LAN messages use.

use std::sync::Arc;

use tracing::warn;

use majordomo_peers::{format_envelope, keys, AuditRecord, Direction};
use majordomo_scheduler::{RegisteredTask, TaskFuture};

use crate::deps::TaskDeps;

pub fn task(deps: &Arc<TaskDeps>) -> RegisteredTask {
    let deps = Arc::clone(deps);
    RegisteredTask::new("relay-poll", move || -> TaskFuture {
        let deps = Arc::clone(&deps);
        Box::pin(async move {
            let (Some(relay), Some(registry), Some(inbox)) = (
                deps.relay.as_ref(),
                deps.peer_registry.as_ref(),
                deps.peer_inbox.as_ref(),
            ) else {
                return Ok("relay disabled".to_string());
            };

            let envelopes = relay
                .poll()
                .await
                .map_err(|e| anyhow::anyhow!("relay poll: {e}"))?;
            if envelopes.is_empty() {
                return Ok("relay inbox empty".to_string());
            }

            let mut accepted = Vec::new();
            for envelope in envelopes {
                let Some(entry) = registry.get(&envelope.from) else {
                    warn!(peer = %envelope.from, "relay envelope from unconfigured peer dropped");
                    continue;
                };
                let Some(pubkey_b64) = entry.public_key.as_deref() else {
                    warn!(peer = %envelope.from, "no public key registered — envelope dropped");
                    continue;
                };
                let pubkey = match keys::verifying_key_from_base64(pubkey_b64) {
                    Ok(k) => k,
                    Err(e) => {
                        warn!(peer = %envelope.from, error = %e, "bad registered key");
                        continue;
                    }
                };
                if let Err(e) = envelope.verify(&pubkey) {
                    warn!(peer = %envelope.from, error = %e, "relay envelope failed verification");
                    continue;
                }

                if let Some(audit) = deps.peer_audit.as_ref() {
                    audit.append(
                        &AuditRecord::now(
                            Direction::Receive,
                            &envelope.from,
                            &envelope.kind.to_string(),
                        )
                        .with_message(&envelope.message_id, envelope.payload_text()),
                    );
                }

                accepted.push(envelope);
            }

            // Ack what we took before injection so the relay can drop it;
            // anything still queued locally survives in the peer inbox.
            let ids: Vec<String> = accepted.iter().map(|e| e.message_id.clone()).collect();
            relay
                .ack(&ids)
                .await
                .map_err(|e| anyhow::anyhow!("relay ack: {e}"))?;

            let mut injected = 0usize;
            for envelope in accepted {
                if deps.bridge.is_agent_idle() {
                    let line = format_envelope(&envelope);
                    if deps.bridge.inject_text(&line, true).await {
                        injected += 1;
                        continue;
                    }
                }
                inbox.push(envelope);
            }

            Ok(format!("{} acked, {injected} injected", ids.len()))
        })
    })
    .without_session()
}
