//! Peer plane — LAN message ingress, state exchange, memory sync, and the
//! signed p2p path.
//!
//! Protocol violations (bad signature, stale timestamp, replayed nonce) are
//! logged and answered with 4xx; they are never injected.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use majordomo_access::{InboundDecision, SenderKey};
use majordomo_core::types::PeerStatus;
use majordomo_peers::{format_envelope, keys, AuditRecord, Direction, Envelope, MessageKind};

use crate::app::{AppState, PeerPlane};
use crate::http::error_response;

/// 401 unless the request carries the shared LAN bearer secret.
fn check_bearer(peers: &PeerPlane, headers: &HeaderMap) -> Result<(), Response> {
    let presented = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match presented {
        Some(token) if token == peers.bearer.expose() => Ok(()),
        _ => Err(error_response(
            StatusCode::UNAUTHORIZED,
            "AUTH_FAILED",
            "missing or invalid bearer token",
        )),
    }
}

fn peers_or_503(state: &AppState) -> Result<&PeerPlane, Response> {
    state.peers.as_ref().ok_or_else(|| {
        error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "PEERS_DISABLED",
            "agent comms are disabled",
        )
    })
}

/// Validate freshness, replay, and (when a key is known or required) the
/// envelope signature.
fn validate_envelope(
    peers: &PeerPlane,
    envelope: &Envelope,
    require_signature: bool,
) -> Result<(), Response> {
    if envelope.check_fresh(Utc::now()).is_err() {
        warn!(from = %envelope.from, "stale envelope timestamp");
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "STALE_TIMESTAMP",
            "envelope timestamp outside the freshness window",
        ));
    }

    if !peers.nonces.observe(&envelope.nonce) {
        warn!(from = %envelope.from, message_id = %envelope.message_id, "replayed nonce");
        return Err(error_response(
            StatusCode::CONFLICT,
            "REPLAYED_NONCE",
            "nonce already seen",
        ));
    }

    let registered_key = peers
        .registry
        .get(&envelope.from)
        .and_then(|e| e.public_key);

    match registered_key {
        Some(raw) => {
            let key = keys::verifying_key_from_base64(&raw).map_err(|e| {
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "BAD_KEY", &e.to_string())
            })?;
            envelope.verify(&key).map_err(|e| {
                warn!(from = %envelope.from, error = %e, "envelope verification failed");
                error_response(
                    StatusCode::UNAUTHORIZED,
                    "BAD_SIGNATURE",
                    "signature does not verify",
                )
            })
        }
        None if require_signature => Err(error_response(
            StatusCode::UNAUTHORIZED,
            "NO_KEY",
            "no public key registered for sender",
        )),
        // LAN path without a pinned key: the bearer already vouches.
        None => Ok(()),
    }
}

/// Inject now when idle, otherwise queue FIFO until the next Stop hook.
async fn inject_or_queue(state: &AppState, peers: &PeerPlane, envelope: Envelope) -> Json<Value> {
    peers.audit.append(
        &AuditRecord::now(
            Direction::Receive,
            &envelope.from,
            &envelope.kind.to_string(),
        )
        .with_message(&envelope.message_id, envelope.payload_text()),
    );

    // A status envelope also refreshes the peer cache.
    if envelope.kind == MessageKind::Status {
        if let Some(status) = envelope
            .payload
            .get("status")
            .and_then(Value::as_str)
            .and_then(|s| serde_json::from_value::<PeerStatus>(json!(s)).ok())
        {
            peers.registry.update_peer_state(&envelope.from, status, None);
        }
    }

    if state.bridge.is_agent_idle() {
        let line = format_envelope(&envelope);
        if state.bridge.inject_text(&line, true).await {
            return Json(json!({"ok": true, "queued": false}));
        }
        warn!(from = %envelope.from, "peer inject failed — queueing");
    }

    peers.inbox.push(envelope);
    Json(json!({"ok": true, "queued": true}))
}

/// POST /agent/message — LAN direct path, bearer-authenticated.
pub async fn agent_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(mut envelope): Json<Envelope>,
) -> Response {
    let peers = match peers_or_503(&state) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    if let Err(resp) = check_bearer(peers, &headers) {
        return resp;
    }
    if let Err(resp) = validate_envelope(peers, &envelope, false) {
        return resp;
    }

    // Senders outside the configured peer registry go through the same
    // classification every other channel uses.
    if peers.registry.get(&envelope.from).is_none() {
        let key = SenderKey::new("agent", envelope.from.clone());
        let preview = envelope.payload_text().unwrap_or("");
        match state.access.check_inbound(&key, &envelope.from, preview) {
            Ok(InboundDecision::Inject { third_party }) => {
                if third_party {
                    if let Some(text) = envelope.payload_text().map(str::to_string) {
                        envelope.payload["text"] = json!(format!(
                            "{} {}",
                            majordomo_access::control::THIRD_PARTY_TAG,
                            text
                        ));
                    }
                }
            }
            Ok(InboundDecision::SilentDrop) => {
                // Blocked: no ack that reveals anything.
                return Json(json!({"ok": true})).into_response();
            }
            Ok(InboundDecision::Decline { reply }) => {
                return error_response(StatusCode::FORBIDDEN, "DENIED", &reply);
            }
            Ok(InboundDecision::Held { prompt }) => {
                if let Some(adapter) = state.router.adapter("telegram") {
                    let _ = adapter.send_message(&prompt).await;
                }
                return Json(json!({"ok": true, "held": true})).into_response();
            }
            Ok(InboundDecision::RateLimited { .. }) => {
                return error_response(
                    StatusCode::TOO_MANY_REQUESTS,
                    "RATE_LIMITED",
                    "slow down",
                );
            }
            Err(e) => {
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "ACCESS_ERROR",
                    &e.to_string(),
                )
            }
        }
    }

    inject_or_queue(&state, peers, envelope).await.into_response()
}

#[derive(Debug, Deserialize)]
pub struct StatusExchange {
    pub from: String,
    pub status: PeerStatus,
}

/// POST /agent/status — heartbeat exchange: record theirs, answer with ours.
pub async fn agent_status_exchange(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<StatusExchange>,
) -> Response {
    let peers = match peers_or_503(&state) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    if let Err(resp) = check_bearer(peers, &headers) {
        return resp;
    }

    let changed = peers.registry.update_peer_state(&body.from, body.status, None);
    if changed {
        info!(peer = %body.from, status = %body.status, "peer state changed (inbound heartbeat)");
    }

    let ours = if state.bridge.is_agent_idle() {
        PeerStatus::Idle
    } else {
        PeerStatus::Busy
    };
    Json(json!({"status": ours})).into_response()
}

/// GET /agent/status — one-sided probe.
pub async fn agent_status_get(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let peers = match peers_or_503(&state) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    if let Err(resp) = check_bearer(peers, &headers) {
        return resp;
    }
    let ours = if state.bridge.is_agent_idle() {
        PeerStatus::Idle
    } else {
        PeerStatus::Busy
    };
    Json(json!({"status": ours, "agent": state.config.agent.name})).into_response()
}

/// POST /agent/memory-sync — memory-sync envelopes ride the same pipeline.
pub async fn agent_memory_sync(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(envelope): Json<Envelope>,
) -> Response {
    let peers = match peers_or_503(&state) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    if let Err(resp) = check_bearer(peers, &headers) {
        return resp;
    }
    if envelope.kind != MessageKind::MemorySync {
        return error_response(
            StatusCode::BAD_REQUEST,
            "WRONG_TYPE",
            "expected a memory-sync envelope",
        );
    }
    if let Err(resp) = validate_envelope(peers, &envelope, false) {
        return resp;
    }
    inject_or_queue(&state, peers, envelope).await.into_response()
}

/// POST /agent/p2p — signature-authenticated ingress (no shared bearer);
/// requires a registered public key.
pub async fn agent_p2p(
    State(state): State<Arc<AppState>>,
    Json(envelope): Json<Envelope>,
) -> Response {
    let peers = match peers_or_503(&state) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    if let Err(resp) = validate_envelope(peers, &envelope, true) {
        return resp;
    }
    inject_or_queue(&state, peers, envelope).await.into_response()
}
