use std::sync::Arc;

use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::app::AppState;

/// GET /status — compact status line.
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let snapshot = state.bridge.agent_snapshot();
    Json(json!({
        "agent": state.config.agent.name,
        "state": snapshot.state,
        "channel": state.router.channel().to_string(),
        "uptime_secs": (Utc::now() - state.started_at).num_seconds(),
    }))
}

/// GET /status/extended — rich status, local-only.
pub async fn status_extended_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let snapshot = state.bridge.agent_snapshot();
    let access = state.access.store().snapshot();
    let peers: Vec<Value> = state
        .peers
        .as_ref()
        .map(|p| {
            p.registry
                .snapshot()
                .into_iter()
                .map(|e| {
                    json!({
                        "name": e.config.name,
                        "status": e.last_known_status,
                        "last_heartbeat": e.last_heartbeat,
                        "latency_ms": e.latency_ms,
                        "key": e.key_status,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Json(json!({
        "agent": {
            "name": state.config.agent.name,
            "role": state.config.agent.role,
            "state": snapshot.state,
            "updated_at": snapshot.updated_at,
        },
        "session_exists": state.bridge.session_exists().await,
        "channel": state.router.channel().to_string(),
        "transcript": state.transcript.stats(),
        "tasks": state.scheduler.list(),
        "peers": peers,
        "peer_inbox_depth": state.peers.as_ref().map(|p| p.inbox.len()).unwrap_or(0),
        "access": {
            "approved": access.approved.len(),
            "denied": access.denied.len(),
            "blocked": access.blocked.len(),
            "pending": access.pending.len(),
        },
    }))
}
