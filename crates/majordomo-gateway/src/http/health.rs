use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;

use crate::app::AppState;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// GET /health — full health report, JSON or text by `Accept`.
pub async fn health_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds();
    let snapshot = state.bridge.agent_snapshot();
    let session_up = state.bridge.session_exists().await;
    let stats = state.transcript.stats();
    let peers_reachable = state
        .peers
        .as_ref()
        .map(|p| {
            p.registry
                .snapshot()
                .iter()
                .filter(|e| e.last_heartbeat.is_some())
                .count()
        })
        .unwrap_or(0);

    let wants_text = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/plain"))
        .unwrap_or(false);

    if wants_text {
        let report = format!(
            "status: ok\nversion: {VERSION}\nuptime: {uptime_secs}s\nagent: {}\nsession: {}\nchannel: {}\ntranscript: emitted={} dup={} errors={}\npeers_reachable: {peers_reachable}\n",
            snapshot.state,
            if session_up { "up" } else { "down" },
            state.router.channel(),
            stats.emitted,
            stats.dropped_duplicate,
            stats.parse_errors,
        );
        return report.into_response();
    }

    Json(json!({
        "status": "ok",
        "version": VERSION,
        "uptime_secs": uptime_secs,
        "agent": {
            "name": state.config.agent.name,
            "state": snapshot.state,
            "updated_at": snapshot.updated_at,
        },
        "session": session_up,
        "channel": state.router.channel().to_string(),
        "transcript": stats,
        "peers_reachable": peers_reachable,
    }))
    .into_response()
}
