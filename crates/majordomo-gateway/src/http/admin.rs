//! Local-only admin surface.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use majordomo_peers::Envelope;

use crate::app::AppState;
use crate::http::error_response;

/// GET /tasks — status rows for every bound task.
pub async fn list_tasks(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "tasks": state.scheduler.list() }))
}

/// POST /tasks/{name}/run — manual trigger; bypasses the idle gate and
/// leaves the cron schedule untouched.
pub async fn run_task(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Response {
    info!(task = %name, "manual task trigger via admin endpoint");
    match state.scheduler.run_now(&name).await {
        Ok(output) => Json(json!({"ok": true, "output": output})).into_response(),
        Err(majordomo_scheduler::SchedulerError::TaskNotFound(name)) => error_response(
            StatusCode::NOT_FOUND,
            "TASK_NOT_FOUND",
            &format!("no task named {name}"),
        ),
        Err(e) => Json(json!({"ok": false, "error": e.to_string()})).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default = "default_lines")]
    pub lines: usize,
}

fn default_lines() -> usize {
    200
}

/// GET /logs — tail of the newest daemon log file.
pub async fn tail_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogsQuery>,
) -> Response {
    let newest = match newest_log(&state.log_dir) {
        Some(path) => path,
        None => {
            return error_response(StatusCode::NOT_FOUND, "NO_LOGS", "no log files yet")
        }
    };

    match std::fs::read_to_string(&newest) {
        Ok(raw) => {
            let lines: Vec<&str> = raw.lines().collect();
            let start = lines.len().saturating_sub(query.lines.min(5_000));
            lines[start..].join("\n").into_response()
        }
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "IO_ERROR",
            &e.to_string(),
        ),
    }
}

fn newest_log(dir: &std::path::Path) -> Option<std::path::PathBuf> {
    let mut best: Option<(std::path::PathBuf, std::time::SystemTime)> = None;
    for entry in std::fs::read_dir(dir).ok()? {
        let entry = entry.ok()?;
        let modified = entry.metadata().ok()?.modified().ok()?;
        if best.as_ref().map(|(_, t)| modified > *t).unwrap_or(true) {
            best = Some((entry.path(), modified));
        }
    }
    best.map(|(p, _)| p)
}

/// POST /session/clear — type `/clear` into the session.
pub async fn session_clear(State(state): State<Arc<AppState>>) -> Response {
    if state.bridge.inject_text("/clear", true).await {
        Json(json!({"ok": true})).into_response()
    } else {
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "SESSION_ERROR",
            "could not clear the session",
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct AgentSendBody {
    pub peer: String,
    pub text: String,
}

/// POST /agent/send — have this daemon message a peer (operator tooling).
pub async fn agent_send(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AgentSendBody>,
) -> Response {
    let Some(peers) = &state.peers else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "PEERS_DISABLED",
            "agent comms are disabled",
        );
    };
    let Some(entry) = peers.registry.get(&body.peer) else {
        return error_response(
            StatusCode::NOT_FOUND,
            "UNKNOWN_PEER",
            &format!("no peer named {}", body.peer),
        );
    };

    let envelope = Envelope::text(&state.config.agent.name, &body.peer, &body.text);
    match peers.sender.send(&entry.config, envelope).await {
        Ok(path) => Json(json!({"ok": true, "path": format!("{path:?}")})).into_response(),
        Err(e) => error_response(StatusCode::BAD_GATEWAY, "DELIVERY_FAILED", &e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub struct ChannelBody {
    pub channel: String,
}

/// POST /channel — switch the active outbound channel.
pub async fn set_channel(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChannelBody>,
) -> Response {
    match body.channel.parse::<majordomo_channels::Selection>() {
        Ok(selection) => {
            state.router.set_channel(selection);
            Json(json!({"ok": true})).into_response()
        }
        Err(e) => error_response(StatusCode::BAD_REQUEST, "BAD_CHANNEL", &e),
    }
}

#[derive(Debug, Deserialize)]
pub struct WorkerSignal {
    pub event: String,
}

/// POST /worker/signal — internal helpers report lifecycle events the same
/// way runtime hooks do.
pub async fn worker_signal(
    State(state): State<Arc<AppState>>,
    Json(body): Json<WorkerSignal>,
) -> Json<Value> {
    state.bridge.update_agent_state(&body.event);
    state.transcript.kick(majordomo_transcript::Kick::Hook);
    Json(json!({"ok": true}))
}
