//! Hook-event ingress from the Claude runtime — the authoritative source of
//! agent state, and a kick source for the transcript stream.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use majordomo_peers::format_envelope;
use majordomo_transcript::Kick;

use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct HookEvent {
    #[serde(alias = "hook_event_name", alias = "event")]
    pub hook_event_name: String,
}

/// POST /hook/response — update agent state, kick a transcript read, and on
/// `Stop` drain any envelopes peers queued while we were busy.
pub async fn hook_response(
    State(state): State<Arc<AppState>>,
    Json(event): Json<HookEvent>,
) -> Json<Value> {
    debug!(event = %event.hook_event_name, "hook event");
    state.bridge.update_agent_state(&event.hook_event_name);
    state.transcript.kick(Kick::Hook);

    if event.hook_event_name == "Stop" {
        if let Some(peers) = &state.peers {
            let inbox = Arc::clone(&peers.inbox);
            let bridge = Arc::clone(&state.bridge);
            tokio::spawn(async move {
                for envelope in inbox.drain_all() {
                    let line = format_envelope(&envelope);
                    if !bridge.inject_text(&line, true).await {
                        warn!(peer = %envelope.from, "queued envelope inject failed — requeueing");
                        inbox.push(envelope);
                        break;
                    }
                }
            });
        }
    }

    Json(json!({"ok": true}))
}

/// POST /typing-done — transcript stream says the response landed; clear the
/// chat adapter's typing signal.
pub async fn typing_done(State(state): State<Arc<AppState>>) -> Json<Value> {
    state.router.stop_typing().await;
    Json(json!({"ok": true}))
}
