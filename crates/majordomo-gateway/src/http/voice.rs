//! Voice pipeline routes.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;

use majordomo_voice::VoiceError;

use crate::app::{AppState, VoicePlane};
use crate::http::error_response;

fn voice_or_404(state: &AppState) -> Result<&VoicePlane, Response> {
    state.voice.as_ref().ok_or_else(|| {
        error_response(
            StatusCode::NOT_FOUND,
            "CHANNEL_DISABLED",
            "voice channel is not enabled",
        )
    })
}

/// POST /voice/transcribe — WAV in, full round trip: STT → inject → wait →
/// TTS. 500 with the contract message on response timeout.
pub async fn transcribe_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let voice = match voice_or_404(&state) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(pipeline) = &voice.pipeline else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "NO_ENGINES",
            "voice engines are not configured",
        );
    };
    if body.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "EMPTY_BODY", "no audio payload");
    }

    match pipeline.handle_utterance(&body).await {
        Ok(reply) => Json(json!({
            "ok": true,
            "text": reply.text,
            "audio": BASE64.encode(reply.audio),
        }))
        .into_response(),
        Err(e @ VoiceError::ResponseTimeout) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "RESPONSE_TIMEOUT",
            &e.to_string(),
        ),
        Err(VoiceError::Busy) => error_response(
            StatusCode::CONFLICT,
            "BUSY",
            "a voice request is already in flight",
        ),
        Err(e) => error_response(StatusCode::BAD_GATEWAY, "PIPELINE_ERROR", &e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub struct SpeakBody {
    pub text: String,
}

/// POST /voice/speak — synthesize without touching the session.
pub async fn speak_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SpeakBody>,
) -> Response {
    let voice = match voice_or_404(&state) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(pipeline) = &voice.pipeline else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "NO_ENGINES",
            "voice engines are not configured",
        );
    };

    match pipeline.synthesize(&body.text).await {
        Ok(audio) => Json(json!({"ok": true, "audio": BASE64.encode(audio)})).into_response(),
        Err(e) => error_response(StatusCode::BAD_GATEWAY, "TTS_ERROR", &e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub struct NotifyBody {
    pub text: String,
}

/// POST /voice/notify — queue a spoken notification for the client.
pub async fn notify_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NotifyBody>,
) -> Response {
    let voice = match voice_or_404(&state) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    voice.adapter.queue_notification(&body.text);
    Json(json!({"ok": true})).into_response()
}

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    pub client_id: String,
}

/// POST /voice/register — a satellite client announces itself.
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterBody>,
) -> Response {
    let voice = match voice_or_404(&state) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    voice.adapter.register_client(&body.client_id);
    Json(json!({"ok": true})).into_response()
}

/// GET /voice/register — current registration.
pub async fn register_info(State(state): State<Arc<AppState>>) -> Response {
    let voice = match voice_or_404(&state) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    Json(json!({"client": voice.adapter.client()})).into_response()
}

/// GET/POST /voice/status — registration plus queued notifications (drained).
pub async fn voice_status(State(state): State<Arc<AppState>>) -> Response {
    let voice = match voice_or_404(&state) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    Json(json!({
        "client": voice.adapter.client(),
        "notifications": voice.adapter.drain_notifications(),
    }))
    .into_response()
}

/// POST /voice/stt — transcription only, no injection.
pub async fn stt_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let voice = match voice_or_404(&state) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(pipeline) = &voice.pipeline else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "NO_ENGINES",
            "voice engines are not configured",
        );
    };
    match pipeline.transcribe(&body).await {
        Ok(text) => Json(json!({"ok": true, "text": text})).into_response(),
        Err(e) => error_response(StatusCode::BAD_GATEWAY, "STT_ERROR", &e.to_string()),
    }
}

/// GET /voice/stt — engine availability probe.
pub async fn stt_info(State(state): State<Arc<AppState>>) -> Response {
    let voice = match voice_or_404(&state) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    Json(json!({"available": voice.pipeline.is_some()})).into_response()
}
