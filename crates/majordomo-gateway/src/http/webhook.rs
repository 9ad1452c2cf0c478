//! Chat-bot webhook ingress.
//!
//! The long-polling adapter is the default transport; this route serves
//! deployments where the bot provider pushes updates instead. Requests are
//! authenticated with HMAC-SHA256 over the raw body (X-Hub-Signature-256)
//! or, failing that header, a static bearer token.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use tracing::{info, warn};

use crate::app::AppState;
use crate::http::error_response;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Deserialize)]
struct Update {
    message: Option<UpdateMessage>,
}

#[derive(Debug, Deserialize)]
struct UpdateMessage {
    chat: UpdateChat,
    from: Option<UpdateUser>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct UpdateUser {
    username: Option<String>,
}

/// POST /<webhook path> — adapter ingress.
pub async fn chat_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(telegram) = &state.telegram else {
        return error_response(
            StatusCode::NOT_FOUND,
            "CHANNEL_DISABLED",
            "chat channel is not enabled",
        );
    };

    if let Err(reason) = authenticate(&state, &headers, &body) {
        warn!(reason, "webhook authentication failed");
        return error_response(StatusCode::UNAUTHORIZED, "AUTH_FAILED", reason);
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(u) => u,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "BAD_BODY",
                &format!("invalid JSON: {e}"),
            )
        }
    };

    let Some(message) = update.message else {
        // Edits, reactions, etc. are acknowledged and ignored.
        return Json(json!({"ok": true})).into_response();
    };
    let Some(text) = message.text else {
        return Json(json!({"ok": true})).into_response();
    };
    let username = message
        .from
        .and_then(|u| u.username)
        .unwrap_or_default();

    info!(chat_id = message.chat.id, "webhook message accepted");
    telegram
        .handle_inbound(message.chat.id, &username, &text)
        .await;
    Json(json!({"ok": true})).into_response()
}

fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<(), &'static str> {
    let Some(secret) = &state.webhook_secret else {
        return Err("no webhook secret configured");
    };

    if let Some(sig_header) = headers
        .get("x-hub-signature-256")
        .and_then(|v| v.to_str().ok())
    {
        let sig_hex = sig_header
            .strip_prefix("sha256=")
            .ok_or("malformed X-Hub-Signature-256 header")?;
        let expected = hex::decode(sig_hex).map_err(|_| "signature is not valid hex")?;

        let mut mac = HmacSha256::new_from_slice(secret.expose().as_bytes())
            .map_err(|_| "invalid HMAC key length")?;
        mac.update(body);
        return mac
            .verify_slice(&expected)
            .map_err(|_| "HMAC signature mismatch");
    }

    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or("missing signature and bearer token")?;
    if token == secret.expose() {
        Ok(())
    } else {
        Err("bearer token mismatch")
    }
}
