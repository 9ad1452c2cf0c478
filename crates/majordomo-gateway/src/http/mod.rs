pub mod admin;
pub mod health;
pub mod hooks;
pub mod peers;
pub mod status;
pub mod voice;
pub mod webhook;

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use majordomo_core::config::EXTERNAL_ORIGIN_HEADER;

/// Admin routes pretend not to exist for requests that arrived through the
/// public tunnel (marked by the reverse proxy's header).
pub async fn local_only(req: Request, next: Next) -> Response {
    if req.headers().contains_key(EXTERNAL_ORIGIN_HEADER) {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "not found"})),
        )
            .into_response();
    }
    next.run(req).await
}

/// Uniform JSON error body with a stable code string.
pub fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(json!({"ok": false, "code": code, "error": message})),
    )
        .into_response()
}
