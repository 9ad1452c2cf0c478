use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router as AxumRouter,
};
use chrono::{DateTime, Utc};

use majordomo_access::AccessControl;
use majordomo_channels::Router;
use majordomo_core::config::MajordomoConfig;
use majordomo_core::vault::SecretValue;
use majordomo_peers::{AuditLog, NonceCache, PeerInbox, PeerRegistry, PeerSender};
use majordomo_scheduler::Scheduler;
use majordomo_session::SessionBridge;
use majordomo_transcript::TranscriptHandle;
use majordomo_voice::{VoiceAdapter, VoicePipeline};

/// Peer-plane state, present only when agent comms are enabled.
pub struct PeerPlane {
    pub registry: Arc<PeerRegistry>,
    pub inbox: Arc<PeerInbox>,
    pub sender: Arc<PeerSender>,
    pub audit: Arc<AuditLog>,
    pub nonces: NonceCache,
    /// Shared LAN bearer secret.
    pub bearer: SecretValue,
}

/// Voice-plane state, present only when the voice channel is enabled and
/// its engines resolved.
pub struct VoicePlane {
    pub adapter: Arc<VoiceAdapter>,
    pub pipeline: Option<Arc<VoicePipeline>>,
}

/// Central shared state — passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: MajordomoConfig,
    pub started_at: DateTime<Utc>,
    pub bridge: Arc<SessionBridge>,
    pub router: Arc<Router>,
    pub access: Arc<AccessControl>,
    pub transcript: TranscriptHandle,
    pub scheduler: Scheduler,
    pub peers: Option<PeerPlane>,
    pub voice: Option<VoicePlane>,
    pub telegram: Option<Arc<majordomo_telegram::TelegramContext>>,
    /// HMAC secret for the chat-bot webhook ingress, when configured.
    pub webhook_secret: Option<SecretValue>,
    pub log_dir: std::path::PathBuf,
}

/// Assemble the full Axum router: public ingress, peer plane, local admin.
pub fn build_router(state: Arc<AppState>) -> AxumRouter {
    let webhook_path = state
        .config
        .channels
        .telegram
        .as_ref()
        .and_then(|t| t.webhook_path.clone())
        .unwrap_or_else(|| "/webhook/chat".to_string());

    let public = AxumRouter::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/status", get(crate::http::status::status_handler))
        .route("/hook/response", post(crate::http::hooks::hook_response))
        .route("/typing-done", post(crate::http::hooks::typing_done))
        .route(&webhook_path, post(crate::http::webhook::chat_webhook))
        .route(
            "/voice/transcribe",
            post(crate::http::voice::transcribe_handler),
        )
        .route("/voice/speak", post(crate::http::voice::speak_handler))
        .route("/voice/notify", post(crate::http::voice::notify_handler))
        .route(
            "/voice/register",
            post(crate::http::voice::register_handler).get(crate::http::voice::register_info),
        )
        .route(
            "/voice/status",
            post(crate::http::voice::voice_status).get(crate::http::voice::voice_status),
        )
        .route(
            "/voice/stt",
            post(crate::http::voice::stt_handler).get(crate::http::voice::stt_info),
        );

    let peer_plane = AxumRouter::new()
        .route("/agent/message", post(crate::http::peers::agent_message))
        .route(
            "/agent/status",
            post(crate::http::peers::agent_status_exchange)
                .get(crate::http::peers::agent_status_get),
        )
        .route(
            "/agent/memory-sync",
            post(crate::http::peers::agent_memory_sync),
        )
        .route("/agent/p2p", post(crate::http::peers::agent_p2p));

    // Local-only: 404 when the reverse proxy marks the request external.
    let admin = AxumRouter::new()
        .route(
            "/status/extended",
            get(crate::http::status::status_extended_handler),
        )
        .route("/tasks", get(crate::http::admin::list_tasks))
        .route("/tasks/{name}/run", post(crate::http::admin::run_task))
        .route("/logs", get(crate::http::admin::tail_logs))
        .route("/session/clear", post(crate::http::admin::session_clear))
        .route("/channel", post(crate::http::admin::set_channel))
        .route("/agent/send", post(crate::http::admin::agent_send))
        .route("/worker/signal", post(crate::http::admin::worker_signal))
        .layer(axum::middleware::from_fn(crate::http::local_only));

    public
        .merge(peer_plane)
        .merge(admin)
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
