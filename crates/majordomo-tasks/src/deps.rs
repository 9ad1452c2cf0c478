use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use majordomo_access::AccessControl;
use majordomo_channels::Router;
use majordomo_email::{EmailAdapter, TriageClassifier};
use majordomo_peers::{AuditLog, Heartbeater, PeerInbox, PeerRegistry, RelayClient};
use majordomo_session::SessionBridge;
use majordomo_transcript::TranscriptHandle;

/// Project-directory files the tasks read.
#[derive(Debug, Clone)]
pub struct TaskPaths {
    pub calendar: PathBuf,
    pub todo: PathBuf,
    /// Written by the Claude status line; read by the context watchdog.
    pub context_usage: PathBuf,
    pub scripts_dir: PathBuf,
}

/// Everything a first-party task may touch. Built once at startup; task
/// closures hold an `Arc` to this.
pub struct TaskDeps {
    pub bridge: Arc<SessionBridge>,
    pub router: Arc<Router>,
    pub access: Arc<AccessControl>,
    pub transcript: TranscriptHandle,
    pub paths: TaskPaths,

    // Optional per enabled channel / subsystem.
    pub mailbox: Option<Arc<EmailAdapter>>,
    pub triage: Option<Arc<TriageClassifier>>,
    pub heartbeater: Option<Arc<Heartbeater>>,
    pub relay: Option<Arc<RelayClient>>,
    pub peer_registry: Option<Arc<PeerRegistry>>,
    pub peer_inbox: Option<Arc<PeerInbox>>,
    pub peer_audit: Option<Arc<AuditLog>>,

    /// Per-task `config:` blocks from the scheduler section, keyed by name.
    pub task_configs: HashMap<String, serde_json::Value>,
}

impl TaskDeps {
    pub fn task_config(&self, name: &str) -> Option<&serde_json::Value> {
        self.task_configs.get(name)
    }
}
