use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Boxed future returned by a task body.
pub type TaskFuture = Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send>>;

/// A first-party task as registered with the dispatcher.
///
/// The closure captures its own dependencies (session bridge, adapters,
/// stores); the scheduler only knows how to call it.
#[derive(Clone)]
pub struct RegisteredTask {
    pub name: String,
    /// Gated tasks are skipped while the agent is busy or the session is
    /// absent. Default true.
    pub requires_session: bool,
    pub run: Arc<dyn Fn() -> TaskFuture + Send + Sync>,
}

impl RegisteredTask {
    pub fn new(
        name: impl Into<String>,
        run: impl Fn() -> TaskFuture + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            requires_session: true,
            run: Arc::new(run),
        }
    }

    pub fn without_session(mut self) -> Self {
        self.requires_session = false;
        self
    }
}

impl std::fmt::Debug for RegisteredTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTask")
            .field("name", &self.name)
            .field("requires_session", &self.requires_session)
            .finish()
    }
}

/// The two questions the idle gate asks before a gated run.
///
/// Modeled as a trait so the dispatcher calls a function instead of holding
/// a back reference into the session bridge.
#[async_trait]
pub trait SessionGate: Send + Sync {
    fn is_idle(&self) -> bool;
    async fn session_exists(&self) -> bool;
}

#[async_trait]
impl SessionGate for majordomo_session::SessionBridge {
    fn is_idle(&self) -> bool {
        self.is_agent_idle()
    }

    async fn session_exists(&self) -> bool {
        // Inherent method — takes precedence over this trait method.
        majordomo_session::SessionBridge::session_exists(self).await
    }
}

/// Row returned by the task listing endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct TaskStatus {
    pub name: String,
    pub schedule: String,
    pub requires_session: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_fire: Option<DateTime<Utc>>,
    pub success_count: u64,
    pub failure_count: u64,
    pub last_error: Option<String>,
}
