//! Keep the tmux session alive — respawn it when the init script's session
//! has gone away.

use std::sync::Arc;

use tracing::warn;

use majordomo_scheduler::{RegisteredTask, TaskFuture};

use crate::deps::TaskDeps;

pub fn task(deps: &Arc<TaskDeps>) -> RegisteredTask {
    let deps = Arc::clone(deps);
    RegisteredTask::new("session-keepalive", move || -> TaskFuture {
        let deps = Arc::clone(&deps);
        Box::pin(async move {
            match deps.bridge.start_session().await {
                Ok(true) => {
                    warn!("session was missing — respawned");
                    Ok("session respawned".to_string())
                }
                Ok(false) => Ok("session alive".to_string()),
                Err(e) => Err(anyhow::anyhow!("respawn failed: {e}")),
            }
        })
    })
    .without_session()
}
