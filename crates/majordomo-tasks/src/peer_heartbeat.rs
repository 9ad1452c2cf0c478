//! Periodic state exchange with every configured peer.

use std::sync::Arc;

use majordomo_core::types::PeerStatus;
use majordomo_scheduler::{RegisteredTask, TaskFuture};

use crate::deps::TaskDeps;

pub fn task(deps: &Arc<TaskDeps>) -> RegisteredTask {
    let deps = Arc::clone(deps);
    RegisteredTask::new("peer-heartbeat", move || -> TaskFuture {
        let deps = Arc::clone(&deps);
        Box::pin(async move {
            let Some(heartbeater) = deps.heartbeater.as_ref() else {
                return Ok("agent comms disabled".to_string());
            };
            let our_status = if deps.bridge.is_agent_idle() {
                PeerStatus::Idle
            } else {
                PeerStatus::Busy
            };
            Ok(heartbeater.run_once(our_status).await)
        })
    })
    .without_session()
}
