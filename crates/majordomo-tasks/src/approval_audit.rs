//! Periodic sweep of expired third-party approvals.

use std::sync::Arc;

use majordomo_scheduler::{RegisteredTask, TaskFuture};

use crate::deps::TaskDeps;

pub fn task(deps: &Arc<TaskDeps>) -> RegisteredTask {
    let deps = Arc::clone(deps);
    RegisteredTask::new("approval-audit", move || -> TaskFuture {
        let deps = Arc::clone(&deps);
        Box::pin(async move {
            let dropped = deps.access.store().prune_expired()?;
            if dropped.is_empty() {
                return Ok("no expired approvals".to_string());
            }

            // Tell the primary who just lost access.
            if let Some(adapter) = deps.router.adapter("telegram") {
                let note = format!(
                    "Expired approvals removed ({}):\n{}",
                    dropped.len(),
                    dropped.join("\n")
                );
                let _ = adapter.send_message(&note).await;
            }
            Ok(format!("{} expired approvals removed", dropped.len()))
        })
    })
    .without_session()
}
