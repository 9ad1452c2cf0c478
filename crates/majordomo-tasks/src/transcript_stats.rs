//! Log the transcript stream's delivery counters for diagnostics.

use std::sync::Arc;

use tracing::info;

use majordomo_scheduler::{RegisteredTask, TaskFuture};

use crate::deps::TaskDeps;

pub fn task(deps: &Arc<TaskDeps>) -> RegisteredTask {
    let deps = Arc::clone(deps);
    RegisteredTask::new("transcript-stats", move || -> TaskFuture {
        let deps = Arc::clone(&deps);
        Box::pin(async move {
            let stats = deps.transcript.stats();
            info!(
                emitted = stats.emitted,
                dropped_duplicate = stats.dropped_duplicate,
                parse_errors = stats.parse_errors,
                "transcript delivery stats"
            );
            Ok(format!(
                "emitted={} dup={} parse_errors={}",
                stats.emitted, stats.dropped_duplicate, stats.parse_errors
            ))
        })
    })
    .without_session()
}
