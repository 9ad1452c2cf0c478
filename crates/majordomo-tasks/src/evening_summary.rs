//! Evening wrap-up prompt.

use std::sync::Arc;

use majordomo_scheduler::{RegisteredTask, TaskFuture};

use crate::deps::TaskDeps;

const SUMMARY_PROMPT: &str = "Evening wrap-up: summarize what we accomplished today, \
what slipped, and what tomorrow's first move should be.";

pub fn task(deps: &Arc<TaskDeps>) -> RegisteredTask {
    let deps = Arc::clone(deps);
    RegisteredTask::new("evening-summary", move || -> TaskFuture {
        let deps = Arc::clone(&deps);
        Box::pin(async move {
            if !deps.bridge.inject_text(SUMMARY_PROMPT, true).await {
                anyhow::bail!("evening summary inject failed");
            }
            Ok("summary requested".to_string())
        })
    })
}
