//! Nightly memory consolidation prompt.

use std::sync::Arc;

use majordomo_scheduler::{RegisteredTask, TaskFuture};

use crate::deps::TaskDeps;

const CONSOLIDATE_PROMPT: &str = "Nightly memory pass: review today's conversation, \
move anything worth keeping into the memory files, and prune stale entries.";

pub fn task(deps: &Arc<TaskDeps>) -> RegisteredTask {
    let deps = Arc::clone(deps);
    RegisteredTask::new("memory-consolidation", move || -> TaskFuture {
        let deps = Arc::clone(&deps);
        Box::pin(async move {
            if !deps.bridge.inject_text(CONSOLIDATE_PROMPT, true).await {
                anyhow::bail!("memory consolidation inject failed");
            }
            Ok("consolidation requested".to_string())
        })
    })
}
