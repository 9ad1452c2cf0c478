//! Daily to-do review — surface the open items so the session can plan.

use std::sync::Arc;

use majordomo_scheduler::{RegisteredTask, TaskFuture};

use crate::deps::TaskDeps;

pub fn task(deps: &Arc<TaskDeps>) -> RegisteredTask {
    let deps = Arc::clone(deps);
    RegisteredTask::new("todo-review", move || -> TaskFuture {
        let deps = Arc::clone(&deps);
        Box::pin(async move {
            let raw = match std::fs::read_to_string(&deps.paths.todo) {
                Ok(raw) => raw,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Ok("no todo file".to_string())
                }
                Err(e) => return Err(e.into()),
            };

            let open: Vec<&str> = raw
                .lines()
                .filter(|l| l.trim_start().starts_with("- [ ]"))
                .collect();
            if open.is_empty() {
                return Ok("todo list clear".to_string());
            }

            let prompt = format!(
                "Open to-do items ({}) — review and tell me which matter today:\n{}",
                open.len(),
                open.join("\n")
            );
            if !deps.bridge.inject_text(&prompt, true).await {
                anyhow::bail!("todo review inject failed");
            }
            Ok(format!("{} open items surfaced", open.len()))
        })
    })
}
