//! Nightly backup via the project's backup script.

use std::sync::Arc;

use majordomo_scheduler::{RegisteredTask, TaskFuture};

use crate::deps::TaskDeps;
use crate::script::{run_script, SCRIPT_TIMEOUT};

pub fn task(deps: &Arc<TaskDeps>) -> RegisteredTask {
    let deps = Arc::clone(deps);
    RegisteredTask::new("backup", move || -> TaskFuture {
        let deps = Arc::clone(&deps);
        Box::pin(async move {
            let script = deps.paths.scripts_dir.join("backup.sh");
            run_script(&script, SCRIPT_TIMEOUT).await
        })
    })
    .without_session()
}
