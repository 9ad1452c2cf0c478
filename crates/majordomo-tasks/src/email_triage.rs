//! Mechanical mailbox hygiene — file junk, newsletters, and receipts into
//! their folders and mark auto-read mail as read. Runs without the session.

use std::sync::Arc;

use tracing::debug;

use majordomo_channels::Mailbox;
use majordomo_email::TriageCategory;
use majordomo_scheduler::{RegisteredTask, TaskFuture};

use crate::deps::TaskDeps;

pub fn task(deps: &Arc<TaskDeps>) -> RegisteredTask {
    let deps = Arc::clone(deps);
    RegisteredTask::new("email-triage", move || -> TaskFuture {
        let deps = Arc::clone(&deps);
        Box::pin(async move {
            let (Some(mailbox), Some(triage)) = (deps.mailbox.as_ref(), deps.triage.as_ref())
            else {
                return Ok("email channel disabled".to_string());
            };

            let unread = mailbox
                .list_unread()
                .await
                .map_err(|e| anyhow::anyhow!("fetch unread: {e}"))?;

            let mut moved = 0usize;
            let mut marked = 0usize;
            for mail in &unread {
                let category = triage.classify(mail);
                if let Some(folder) = category.target_folder() {
                    if let Err(e) = mailbox.move_to(&mail.id, folder).await {
                        debug!(id = %mail.id, error = %e, "move failed, leaving in inbox");
                        continue;
                    }
                    moved += 1;
                } else if category == TriageCategory::AutoRead {
                    if mailbox.mark_read(&mail.id).await.is_ok() {
                        marked += 1;
                    }
                }
            }

            Ok(format!("{moved} filed, {marked} marked read"))
        })
    })
    .without_session()
}
