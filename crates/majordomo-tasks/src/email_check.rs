//! Periodic unread-mail check — triage-aware summaries injected into the
//! session.

use std::sync::Arc;

use majordomo_channels::Mailbox;
use majordomo_email::TriageCategory;
use majordomo_scheduler::{RegisteredTask, TaskFuture};

use crate::deps::TaskDeps;

/// At most this many messages are summarized per run.
const SUMMARY_CAP: usize = 10;

pub fn task(deps: &Arc<TaskDeps>) -> RegisteredTask {
    let deps = Arc::clone(deps);
    RegisteredTask::new("email-check", move || -> TaskFuture {
        let deps = Arc::clone(&deps);
        Box::pin(async move {
            let Some(mailbox) = deps.mailbox.as_ref() else {
                return Ok("email channel disabled".to_string());
            };

            let unread = mailbox
                .list_unread()
                .await
                .map_err(|e| anyhow::anyhow!("fetch unread: {e}"))?;
            if unread.is_empty() {
                return Ok("inbox clear".to_string());
            }

            let mut vip = 0usize;
            let mut lines = Vec::new();
            for mail in unread.iter().take(SUMMARY_CAP) {
                let category = deps
                    .triage
                    .as_ref()
                    .map(|t| t.classify(mail))
                    .unwrap_or(TriageCategory::Normal);
                if matches!(category, TriageCategory::Junk | TriageCategory::AutoRead) {
                    continue;
                }
                let marker = if category == TriageCategory::Vip {
                    vip += 1;
                    "[VIP] "
                } else {
                    ""
                };
                lines.push(format!("- {marker}{}: {}", mail.from, mail.subject));
            }

            if lines.is_empty() {
                return Ok("only junk/auto-read mail".to_string());
            }

            let prompt = format!(
                "Unread email ({} new{}):\n{}\nSummarize anything urgent.",
                unread.len(),
                if vip > 0 {
                    format!(", {vip} VIP")
                } else {
                    String::new()
                },
                lines.join("\n")
            );
            if !deps.bridge.inject_text(&prompt, true).await {
                anyhow::bail!("email summary inject failed");
            }
            Ok(format!("{} messages summarized", lines.len()))
        })
    })
}
