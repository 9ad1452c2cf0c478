//! Morning briefing — ask the session to brief the day; when the session is
//! down, fall back to a plain chat message so the morning is never silent.

use std::sync::Arc;

use majordomo_scheduler::{RegisteredTask, TaskFuture};

use crate::deps::TaskDeps;

const BRIEFING_PROMPT: &str = "Good morning. Please prepare my briefing: today's calendar, \
open to-dos, unread email highlights, and anything peers flagged overnight.";

const FALLBACK_MESSAGE: &str = "Good morning! My session is down, so no full briefing — \
check the calendar and inbox directly until I recover.";

pub fn task(deps: &Arc<TaskDeps>) -> RegisteredTask {
    let deps = Arc::clone(deps);
    RegisteredTask::new("morning-briefing", move || -> TaskFuture {
        let deps = Arc::clone(&deps);
        Box::pin(async move {
            if deps.bridge.session_exists().await && deps.bridge.is_agent_idle() {
                if deps.bridge.inject_text(BRIEFING_PROMPT, true).await {
                    return Ok("briefing requested from session".to_string());
                }
            }

            // Degraded path: the chat adapter delivers a canned note.
            let adapter = deps
                .router
                .adapter("telegram")
                .ok_or_else(|| anyhow::anyhow!("no chat adapter for briefing fallback"))?;
            adapter
                .send_message(FALLBACK_MESSAGE)
                .await
                .map_err(|e| anyhow::anyhow!("briefing fallback send: {e}"))?;
            Ok("fallback briefing sent".to_string())
        })
    })
    // Handles its own degraded path, so it must run even with no session.
    .without_session()
}
