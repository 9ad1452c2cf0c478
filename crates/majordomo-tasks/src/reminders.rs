//! Calendar reminders — scan the calendar file for entries coming due and
//! nudge the session about them.
//!
//! Calendar lines look like `2025-06-01 09:00 dentist appointment`; anything
//! else is ignored. An entry fires once when it falls inside the lookahead
//! window.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use tracing::debug;

use majordomo_scheduler::{RegisteredTask, TaskFuture};

use crate::deps::TaskDeps;

/// How far ahead an entry counts as "coming up".
const LOOKAHEAD_MIN: i64 = 15;
/// Entries older than this are considered missed, not due.
const GRACE_MIN: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CalendarEntry {
    pub at_ms: i64,
    pub text: String,
}

/// Parse calendar lines; malformed lines are skipped.
pub fn parse_calendar(raw: &str) -> Vec<CalendarEntry> {
    raw.lines()
        .filter_map(|line| {
            let line = line.trim().trim_start_matches("- ").trim();
            if line.len() < 17 {
                return None;
            }
            let (stamp, text) = line.split_at(16);
            let naive = NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M").ok()?;
            let at = Local.from_local_datetime(&naive).single()?;
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            Some(CalendarEntry {
                at_ms: at.timestamp_millis(),
                text: text.to_string(),
            })
        })
        .collect()
}

/// Entries due inside the window `[now - grace, now + lookahead]`.
pub fn due_entries(entries: &[CalendarEntry], now: DateTime<Utc>) -> Vec<&CalendarEntry> {
    let start = (now - Duration::minutes(GRACE_MIN)).timestamp_millis();
    let end = (now + Duration::minutes(LOOKAHEAD_MIN)).timestamp_millis();
    entries
        .iter()
        .filter(|e| e.at_ms >= start && e.at_ms <= end)
        .collect()
}

pub fn task(deps: &Arc<TaskDeps>) -> RegisteredTask {
    let deps = Arc::clone(deps);
    let fired: Arc<Mutex<HashSet<CalendarEntry>>> = Arc::new(Mutex::new(HashSet::new()));

    RegisteredTask::new("reminders", move || -> TaskFuture {
        let deps = Arc::clone(&deps);
        let fired = Arc::clone(&fired);
        Box::pin(async move {
            let raw = match std::fs::read_to_string(&deps.paths.calendar) {
                Ok(raw) => raw,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Ok("no calendar file".to_string())
                }
                Err(e) => return Err(e.into()),
            };

            let entries = parse_calendar(&raw);
            let due: Vec<CalendarEntry> = {
                let mut fired = fired.lock().expect("fired set poisoned");
                due_entries(&entries, Utc::now())
                    .into_iter()
                    .cloned()
                    .filter(|e| fired.insert(e.clone()))
                    .collect()
            };

            if due.is_empty() {
                debug!("no reminders due");
                return Ok("nothing due".to_string());
            }

            let mut prompt = String::from("Upcoming calendar items — please remind me:\n");
            for entry in &due {
                prompt.push_str(&format!("- {}\n", entry.text));
            }
            if !deps.bridge.inject_text(prompt.trim_end(), true).await {
                anyhow::bail!("reminder inject failed");
            }
            Ok(format!("{} reminder(s) injected", due.len()))
        })
    })
}
