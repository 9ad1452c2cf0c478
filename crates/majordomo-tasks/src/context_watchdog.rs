//! Context watchdog — tiered escalation as the session's context window
//! fills up.
//!
//! The Claude status line writes `context-usage.json`; we read it and inject
//! an escalating nudge each time usage crosses a higher threshold. Each
//! (session, tier) pair escalates once; a new session id resets the ladder.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use tracing::debug;

use majordomo_scheduler::{RegisteredTask, TaskFuture};

use crate::deps::TaskDeps;

/// Default escalation thresholds (percent of context window used).
pub const DEFAULT_THRESHOLDS: [u8; 4] = [50, 65, 80, 90];

#[derive(Debug, Deserialize)]
struct ContextUsage {
    #[serde(alias = "sessionId", alias = "session_id")]
    session_id: String,
    #[serde(alias = "percentUsed", alias = "percent_used", alias = "percent")]
    percent: f64,
}

/// Highest configured threshold at or below `percent`, if any.
pub fn crossed_tier(thresholds: &[u8], percent: f64) -> Option<u8> {
    thresholds
        .iter()
        .copied()
        .filter(|t| f64::from(*t) <= percent)
        .max()
}

/// The message injected at a given tier.
pub fn tier_message(tier: u8, percent: f64) -> String {
    if tier >= 90 {
        format!(
            "Context usage is at {percent:.0}% — critical. Save any important state \
             to memory files now and run /compact before continuing."
        )
    } else if tier >= 80 {
        format!(
            "Context usage is at {percent:.0}%. Wrap up the current thread and \
             consider compacting soon."
        )
    } else {
        format!("Heads up: context usage has reached {percent:.0}%.")
    }
}

fn thresholds_from(config: Option<&serde_json::Value>) -> Vec<u8> {
    config
        .and_then(|c| c.get("thresholds"))
        .and_then(|t| t.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_u64())
                .map(|v| v.min(100) as u8)
                .collect()
        })
        .filter(|v: &Vec<u8>| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_THRESHOLDS.to_vec())
}

pub fn task(deps: &Arc<TaskDeps>) -> RegisteredTask {
    let deps = Arc::clone(deps);
    let thresholds = thresholds_from(deps.task_config("context-watchdog"));
    let escalated: Arc<Mutex<HashSet<(String, u8)>>> = Arc::new(Mutex::new(HashSet::new()));

    RegisteredTask::new("context-watchdog", move || -> TaskFuture {
        let deps = Arc::clone(&deps);
        let thresholds = thresholds.clone();
        let escalated = Arc::clone(&escalated);
        Box::pin(async move {
            let raw = match std::fs::read_to_string(&deps.paths.context_usage) {
                Ok(raw) => raw,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Ok("no usage file".to_string())
                }
                Err(e) => return Err(e.into()),
            };
            let usage: ContextUsage = serde_json::from_str(&raw)?;

            let Some(tier) = crossed_tier(&thresholds, usage.percent) else {
                debug!(percent = usage.percent, "context usage below all thresholds");
                return Ok(format!("usage {:.0}%", usage.percent));
            };

            {
                let mut escalated = escalated.lock().expect("escalation set poisoned");
                // New session id: forget the previous session's ladder.
                escalated.retain(|(sid, _)| *sid == usage.session_id);
                if !escalated.insert((usage.session_id.clone(), tier)) {
                    return Ok(format!("tier {tier} already escalated"));
                }
            }

            let message = tier_message(tier, usage.percent);
            if !deps.bridge.inject_text(&message, true).await {
                anyhow::bail!("watchdog inject failed");
            }
            Ok(format!("escalated at {tier}%"))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highest_crossed_threshold_wins() {
        assert_eq!(crossed_tier(&DEFAULT_THRESHOLDS, 40.0), None);
        assert_eq!(crossed_tier(&DEFAULT_THRESHOLDS, 50.0), Some(50));
        assert_eq!(crossed_tier(&DEFAULT_THRESHOLDS, 72.5), Some(65));
        assert_eq!(crossed_tier(&DEFAULT_THRESHOLDS, 95.0), Some(90));
    }

    #[test]
    fn messages_escalate_in_tone() {
        assert!(tier_message(50, 52.0).starts_with("Heads up"));
        assert!(tier_message(80, 81.0).contains("compacting"));
        assert!(tier_message(90, 93.0).contains("/compact"));
    }

    #[test]
    fn custom_thresholds_override_defaults() {
        let cfg = serde_json::json!({ "thresholds": [70, 95] });
        assert_eq!(thresholds_from(Some(&cfg)), vec![70, 95]);
        assert_eq!(thresholds_from(None), DEFAULT_THRESHOLDS.to_vec());
        let empty = serde_json::json!({ "thresholds": [] });
        assert_eq!(thresholds_from(Some(&empty)), DEFAULT_THRESHOLDS.to_vec());
    }
}
