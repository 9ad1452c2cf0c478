//! Persistent last-run state, written after every attempted run so cron
//! tasks don't re-fire immediately across daemon restarts.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskRunRecord {
    /// Milliseconds since the epoch; 0 = never ran. Monotonically
    /// non-decreasing.
    #[serde(default)]
    pub last_run_ms: i64,
    #[serde(default)]
    pub success_count: u64,
    #[serde(default)]
    pub failure_count: u64,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl TaskRunRecord {
    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        if self.last_run_ms == 0 {
            None
        } else {
            DateTime::from_timestamp_millis(self.last_run_ms)
        }
    }
}

/// The last-run map plus its file location.
#[derive(Debug)]
pub struct SchedulerState {
    path: PathBuf,
    records: HashMap<String, TaskRunRecord>,
}

impl SchedulerState {
    /// Load from disk; a missing file starts all counters at zero.
    pub fn load(path: PathBuf) -> Result<Self> {
        let records = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, records })
    }

    pub fn record(&self, name: &str) -> TaskRunRecord {
        self.records.get(name).cloned().unwrap_or_default()
    }

    /// Record an executed run and persist.
    pub fn record_run(
        &mut self,
        name: &str,
        started: DateTime<Utc>,
        outcome: &std::result::Result<String, String>,
    ) {
        let entry = self.records.entry(name.to_string()).or_default();
        // last_run only moves forward.
        entry.last_run_ms = entry.last_run_ms.max(started.timestamp_millis());
        match outcome {
            Ok(_) => {
                entry.success_count += 1;
                entry.last_error = None;
            }
            Err(e) => {
                entry.failure_count += 1;
                entry.last_error = Some(e.clone());
            }
        }
        if let Err(e) = self.persist() {
            warn!(error = %e, "scheduler state persist failed");
        }
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&self.records)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_starts_at_zero() {
        let dir = tempfile::tempdir().unwrap();
        let state = SchedulerState::load(dir.path().join("sched.json")).unwrap();
        let rec = state.record("email-check");
        assert_eq!(rec.success_count, 0);
        assert!(rec.last_run().is_none());
    }

    #[test]
    fn run_records_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sched.json");
        let started = Utc::now();
        {
            let mut state = SchedulerState::load(path.clone()).unwrap();
            state.record_run("backup", started, &Ok("done".into()));
            state.record_run("backup", started, &Err("disk full".into()));
        }
        let state = SchedulerState::load(path).unwrap();
        let rec = state.record("backup");
        assert_eq!(rec.success_count, 1);
        assert_eq!(rec.failure_count, 1);
        assert_eq!(rec.last_error.as_deref(), Some("disk full"));
        assert_eq!(
            rec.last_run().unwrap().timestamp_millis(),
            started.timestamp_millis()
        );
    }

    #[test]
    fn last_run_never_decreases() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = SchedulerState::load(dir.path().join("s.json")).unwrap();
        let later = Utc::now();
        let earlier = later - chrono::Duration::minutes(10);
        state.record_run("t", later, &Ok(String::new()));
        state.record_run("t", earlier, &Ok(String::new()));
        assert_eq!(
            state.record("t").last_run().unwrap().timestamp_millis(),
            later.timestamp_millis()
        );
    }
}
