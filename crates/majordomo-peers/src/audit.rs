//! Append-only JSONL audit log for the peer plane.
//!
//! Every send, receive, and heartbeat is recorded (heartbeats deduplicated
//! upstream to state changes and an hourly uptime line).

use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Send,
    Receive,
    Heartbeat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub ts: DateTime<Utc>,
    pub direction: Direction,
    pub peer: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "messageId", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(rename = "latencyMs", skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditRecord {
    pub fn now(direction: Direction, peer: &str, kind: &str) -> Self {
        Self {
            ts: Utc::now(),
            direction,
            peer: peer.to_string(),
            kind: kind.to_string(),
            text: None,
            message_id: None,
            latency_ms: None,
            error: None,
        }
    }

    pub fn with_message(mut self, message_id: &str, text: Option<&str>) -> Self {
        self.message_id = Some(message_id.to_string());
        self.text = text.map(str::to_string);
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    pub fn with_error(mut self, error: &str) -> Self {
        self.error = Some(error.to_string());
        self
    }
}

/// Single-writer append-only JSONL file.
pub struct AuditLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl AuditLog {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Append one record. Failures are logged, never propagated — an audit
    /// miss must not break message delivery.
    pub fn append(&self, record: &AuditRecord) {
        let _guard = self.write_lock.lock().expect("audit lock poisoned");
        let result = (|| -> std::io::Result<()> {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            let line = serde_json::to_string(record)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            writeln!(file, "{line}")
        })();

        if let Err(e) = result {
            warn!(error = %e, "audit append failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_append_as_one_json_line_each() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("audit.jsonl"));

        log.append(
            &AuditRecord::now(Direction::Receive, "r2", "text")
                .with_message("m1", Some("ready")),
        );
        log.append(
            &AuditRecord::now(Direction::Send, "r2", "status").with_latency(42),
        );
        log.append(
            &AuditRecord::now(Direction::Heartbeat, "calcifer", "status")
                .with_error("connection refused"),
        );

        let raw = std::fs::read_to_string(dir.path().join("audit.jsonl")).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 3);

        let first: AuditRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.direction, Direction::Receive);
        assert_eq!(first.message_id.as_deref(), Some("m1"));

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["latencyMs"], 42);
        assert!(second.get("error").is_none());
    }
}
