//! Filesystem spool provider.
//!
//! The dev/self-hosted backend: a sync bridge (or a human) drops one JSON
//! file per message into `<dir>/new/`; we move files between subdirectories
//! for read/triage state and write outbound mail into `<dir>/out/` for the
//! bridge to deliver.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use majordomo_channels::MailSummary;

use crate::error::{EmailError, Result};
use crate::provider::{MailProvider, OutgoingMail};

#[derive(Debug, Serialize, Deserialize)]
struct SpoolMessage {
    from: String,
    subject: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    received_at: String,
}

pub struct SpoolProvider {
    name: String,
    address: String,
    dir: PathBuf,
}

impl SpoolProvider {
    pub fn new(name: &str, address: &str, dir: &Path) -> Result<Self> {
        for sub in ["new", "cur", "out"] {
            std::fs::create_dir_all(dir.join(sub)).map_err(|e| EmailError::Provider {
                provider: name.to_string(),
                reason: format!("creating spool dirs: {e}"),
            })?;
        }
        Ok(Self {
            name: name.to_string(),
            address: address.to_string(),
            dir: dir.to_path_buf(),
        })
    }

    fn err(&self, reason: impl std::fmt::Display) -> EmailError {
        EmailError::Provider {
            provider: self.name.clone(),
            reason: reason.to_string(),
        }
    }

    fn message_path(&self, id: &str) -> Result<PathBuf> {
        // ids are filename stems — refuse anything that escapes the spool.
        if id.contains('/') || id.contains("..") {
            return Err(self.err("invalid message id"));
        }
        Ok(self.dir.join("new").join(format!("{id}.json")))
    }
}

#[async_trait]
impl MailProvider for SpoolProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn address(&self) -> &str {
        &self.address
    }

    async fn fetch_unread(&self) -> Result<Vec<MailSummary>> {
        let new_dir = self.dir.join("new");
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&new_dir).map_err(|e| self.err(e))? {
            let entry = entry.map_err(|e| self.err(e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = std::fs::read_to_string(&path).map_err(|e| self.err(e))?;
            let msg: SpoolMessage = match serde_json::from_str(&raw) {
                Ok(m) => m,
                // A half-written file shows up on the next pass.
                Err(_) => continue,
            };
            let id = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            out.push(MailSummary {
                id,
                from: msg.from,
                subject: msg.subject,
                snippet: msg.snippet,
                received_at: msg.received_at,
            });
        }
        out.sort_by(|a, b| a.received_at.cmp(&b.received_at));
        Ok(out)
    }

    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        let stamp = chrono::Utc::now().timestamp_micros();
        let path = self.dir.join("out").join(format!("{stamp}.json"));
        let raw = serde_json::json!({
            "to": mail.to,
            "subject": mail.subject,
            "body": mail.body,
        });
        std::fs::write(&path, serde_json::to_vec_pretty(&raw).map_err(|e| self.err(e))?)
            .map_err(|e| self.err(e))
    }

    async fn mark_read(&self, id: &str) -> Result<()> {
        let from = self.message_path(id)?;
        let to = self.dir.join("cur").join(format!("{id}.json"));
        std::fs::rename(from, to).map_err(|e| self.err(e))
    }

    async fn move_to(&self, id: &str, folder: &str) -> Result<()> {
        let from = self.message_path(id)?;
        let folder_dir = self.dir.join(folder.to_ascii_lowercase());
        std::fs::create_dir_all(&folder_dir).map_err(|e| self.err(e))?;
        std::fs::rename(from, folder_dir.join(format!("{id}.json"))).map_err(|e| self.err(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spool(dir: &Path) -> SpoolProvider {
        SpoolProvider::new("local", "me@example.com", dir).unwrap()
    }

    fn drop_message(dir: &Path, id: &str, from: &str, subject: &str) {
        std::fs::write(
            dir.join("new").join(format!("{id}.json")),
            serde_json::json!({
                "from": from,
                "subject": subject,
                "received_at": "2025-06-01T08:00:00Z",
            })
            .to_string(),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn unread_lists_only_new_messages() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = spool(tmp.path());
        drop_message(tmp.path(), "m1", "a@b.c", "first");
        drop_message(tmp.path(), "m2", "d@e.f", "second");

        let unread = provider.fetch_unread().await.unwrap();
        assert_eq!(unread.len(), 2);

        provider.mark_read("m1").await.unwrap();
        let unread = provider.fetch_unread().await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].id, "m2");
        assert!(tmp.path().join("cur/m1.json").exists());
    }

    #[tokio::test]
    async fn move_to_files_into_folder() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = spool(tmp.path());
        drop_message(tmp.path(), "m1", "promo@spam.biz", "deal!!!");

        provider.move_to("m1", "Junk").await.unwrap();
        assert!(tmp.path().join("junk/m1.json").exists());
        assert!(provider.fetch_unread().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_writes_to_outbox() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = spool(tmp.path());
        provider
            .send(&OutgoingMail {
                to: "boss@example.com".into(),
                subject: "status".into(),
                body: "all green".into(),
            })
            .await
            .unwrap();

        let outbox: Vec<_> = std::fs::read_dir(tmp.path().join("out"))
            .unwrap()
            .collect();
        assert_eq!(outbox.len(), 1);
    }

    #[tokio::test]
    async fn path_traversal_ids_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = spool(tmp.path());
        assert!(provider.mark_read("../../etc/passwd").await.is_err());
    }
}
