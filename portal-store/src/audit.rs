//! Audit log
//!
//! Append-only tab-separated log of state-changing actions. Appends are
//! serialized by a mutex so concurrent handlers never interleave lines.

use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use portal_core::AuditEvent;

use crate::error::StoreResult;

pub struct AuditLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl AuditLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// Append one event
    pub async fn record(&self, actor: &str, action: &str, detail: &str) -> StoreResult<()> {
        let event = AuditEvent::new(chrono::Utc::now(), actor, action, detail);
        let line = event.to_line();

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        Ok(())
    }

    /// Read back all events, oldest first. Malformed lines are logged and
    /// skipped so one bad line cannot hide the rest of the trail.
    pub async fn events(&self) -> StoreResult<Vec<AuditEvent>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut events = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            match AuditEvent::parse_line(line) {
                Ok(event) => events.push(event),
                Err(err) => tracing::warn!(%err, "skipping malformed audit line"),
            }
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("audit.log"));

        log.record("alice", "upload", "a.pdf").await.unwrap();
        log.record("boss", "approve", "a.pdf").await.unwrap();

        let events = log.events().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, "upload");
        assert_eq!(events[1].actor, "boss");
    }

    #[tokio::test]
    async fn test_missing_log_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("audit.log"));
        assert!(log.events().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_lines_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let log = AuditLog::new(&path);
        log.record("alice", "upload", "a.pdf").await.unwrap();

        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("garbage line\n");
        std::fs::write(&path, content).unwrap();
        log.record("bob", "delete", "a.pdf").await.unwrap();

        let events = log.events().await.unwrap();
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_appends_stay_line_separated() {
        let dir = tempfile::tempdir().unwrap();
        let log = std::sync::Arc::new(AuditLog::new(dir.path().join("audit.log")));

        let mut handles = Vec::new();
        for i in 0..20 {
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                log.record("actor", "action", &format!("detail {i}")).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(log.events().await.unwrap().len(), 20);
    }
}
