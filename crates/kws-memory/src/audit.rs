//! Append-only audit log of inbound requests and retry enqueues.

use kws_types::error::KwsResult;
use kws_types::time::now_timestamp;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

/// `[timestamp] summary` lines, appended, never rewritten.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl AuditLog {
    /// Open the log backed by `path`. The file is created on first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record stamped with the current time.
    pub async fn append(&self, summary: &str) -> KwsResult<()> {
        // One record per line, whatever the summary contains.
        let summary = summary.replace(['\r', '\n'], " ");
        let line = format!("[{}] {}\n", now_timestamp(), summary);

        let _guard = self.lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// The whole log. Unreadable or missing files read as empty.
    pub async fn read_all(&self) -> String {
        let _guard = self.lock.lock().await;
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read audit log");
                String::new()
            }
        }
    }
}
