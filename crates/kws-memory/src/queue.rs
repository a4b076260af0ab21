//! Durable retry queue for requests that could not be delivered.
//!
//! A drain is split in two so no lock is held while the network is in use:
//! [`RetryQueue::load`] takes a snapshot, the caller attempts each entry,
//! and [`RetryQueue::settle`] writes back the entries that failed again.
//! `settle` reloads the file under the lock and keeps anything that was not
//! part of the snapshot, so requests enqueued mid-drain survive until the
//! next cycle.

use crate::atomic::{atomic_write, read_existing};
use kws_types::error::KwsResult;
use kws_types::pending::PendingRequest;
use kws_types::time::now_timestamp;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Append-ordered list of pending requests, persisted as one file.
#[derive(Debug, Clone)]
pub struct RetryQueue {
    path: PathBuf,
    /// Maximum entries kept; `0` disables the cap.
    max_entries: usize,
    lock: Arc<Mutex<()>>,
}

impl RetryQueue {
    /// Open the queue backed by `path`, keeping at most `max_entries`.
    pub fn new(path: impl Into<PathBuf>, max_entries: usize) -> Self {
        Self {
            path: path.into(),
            max_entries,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue `raw_request` for `destination`, stamped with the current time.
    pub async fn enqueue(&self, destination: &str, raw_request: &str) -> KwsResult<PendingRequest> {
        let entry = PendingRequest {
            destination: destination.to_string(),
            raw_request: raw_request.to_string(),
            enqueued_at: now_timestamp(),
        };

        let _guard = self.lock.lock().await;
        let mut entries = self.read_strict().await?;
        entries.push(entry.clone());

        if self.max_entries > 0 && entries.len() > self.max_entries {
            let overflow = entries.len() - self.max_entries;
            warn!(
                dropped = overflow,
                max_entries = self.max_entries,
                "Retry queue full, dropping oldest entries"
            );
            entries.drain(..overflow);
        }

        self.write(&entries).await?;
        info!(destination = %entry.destination, queued = entries.len(), "Request queued for retry");
        Ok(entry)
    }

    /// Snapshot of every queued entry, in insertion order.
    ///
    /// Unreadable files read as empty.
    pub async fn load(&self) -> Vec<PendingRequest> {
        let _guard = self.lock.lock().await;
        match self.read_strict().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read retry queue, treating as empty");
                Vec::new()
            }
        }
    }

    /// Number of queued entries.
    pub async fn len(&self) -> usize {
        self.load().await.len()
    }

    /// True if nothing is queued.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Finish a drain.
    ///
    /// `attempted` is the snapshot the drain worked from; `still_failed` is
    /// the subset that failed again. The file ends up holding `still_failed`
    /// followed by any entries that were queued while the drain ran.
    pub async fn settle(
        &self,
        attempted: &[PendingRequest],
        still_failed: Vec<PendingRequest>,
    ) -> KwsResult<()> {
        let _guard = self.lock.lock().await;
        let current = self.read_strict().await?;

        let mut unclaimed: Vec<&PendingRequest> = attempted.iter().collect();
        let mut arrived = Vec::new();
        for entry in current {
            match unclaimed.iter().position(|a| **a == entry) {
                Some(idx) => {
                    unclaimed.swap_remove(idx);
                }
                None => arrived.push(entry),
            }
        }

        let delivered = attempted.len().saturating_sub(still_failed.len());
        let mut entries = still_failed;
        entries.extend(arrived);
        self.write(&entries).await?;
        debug!(delivered, remaining = entries.len(), "Retry queue settled");
        Ok(())
    }

    async fn read_strict(&self) -> KwsResult<Vec<PendingRequest>> {
        let contents = read_existing(&self.path).await?;
        let mut entries = Vec::new();
        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match PendingRequest::from_line(line) {
                Some(entry) => entries.push(entry),
                None => warn!(line = %line, "Dropping malformed retry queue line"),
            }
        }
        Ok(entries)
    }

    async fn write(&self, entries: &[PendingRequest]) -> KwsResult<()> {
        let mut out = String::new();
        for entry in entries {
            out.push_str(&entry.to_line());
            out.push('\n');
        }
        atomic_write(&self.path, &out).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue_in(dir: &tempfile::TempDir, max_entries: usize) -> RetryQueue {
        RetryQueue::new(dir.path().join("outbox.queue"), max_entries)
    }

    #[tokio::test]
    async fn test_enqueue_persists_payload_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let queue = queue_in(&dir, 0);
        let entry = queue
            .enqueue("10.0.0.7", "MSG;me;2024-06-01 10:00:00;hi;there")
            .await
            .unwrap();

        let reopened = queue_in(&dir, 0);
        let entries = reopened.load().await;
        assert_eq!(entries, vec![entry]);
        assert_eq!(entries[0].raw_request, "MSG;me;2024-06-01 10:00:00;hi;there");
    }

    #[tokio::test]
    async fn test_settle_keeps_only_failures() {
        let dir = tempfile::tempdir().unwrap();
        let queue = queue_in(&dir, 0);
        queue.enqueue("a", "PING;1").await.unwrap();
        queue.enqueue("b", "PING;2").await.unwrap();
        queue.enqueue("c", "PING;3").await.unwrap();

        let snapshot = queue.load().await;
        let failed = vec![snapshot[1].clone()];
        queue.settle(&snapshot, failed.clone()).await.unwrap();

        assert_eq!(queue.load().await, failed);
    }

    #[tokio::test]
    async fn test_settle_preserves_entries_queued_mid_drain() {
        let dir = tempfile::tempdir().unwrap();
        let queue = queue_in(&dir, 0);
        queue.enqueue("a", "PING;1").await.unwrap();

        let snapshot = queue.load().await;
        let late = queue.enqueue("b", "PING;late").await.unwrap();
        queue.settle(&snapshot, Vec::new()).await.unwrap();

        assert_eq!(queue.load().await, vec![late]);
    }

    #[tokio::test]
    async fn test_cap_drops_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let queue = queue_in(&dir, 2);
        queue.enqueue("a", "PING;1").await.unwrap();
        queue.enqueue("b", "PING;2").await.unwrap();
        queue.enqueue("c", "PING;3").await.unwrap();

        let entries = queue.load().await;
        let destinations: Vec<&str> = entries.iter().map(|e| e.destination.as_str()).collect();
        assert_eq!(destinations, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_multiline_payload_survives() {
        let dir = tempfile::tempdir().unwrap();
        let queue = queue_in(&dir, 0);
        let raw = "REQ;me;T;ADDLIST;a;A1;t;A;h;online|\nb;B2;t;B;h;offline|";
        queue.enqueue("10.0.0.7", raw).await.unwrap();

        let entries = queue.load().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].raw_request, raw);
    }

    #[tokio::test]
    async fn test_malformed_lines_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let queue = queue_in(&dir, 0);
        std::fs::write(
            queue.path(),
            "garbage\n10.0.0.1|PING;x|2024-01-01 00:00:00\n\n",
        )
        .unwrap();
        let entries = queue.load().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].destination, "10.0.0.1");
        assert!(!queue.is_empty().await);
    }
}
