//! Outbound retry loop: re-sends queued requests once per cycle.

use kws_memory::RetryQueue;
use kws_types::error::KwsResult;
use kws_wire::Transport;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Result of one drain cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub delivered: usize,
    pub still_pending: usize,
}

/// Drains the retry queue through the transport.
#[derive(Clone)]
pub struct RetryLoop {
    queue: RetryQueue,
    transport: Transport,
}

impl RetryLoop {
    pub fn new(queue: RetryQueue, transport: Transport) -> Self {
        Self { queue, transport }
    }

    /// Attempt every queued entry once, in insertion order.
    ///
    /// Delivered entries are removed; failures stay, unchanged, for the
    /// next cycle. Any reply counts as delivery.
    pub async fn drain(&self) -> KwsResult<DrainSummary> {
        let snapshot = self.queue.load().await;
        if snapshot.is_empty() {
            return Ok(DrainSummary::default());
        }

        let mut still_failed = Vec::new();
        for entry in &snapshot {
            match self
                .transport
                .send(&entry.destination, &entry.raw_request)
                .await
            {
                Ok(reply) => {
                    debug!(destination = %entry.destination, reply = %reply.trim(), "Queued request delivered");
                }
                Err(e) => {
                    debug!(destination = %entry.destination, error = %e, "Queued request still undeliverable");
                    still_failed.push(entry.clone());
                }
            }
        }

        let summary = DrainSummary {
            delivered: snapshot.len() - still_failed.len(),
            still_pending: still_failed.len(),
        };
        self.queue.settle(&snapshot, still_failed).await?;

        if summary.delivered > 0 {
            info!(
                delivered = summary.delivered,
                still_pending = summary.still_pending,
                "Retry queue drained"
            );
        }
        Ok(summary)
    }

    /// Drain now, then every `interval`, until shutdown.
    pub fn spawn(self, interval: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        info!(interval_secs = interval.as_secs(), "Starting outbound retry loop");
        tokio::spawn(async move {
            loop {
                if *shutdown.borrow() {
                    break;
                }
                if let Err(e) = self.drain().await {
                    warn!(error = %e, "Retry loop: failed to write back queue");
                }

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = shutdown.changed() => {
                        info!("Retry loop: shutdown signal received");
                        break;
                    }
                }
            }
        })
    }
}
