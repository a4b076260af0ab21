//! INFO poller: asks every contact for its identity on a fixed schedule.
//!
//! Each request goes through the kernel's foreground send path, so a contact
//! that cannot be reached gets its `INFO` request queued for the retry loop.

use crate::error::KernelResult;
use crate::kernel::{KwsKernel, SendOutcome};

use kws_wire::{ReqCommand, Request};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Result of one poll pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub answered: usize,
    pub queued: usize,
}

pub struct InfoPoller {
    kernel: Arc<KwsKernel>,
}

impl InfoPoller {
    pub fn new(kernel: Arc<KwsKernel>) -> Self {
        Self { kernel }
    }

    /// Send `REQ;<local>;<contact>;INFO` to every contact, one at a time.
    pub async fn poll_pass(&self) -> KernelResult<PollSummary> {
        let mut summary = PollSummary::default();
        for contact in self.kernel.contacts().await {
            let request = Request::Req {
                sender: self.kernel.identity().to_string(),
                target: contact.identity.clone(),
                command: ReqCommand::Info,
                payload: String::new(),
            };
            match self.kernel.send_or_queue(&contact, &request).await? {
                SendOutcome::Delivered(reply) => {
                    debug!(to = %contact.display_name, reply = %reply.trim(), "INFO answered");
                    summary.answered += 1;
                }
                SendOutcome::Queued => summary.queued += 1,
            }
        }
        Ok(summary)
    }

    /// Poll now, then every `interval`, until shutdown.
    pub fn spawn(self, interval: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        info!(interval_secs = interval.as_secs(), "Starting INFO poller");
        tokio::spawn(async move {
            loop {
                if *shutdown.borrow() {
                    break;
                }
                match self.poll_pass().await {
                    Ok(summary) => {
                        debug!(answered = summary.answered, queued = summary.queued, "INFO pass complete");
                    }
                    Err(e) => warn!(error = %e, "INFO poller: failed to queue request"),
                }

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = shutdown.changed() => {
                        info!("INFO poller: shutdown signal received");
                        break;
                    }
                }
            }
        })
    }
}
