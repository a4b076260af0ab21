//! Presence prober: periodically pings every contact and records who answered.

use futures::stream::{self, StreamExt};
use kws_memory::DirectoryStore;
use kws_types::contact::ContactStatus;
use kws_types::error::KwsResult;
use kws_types::time::now_timestamp;
use kws_wire::{Reply, Request, Transport};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Result of one probe pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeSummary {
    pub online: usize,
    pub offline: usize,
}

/// Pings every contact in the directory and updates status and last-seen.
#[derive(Clone)]
pub struct PresenceProber {
    directory: DirectoryStore,
    transport: Transport,
    local_identity: String,
    concurrency: usize,
}

impl PresenceProber {
    /// `transport` should carry the probe timeout.
    pub fn new(
        directory: DirectoryStore,
        transport: Transport,
        local_identity: String,
        concurrency: usize,
    ) -> Self {
        Self {
            directory,
            transport,
            local_identity,
            concurrency: concurrency.max(1),
        }
    }

    /// Probe every contact once and apply the results.
    ///
    /// A contact that answers `PONG` becomes online with `last_seen` set to
    /// now. Anything else marks it offline and leaves `last_seen` alone.
    /// Results are applied by identity in a single store update, so contacts
    /// merged in while the pass ran are kept.
    pub async fn probe_pass(&self) -> KwsResult<ProbeSummary> {
        let contacts = self.directory.load().await;
        if contacts.is_empty() {
            debug!("Presence prober: directory empty, nothing to probe");
            return Ok(ProbeSummary::default());
        }

        let ping = Request::Ping {
            sender: self.local_identity.clone(),
        }
        .encode();
        let transport = &self.transport;
        let ping = &ping;

        let results: HashMap<String, bool> = stream::iter(contacts)
            .map(|contact| async move {
                let online = match transport.send(&contact.address, ping).await {
                    Ok(reply) => Reply::parse(&reply) == Some(Reply::Pong),
                    Err(e) => {
                        debug!(identity = %contact.identity, address = %contact.address, error = %e, "Probe failed");
                        false
                    }
                };
                (contact.identity, online)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let now = now_timestamp();
        let summary = self
            .directory
            .update(|contacts| {
                let mut summary = ProbeSummary::default();
                for contact in contacts.iter_mut() {
                    match results.get(&contact.identity) {
                        Some(true) => {
                            contact.status = ContactStatus::Online;
                            contact.last_seen = now.clone();
                            summary.online += 1;
                        }
                        Some(false) => {
                            contact.status = ContactStatus::Offline;
                            summary.offline += 1;
                        }
                        None => {}
                    }
                }
                summary
            })
            .await?;

        debug!(online = summary.online, offline = summary.offline, "Probe pass complete");
        Ok(summary)
    }

    /// Run a pass every `interval` until shutdown.
    pub fn spawn(self, interval: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        info!(interval_secs = interval.as_secs(), concurrency = self.concurrency, "Starting presence prober");
        tokio::spawn(async move {
            loop {
                if *shutdown.borrow() {
                    break;
                }
                if let Err(e) = self.probe_pass().await {
                    warn!(error = %e, "Presence prober: failed to save results");
                }

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = shutdown.changed() => {
                        info!("Presence prober: shutdown signal received");
                        break;
                    }
                }
            }
        })
    }
}
