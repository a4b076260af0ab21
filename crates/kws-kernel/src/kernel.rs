//! KwsKernel assembles the stores, the listener and the background loops.

use crate::config::load_config;
use crate::error::{KernelError, KernelResult};
use crate::identity::load_identity;
use crate::info_poller::InfoPoller;
use crate::prober::PresenceProber;
use crate::retry::RetryLoop;
use crate::supervisor::Supervisor;

use async_trait::async_trait;
use kws_memory::{AuditLog, DirectoryStore, RetryQueue};
use kws_types::config::NodeConfig;
use kws_types::contact::Contact;
use kws_types::error::KwsError;
use kws_types::time::now_timestamp;
use kws_wire::{PeerConfig, PeerHandle, PeerNode, ReqCommand, Request, Transport};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// How a foreground send ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The peer answered with this reply.
    Delivered(String),
    /// The send failed and the request was queued for retry.
    Queued,
}

/// A running (or runnable) KWS node.
pub struct KwsKernel {
    config: NodeConfig,
    identity: String,
    directory: DirectoryStore,
    queue: RetryQueue,
    audit: AuditLog,
    transport: Transport,
    supervisor: Supervisor,
}

impl KwsKernel {
    /// Load the config at `config_path` (or the default) and boot.
    pub fn boot(config_path: Option<&Path>) -> KernelResult<Self> {
        Self::boot_with_config(load_config(config_path))
    }

    /// Boot from an already-loaded config. The node must have been
    /// initialised, so that an identity exists.
    pub fn boot_with_config(config: NodeConfig) -> KernelResult<Self> {
        let data_dir = config.data_dir();
        if !data_dir.is_dir() {
            return Err(KernelError::BootFailed(format!(
                "data directory {} does not exist, run `kws init` first",
                data_dir.display()
            )));
        }
        let identity = load_identity(&config.identity_path())?;

        let transport = Transport::new(
            config.network.peer_port,
            Duration::from_secs(config.network.send_timeout_secs),
        );

        info!(identity = %identity, data_dir = %data_dir.display(), "Kernel booted");

        Ok(Self {
            directory: DirectoryStore::new(config.directory_path()),
            queue: RetryQueue::new(config.queue_path(), config.retry.max_entries),
            audit: AuditLog::new(config.audit_path()),
            transport,
            supervisor: Supervisor::new(),
            identity,
            config,
        })
    }

    /// This node's identity token.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn directory(&self) -> &DirectoryStore {
        &self.directory
    }

    pub fn queue(&self) -> &RetryQueue {
        &self.queue
    }

    /// Start the listener, the presence prober, the retry loop and, unless
    /// disabled, the INFO poller.
    ///
    /// Everything stops when [`shutdown`](Self::shutdown) is called.
    pub async fn start(self: &Arc<Self>) -> KernelResult<Arc<PeerNode>> {
        let listen_addr: SocketAddr = self.config.network.listen_addr.parse().map_err(|e| {
            KwsError::Config(format!(
                "invalid listen_addr {:?}: {e}",
                self.config.network.listen_addr
            ))
        })?;

        let peer_config = PeerConfig {
            listen_addr,
            max_connections: self.config.network.max_connections,
            read_timeout: self.transport.timeout(),
        };
        let handle: Arc<dyn PeerHandle> = self.clone();
        let (node, accept_task) = PeerNode::start(peer_config, handle).await?;

        let probe_transport = self
            .transport
            .with_timeout(Duration::from_secs(self.config.probe.timeout_secs));
        PresenceProber::new(
            self.directory.clone(),
            probe_transport,
            self.identity.clone(),
            self.config.probe.concurrency,
        )
        .spawn(
            Duration::from_secs(self.config.probe.interval_secs.max(1)),
            self.supervisor.subscribe(),
        );

        RetryLoop::new(self.queue.clone(), self.transport.clone()).spawn(
            Duration::from_secs(self.config.retry_interval_secs().max(1)),
            self.supervisor.subscribe(),
        );

        if self.config.info.enabled {
            InfoPoller::new(Arc::clone(self)).spawn(
                Duration::from_secs(self.config.info_interval_secs().max(1)),
                self.supervisor.subscribe(),
            );
        }

        let mut shutdown = self.supervisor.subscribe();
        tokio::spawn(async move {
            let _ = shutdown.changed().await;
            accept_task.abort();
        });

        Ok(node)
    }

    /// Signal the listener and the background loops to stop.
    pub fn shutdown(&self) {
        self.supervisor.shutdown();
    }

    /// Add a contact by hand. Fails if the identity is already known.
    pub async fn add_contact(
        &self,
        identity: &str,
        username: &str,
        display_name: &str,
        address: &str,
    ) -> KernelResult<Contact> {
        for (field, value) in [
            ("identity", identity),
            ("username", username),
            ("name", display_name),
            ("address", address),
        ] {
            if value.is_empty() || value.contains([';', '|', '\n', '\r']) {
                return Err(KwsError::InvalidInput(format!(
                    "{field} must be non-empty and must not contain ';', '|' or line breaks"
                ))
                .into());
            }
        }

        let contact = Contact {
            username: username.to_string(),
            identity: identity.to_string(),
            last_seen: now_timestamp(),
            display_name: display_name.to_string(),
            address: address.to_string(),
            status: Default::default(),
        };
        self.directory.add_contact(contact.clone()).await?;
        info!(identity, name = display_name, "Contact added");
        Ok(contact)
    }

    /// Every known contact.
    pub async fn contacts(&self) -> Vec<Contact> {
        self.directory.load().await
    }

    /// Send a text message to the contact named by identity or display name.
    pub async fn send_message(&self, selector: &str, text: &str) -> KernelResult<SendOutcome> {
        let contact = self.resolve(selector).await?;
        let request = Request::Msg {
            sender: self.identity.clone(),
            timestamp: now_timestamp(),
            text: text.to_string(),
        };
        self.send_or_queue(&contact, &request).await
    }

    /// Send a `REQ` command to a contact. `ADDLIST` carries our directory.
    pub async fn send_request(
        &self,
        selector: &str,
        command: ReqCommand,
    ) -> KernelResult<SendOutcome> {
        let contact = self.resolve(selector).await?;
        let payload = match command {
            ReqCommand::AddList => self.directory.raw().await,
            _ => String::new(),
        };
        let request = Request::Req {
            sender: self.identity.clone(),
            target: contact.identity.clone(),
            command,
            payload,
        };
        self.send_or_queue(&contact, &request).await
    }

    /// The audit log as text.
    pub async fn audit_log(&self) -> String {
        self.audit.read_all().await
    }

    async fn resolve(&self, selector: &str) -> KernelResult<Contact> {
        self.directory
            .find(selector)
            .await
            .ok_or_else(|| KwsError::ContactNotFound(selector.to_string()).into())
    }

    pub(crate) async fn send_or_queue(
        &self,
        contact: &Contact,
        request: &Request,
    ) -> KernelResult<SendOutcome> {
        let raw = request.encode();
        match self.transport.send(&contact.address, &raw).await {
            Ok(reply) => {
                info!(to = %contact.display_name, kind = request.kind(), reply = %reply.trim(), "Request delivered");
                Ok(SendOutcome::Delivered(reply))
            }
            Err(e) => {
                warn!(to = %contact.display_name, address = %contact.address, error = %e, "Send failed, queueing for retry");
                self.queue.enqueue(&contact.address, &raw).await?;
                self.record(&format!(
                    "Queued {} for {} ({}): {e}",
                    request.kind(),
                    contact.address,
                    contact.display_name
                ))
                .await;
                Ok(SendOutcome::Queued)
            }
        }
    }
}

#[async_trait]
impl PeerHandle for KwsKernel {
    fn local_identity(&self) -> &str {
        &self.identity
    }

    async fn merge_directory(&self, payload: &str) -> Result<(), String> {
        let outcome = self
            .directory
            .merge_serialized(payload)
            .await
            .map_err(|e| e.to_string())?;
        if !outcome.is_noop() {
            info!(added = outcome.added, updated = outcome.updated, "Directory merged");
        }
        Ok(())
    }

    async fn directory_listing(&self) -> String {
        self.directory.raw().await
    }

    async fn record(&self, summary: &str) {
        if let Err(e) = self.audit.append(summary).await {
            warn!(error = %e, "Failed to write audit record");
        }
    }
}
