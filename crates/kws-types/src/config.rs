//! Node configuration, read from `~/.kws/config.toml`.
//!
//! Every field has a default, so an empty or partial file is valid.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default TCP port for all peer traffic.
pub const DEFAULT_PEER_PORT: u16 = 5000;

/// Default presence probe interval (seconds).
pub const DEFAULT_PROBE_INTERVAL_SECS: u64 = 30;

/// Default connect+read timeout for a single send (seconds).
pub const DEFAULT_SEND_TIMEOUT_SECS: u64 = 5;

/// Local identity token.
pub const IDENTITY_FILE: &str = "auth.key";
/// Node configuration.
pub const CONFIG_FILE: &str = "config.toml";
/// Contact directory.
pub const DIRECTORY_FILE: &str = "contacts.cdf";
/// Retry queue.
pub const QUEUE_FILE: &str = "outbox.queue";
/// Audit log.
pub const AUDIT_FILE: &str = "audit.log";

/// Top-level node configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Local user name, shown by the CLI.
    pub username: String,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Directory holding identity, directory, queue and audit files.
    /// Defaults to [`kws_home`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Listener and transport settings.
    pub network: NetworkConfig,
    /// Presence prober settings.
    pub probe: ProbeConfig,
    /// Outbound retry loop settings.
    pub retry: RetryConfig,
    /// Periodic `INFO` requests to every contact.
    pub info: InfoConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            username: "default_user".to_string(),
            log_level: "info".to_string(),
            data_dir: None,
            network: NetworkConfig::default(),
            probe: ProbeConfig::default(),
            retry: RetryConfig::default(),
            info: InfoConfig::default(),
        }
    }
}

impl NodeConfig {
    /// The data directory, falling back to `~/.kws`.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(kws_home)
    }

    /// Path of the identity file.
    pub fn identity_path(&self) -> PathBuf {
        self.data_dir().join(IDENTITY_FILE)
    }

    /// Path of the contact directory.
    pub fn directory_path(&self) -> PathBuf {
        self.data_dir().join(DIRECTORY_FILE)
    }

    /// Path of the retry queue.
    pub fn queue_path(&self) -> PathBuf {
        self.data_dir().join(QUEUE_FILE)
    }

    /// Path of the audit log.
    pub fn audit_path(&self) -> PathBuf {
        self.data_dir().join(AUDIT_FILE)
    }

    /// Retry loop interval: its own override, else the probe interval.
    pub fn retry_interval_secs(&self) -> u64 {
        self.retry.interval_secs.unwrap_or(self.probe.interval_secs)
    }

    /// INFO poller interval: its own override, else the probe interval.
    pub fn info_interval_secs(&self) -> u64 {
        self.info.interval_secs.unwrap_or(self.probe.interval_secs)
    }
}

/// Listener and transport settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the peer listener binds to.
    pub listen_addr: String,
    /// Port appended to contact addresses that carry no port of their own.
    pub peer_port: u16,
    /// Connect+read timeout for one send (seconds).
    pub send_timeout_secs: u64,
    /// Maximum number of inbound connections handled at once.
    pub max_connections: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: format!("0.0.0.0:{DEFAULT_PEER_PORT}"),
            peer_port: DEFAULT_PEER_PORT,
            send_timeout_secs: DEFAULT_SEND_TIMEOUT_SECS,
            max_connections: 64,
        }
    }
}

/// Presence prober settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Seconds between probe passes.
    pub interval_secs: u64,
    /// Timeout for a single probe (seconds).
    pub timeout_secs: u64,
    /// Probes in flight at once within one pass.
    pub concurrency: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_PROBE_INTERVAL_SECS,
            timeout_secs: DEFAULT_SEND_TIMEOUT_SECS,
            concurrency: 8,
        }
    }
}

/// Outbound retry loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Seconds between drains. `None` follows the probe interval.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,
    /// Queue cap; the oldest entries are dropped beyond it. `0` = unbounded.
    pub max_entries: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            interval_secs: None,
            max_entries: 1000,
        }
    }
}

/// INFO poller settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfoConfig {
    /// Whether `kws start` runs the poller.
    pub enabled: bool,
    /// Seconds between passes. `None` follows the probe interval.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,
}

impl Default for InfoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: None,
        }
    }
}

/// Default home directory, `~/.kws`.
pub fn kws_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".kws")
}
