//! `kws init`: lay out the data directory for a new node.

use crate::config::{default_config_path, load_config, write_config};
use crate::error::KernelResult;
use crate::identity::ensure_identity;
use kws_types::config::NodeConfig;
use kws_types::error::KwsError;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::info;

/// What [`init_node`] found or created.
#[derive(Debug, Clone)]
pub struct InitReport {
    pub identity: String,
    pub identity_created: bool,
    pub config_path: PathBuf,
    pub config_created: bool,
    pub data_dir: PathBuf,
}

/// Create the config file, identity and empty store files if missing.
///
/// Existing files are left alone, so running it twice is harmless.
/// `username` only applies when the config file is created.
pub fn init_node(config_path: Option<&Path>, username: Option<&str>) -> KernelResult<InitReport> {
    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(default_config_path);

    let config_created = !config_path.exists();
    if config_created {
        let mut fresh = NodeConfig::default();
        if let Some(name) = username {
            fresh.username = name.to_string();
        }
        write_config(&config_path, &fresh)?;
        info!(path = %config_path.display(), "Wrote default configuration");
    }

    let config = load_config(Some(&config_path));
    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir).map_err(KwsError::from)?;

    let (identity, identity_created) = ensure_identity(&config.identity_path())?;

    for path in [
        config.directory_path(),
        config.queue_path(),
        config.audit_path(),
    ] {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(KwsError::from)?;
    }

    Ok(InitReport {
        identity,
        identity_created,
        config_path,
        config_created,
        data_dir,
    })
}
