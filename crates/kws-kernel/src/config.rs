//! Configuration loading from `~/.kws/config.toml` with defaults.

use kws_types::config::{kws_home, NodeConfig, CONFIG_FILE};
use kws_types::error::{KwsError, KwsResult};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Load node configuration from a TOML file, with defaults.
///
/// A missing, unreadable or unparseable file yields the defaults. When an
/// explicit path is given and the file sets no `data_dir`, the data lives
/// next to the config file.
pub fn load_config(path: Option<&Path>) -> NodeConfig {
    let config_path = path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(default_config_path);

    let mut config = if config_path.exists() {
        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str::<NodeConfig>(&contents) {
                Ok(config) => {
                    info!(path = %config_path.display(), "Loaded configuration");
                    config
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        path = %config_path.display(),
                        "Failed to parse config, using defaults"
                    );
                    NodeConfig::default()
                }
            },
            Err(e) => {
                warn!(
                    error = %e,
                    path = %config_path.display(),
                    "Failed to read config file, using defaults"
                );
                NodeConfig::default()
            }
        }
    } else {
        info!(
            path = %config_path.display(),
            "Config file not found, using defaults"
        );
        NodeConfig::default()
    };

    if config.data_dir.is_none() && path.is_some() {
        config.data_dir = config_path.parent().map(Path::to_path_buf);
    }
    config
}

/// Write `config` to `path` as TOML, creating parent directories.
pub fn write_config(path: &Path, config: &NodeConfig) -> KwsResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = toml::to_string_pretty(config)
        .map_err(|e| KwsError::Config(e.to_string()))?;
    std::fs::write(path, contents)?;
    Ok(())
}

/// Get the default config file path.
pub fn default_config_path() -> PathBuf {
    kws_home().join(CONFIG_FILE)
}
