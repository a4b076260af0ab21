//! Init and the long-running node.

use crate::cmd::{boot_kernel, fail, runtime};
use crate::ui;
use kws_kernel::bootstrap::init_node;
use std::path::PathBuf;
use std::sync::Arc;

pub fn cmd_init(config: Option<PathBuf>, username: Option<String>) {
    let report = match init_node(config.as_deref(), username.as_deref()) {
        Ok(report) => report,
        Err(e) => fail(&e),
    };

    ui::section("KWS node");
    ui::kv("Identity", &report.identity);
    ui::kv("Data dir", &report.data_dir.display().to_string());
    ui::kv("Config", &report.config_path.display().to_string());
    if report.identity_created {
        ui::success("Generated a new identity");
    } else {
        ui::success("Already initialised, nothing overwritten");
    }
    ui::hint("Share your identity with contacts, then run `kws start`");
}

pub fn cmd_start(config: Option<PathBuf>) {
    let kernel = Arc::new(boot_kernel(config));
    let rt = runtime();
    rt.block_on(async move {
        let node = match kernel.start().await {
            Ok(node) => node,
            Err(e) => fail(&e),
        };
        ui::section("KWS node running");
        ui::kv("Identity", kernel.identity());
        ui::kv("Listening", &node.local_addr().to_string());
        let config = kernel.config();
        ui::kv("Probe every", &format!("{}s", config.probe.interval_secs));
        if config.info.enabled {
            ui::kv("INFO every", &format!("{}s", config.info_interval_secs()));
        }
        ui::hint("Press Ctrl+C to stop");

        if let Err(e) = tokio::signal::ctrl_c().await {
            ui::error(&format!("Failed to wait for Ctrl+C: {e}"));
        }
        kernel.shutdown();
        ui::success("Stopped");
    });
}
