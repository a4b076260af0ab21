//! Command implementations by domain.

pub mod contact;
pub mod node;
pub mod send;

use crate::ui;
use kws_kernel::error::KernelError;
use kws_kernel::KwsKernel;
use kws_types::error::KwsError;
use std::path::PathBuf;

pub(crate) fn boot_kernel_error(e: &KernelError) {
    match e {
        KernelError::Kws(KwsError::Identity(_)) | KernelError::BootFailed(_) => {
            ui::error_with_fix(&e.to_string(), "Run `kws init` to create the node");
        }
        KernelError::Kws(KwsError::Config(_)) => {
            ui::error_with_fix(&e.to_string(), "Check your config.toml syntax");
        }
        _ => ui::error(&format!("Failed to boot node: {e}")),
    }
}

pub(crate) fn boot_kernel(config: Option<PathBuf>) -> KwsKernel {
    match KwsKernel::boot(config.as_deref()) {
        Ok(k) => k,
        Err(e) => {
            boot_kernel_error(&e);
            std::process::exit(1);
        }
    }
}

pub(crate) fn runtime() -> tokio::runtime::Runtime {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            ui::error(&format!("Failed to start async runtime: {e}"));
            std::process::exit(1);
        }
    }
}

/// Print `e` and exit with status 1.
pub(crate) fn fail(e: &KernelError) -> ! {
    match e {
        KernelError::Kws(KwsError::ContactNotFound(name)) => ui::error_with_fix(
            &format!("No contact named {name}"),
            "List contacts with `kws contact list`",
        ),
        _ => ui::error(&e.to_string()),
    }
    std::process::exit(1);
}
