//! Kernel-specific error types.

use kws_types::error::KwsError;
use kws_wire::WireError;
use thiserror::Error;

/// Kernel error type wrapping KwsError with kernel-specific context.
#[derive(Error, Debug)]
pub enum KernelError {
    /// A wrapped KwsError.
    #[error(transparent)]
    Kws(#[from] KwsError),

    /// The peer listener could not be started.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// The kernel failed to boot.
    #[error("Boot failed: {0}")]
    BootFailed(String),
}

/// Alias for kernel results.
pub type KernelResult<T> = Result<T, KernelError>;
