//! Shared error types for the KWS node.

use thiserror::Error;

/// Top-level error type for the KWS node.
#[derive(Error, Debug)]
pub enum KwsError {
    /// A contact with this identity is already in the directory.
    #[error("Contact already exists: {0}")]
    ContactExists(String),

    /// No contact matches the given identity or display name.
    #[error("Contact not found: {0}")]
    ContactNotFound(String),

    /// The local identity is missing or unreadable.
    #[error("Identity error: {0}")]
    Identity(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A network error occurred.
    #[error("Network error: {0}")]
    Network(String),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid user input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Alias for Result with KwsError.
pub type KwsResult<T> = Result<T, KwsError>;
