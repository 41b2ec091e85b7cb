//! Common error types for cryptsync.

use thiserror::Error;

/// Top-level error type for cryptsync operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Path validation failed (escapes its root or crosses a symlink).
    #[error("Validation error: {0}")]
    Validation(String),

    /// A newer remote counterpart exists for a locally changed file.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The crypto engine reported a failure.
    #[error("Engine error: {0}")]
    Engine(String),

    /// Decrypted content did not match the expected digest.
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Sync folder operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Filesystem watcher failed.
    #[error("Watch error: {0}")]
    Watch(String),

    /// Configuration is missing or invalid. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
