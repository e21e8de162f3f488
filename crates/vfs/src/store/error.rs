//! Error types for backing-store operations.

use thiserror::Error;

/// Errors surfaced by a backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store cannot arm change signals.
    #[error("Backing store does not support change observation")]
    ObserveUnsupported,

    /// Null/invalid path argument.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// IO error from an OS- or archive-backed store.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend-specific failure.
    #[error("Store error: {0}")]
    Other(String),
}
