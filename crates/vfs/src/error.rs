//! Caller-facing error types for the subscription surface.

use thiserror::Error;

use crate::dispose::DisposeError;
use crate::store::StoreError;

/// Errors from [`ObservableFs::subscribe`](crate::fs::ObservableFs::subscribe).
#[derive(Debug, Error)]
pub enum SubscribeError {
    /// Null/empty/invalid filter argument.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// The backing store lacks the observe capability.
    #[error("Backing store does not support change observation")]
    ObserveUnsupported,

    /// The filesystem has been torn down.
    #[error("Filesystem already disposed")]
    Disposed,

    /// Malformed glob filter.
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// Failure from the backing store during arming or the initial read.
    #[error(transparent)]
    Store(StoreError),

    /// The filesystem's teardown raced the subscribe and failed.
    #[error("Teardown during subscribe: {0}")]
    Teardown(#[from] DisposeError),
}

impl From<StoreError> for SubscribeError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ObserveUnsupported => SubscribeError::ObserveUnsupported,
            other => SubscribeError::Store(other),
        }
    }
}
