//! Trait seams for backing stores.
//!
//! A backing store only has to produce [`Entry`] values and, when it can,
//! a coarse one-shot change signal. Everything finer - diffing, event
//! classification, re-arming - lives in the watcher layer.

use std::sync::Arc;

use sentinelfs_model::Entry;

use super::error::StoreError;

/// Callback invoked by an armed change signal.
pub type ChangeCallback = Box<dyn Fn() + Send + Sync>;

/// A one-shot native change signal armed on some path.
///
/// Each arm or re-arm yields at most one callback invocation; the watcher
/// re-arms after every signal, before reading, so no notification window is
/// missed.
pub trait ChangeSignal: Send + Sync {
    /// Re-arm the signal for the next change.
    fn rearm(&self) -> Result<(), StoreError>;

    /// Permanently disarm the signal. Idempotent.
    fn disarm(&self);
}

/// A backing store that can be browsed and, optionally, observed.
pub trait EntryStore: Send + Sync {
    /// Read the entry at `path`.
    ///
    /// # Returns
    /// `None` when the path does not exist. The entry is a fresh snapshot,
    /// never a shared mutable object.
    fn read_entry(&self, path: &str) -> Result<Option<Entry>, StoreError>;

    /// Read every entry in the subtree rooted at `root`.
    ///
    /// # Arguments
    /// * `root` - Subtree root; empty string for the whole store
    fn read_subtree(&self, root: &str) -> Result<Vec<Entry>, StoreError>;

    /// Whether this store can arm change signals.
    fn supports_observe(&self) -> bool {
        false
    }

    /// Arm a one-shot change signal covering `path` and its subtree.
    ///
    /// # Arguments
    /// * `path` - Watched root
    /// * `callback` - Invoked once per arm when something under `path` may
    ///   have changed; carries no payload
    ///
    /// # Errors
    /// `ObserveUnsupported` when [`EntryStore::supports_observe`] is false.
    fn arm_change_signal(
        &self,
        path: &str,
        callback: ChangeCallback,
    ) -> Result<Arc<dyn ChangeSignal>, StoreError> {
        let _ = (path, callback);
        Err(StoreError::ObserveUnsupported)
    }
}
