//! Change events emitted by filesystem watchers.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Classification of a detected change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    /// Path appeared between two reads.
    Created,
    /// Path present in both reads with differing metadata.
    Changed,
    /// Path disappeared between two reads.
    Deleted,
}

/// A single change event delivered to a subscription consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// What happened.
    pub kind: ChangeKind,
    /// Path the change applies to.
    pub path: String,
    /// Capture time (UTC). All events of one batch share one timestamp.
    pub timestamp: SystemTime,
    /// Identifier of the subscription that produced the event.
    pub subscription_id: u64,
}

impl ChangeEvent {
    /// Create a new change event.
    ///
    /// # Arguments
    /// * `kind` - Change classification
    /// * `path` - Affected path
    /// * `timestamp` - Capture time (UTC)
    /// * `subscription_id` - Producing subscription
    pub fn new(
        kind: ChangeKind,
        path: impl Into<String>,
        timestamp: SystemTime,
        subscription_id: u64,
    ) -> Self {
        Self {
            kind,
            path: path.into(),
            timestamp,
            subscription_id,
        }
    }
}
