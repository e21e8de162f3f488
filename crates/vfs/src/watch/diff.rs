//! Pure snapshot diffing.
//!
//! The backing store only says "something may have changed"; these functions
//! turn two successive reads into classified events. They are free of
//! timers, signals, and locks so the classification logic is testable on its
//! own.

use std::collections::HashMap;

use sentinelfs_model::{ChangeKind, Entry};

/// Classify the difference between two reads of one path.
///
/// # Returns
/// `None` when nothing observable changed: absent in both reads, or present
/// in both with equal metadata.
pub fn classify(old: Option<&Entry>, new: Option<&Entry>) -> Option<ChangeKind> {
    match (old, new) {
        (None, None) => None,
        (None, Some(_)) => Some(ChangeKind::Created),
        (Some(_), None) => Some(ChangeKind::Deleted),
        (Some(old), Some(new)) => {
            if old == new {
                None
            } else {
                Some(ChangeKind::Changed)
            }
        }
    }
}

/// Symmetric difference of two snapshot maps as classified per-path changes.
///
/// Paths present in both maps compare by entry value (path, kind, length,
/// modified time); only unequal pairs produce a `Changed`. Ordering of the
/// returned batch is unspecified.
pub fn diff_snapshots(
    old: &HashMap<String, Entry>,
    new: &HashMap<String, Entry>,
) -> Vec<(ChangeKind, String)> {
    let mut changes: Vec<(ChangeKind, String)> = Vec::new();

    for (path, old_entry) in old {
        match new.get(path) {
            Some(new_entry) => {
                if old_entry != new_entry {
                    changes.push((ChangeKind::Changed, path.clone()));
                }
            }
            None => changes.push((ChangeKind::Deleted, path.clone())),
        }
    }
    for path in new.keys() {
        if !old.contains_key(path) {
            changes.push((ChangeKind::Created, path.clone()));
        }
    }

    changes
}
