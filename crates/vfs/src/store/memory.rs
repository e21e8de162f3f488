//! In-memory backing store.
//!
//! Reference implementation of the store traits: entries live in a concurrent
//! map, and every mutation fires the armed change signals covering the
//! mutated path. Doubles as the store used by the integration test suite.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::Mutex;
use sentinelfs_model::{micros_to_system_time, Entry};

use super::error::StoreError;
use super::traits::{ChangeCallback, ChangeSignal, EntryStore};

/// One-shot signal armed on a subtree of a [`MemoryStore`].
struct MemorySignal {
    /// Watched root path. Empty covers the whole store.
    root: String,
    /// True while armed; cleared when the signal fires.
    armed: AtomicBool,
    /// True once permanently disarmed.
    disarmed: AtomicBool,
    callback: ChangeCallback,
}

impl MemorySignal {
    /// Fire if armed and not disarmed, consuming the arm.
    fn fire(&self) {
        if self.disarmed.load(Ordering::Acquire) {
            return;
        }
        if self.armed.swap(false, Ordering::AcqRel) {
            (self.callback)();
        }
    }
}

impl ChangeSignal for MemorySignal {
    fn rearm(&self) -> Result<(), StoreError> {
        if !self.disarmed.load(Ordering::Acquire) {
            self.armed.store(true, Ordering::Release);
        }
        Ok(())
    }

    fn disarm(&self) {
        self.disarmed.store(true, Ordering::Release);
        self.armed.store(false, Ordering::Release);
    }
}

/// In-memory entry store with change signals fired by its own mutators.
pub struct MemoryStore {
    /// Entries by path.
    entries: DashMap<String, Entry>,
    /// Live signals. Dead weak references are pruned on notify.
    signals: Mutex<Vec<Weak<MemorySignal>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            signals: Mutex::new(Vec::new()),
        }
    }

    /// Insert or replace a file entry and signal the change.
    ///
    /// # Arguments
    /// * `path` - File path
    /// * `length` - Size in bytes
    /// * `modified_micros` - Modification time, microseconds since epoch
    pub fn put_file(&self, path: &str, length: i64, modified_micros: i64) {
        let entry: Entry = Entry::file(path, length, micros_to_system_time(modified_micros));
        self.entries.insert(path.to_string(), entry);
        self.notify(path);
    }

    /// Insert or replace a directory entry and signal the change.
    pub fn put_dir(&self, path: &str, modified_micros: i64) {
        let entry: Entry = Entry::directory(path, micros_to_system_time(modified_micros));
        self.entries.insert(path.to_string(), entry);
        self.notify(path);
    }

    /// Remove an entry and signal the change.
    ///
    /// # Returns
    /// True if the entry existed.
    pub fn remove(&self, path: &str) -> bool {
        let removed: bool = self.entries.remove(path).is_some();
        if removed {
            self.notify(path);
        }
        removed
    }

    /// Update a file's modification time and signal the change.
    ///
    /// # Returns
    /// True if the entry existed.
    pub fn touch(&self, path: &str, modified_micros: i64) -> bool {
        let updated: Option<Entry> = self.entries.get(path).map(|entry| {
            Entry::file(
                path,
                entry.length(),
                micros_to_system_time(modified_micros),
            )
        });
        match updated {
            Some(entry) => {
                self.entries.insert(path.to_string(), entry);
                self.notify(path);
                true
            }
            None => false,
        }
    }

    /// Number of stored entries.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Fire every armed signal whose watched root covers `path`.
    ///
    /// Callbacks run outside the signal-list lock; a consumer reacting to an
    /// event may mutate this store again without deadlocking.
    fn notify(&self, path: &str) {
        let live: Vec<Arc<MemorySignal>> = {
            let mut signals = self.signals.lock();
            signals.retain(|weak| weak.strong_count() > 0);
            signals.iter().filter_map(Weak::upgrade).collect()
        };
        for signal in live {
            if path_within(&signal.root, path) {
                signal.fire();
            }
        }
    }
}

impl EntryStore for MemoryStore {
    fn read_entry(&self, path: &str) -> Result<Option<Entry>, StoreError> {
        if path.is_empty() {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        Ok(self.entries.get(path).map(|entry| entry.clone()))
    }

    fn read_subtree(&self, root: &str) -> Result<Vec<Entry>, StoreError> {
        let mut entries: Vec<Entry> = self
            .entries
            .iter()
            .filter(|item| path_within(root, item.key()))
            .map(|item| item.value().clone())
            .collect();
        entries.sort_by(|a, b| a.path().cmp(b.path()));
        Ok(entries)
    }

    fn supports_observe(&self) -> bool {
        true
    }

    fn arm_change_signal(
        &self,
        path: &str,
        callback: ChangeCallback,
    ) -> Result<Arc<dyn ChangeSignal>, StoreError> {
        let signal: Arc<MemorySignal> = Arc::new(MemorySignal {
            root: path.trim_end_matches('/').to_string(),
            armed: AtomicBool::new(true),
            disarmed: AtomicBool::new(false),
            callback,
        });
        self.signals.lock().push(Arc::downgrade(&signal));
        Ok(signal)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `path` equals `root` or lies inside its subtree.
fn path_within(root: &str, path: &str) -> bool {
    if root.is_empty() {
        return true;
    }
    path == root
        || (path.len() > root.len()
            && path.starts_with(root)
            && path.as_bytes()[root.len()] == b'/')
}
