//! Thread-safe list serving atomic array snapshots to concurrent readers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

/// Thread-safe list with lock-free consistent snapshots.
///
/// Mutations run inside a short exclusive section and invalidate a cached
/// immutable array. Readers iterate over [`AtomicSnapshotList::snapshot`],
/// which is always a complete "before" or "after" view of the list: a reader
/// never observes a half-applied mutation, and concurrent mutation during
/// iteration never faults.
pub struct AtomicSnapshotList<T> {
    /// Live elements. All mutation happens under this lock.
    items: Mutex<Vec<T>>,
    /// Cached immutable view, invalidated by every mutation.
    cache: RwLock<Option<Arc<[T]>>>,
    /// Element count, readable without taking a lock.
    len: AtomicUsize,
}

impl<T: Clone> AtomicSnapshotList<T> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            cache: RwLock::new(None),
            len: AtomicUsize::new(0),
        }
    }

    /// Append an element.
    pub fn push(&self, value: T) {
        let mut items = self.items.lock();
        items.push(value);
        self.invalidate(items.len());
    }

    /// Insert an element at `index`, shifting later elements.
    ///
    /// # Panics
    /// Panics if `index > len`, matching `Vec::insert`.
    pub fn insert(&self, index: usize, value: T) {
        let mut items = self.items.lock();
        items.insert(index, value);
        self.invalidate(items.len());
    }

    /// Remove all elements.
    pub fn clear(&self) {
        let mut items = self.items.lock();
        items.clear();
        self.invalidate(0);
    }

    /// Take every element out of the list, leaving it empty.
    ///
    /// The removal and the emptying are one atomic step, so an element can be
    /// observed by at most one `drain` call.
    pub fn drain(&self) -> Vec<T> {
        let mut items = self.items.lock();
        let taken: Vec<T> = std::mem::take(&mut *items);
        self.invalidate(0);
        taken
    }

    /// Element count. Reads a cached counter without locking.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// True when the list has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return an immutable snapshot of the current elements.
    ///
    /// Returns the cached array when one exists; otherwise rebuilds and
    /// caches it under the exclusive section.
    pub fn snapshot(&self) -> Arc<[T]> {
        if let Some(cached) = self.cache.read().as_ref() {
            return cached.clone();
        }

        // Rebuild under the mutation lock so the view is consistent.
        let items = self.items.lock();
        let built: Arc<[T]> = items.as_slice().into();
        *self.cache.write() = Some(built.clone());
        built
    }

    /// Invalidate the cached array and publish the new length.
    ///
    /// Must be called while holding the `items` lock.
    fn invalidate(&self, new_len: usize) {
        *self.cache.write() = None;
        self.len.store(new_len, Ordering::Release);
    }
}

impl<T: Clone + PartialEq> AtomicSnapshotList<T> {
    /// Remove the first element equal to `value`.
    ///
    /// # Returns
    /// True if an element was removed.
    pub fn remove(&self, value: &T) -> bool {
        let mut items = self.items.lock();
        match items.iter().position(|item| item == value) {
            Some(pos) => {
                items.remove(pos);
                self.invalidate(items.len());
                true
            }
            None => false,
        }
    }

    /// Check membership against the current snapshot.
    pub fn contains(&self, value: &T) -> bool {
        self.index_of(value).is_some()
    }

    /// Index of the first equal element in the current snapshot.
    pub fn index_of(&self, value: &T) -> Option<usize> {
        self.snapshot().iter().position(|item| item == value)
    }
}

impl<T: Clone> Default for AtomicSnapshotList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + std::fmt::Debug> std::fmt::Debug for AtomicSnapshotList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.snapshot().iter()).finish()
    }
}
