//! Watcher for glob-pattern filters.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use sentinelfs_model::{ChangeEvent, ChangeKind, Entry};

use super::{arm_signal, diff, install_teardown_hook, ChangeConsumer, Watcher, WatcherCore};
use crate::dispose::{Disposable, DisposeError};
use crate::error::SubscribeError;
use crate::fs::ObservableFs;
use crate::pattern::PathPattern;
use crate::store::{EntryStore, StoreError};

/// Subscription on a wildcard filter.
///
/// Arms the change signal at the filter's literal prefix and keeps a full
/// snapshot map of matching entries. Each signal rebuilds the map with one
/// subtree scan and dispatches the symmetric difference as one event batch.
/// Cost is O(subtree size) per poll by design: the backing store offers no
/// finer-grained change feed.
pub struct PatternWatcher {
    core: WatcherCore,
    pattern: Arc<dyn PathPattern>,
    /// Snapshot from the previous poll, replaced wholesale each cycle.
    snapshot: Mutex<HashMap<String, Entry>>,
}

impl PatternWatcher {
    /// Build, register teardown, arm at the literal prefix, and take the
    /// initial snapshot.
    pub(crate) fn start(
        fs: &Arc<ObservableFs>,
        filter: String,
        pattern: Arc<dyn PathPattern>,
        consumer: Arc<dyn ChangeConsumer>,
        caller_state: Option<Box<dyn Any + Send + Sync>>,
        id: u64,
    ) -> Result<Arc<Self>, SubscribeError> {
        let watcher: Arc<Self> = Arc::new(Self {
            core: WatcherCore::new(Arc::downgrade(fs), filter, consumer, caller_state, id),
            pattern: pattern.clone(),
            snapshot: Mutex::new(HashMap::new()),
        });
        install_teardown_hook(&watcher);

        arm_signal(&watcher, fs, pattern.literal_prefix())?;
        let initial: HashMap<String, Entry> = build_snapshot(fs.store().as_ref(), &*pattern)?;
        *watcher.snapshot.lock() = initial;
        Ok(watcher)
    }
}

impl Watcher for PatternWatcher {
    fn core(&self) -> &WatcherCore {
        &self.core
    }

    fn on_signal(&self) {
        if !self.core.active() {
            return;
        }

        // Re-arm before scanning so no notification window is missed.
        self.core.rearm();

        let fs: Arc<ObservableFs> = match self.core.fs() {
            Some(fs) => fs,
            None => return,
        };
        let new: HashMap<String, Entry> =
            match build_snapshot(fs.store().as_ref(), &*self.pattern) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    // No events this cycle; the signal stays armed.
                    tracing::warn!(filter = %self.core.filter(), "Snapshot scan failed: {}", e);
                    return;
                }
            };

        let changes: Vec<(ChangeKind, String)> = {
            let mut snapshot = self.snapshot.lock();
            let changes: Vec<(ChangeKind, String)> = diff::diff_snapshots(&snapshot, &new);
            *snapshot = new;
            changes
        };

        if !changes.is_empty() {
            // One capture timestamp shared by the whole batch.
            let timestamp: SystemTime = SystemTime::now();
            let events: Vec<ChangeEvent> = changes
                .into_iter()
                .map(|(kind, path)| ChangeEvent::new(kind, path, timestamp, self.core.id()))
                .collect();
            self.core.emit(events);
        }
    }
}

impl Disposable for PatternWatcher {
    fn dispose(&self) -> Result<(), DisposeError> {
        self.core.coordinator().dispose()
    }
}

/// One full scan: walk the subtree under the literal prefix, prune paths the
/// pattern rejects, and key the survivors by path.
fn build_snapshot(
    store: &dyn EntryStore,
    pattern: &dyn PathPattern,
) -> Result<HashMap<String, Entry>, StoreError> {
    let entries: Vec<Entry> = store.read_subtree(pattern.literal_prefix())?;
    Ok(entries
        .into_iter()
        .filter(|entry| pattern.matches(entry.path()))
        .map(|entry| (entry.path().to_string(), entry))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::GlobPattern;
    use crate::store::MemoryStore;

    #[test]
    fn test_build_snapshot_prunes_non_matching() {
        let store: MemoryStore = MemoryStore::new();
        store.put_file("docs/a.txt", 1, 0);
        store.put_file("docs/b.log", 1, 0);
        store.put_file("other/c.txt", 1, 0);

        let pattern: GlobPattern = GlobPattern::new("docs/*.txt").unwrap();
        let snapshot: HashMap<String, Entry> = build_snapshot(&store, &pattern).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key("docs/a.txt"));
    }
}
