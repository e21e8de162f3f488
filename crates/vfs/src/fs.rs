//! The observable filesystem facade.
//!
//! [`ObservableFs`] wraps one backing store, owns every live subscription
//! through its teardown coordinator, and routes event batches to consumers,
//! inline or through a configured dispatcher.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use sentinelfs_model::{ChangeEvent, Entry};

use crate::dispatch::EventDispatcher;
use crate::dispose::{ChildId, Disposable, DisposalCoordinator, DisposeError, DisposeState};
use crate::error::SubscribeError;
use crate::pattern::{has_wildcard, GlobPattern};
use crate::store::{EntryStore, StoreError};
use crate::sync::AtomicSnapshotList;
use crate::watch::{ChangeConsumer, PatternWatcher, SingleEntryWatcher, Watcher};

/// Registry entry for one live subscription, compared by subscription id.
#[derive(Clone)]
pub(crate) struct SubscriptionRef(Arc<dyn Watcher>);

impl PartialEq for SubscriptionRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.core().id() == other.0.core().id()
    }
}

/// A virtual filesystem over one backing store, observable for changes.
///
/// Subscriptions register as children of the filesystem's coordinator, so
/// disposing the filesystem cascades to every live subscription and each
/// consumer receives its completion notice exactly once.
pub struct ObservableFs {
    store: Arc<dyn EntryStore>,
    coordinator: DisposalCoordinator,
    /// Live subscriptions, for enumeration and deregistration.
    subscriptions: AtomicSnapshotList<SubscriptionRef>,
    /// Optional consumer-callback redirection; `None` means inline dispatch
    /// on the signaling thread.
    dispatcher: Option<Arc<dyn EventDispatcher>>,
    next_subscription_id: AtomicU64,
}

impl ObservableFs {
    /// Create a filesystem with inline event dispatch.
    pub fn new(store: Arc<dyn EntryStore>) -> Arc<Self> {
        Self::build(store, None)
    }

    /// Create a filesystem routing consumer callbacks through `dispatcher`.
    ///
    /// The dispatcher's lifecycle stays with the caller; disposing the
    /// filesystem does not shut it down.
    pub fn with_dispatcher(
        store: Arc<dyn EntryStore>,
        dispatcher: Arc<dyn EventDispatcher>,
    ) -> Arc<Self> {
        Self::build(store, Some(dispatcher))
    }

    fn build(store: Arc<dyn EntryStore>, dispatcher: Option<Arc<dyn EventDispatcher>>) -> Arc<Self> {
        Arc::new(Self {
            store,
            coordinator: DisposalCoordinator::new(),
            subscriptions: AtomicSnapshotList::new(),
            dispatcher,
            next_subscription_id: AtomicU64::new(1),
        })
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn EntryStore> {
        &self.store
    }

    /// Read one entry from the backing store.
    pub fn entry(&self, path: &str) -> Result<Option<Entry>, StoreError> {
        self.store.read_entry(path)
    }

    /// Read a whole subtree from the backing store.
    pub fn entries(&self, root: &str) -> Result<Vec<Entry>, StoreError> {
        self.store.read_subtree(root)
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// The filesystem's teardown coordinator.
    pub fn coordinator(&self) -> &DisposalCoordinator {
        &self.coordinator
    }

    /// Subscribe a consumer to changes matching `filter`.
    ///
    /// A filter with wildcards becomes a [`PatternWatcher`]; a literal path
    /// becomes a [`SingleEntryWatcher`]. A literal separator-terminated
    /// directory filter is accepted but never emits events.
    ///
    /// # Arguments
    /// * `filter` - Literal path or glob pattern
    /// * `consumer` - Receives event batches and the completion notice
    /// * `caller_state` - Opaque state retrievable from the handle
    pub fn subscribe(
        self: &Arc<Self>,
        filter: &str,
        consumer: Arc<dyn ChangeConsumer>,
        caller_state: Option<Box<dyn Any + Send + Sync>>,
    ) -> Result<SubscriptionHandle, SubscribeError> {
        if filter.is_empty() {
            return Err(SubscribeError::InvalidFilter("empty filter".to_string()));
        }
        if self.coordinator.state() != DisposeState::Active {
            return Err(SubscribeError::Disposed);
        }
        if !self.store.supports_observe() {
            return Err(SubscribeError::ObserveUnsupported);
        }

        let id: u64 = self.next_subscription_id.fetch_add(1, Ordering::Relaxed);
        let (watcher, child): (Arc<dyn Watcher>, Arc<dyn Disposable>) = if has_wildcard(filter) {
            let pattern: Arc<GlobPattern> = Arc::new(GlobPattern::new(filter)?);
            let watcher: Arc<PatternWatcher> = PatternWatcher::start(
                self,
                filter.to_string(),
                pattern,
                consumer,
                caller_state,
                id,
            )?;
            (watcher.clone(), watcher)
        } else {
            let watcher: Arc<SingleEntryWatcher> =
                SingleEntryWatcher::start(self, filter.to_string(), consumer, caller_state, id)?;
            (watcher.clone(), watcher)
        };

        // Register before attaching: if the filesystem's teardown races this
        // subscribe, the attach disposes the watcher inline and its hook
        // deregisters it again.
        self.subscriptions.push(SubscriptionRef(watcher.clone()));
        let child_id: ChildId = self.coordinator.attach(child)?;
        watcher.core().set_registration(child_id);

        tracing::debug!(filter, id, "Subscription created");
        Ok(SubscriptionHandle { watcher })
    }

    /// Tear down the filesystem and every live subscription.
    pub fn dispose(&self) -> Result<(), DisposeError> {
        self.coordinator.dispose()
    }

    /// Route one event batch to a consumer.
    pub(crate) fn deliver(&self, consumer: Arc<dyn ChangeConsumer>, events: Vec<ChangeEvent>) {
        match &self.dispatcher {
            Some(dispatcher) => {
                dispatcher.dispatch(Box::new(move || consumer.on_events(&events)));
            }
            None => consumer.on_events(&events),
        }
    }

    /// Remove a subscription from the registry and the child set.
    ///
    /// Called from the watcher's teardown hook; idempotent because the hook
    /// runs exactly once per subscription and both removals tolerate absence.
    pub(crate) fn deregister(&self, watcher: &Arc<dyn Watcher>) {
        self.subscriptions.remove(&SubscriptionRef(watcher.clone()));
        if let Some(child_id) = watcher.core().take_registration() {
            self.coordinator.detach(child_id);
        }
    }
}

impl Disposable for ObservableFs {
    fn dispose(&self) -> Result<(), DisposeError> {
        self.coordinator.dispose()
    }
}

impl std::fmt::Debug for ObservableFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableFs")
            .field("state", &self.coordinator.state())
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

/// Caller-held handle to one subscription.
pub struct SubscriptionHandle {
    watcher: Arc<dyn Watcher>,
}

impl SubscriptionHandle {
    /// Subscription id, unique within the owning filesystem.
    pub fn id(&self) -> u64 {
        self.watcher.core().id()
    }

    /// The subscription filter.
    pub fn filter(&self) -> &str {
        self.watcher.core().filter()
    }

    /// Opaque caller state passed at subscribe time.
    pub fn caller_state(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.watcher.core().caller_state()
    }

    /// Tear down the subscription.
    ///
    /// Idempotent: unsubscribing an already-completed subscription is a
    /// no-op, including when the owning filesystem's teardown got there
    /// first.
    pub fn unsubscribe(&self) -> Result<(), DisposeError> {
        self.watcher.dispose()
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id())
            .field("filter", &self.filter())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    /// Consumer recording every delivery for assertions.
    struct RecordingConsumer {
        events: Mutex<Vec<ChangeEvent>>,
        completed: AtomicUsize,
    }

    impl RecordingConsumer {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                events: Mutex::new(Vec::new()),
                completed: AtomicUsize::new(0),
            })
        }

        fn event_count(&self) -> usize {
            self.events.lock().len()
        }

        fn completed_count(&self) -> usize {
            self.completed.load(Ordering::SeqCst)
        }
    }

    impl ChangeConsumer for RecordingConsumer {
        fn on_events(&self, events: &[ChangeEvent]) {
            self.events.lock().extend_from_slice(events);
        }

        fn on_completed(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.completed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Store without the observe capability.
    struct BlindStore;

    impl EntryStore for BlindStore {
        fn read_entry(&self, _path: &str) -> Result<Option<Entry>, StoreError> {
            Ok(None)
        }

        fn read_subtree(&self, _root: &str) -> Result<Vec<Entry>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_subscribe_rejects_empty_filter() {
        let fs = ObservableFs::new(Arc::new(MemoryStore::new()));
        let result = fs.subscribe("", RecordingConsumer::new(), None);
        assert!(matches!(result, Err(SubscribeError::InvalidFilter(_))));
    }

    #[test]
    fn test_subscribe_requires_observe_capability() {
        let fs = ObservableFs::new(Arc::new(BlindStore));
        let result = fs.subscribe("a.txt", RecordingConsumer::new(), None);
        assert!(matches!(result, Err(SubscribeError::ObserveUnsupported)));
    }

    #[test]
    fn test_subscribe_after_dispose_fails() {
        let fs = ObservableFs::new(Arc::new(MemoryStore::new()));
        fs.dispose().unwrap();
        let result = fs.subscribe("a.txt", RecordingConsumer::new(), None);
        assert!(matches!(result, Err(SubscribeError::Disposed)));
    }

    #[test]
    fn test_unsubscribe_deregisters_and_completes_once() {
        let fs = ObservableFs::new(Arc::new(MemoryStore::new()));
        let consumer = RecordingConsumer::new();
        let handle: SubscriptionHandle = fs.subscribe("a.txt", consumer.clone(), None).unwrap();

        assert_eq!(fs.subscription_count(), 1);
        assert_eq!(fs.coordinator().child_count(), 1);

        handle.unsubscribe().unwrap();
        assert_eq!(fs.subscription_count(), 0);
        assert_eq!(fs.coordinator().child_count(), 0);
        assert_eq!(consumer.completed_count(), 1);

        // Idempotent: a second unsubscribe is a no-op.
        handle.unsubscribe().unwrap();
        assert_eq!(consumer.completed_count(), 1);
    }

    #[test]
    fn test_fs_dispose_cascades_to_subscriptions() {
        let fs = ObservableFs::new(Arc::new(MemoryStore::new()));
        let first = RecordingConsumer::new();
        let second = RecordingConsumer::new();
        let _a = fs.subscribe("a.txt", first.clone(), None).unwrap();
        let _b = fs.subscribe("docs/*.txt", second.clone(), None).unwrap();

        fs.dispose().unwrap();

        assert_eq!(first.completed_count(), 1);
        assert_eq!(second.completed_count(), 1);
        assert_eq!(fs.subscription_count(), 0);
    }

    #[test]
    fn test_directory_literal_subscription_is_inert() {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let fs = ObservableFs::new(store.clone());
        let consumer = RecordingConsumer::new();
        let handle = fs.subscribe("docs/", consumer.clone(), None).unwrap();

        // Changes under the directory never reach a directory-literal filter.
        store.put_file("docs/a.txt", 1, 0);
        store.put_file("docs/b.txt", 1, 0);
        assert_eq!(consumer.event_count(), 0);

        // Completion still behaves normally.
        handle.unsubscribe().unwrap();
        assert_eq!(consumer.completed_count(), 1);
    }

    #[test]
    fn test_caller_state_round_trip() {
        let fs = ObservableFs::new(Arc::new(MemoryStore::new()));
        let handle = fs
            .subscribe(
                "a.txt",
                RecordingConsumer::new(),
                Some(Box::new("ticket-42".to_string())),
            )
            .unwrap();

        let state: &String = handle
            .caller_state()
            .and_then(|s| s.downcast_ref::<String>())
            .unwrap();
        assert_eq!(state, "ticket-42");
    }

    #[test]
    fn test_browse_passthrough() {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        store.put_file("docs/a.txt", 3, 0);
        let fs = ObservableFs::new(store);

        assert!(fs.entry("docs/a.txt").unwrap().is_some());
        assert_eq!(fs.entries("docs").unwrap().len(), 1);
    }
}
