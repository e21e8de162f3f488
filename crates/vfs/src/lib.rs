//! Observable virtual filesystem.
//!
//! This crate lets heterogeneous backing stores be browsed, observed for
//! changes, and torn down safely while operations are in flight. The backing
//! store only has to produce [`Entry`](sentinelfs_model::Entry) values and a
//! coarse "something may have changed" signal; the watchers turn that into
//! classified Create/Change/Delete events by diffing successive snapshots.
//!
//! # Architecture
//!
//! ```text
//! Layer 3: ObservableFs (subscribe, unsubscribe, event sinks)
//! Layer 2: Watchers (SingleEntryWatcher, PatternWatcher, diff)
//! Layer 1: Primitives (AtomicSnapshotList, DisposalCoordinator, stores)
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use sentinelfs_model::ChangeEvent;
//! use sentinelfs_vfs::{ChangeConsumer, MemoryStore, ObservableFs};
//!
//! struct Printer;
//! impl ChangeConsumer for Printer {
//!     fn on_events(&self, events: &[ChangeEvent]) {
//!         for event in events {
//!             println!("{:?} {}", event.kind, event.path);
//!         }
//!     }
//! }
//!
//! let store = Arc::new(MemoryStore::new());
//! let fs = ObservableFs::new(store.clone());
//! let handle = fs.subscribe("docs/*.txt", Arc::new(Printer), None).unwrap();
//! store.put_file("docs/a.txt", 12, 1_000_000);
//! handle.unsubscribe().unwrap();
//! ```

pub mod dispatch;
pub mod dispose;
pub mod error;
pub mod fs;
pub mod pattern;
pub mod store;
pub mod sync;
pub mod watch;

pub use dispatch::{DispatchJob, EventDispatcher, QueueDispatcher};
pub use dispose::{
    AggregateDisposeError, BelateToken, ChildId, Disposable, DisposalCoordinator, DisposeError,
    DisposeState,
};
pub use error::SubscribeError;
pub use fs::{ObservableFs, SubscriptionHandle};
pub use pattern::{has_wildcard, GlobPattern, PathPattern};
pub use store::{ChangeCallback, ChangeSignal, EntryStore, MemoryStore, StoreError};
pub use sync::AtomicSnapshotList;
pub use watch::{diff, ChangeConsumer, PatternWatcher, SingleEntryWatcher, Watcher};

// Re-export the model types for convenience.
pub use sentinelfs_model::{ChangeEvent, ChangeKind, Entry, EntryKind};
