//! Thread-safe collection primitives.

pub mod snapshot_list;

pub use snapshot_list::AtomicSnapshotList;
