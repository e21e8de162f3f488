//! Data model for the sentinelfs virtual filesystem.
//!
//! This crate defines the value types shared between backing stores,
//! watchers, and consumers:
//!
//! - [`Entry`] - immutable per-read metadata snapshot of one path
//! - [`ChangeEvent`] / [`ChangeKind`] - classified change notifications
//!
//! All types are plain data: serde-derived, cheaply cloneable, and free of
//! any synchronization or I/O.

pub mod entry;
pub mod event;

pub use entry::{micros_to_system_time, Entry, EntryKind, LENGTH_UNKNOWN};
pub use event::{ChangeEvent, ChangeKind};
