//! Entry: immutable metadata snapshot of one filesystem path.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Length value for entries whose size is unknown or not applicable.
pub const LENGTH_UNKNOWN: i64 = -1;

/// Kind of filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Drive / mount root.
    Drive,
}

/// Immutable metadata snapshot of one path at read time.
///
/// Constructed fresh on every read and never mutated afterwards. Two entries
/// are equal when their path, kind, length, and modified time agree; the name
/// is derived from the path and excluded from comparison.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Full path within the backing store.
    path: String,
    /// Final path component.
    name: String,
    /// Last-modified time, UTC.
    modified: SystemTime,
    /// Entry kind.
    kind: EntryKind,
    /// Length in bytes. Files only; `LENGTH_UNKNOWN` when the backing store
    /// cannot report a size, and for directories and drives.
    length: i64,
}

impl Entry {
    /// Create a file entry.
    ///
    /// # Arguments
    /// * `path` - Full path
    /// * `length` - Size in bytes, or `LENGTH_UNKNOWN`
    /// * `modified` - Last-modified time (UTC)
    pub fn file(path: impl Into<String>, length: i64, modified: SystemTime) -> Self {
        Self::new(path.into(), EntryKind::File, length, modified)
    }

    /// Create a directory entry.
    pub fn directory(path: impl Into<String>, modified: SystemTime) -> Self {
        Self::new(path.into(), EntryKind::Directory, LENGTH_UNKNOWN, modified)
    }

    /// Create a drive entry.
    pub fn drive(path: impl Into<String>) -> Self {
        Self::new(path.into(), EntryKind::Drive, LENGTH_UNKNOWN, UNIX_EPOCH)
    }

    fn new(path: String, kind: EntryKind, length: i64, modified: SystemTime) -> Self {
        let name: String = entry_name(&path).to_string();
        Self {
            path,
            name,
            modified,
            kind,
            length,
        }
    }

    /// Full path within the backing store.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Final path component.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last-modified time (UTC).
    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    /// Last-modified time as microseconds since the Unix epoch.
    pub fn modified_micros(&self) -> i64 {
        match self.modified.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_micros() as i64,
            Err(e) => -(e.duration().as_micros() as i64),
        }
    }

    /// Entry kind.
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// Length in bytes, or `LENGTH_UNKNOWN`.
    pub fn length(&self) -> i64 {
        self.length
    }

    /// True for directory and drive entries.
    pub fn is_container(&self) -> bool {
        matches!(self.kind, EntryKind::Directory | EntryKind::Drive)
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
            && self.kind == other.kind
            && self.length == other.length
            && self.modified == other.modified
    }
}

/// Final component of a path, trailing separators ignored.
fn entry_name(path: &str) -> &str {
    let trimmed: &str = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(pos) => &trimmed[pos + 1..],
        None => trimmed,
    }
}

/// Convert microseconds since the Unix epoch to SystemTime.
///
/// # Arguments
/// * `micros` - Microseconds since Unix epoch (negative for pre-epoch)
pub fn micros_to_system_time(micros: i64) -> SystemTime {
    if micros >= 0 {
        UNIX_EPOCH + Duration::from_micros(micros as u64)
    } else {
        UNIX_EPOCH - Duration::from_micros((-micros) as u64)
    }
}
