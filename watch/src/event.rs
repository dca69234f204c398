//! Raw and resolved file events (§4.1).

use std::path::PathBuf;
use std::time::SystemTime;

use localdoc_core::MediaType;

/// The kind of change a raw filesystem event represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    /// A path that was not previously tracked appeared.
    Created,
    /// A tracked path's content changed.
    Modified,
    /// A tracked path moved to a new location.
    Moved,
    /// A tracked path was removed.
    Deleted,
}

/// A raw, identity-agnostic filesystem event, as produced by the
/// debounced watcher before any content-hash resolution.
#[derive(Debug, Clone)]
pub struct FileEvent {
    /// The kind of change observed.
    pub kind: FileEventKind,
    /// The path the event concerns (the destination path for `Moved`).
    pub path: PathBuf,
    /// The path this file was moved from, for `Moved` events.
    pub prev_path: Option<PathBuf>,
    /// Platform inode number, used as a cheap identity hint.
    pub inode: u64,
    /// File size in bytes at the time of the event.
    pub size: u64,
    /// Filesystem modification time at the time of the event.
    pub mtime: SystemTime,
}

/// The action the identity resolver decided to take for a [`FileEvent`],
/// after consulting the document registry (§4.1 step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedAction {
    /// No document exists for this identity; create one.
    Insert,
    /// The document's content changed in place.
    Update,
    /// The document's content is unchanged but its path moved.
    Rename,
    /// A previously tombstoned document's content hash reappeared.
    Restore,
    /// The document was deleted from disk.
    Tombstone,
}

/// The outcome of identity resolution: a [`FileEvent`] paired with the
/// document it resolves to and the action the scheduler should take.
#[derive(Debug, Clone)]
pub struct ResolvedEvent {
    /// Stable document identity, preserved across renames.
    pub doc_id: String,
    /// What the scheduler should do with this document.
    pub action: ResolvedAction,
    /// Current absolute path.
    pub path: PathBuf,
    /// Previous path, for `Rename`.
    pub prev_path: Option<PathBuf>,
    /// Content hash, absent for `Tombstone` (the file is gone).
    pub content_hash: Option<String>,
    /// Classified media type, absent for `Tombstone`.
    pub media_type: Option<MediaType>,
    /// File size in bytes, zero for `Tombstone`.
    pub size: u64,
    /// Filesystem modification time.
    pub mtime: SystemTime,
}
