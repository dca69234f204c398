//! Error type for the watcher and identity-resolution crate.

use localdoc_core::Error as CoreError;

/// Crate-local result alias.
pub type Result<T> = std::result::Result<T, WatchError>;

/// Failure modes local to filesystem watching and identity resolution.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The underlying `notify` watcher could not be installed or failed.
    #[error("watcher error: {0}")]
    Notify(String),

    /// A capability call into the dual-index store failed; wraps the
    /// shared kind.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The dual-index store reported an error while resolving identity.
    #[error(transparent)]
    Index(#[from] localdoc_index::IndexError),

    /// Underlying filesystem error (stat, read).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<WatchError> for CoreError {
    fn from(err: WatchError) -> Self {
        match err {
            WatchError::Core(e) => e,
            WatchError::Notify(msg) => Self::io(std::path::PathBuf::new(), std::io::Error::other(msg)),
            WatchError::Index(e) => e.into(),
            WatchError::Io(e) => Self::from(e),
        }
    }
}
