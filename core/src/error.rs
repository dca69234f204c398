//! Crate-wide error taxonomy.
//!
//! Every failure mode in the system collapses into one of these kinds so
//! the scheduler, the store, and the HTTP layer can all match on *kind*
//! without knowing which crate raised it. Downstream crates define their
//! own local error enums for internal detail and convert into this one
//! at the boundary via `#[from]`.

use std::path::PathBuf;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// A system-wide error kind, matching the error handling design's
/// propagation policy: most kinds are recorded per-document and do not
/// halt the scheduler; `ModelShapeMismatch` and `StoreCorruption` are
/// fatal; `Cancelled` never surfaces as a user-visible error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Filesystem I/O failure reading or writing tracked content.
    #[error("io error at {path:?}: {source}")]
    Io {
        /// Path the failing operation touched, if known.
        path: Option<PathBuf>,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A processor could not extract text from a document.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// The local model runtime could not be reached at all.
    #[error("model unreachable: {0}")]
    ModelUnavailable(String),

    /// A call to the model runtime exceeded its deadline.
    #[error("model call timed out after {0:?}")]
    ModelTimeout(std::time::Duration),

    /// The model runtime returned an embedding of unexpected dimension.
    ///
    /// Fatal: dimension is fixed at construction from a probe call, so
    /// drift means the runtime was swapped underneath us.
    #[error("embedding dimension drift: expected {expected}, got {actual}")]
    ModelShapeMismatch {
        /// Dimension established by the initial probe call.
        expected: usize,
        /// Dimension observed on a later call.
        actual: usize,
    },

    /// The persisted store is internally inconsistent.
    ///
    /// Fatal: the scheduler halts and the API enters degraded read-only
    /// mode until the recovery pass runs on next start.
    #[error("store corruption: {0}")]
    StoreCorruption(String),

    /// The scheduler's bounded queue is full.
    #[error("indexing queue is full (capacity {capacity})")]
    QueueFull {
        /// Configured queue capacity.
        capacity: usize,
    },

    /// Work was cooperatively cancelled. Never converts to a user-facing
    /// error; in-flight work rolls back instead.
    #[error("cancelled")]
    Cancelled,

    /// A configuration value was missing or unparsable.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
}

impl Error {
    /// Wraps an I/O error with the path that produced it.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: Some(path.into()),
            source,
        }
    }

    /// Whether the error kind is safe to retry.
    ///
    /// Mirrors the API's `{error: {kind, message, retryable}}` surface.
    #[must_use]
    pub const fn retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::ModelUnavailable(_) | Self::ModelTimeout(_) | Self::QueueFull { .. }
        )
    }

    /// Short machine-readable kind name, used as the `kind` field in
    /// structured error responses and CLI output.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Io { .. } => "IoError",
            Self::Extraction(_) => "ExtractionError",
            Self::ModelUnavailable(_) => "ModelUnavailable",
            Self::ModelTimeout(_) => "ModelTimeout",
            Self::ModelShapeMismatch { .. } => "ModelShapeMismatch",
            Self::StoreCorruption(_) => "StoreCorruption",
            Self::QueueFull { .. } => "QueueFull",
            Self::Cancelled => "Cancelled",
            Self::ConfigInvalid(_) => "ConfigInvalid",
        }
    }

    /// Whether this error kind is fatal to the scheduler as a whole,
    /// as opposed to recorded per-document.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::ModelShapeMismatch { .. } | Self::StoreCorruption(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Io { path: None, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_kinds() {
        assert!(Error::StoreCorruption("x".into()).is_fatal());
        assert!(Error::ModelShapeMismatch { expected: 1024, actual: 768 }.is_fatal());
        assert!(!Error::Cancelled.is_fatal());
    }

    #[test]
    fn retryable_kinds() {
        assert!(Error::ModelTimeout(std::time::Duration::from_secs(1)).retryable());
        assert!(!Error::Cancelled.retryable());
        assert!(!Error::ConfigInvalid("bad".into()).retryable());
    }

    #[test]
    fn kind_names_match_taxonomy() {
        assert_eq!(Error::Cancelled.kind(), "Cancelled");
        assert_eq!(Error::QueueFull { capacity: 10_000 }.kind(), "QueueFull");
    }
}
