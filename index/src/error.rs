//! Error type for the indexing and search crate.

use localdoc_core::Error as CoreError;

/// Crate-local result alias.
pub type Result<T> = std::result::Result<T, IndexError>;

/// Failure modes local to chunking, the dual-index store, and search.
///
/// Converts into [`localdoc_core::Error`] at the scheduler/engine
/// boundary so callers outside this crate only need to match on the
/// shared taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// A capability call (embedding, VLM) failed; wraps the shared kind.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The embedding returned did not match the index's fixed dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the index was built with.
        expected: usize,
        /// Dimension actually observed.
        actual: usize,
    },

    /// The relational or full-text backing store reported an error.
    #[error("store error: {0}")]
    Store(String),

    /// Serialization of a persisted record failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A chunking invariant was violated (e.g. overlap ≥ target size).
    #[error("chunking error: {0}")]
    Chunking(String),

    /// Referenced document or chunk does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Underlying filesystem error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<IndexError> for CoreError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::Core(e) => e,
            IndexError::Store(msg) | IndexError::Serialization(msg) => {
                CoreError::StoreCorruption(msg)
            }
            IndexError::Chunking(msg) => CoreError::Extraction(msg),
            IndexError::NotFound(msg) => CoreError::ConfigInvalid(msg),
            IndexError::DimensionMismatch { expected, actual } => {
                CoreError::ModelShapeMismatch { expected, actual }
            }
            IndexError::Io(e) => CoreError::from(e),
        }
    }
}
