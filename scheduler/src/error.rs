//! Error type for the indexing scheduler.

use localdoc_core::Error as CoreError;

/// Crate-local result alias.
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Failure modes local to queueing and orchestrating document
/// processing, converted into [`CoreError`] wherever the scheduler's
/// caller only needs the shared taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The bounded queue rejected a new item because it is full.
    #[error("indexing queue is full (capacity {capacity})")]
    QueueFull {
        /// Configured queue capacity.
        capacity: usize,
    },

    /// A document exhausted its retry budget.
    #[error("document {document_id} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// The document that failed.
        document_id: String,
        /// Attempts made, including the first.
        attempts: u32,
        /// The last error observed.
        #[source]
        source: CoreError,
    },

    /// Processing was cooperatively cancelled.
    #[error("cancelled")]
    Cancelled,

    /// A capability or store call failed; wraps the shared kind.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The processor pipeline reported an error.
    #[error(transparent)]
    Processor(#[from] localdoc_processors::ProcessorError),

    /// The dual-index store reported an error.
    #[error(transparent)]
    Index(#[from] localdoc_index::IndexError),

    /// The watcher/identity crate reported an error.
    #[error(transparent)]
    Watch(#[from] localdoc_watch::WatchError),
}

impl From<SchedulerError> for CoreError {
    fn from(err: SchedulerError) -> Self {
        match err {
            Self::QueueFull { capacity } => CoreError::QueueFull { capacity },
            Self::RetriesExhausted { source, .. } => source,
            Self::Cancelled => CoreError::Cancelled,
            Self::Core(e) => e,
            Self::Processor(e) => e.into(),
            Self::Index(e) => e.into(),
            Self::Watch(e) => e.into(),
        }
    }
}
