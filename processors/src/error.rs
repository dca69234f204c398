//! Local error enum for the processors crate.

use localdoc_core::Error as CoreError;

/// Crate-local result alias.
pub type Result<T> = std::result::Result<T, ProcessorError>;

/// Failure modes specific to media processing, converted into
/// [`CoreError`] at the scheduler boundary.
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    /// No registered pipeline handles this media type.
    #[error("no processor registered for media type {0:?}")]
    Unsupported(localdoc_core::MediaType),

    /// A zip-backed Office document could not be opened or is missing
    /// its expected part.
    #[error("malformed office document: {0}")]
    MalformedOffice(String),

    /// The document's bytes are not valid UTF-8 and no conversion was
    /// attempted (plain text/Markdown processor).
    #[error("document is not valid UTF-8: {0}")]
    InvalidUtf8(String),

    /// The `ffmpeg` subprocess used to extract a video's audio track
    /// failed or was not found on `PATH`.
    #[error("ffmpeg audio extraction failed: {0}")]
    Ffmpeg(String),

    /// PDF sub-pipeline error, wrapped so the caller sees one error type.
    #[error(transparent)]
    Pdf(#[from] localdoc_pdf::PdfError),

    /// Shared system error kind.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Filesystem I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ProcessorError> for CoreError {
    fn from(err: ProcessorError) -> Self {
        match err {
            ProcessorError::Core(e) => e,
            ProcessorError::Pdf(e) => e.into(),
            ProcessorError::Io(e) => CoreError::from(e),
            other => CoreError::Extraction(other.to_string()),
        }
    }
}
