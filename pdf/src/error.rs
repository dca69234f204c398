//! Error type for the PDF sub-pipeline.

use localdoc_core::Error as CoreError;

/// Crate-local result alias.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Failure modes local to PDF text extraction and page rasterization.
#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    /// The input bytes do not decode as a valid PDF structure.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// A page could not be rasterized for the VLM fallback.
    #[error("failed to render page {page}: {source}")]
    Render {
        /// 1-based page number that failed to render.
        page: u32,
        /// Underlying rendering failure.
        source: String,
    },

    /// The Pdfium dynamic library could not be loaded.
    #[error("failed to load pdfium library: {0}")]
    PdfiumLoad(String),

    /// A capability call (the VLM) failed; wraps the shared kind.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Underlying filesystem error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<PdfError> for CoreError {
    fn from(err: PdfError) -> Self {
        match err {
            PdfError::Core(e) => e,
            PdfError::Parse(msg) => Self::Extraction(msg),
            PdfError::Render { page, source } => {
                Self::Extraction(format!("page {page}: {source}"))
            }
            PdfError::PdfiumLoad(msg) => Self::ConfigInvalid(msg),
            PdfError::Io(e) => Self::from(e),
        }
    }
}
