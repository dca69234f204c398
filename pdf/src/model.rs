//! Configuration for the PDF sub-pipeline (§4.4, §6 config variables).

use std::time::Duration;

/// Tunables for [`crate::PdfPipeline`], sourced from the
/// `PDF_VLM_*`/`PDF_MIN_CHARS_PER_PAGE` environment variables at the
/// engine layer.
#[derive(Debug, Clone)]
pub struct PdfPipelineConfig {
    /// A page with fewer extracted characters than this is image-heavy
    /// and falls back to the VLM.
    pub min_chars_per_page: usize,
    /// At most this many image-heavy pages are submitted to the VLM per
    /// document; any beyond this count keep their (short) native text.
    pub max_pages: usize,
    /// Render resolution for pages submitted to the VLM.
    pub dpi: u16,
    /// Maximum concurrent in-flight VLM page calls.
    pub workers: usize,
    /// Per-page VLM call deadline.
    pub vlm_timeout: Duration,
    /// Absolute path to the Pdfium dynamic library (`PDF_VLM_PDFIUM_PATH`).
    /// `None` falls back to the system library search paths at the
    /// point a page actually needs rasterizing.
    pub pdfium_library_path: Option<String>,
}

impl Default for PdfPipelineConfig {
    fn default() -> Self {
        Self {
            min_chars_per_page: 100,
            max_pages: 20,
            dpi: 150,
            workers: 2,
            vlm_timeout: Duration::from_secs(60),
            pdfium_library_path: None,
        }
    }
}

/// A fixed prompt asking the VLM for a full transcription plus a
/// structural description of the page, per §4.4 step 3.
pub const VLM_PROMPT: &str = "Transcribe every line of visible text on this page verbatim, \
then describe the page's structure (headings, tables, figures, layout) in a short paragraph.";
