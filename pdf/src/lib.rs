//! PDF sub-pipeline (§4.4): native text extraction with a per-page
//! Vision-Language-Model fallback for image-heavy pages.
//!
//! [`PdfPipeline::process`] runs the two-stage extraction described in
//! the component contract: a text pass over every page, a fallback
//! decision keyed on characters-per-page, and a bounded-concurrency VLM
//! pass over the pages that need it. Output is a list of
//! [`localdoc_index::chunking::TextSegment`]s with page locators already
//! attached, ready for the chunker.

mod error;
mod model;
mod parser;
mod render;

pub use error::{PdfError, Result};
pub use model::{PdfPipelineConfig, VLM_PROMPT};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;

use localdoc_core::VlmModel;
use localdoc_index::chunking::TextSegment;

/// The outcome of running the PDF sub-pipeline over one document.
#[derive(Debug, Clone)]
pub struct PdfOutcome {
    /// Per-page text segments, page locators attached, in page order.
    pub segments: Vec<TextSegment>,
    /// Total pages in the source PDF.
    pub page_count: usize,
    /// Image-heavy pages actually submitted to the VLM.
    pub vlm_pages_processed: usize,
    /// Whether every page failed to produce usable text — the caller
    /// should tombstone the document with `reason=extraction_failed`.
    pub all_failed: bool,
}

/// Runs the PDF text-extraction + VLM-fallback pipeline.
#[derive(Debug, Clone)]
pub struct PdfPipeline {
    config: PdfPipelineConfig,
}

impl PdfPipeline {
    /// Builds a pipeline with the given configuration.
    #[must_use]
    pub const fn new(config: PdfPipelineConfig) -> Self {
        Self { config }
    }

    /// Processes `path` against `vlm`, rendering and transcribing
    /// image-heavy pages up to `max_pages`, each bounded by
    /// `vlm_timeout` and no more than `workers` concurrently (§4.4
    /// steps 1-4).
    ///
    /// # Errors
    /// Returns an error if the PDF cannot be parsed at all. Per-page VLM
    /// failures are not propagated; they degrade to a placeholder chunk
    /// (§4.4 Failure policy).
    pub async fn process(&self, path: &Path, vlm: &(impl VlmModel + ?Sized)) -> Result<PdfOutcome> {
        let owned_path = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || parser::extract_pages(&owned_path))
            .await
            .expect("extraction task did not panic")?;

        let page_count = pages.len();
        let mut texts: Vec<String> = pages;
        let mut succeeded = vec![false; page_count];
        for (i, text) in texts.iter().enumerate() {
            succeeded[i] = text.chars().count() >= self.config.min_chars_per_page;
        }

        let image_heavy: Vec<usize> = (0..page_count)
            .filter(|&i| !succeeded[i])
            .take(self.config.max_pages)
            .collect();

        let vlm_pages_processed = image_heavy.len();

        if !image_heavy.is_empty() {
            let semaphore = Arc::new(Semaphore::new(self.config.workers.max(1)));
            let results = futures::future::join_all(image_heavy.iter().map(|&idx| {
                let semaphore = Arc::clone(&semaphore);
                let path = path.to_path_buf();
                let dpi = self.config.dpi;
                let timeout = self.config.vlm_timeout;
                let library_path = self.config.pdfium_library_path.clone();
                async move {
                    let page_number = u32::try_from(idx + 1).unwrap_or(u32::MAX);
                    let outcome =
                        render_and_describe(semaphore, path, page_number, dpi, library_path, vlm, timeout)
                            .await;
                    (idx, outcome)
                }
            }))
            .await;

            for (idx, outcome) in results {
                match outcome {
                    Ok(text) => {
                        texts[idx] = text;
                        succeeded[idx] = true;
                    }
                    Err(e) => {
                        tracing::warn!(page = idx + 1, error = %e, "VLM fallback failed for page, using placeholder");
                        texts[idx] = format!("[page {}: extraction failed]", idx + 1);
                    }
                }
            }
        }

        let all_failed = page_count > 0 && succeeded.iter().all(|ok| !ok);

        let segments = texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let page_number = u32::try_from(i + 1).unwrap_or(u32::MAX);
                TextSegment::page(text, page_number)
            })
            .collect();

        Ok(PdfOutcome { segments, page_count, vlm_pages_processed, all_failed })
    }
}

#[allow(clippy::too_many_arguments)]
async fn render_and_describe(
    semaphore: Arc<Semaphore>,
    path: PathBuf,
    page_number: u32,
    dpi: u16,
    library_path: Option<String>,
    vlm: &(impl VlmModel + ?Sized),
    timeout: std::time::Duration,
) -> Result<String> {
    let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");

    let png = tokio::task::spawn_blocking(move || {
        render::render_page_png(&path, page_number, dpi, library_path.as_deref())
    })
    .await
    .expect("render task did not panic")?;

    match tokio::time::timeout(timeout, vlm.describe(&png, VLM_PROMPT)).await {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(PdfError::Core(e)),
        Err(_) => Err(PdfError::Core(localdoc_core::Error::ModelTimeout(timeout))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use localdoc_core::Result as CoreResult;

    #[derive(Debug, Default)]
    struct FixedVlm {
        response: String,
    }

    impl VlmModel for FixedVlm {
        async fn describe(&self, _image: &[u8], _prompt: &str) -> CoreResult<String> {
            Ok(self.response.clone())
        }
    }

    #[test]
    fn config_defaults_match_contract() {
        let config = PdfPipelineConfig::default();
        assert_eq!(config.min_chars_per_page, 100);
        assert_eq!(config.dpi, 150);
        assert_eq!(config.workers, 2);
        assert_eq!(config.vlm_timeout, std::time::Duration::from_secs(60));
    }

    #[tokio::test]
    async fn invalid_pdf_path_errors() {
        let pipeline = PdfPipeline::new(PdfPipelineConfig::default());
        let vlm = FixedVlm::default();
        let result = pipeline.process(Path::new("/nonexistent/does-not-exist.pdf"), &vlm).await;
        assert!(result.is_err());
    }
}
