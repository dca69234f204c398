//! `MediaPipeline` capability trait and the `MediaType`-keyed registry
//! that dispatches to one (§4.3, design note §9: tagged-variant
//! dispatch instead of a growing match in the scheduler).

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use localdoc_core::MediaType;
use localdoc_index::Transcript;
use localdoc_index::chunking::TextSegment;

use crate::error::{ProcessorError, Result};

/// The outcome of running one media type's pipeline over a document.
#[derive(Debug, Clone, Default)]
pub struct ProcessedMedia {
    /// Locator-tagged text ready for the chunker.
    pub segments: Vec<TextSegment>,
    /// Pixel width, for image/video documents.
    pub width: Option<u32>,
    /// Pixel height, for image/video documents.
    pub height: Option<u32>,
    /// Duration in seconds, for audio/video documents.
    pub duration_seconds: Option<f64>,
    /// A persisted transcript row, for audio/video documents.
    pub transcript: Option<Transcript>,
    /// Pages the PDF sub-pipeline fell back to VLM description for.
    pub vlm_pages_processed: usize,
}

/// One media type's extraction pipeline.
///
/// Dyn-compatible by hand-boxing the returned future, the same pattern
/// used for the watcher's `EventSink` and [`localdoc_index::Reranker`]
/// — the registry holds pipelines behind `Arc<dyn MediaPipeline>`.
pub trait MediaPipeline: Send + Sync {
    /// Whether this pipeline handles `media_type`.
    fn can_process(&self, media_type: MediaType) -> bool;

    /// Extracts locator-tagged text (and, where relevant, dimensions,
    /// duration, and a transcript) from `path`.
    ///
    /// # Errors
    /// Returns an error if extraction fails outright; callers decide
    /// per-document whether to tombstone or retry.
    fn process<'a>(
        &'a self,
        path: &'a Path,
        document_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ProcessedMedia>> + Send + 'a>>;
}

/// Maps [`MediaType`] to the pipeline that handles it. Adding a media
/// type never requires touching the scheduler: register a new
/// pipeline here instead.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    pipelines: HashMap<MediaType, Arc<dyn MediaPipeline>>,
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry").field("registered", &self.pipelines.len()).finish()
    }
}

impl ProcessorRegistry {
    /// Builds an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `pipeline` for `media_type`, replacing any previous
    /// registration for that type.
    pub fn register(&mut self, media_type: MediaType, pipeline: Arc<dyn MediaPipeline>) {
        self.pipelines.insert(media_type, pipeline);
    }

    /// Processes `path` with the pipeline registered for `media_type`.
    ///
    /// # Errors
    /// Returns [`ProcessorError::Unsupported`] if no pipeline is
    /// registered, or whatever error the pipeline itself raises.
    pub async fn process(
        &self,
        media_type: MediaType,
        path: &Path,
        document_id: &str,
    ) -> Result<ProcessedMedia> {
        let pipeline =
            self.pipelines.get(&media_type).ok_or(ProcessorError::Unsupported(media_type))?;
        pipeline.process(path, document_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedPipeline(MediaType);

    impl MediaPipeline for FixedPipeline {
        fn can_process(&self, media_type: MediaType) -> bool {
            media_type == self.0
        }

        fn process<'a>(
            &'a self,
            _path: &'a Path,
            _document_id: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<ProcessedMedia>> + Send + 'a>> {
            Box::pin(async move {
                Ok(ProcessedMedia { segments: vec![TextSegment::plain("x")], ..Default::default() })
            })
        }
    }

    #[tokio::test]
    async fn dispatches_to_registered_pipeline() {
        let mut registry = ProcessorRegistry::new();
        registry.register(MediaType::Document, Arc::new(FixedPipeline(MediaType::Document)));
        let out = registry.process(MediaType::Document, Path::new("/a.txt"), "d1").await.unwrap();
        assert_eq!(out.segments.len(), 1);
    }

    #[tokio::test]
    async fn unregistered_media_type_errors() {
        let registry = ProcessorRegistry::new();
        let err = registry.process(MediaType::Image, Path::new("/a.png"), "d1").await.unwrap_err();
        assert!(matches!(err, ProcessorError::Unsupported(MediaType::Image)));
    }
}
