//! Image pipeline (§4.3): a single VLM describe call over the whole
//! image, plus dimensions read from the image header.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use localdoc_core::{MediaType, VlmModel};
use localdoc_index::chunking::TextSegment;

use crate::error::Result;
use crate::registry::{MediaPipeline, ProcessedMedia};

/// The fixed prompt submitted for every image, mirroring the PDF
/// sub-pipeline's fixed `VLM_PROMPT` (§4.4) but scoped to a standalone
/// image rather than a rendered page.
pub const IMAGE_VLM_PROMPT: &str =
    "Describe this image in detail: subject, setting, visible text, and any notable objects or people.";

/// Image pipeline: describes the image with a VLM and records its
/// pixel dimensions.
pub struct ImagePipeline<V> {
    vlm: V,
}

impl<V: VlmModel> ImagePipeline<V> {
    /// Builds an image pipeline backed by `vlm`.
    #[must_use]
    pub const fn new(vlm: V) -> Self {
        Self { vlm }
    }
}

impl<V: VlmModel + Send + Sync> MediaPipeline for ImagePipeline<V> {
    fn can_process(&self, media_type: MediaType) -> bool {
        media_type == MediaType::Image
    }

    fn process<'a>(
        &'a self,
        path: &'a Path,
        _document_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ProcessedMedia>> + Send + 'a>> {
        Box::pin(async move {
            let bytes = tokio::fs::read(path).await?;
            let dims = image::load_from_memory(&bytes).ok().map(|img| (img.width(), img.height()));

            let description = self.vlm.describe(&bytes, IMAGE_VLM_PROMPT).await?;

            Ok(ProcessedMedia {
                segments: vec![TextSegment::plain(description)],
                width: dims.map(|(w, _)| w),
                height: dims.map(|(_, h)| h),
                ..Default::default()
            })
        })
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

    #[tokio::test]
    async fn describes_image_and_reads_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        let img = image::RgbImage::new(4, 3);
        img.save(&path).unwrap();

        let pipeline = ImagePipeline::new(FixedVlm { response: "a blank photo".into() });
        let out = pipeline.process(&path, "d1").await.unwrap();
        assert_eq!(out.segments[0].text, "a blank photo");
        assert_eq!(out.width, Some(4));
        assert_eq!(out.height, Some(3));
    }
}
