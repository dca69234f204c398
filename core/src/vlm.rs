//! Vision-Language-Model capability, used as the PDF sub-pipeline's
//! image-heavy-page fallback and as the image processor's description
//! generator.

use crate::Result;

/// A model capable of producing text conditioned on an image and a
/// prompt, e.g. a local Ollama-compatible generation endpoint.
pub trait VlmModel: Send + Sync {
    /// Submits one image (already encoded, e.g. PNG bytes) with a fixed
    /// prompt and returns the model's free-text response.
    ///
    /// # Errors
    /// Returns an error if the model is unreachable or times out. Callers
    /// are responsible for enforcing the per-call deadline (`T_vlm`).
    fn describe(&self, image: &[u8], prompt: &str) -> impl Future<Output = Result<String>> + Send;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::VlmModel;
    use crate::Result;

    /// Deterministic VLM stub for tests.
    #[derive(Debug, Default)]
    pub struct MockVlmModel {
        pub response: String,
    }

    impl VlmModel for MockVlmModel {
        async fn describe(&self, _image: &[u8], _prompt: &str) -> Result<String> {
            Ok(self.response.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::MockVlmModel;
    use super::*;

    #[tokio::test]
    async fn returns_fixed_response() {
        let vlm = MockVlmModel { response: "page 2 content".into() };
        let out = vlm.describe(b"\x89PNG", "transcribe").await.unwrap();
        assert_eq!(out, "page 2 content");
    }
}
