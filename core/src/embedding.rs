//! Dense embedding capability.
//!
//! An embedding is a fixed-dimension real-valued representation of text,
//! produced by a local model runtime (an Ollama-compatible HTTP service in
//! production, a deterministic mock in tests). The dimension is fixed at
//! construction from a probe call; any later call returning a different
//! dimension is a fatal [`crate::Error::ModelShapeMismatch`].

use crate::Result;

/// A dense embedding vector. The system fixes `d = 1024` for the
/// production model, but the type itself carries no dimension — callers
/// that need the fixed dimension read it from [`EmbeddingModel::dim`].
pub type Embedding = Vec<f32>;

/// A model capable of producing dense embeddings for text.
///
/// Implementations are expected to be cheap to clone (an `Arc` around a
/// client) and safe to call concurrently — the embedding gateway bounds
/// concurrency itself rather than relying on the model to do so.
pub trait EmbeddingModel: Send + Sync {
    /// The fixed dimension of vectors this model produces.
    fn dim(&self) -> usize;

    /// Embeds a single piece of text.
    ///
    /// # Errors
    /// Returns an error if the model is unreachable, times out, or
    /// returns a vector of unexpected dimension.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Embedding>> + Send;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::{Embedding, EmbeddingModel};
    use crate::Result;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic embedder for tests: every call is pure and fast.
    #[derive(Debug, Default)]
    pub struct MockEmbeddingModel {
        pub dim: usize,
        pub calls: AtomicUsize,
    }

    impl MockEmbeddingModel {
        #[must_use]
        pub fn new(dim: usize) -> Self {
            Self { dim, calls: AtomicUsize::new(0) }
        }
    }

    impl EmbeddingModel for MockEmbeddingModel {
        fn dim(&self) -> usize {
            self.dim
        }

        async fn embed(&self, text: &str) -> Result<Embedding> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let len = text.len() as f32;
            Ok((0..self.dim).map(|i| (len + i as f32) * 0.01).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::MockEmbeddingModel;
    use super::*;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn embedding_matches_declared_dimension() {
        let model = MockEmbeddingModel::new(1024);
        let v = model.embed("hello world").await.unwrap();
        assert_eq!(v.len(), model.dim());
    }

    #[tokio::test]
    async fn different_texts_produce_different_vectors() {
        let model = MockEmbeddingModel::new(8);
        let a = model.embed("short").await.unwrap();
        let b = model.embed("a much longer string of text").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn each_call_is_counted() {
        let model = MockEmbeddingModel::new(4);
        model.embed("a").await.unwrap();
        model.embed("b").await.unwrap();
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    }
}
