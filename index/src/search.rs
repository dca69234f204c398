//! Hybrid search engine (§4.7): parallel vector + BM25 search fused by
//! Reciprocal Rank Fusion, with an optional rerank pass and document-level
//! filter push-down.
//!
//! Tombstoned documents never need filtering out of the fused candidate
//! set here: the store removes a document's chunks from both the vector
//! and full-text indexes the moment it is tombstoned (I5), so a dead
//! chunk simply cannot appear in either sub-search's results.

use std::collections::HashMap;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::SystemTime;

use ordered_float::OrderedFloat;

use localdoc_core::{EmbeddingModel, MediaType};

use crate::error::Result;
use crate::fulltext::FullTextIndex;
use crate::types::{Chunk, Document};
use crate::vector::VectorIndex;

/// RRF rank-damping constant.
const RRF_K: f32 = 60.0;
/// Weight given to the vector sub-search's ranks in fusion.
const W_VECTOR: f32 = 0.7;
/// Weight given to the BM25 sub-search's ranks in fusion.
const W_BM25: f32 = 0.3;
/// Cosine-similarity floor: a chunk absent from the BM25 list survives
/// fusion only if its vector similarity meets this.
const MIN_SIMILARITY: f32 = 0.3;
/// Each sub-search is asked for `CANDIDATE_MULTIPLIER * k` candidates so
/// fusion has enough of a pool to work with.
const CANDIDATE_MULTIPLIER: usize = 4;
/// Default size of the rerank candidate pool, when reranking is enabled.
const DEFAULT_TOP_K_RERANK: usize = 50;

/// A capability trait for a pairwise reranker: given a query and a set of
/// `(chunk_id, text)` candidates, returns one relevance score per
/// candidate, same order as the input.
///
/// Boxed-future rather than native `async fn` in trait, since the engine
/// holds this behind `Arc<dyn Reranker>` and native AFIT is not yet
/// object-safe.
pub trait Reranker: Send + Sync {
    /// Scores each candidate's relevance to `query`. The returned vector
    /// must have the same length and order as `candidates`.
    ///
    /// # Errors
    /// Returns an error if the reranking model is unreachable or times
    /// out.
    fn rerank<'a>(
        &'a self,
        query: &'a str,
        candidates: &'a [(String, String)],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<f32>>> + Send + 'a>>;
}

/// Optional filters pushed down into both sub-searches (§4.7 inputs).
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    /// Restrict to these media types, if non-empty.
    pub media_type: Vec<MediaType>,
    /// Restrict to these extensions (case-insensitive), if non-empty.
    pub extension: Vec<String>,
    /// Restrict to documents whose path starts with this prefix.
    pub path_prefix: Option<PathBuf>,
    /// Restrict to documents modified at or after this time.
    pub date_from: Option<SystemTime>,
    /// Restrict to documents modified at or before this time.
    pub date_to: Option<SystemTime>,
    /// Restrict to audio/video documents with at least this duration.
    pub min_duration: Option<f64>,
    /// Restrict to audio/video documents with at most this duration.
    pub max_duration: Option<f64>,
}

impl SearchFilters {
    /// Whether `doc` satisfies every configured filter. A filter left at
    /// its default (empty/`None`) never excludes anything.
    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        if !self.media_type.is_empty() && !self.media_type.contains(&doc.media_type) {
            return false;
        }
        if !self.extension.is_empty()
            && !self.extension.iter().any(|e| e.eq_ignore_ascii_case(&doc.extension))
        {
            return false;
        }
        if let Some(prefix) = &self.path_prefix {
            if !doc.path.starts_with(prefix) {
                return false;
            }
        }
        if let Some(from) = self.date_from {
            if doc.modified_at < from {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if doc.modified_at > to {
                return false;
            }
        }
        if let Some(min) = self.min_duration {
            if doc.duration_seconds.is_none_or(|d| d < min) {
                return false;
            }
        }
        if let Some(max) = self.max_duration {
            if doc.duration_seconds.is_none_or(|d| d > max) {
                return false;
            }
        }
        true
    }
}

/// One fused search result: a chunk plus the scores that produced its
/// rank. Document-level enrichment (path, filename, playback URL) is the
/// caller's job, since this engine never touches the document registry.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchResult {
    /// The matched chunk.
    pub chunk: Chunk,
    /// Final ranking score: the RRF fusion score, or the reranker's score
    /// if reranking was enabled.
    pub score: f32,
    /// Cosine similarity from the vector sub-search, if the chunk
    /// appeared in its results.
    pub cosine_similarity: Option<f32>,
    /// BM25 score from the lexical sub-search, if the chunk appeared in
    /// its results.
    pub bm25_score: Option<f32>,
}

enum EmbedderHandle<'e, M: EmbeddingModel> {
    Owned(Arc<M>),
    Borrowed(&'e M),
}

impl<M: EmbeddingModel> EmbedderHandle<'_, M> {
    const fn as_ref(&self) -> &M {
        match self {
            Self::Owned(arc) => arc,
            Self::Borrowed(r) => r,
        }
    }
}

/// Fuses a vector sub-search and a BM25 sub-search via Reciprocal Rank
/// Fusion, with an optional rerank pass (§4.7).
pub struct HybridSearchEngine<'e, M: EmbeddingModel> {
    embedder: EmbedderHandle<'e, M>,
    vector: Arc<VectorIndex>,
    fulltext: Arc<FullTextIndex>,
    reranker: Option<Arc<dyn Reranker>>,
    top_k_rerank: usize,
}

impl<M: EmbeddingModel> std::fmt::Debug for HybridSearchEngine<'_, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridSearchEngine")
            .field("vector_len", &self.vector.len())
            .field("fulltext_len", &self.fulltext.len())
            .field("reranking", &self.reranker.is_some())
            .finish_non_exhaustive()
    }
}

impl<M: EmbeddingModel> HybridSearchEngine<'static, M> {
    /// Builds an engine that owns its embedder handle (via `Arc`), for
    /// callers that keep the engine around across many searches.
    #[must_use]
    pub fn new(embedder: Arc<M>, vector: Arc<VectorIndex>, fulltext: Arc<FullTextIndex>) -> Self {
        Self {
            embedder: EmbedderHandle::Owned(embedder),
            vector,
            fulltext,
            reranker: None,
            top_k_rerank: DEFAULT_TOP_K_RERANK,
        }
    }
}

impl<'e, M: EmbeddingModel> HybridSearchEngine<'e, M> {
    /// Builds an engine borrowing its embedder for the duration of `'e`,
    /// for a single ephemeral search call.
    #[must_use]
    pub fn new_borrowed(
        embedder: &'e M,
        vector: &Arc<VectorIndex>,
        fulltext: &Arc<FullTextIndex>,
    ) -> Self {
        Self {
            embedder: EmbedderHandle::Borrowed(embedder),
            vector: Arc::clone(vector),
            fulltext: Arc::clone(fulltext),
            reranker: None,
            top_k_rerank: DEFAULT_TOP_K_RERANK,
        }
    }

    /// Enables a rerank pass over the top `top_k_rerank` fused candidates.
    #[must_use]
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>, top_k_rerank: usize) -> Self {
        self.reranker = Some(reranker);
        self.top_k_rerank = top_k_rerank;
        self
    }

    /// Runs the hybrid search algorithm (§4.7 steps 1-6; document-level
    /// enrichment, step 7, is the store's job).
    ///
    /// `keep` is applied to every candidate in the fused pool *before* it
    /// is cut down to `k` (and before reranking, if enabled) — pushing
    /// document-level filters and tombstone exclusion (steps 2-3) down
    /// past the final truncation, since a chunk filtered out at rank 3
    /// must not suppress a match waiting at rank 11 of the same pool.
    /// The store is the caller that knows how to resolve a chunk's
    /// document, so it builds `keep` from its own registry.
    ///
    /// # Errors
    /// Returns an error if embedding the query fails, or (when enabled)
    /// the reranker call fails.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        mut keep: impl FnMut(&Chunk) -> bool,
    ) -> Result<Vec<SearchResult>> {
        let k = k.clamp(1, 100);
        let pool = k * CANDIDATE_MULTIPLIER;

        let query_embedding = self.embedder.as_ref().embed(query).await?;

        let (vector_hits, bm25_hits) =
            tokio::join!(self.vector_search(&query_embedding, pool), self.bm25_search(query, pool));

        let fused = fuse(&vector_hits, &bm25_hits);

        let mut candidates: Vec<SearchResult> = fused
            .into_iter()
            .filter_map(|(chunk_id, score, cosine_similarity, bm25_score)| {
                let entry = self.vector.get(&chunk_id)?;
                if !keep(&entry.chunk) {
                    return None;
                }
                Some(SearchResult { chunk: entry.chunk, score, cosine_similarity, bm25_score })
            })
            .collect();

        sort_results(&mut candidates);

        if let Some(reranker) = &self.reranker {
            candidates.truncate(self.top_k_rerank);
            let texts: Vec<(String, String)> =
                candidates.iter().map(|r| (r.chunk.id.clone(), r.chunk.text.clone())).collect();
            let scores = reranker.rerank(query, &texts).await?;
            for (result, score) in candidates.iter_mut().zip(scores) {
                result.score = score;
            }
            sort_results(&mut candidates);
        }

        candidates.truncate(k);
        Ok(candidates)
    }

    async fn vector_search(&self, query: &[f32], pool: usize) -> Vec<(String, f32)> {
        self.vector.search(query, pool, 0.0)
    }

    async fn bm25_search(&self, query: &str, pool: usize) -> Vec<(String, f32)> {
        self.fulltext.search(query, pool)
    }
}

/// Fuses two ranked lists by Reciprocal Rank Fusion (§4.7 step 4), then
/// drops chunks that fail the minimum-similarity floor (step 5).
///
/// Returns `(chunk_id, fused_score, cosine_similarity, bm25_score)`.
fn fuse(vector_hits: &[(String, f32)], bm25_hits: &[(String, f32)]) -> Vec<(String, f32, Option<f32>, Option<f32>)> {
    let vector_ranks: HashMap<&str, (usize, f32)> =
        vector_hits.iter().enumerate().map(|(i, (id, sim))| (id.as_str(), (i + 1, *sim))).collect();
    let bm25_ranks: HashMap<&str, (usize, f32)> =
        bm25_hits.iter().enumerate().map(|(i, (id, score))| (id.as_str(), (i + 1, *score))).collect();

    let mut ids: Vec<&str> = vector_ranks.keys().copied().collect();
    for id in bm25_ranks.keys() {
        if !vector_ranks.contains_key(id) {
            ids.push(id);
        }
    }

    ids.into_iter()
        .filter_map(|id| {
            let vector_entry = vector_ranks.get(id);
            let bm25_entry = bm25_ranks.get(id);

            let cosine_similarity = vector_entry.map(|(_, sim)| *sim);
            let bm25_score = bm25_entry.map(|(_, score)| *score);

            if cosine_similarity.is_none_or(|s| s < MIN_SIMILARITY) && bm25_entry.is_none() {
                return None;
            }

            let vector_term = vector_entry.map_or(0.0, |(rank, _)| W_VECTOR / (RRF_K + *rank as f32));
            let bm25_term = bm25_entry.map_or(0.0, |(rank, _)| W_BM25 / (RRF_K + *rank as f32));

            Some((id.to_string(), vector_term + bm25_term, cosine_similarity, bm25_score))
        })
        .collect()
}

/// Deterministic tie-break (§4.7 ordering guarantees): higher fused
/// score, then higher cosine similarity, then lower `chunk_id`.
fn sort_results(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        OrderedFloat(b.score)
            .cmp(&OrderedFloat(a.score))
            .then_with(|| {
                OrderedFloat(b.cosine_similarity.unwrap_or(f32::NEG_INFINITY))
                    .cmp(&OrderedFloat(a.cosine_similarity.unwrap_or(f32::NEG_INFINITY)))
            })
            .then_with(|| a.chunk.id.cmp(&b.chunk.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IndexEntry;
    use localdoc_core::Embedding;

    /// Returns canned embeddings recognizable by a keyword in the text,
    /// so the scenario below has fully deterministic cosine similarities
    /// instead of depending on a real model.
    #[derive(Debug)]
    struct ScenarioEmbedder;

    impl EmbeddingModel for ScenarioEmbedder {
        fn dim(&self) -> usize {
            3
        }

        async fn embed(&self, text: &str) -> localdoc_core::Result<Embedding> {
            Ok(if text.contains("quick") {
                vec![1.0, 0.0, 0.0]
            } else if text.contains("sleeps") {
                vec![0.7, 0.3, 0.0]
            } else if text.contains("lazy") {
                vec![0.35, 0.0, 0.9368]
            } else {
                vec![1.0, 0.0, 0.0] // the query itself
            })
        }
    }

    fn seed(vector: &VectorIndex, fulltext: &FullTextIndex, id: &str, text: &str, embedding: Vec<f32>) {
        let chunk = {
            let mut c = Chunk::new("doc1", 0, text, crate::dedup::content_hash(text));
            c.id = id.to_string();
            c
        };
        vector.insert(IndexEntry::new(chunk.clone(), embedding)).unwrap();
        fulltext.insert(id, text);
    }

    #[tokio::test]
    async fn deterministic_hybrid_search_matches_scenario_5() {
        let vector = Arc::new(VectorIndex::new(3));
        let fulltext = Arc::new(FullTextIndex::new());

        // cosine(query, c1)=1.0, cosine(query, c3)=0.919, cosine(query, c2)=0.35 —
        // c2 stays above the 0.3 similarity floor so it survives fusion despite
        // matching neither BM25 term.
        seed(&vector, &fulltext, "c1", "The quick brown fox", vec![1.0, 0.0, 0.0]);
        seed(&vector, &fulltext, "c2", "Jumps over the lazy dog", vec![0.35, 0.0, 0.9368]);
        seed(&vector, &fulltext, "c3", "Brown fox sleeps", vec![0.7, 0.3, 0.0]);

        let embedder = ScenarioEmbedder;
        let engine = HybridSearchEngine::new_borrowed(&embedder, &vector, &fulltext);

        let results = engine.search("brown fox", 3, |_| true).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c3", "c2"]);
    }

    #[tokio::test]
    async fn keep_predicate_surfaces_a_match_buried_in_the_pool() {
        // Four chunks all land in the k=1 pool (pool = 4*k = 4), ranked
        // c1 > c2 > c3 > c4 by similarity. Only c4 passes `keep`. If the
        // engine truncated to k before filtering, the unfiltered top-1
        // (c1) would be cut first and the whole result set would come
        // back empty despite c4 being right there in the pool.
        let vector = Arc::new(VectorIndex::new(3));
        let fulltext = Arc::new(FullTextIndex::new());
        seed(&vector, &fulltext, "c1", "brown fox one", vec![1.0, 0.0, 0.0]);
        seed(&vector, &fulltext, "c2", "brown fox two", vec![0.95, 0.3122, 0.0]);
        seed(&vector, &fulltext, "c3", "brown fox three", vec![0.9, 0.4359, 0.0]);
        seed(&vector, &fulltext, "c4", "brown fox four", vec![0.85, 0.5267, 0.0]);

        let embedder = ScenarioEmbedder;
        let engine = HybridSearchEngine::new_borrowed(&embedder, &vector, &fulltext);

        let results = engine.search("brown fox", 1, |c| c.id == "c4").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.id, "c4");
    }

    #[test]
    fn rrf_favors_item_ranked_first_in_both_lists() {
        let v = vec![("c1".to_string(), 0.9), ("c3".to_string(), 0.5)];
        let b = vec![("c1".to_string(), 5.0), ("c2".to_string(), 4.0)];
        let fused = fuse(&v, &b);
        let mut scores: HashMap<_, _> = fused.into_iter().map(|(id, s, _, _)| (id, s)).collect();
        let c1 = scores.remove("c1").unwrap();
        let c2 = scores.remove("c2").unwrap();
        let c3 = scores.remove("c3").unwrap();
        assert!(c1 > c2);
        assert!(c1 > c3);
    }

    #[test]
    fn drops_low_similarity_chunk_absent_from_bm25() {
        let v = vec![("lonely".to_string(), 0.1)];
        let b: Vec<(String, f32)> = vec![];
        assert!(fuse(&v, &b).is_empty());
    }

    #[test]
    fn keeps_low_similarity_chunk_present_in_bm25() {
        let v = vec![("c1".to_string(), 0.1)];
        let b = vec![("c1".to_string(), 2.0)];
        assert_eq!(fuse(&v, &b).len(), 1);
    }

    #[test]
    fn tie_break_prefers_higher_cosine_then_lower_id() {
        let mut results = vec![
            SearchResult {
                chunk: Chunk::new("d", 0, "a", 1),
                score: 1.0,
                cosine_similarity: Some(0.5),
                bm25_score: None,
            },
            SearchResult {
                chunk: {
                    let mut c = Chunk::new("d", 1, "b", 2);
                    c.id = "aaa".to_string();
                    c
                },
                score: 1.0,
                cosine_similarity: Some(0.5),
                bm25_score: None,
            },
        ];
        sort_results(&mut results);
        assert_eq!(results[0].chunk.id, "aaa");
    }
}
