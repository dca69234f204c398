//! HNSW-backed approximate nearest-neighbor vector index over chunk
//! embeddings, keyed by `chunk_id`.

use instant_distance::{Builder, HnswMap, Point, Search};
use ordered_float::OrderedFloat;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::{IndexError, Result};
use crate::types::IndexEntry;

#[derive(Debug, Clone)]
struct EmbeddingPoint {
    embedding: Vec<f32>,
}

impl Point for EmbeddingPoint {
    fn distance(&self, other: &Self) -> f32 {
        1.0 - cosine_similarity(&self.embedding, &other.embedding)
    }
}

/// Cosine similarity between two equal-length vectors. Returns 0.0 if
/// either vector has zero norm.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

struct IndexState {
    entries: Vec<IndexEntry>,
    id_to_index: HashMap<String, usize>,
    content_hashes: HashMap<u64, String>,
    hnsw: Option<HnswMap<EmbeddingPoint, usize>>,
    dirty: bool,
}

impl IndexState {
    fn rebuild_hnsw(&mut self) {
        if self.entries.is_empty() {
            self.hnsw = None;
            self.dirty = false;
            return;
        }
        let points: Vec<EmbeddingPoint> =
            self.entries.iter().map(|e| EmbeddingPoint { embedding: e.embedding.clone() }).collect();
        let indices: Vec<usize> = (0..self.entries.len()).collect();
        self.hnsw = Some(Builder::default().build(points, indices));
        self.dirty = false;
    }
}

/// A vector index over chunk embeddings, with exact dimension checking
/// and content-hash lookup for deduplication.
pub struct VectorIndex {
    dimension: usize,
    state: RwLock<IndexState>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex").field("dimension", &self.dimension).field("len", &self.len()).finish()
    }
}

impl VectorIndex {
    /// Builds an empty index fixed to `dimension`.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            state: RwLock::new(IndexState {
                entries: Vec::new(),
                id_to_index: HashMap::new(),
                content_hashes: HashMap::new(),
                hnsw: None,
                dirty: false,
            }),
        }
    }

    /// The fixed embedding dimension this index accepts.
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Inserts or replaces an entry by `chunk.id`.
    ///
    /// # Errors
    /// Returns [`IndexError::DimensionMismatch`] if the embedding's
    /// length does not match [`Self::dimension`].
    pub fn insert(&self, entry: IndexEntry) -> Result<()> {
        if entry.embedding.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: entry.embedding.len(),
            });
        }
        let mut state = self.state.write();
        let id = entry.chunk.id.clone();
        let hash = entry.chunk.content_hash;
        if let Some(&idx) = state.id_to_index.get(&id) {
            let old_hash = state.entries[idx].chunk.content_hash;
            state.content_hashes.remove(&old_hash);
            state.entries[idx] = entry;
        } else {
            let idx = state.entries.len();
            state.entries.push(entry);
            state.id_to_index.insert(id.clone(), idx);
        }
        state.content_hashes.insert(hash, id);
        state.dirty = true;
        Ok(())
    }

    /// Removes an entry by `chunk_id`, using swap-removal and
    /// re-indexing the swapped element.
    pub fn remove(&self, chunk_id: &str) -> bool {
        let mut state = self.state.write();
        let Some(idx) = state.id_to_index.remove(chunk_id) else {
            return false;
        };
        let removed = state.entries.swap_remove(idx);
        state.content_hashes.remove(&removed.chunk.content_hash);
        if idx < state.entries.len() {
            let moved_id = state.entries[idx].chunk.id.clone();
            state.id_to_index.insert(moved_id, idx);
        }
        state.dirty = true;
        true
    }

    /// Searches for the `top_k` nearest neighbors of `query` above
    /// `threshold` cosine similarity, sorted by similarity descending.
    #[must_use]
    pub fn search(&self, query: &[f32], top_k: usize, threshold: f32) -> Vec<(String, f32)> {
        {
            let needs_rebuild = self.state.read().dirty;
            if needs_rebuild {
                self.state.write().rebuild_hnsw();
            }
        }
        let state = self.state.read();
        let Some(hnsw) = &state.hnsw else {
            return Vec::new();
        };
        let query_point = EmbeddingPoint { embedding: query.to_vec() };
        let mut search = Search::default();
        let mut results: Vec<(String, f32)> = hnsw
            .search(&query_point, &mut search)
            .take(top_k.max(1) * 4)
            .filter_map(|item| {
                let entry_idx = *item.value;
                let similarity = 1.0 - item.distance;
                if similarity < threshold {
                    return None;
                }
                Some((state.entries[entry_idx].chunk.id.clone(), similarity))
            })
            .collect();
        results.sort_by(|a, b| OrderedFloat(b.1).cmp(&OrderedFloat(a.1)).then_with(|| a.0.cmp(&b.0)));
        results.truncate(top_k);
        results
    }

    /// Looks up a single entry by `chunk_id`, for enrichment after a
    /// fused search has settled on a final candidate set.
    #[must_use]
    pub fn get(&self, chunk_id: &str) -> Option<IndexEntry> {
        let state = self.state.read();
        state.id_to_index.get(chunk_id).map(|&idx| state.entries[idx].clone())
    }

    /// Number of entries currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes all entries.
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.entries.clear();
        state.id_to_index.clear();
        state.content_hashes.clear();
        state.hnsw = None;
        state.dirty = false;
    }

    /// Returns a snapshot of all entries, for persistence.
    #[must_use]
    pub fn entries(&self) -> Vec<IndexEntry> {
        self.state.read().entries.clone()
    }

    /// Replaces all entries, e.g. when loading from persistence.
    pub fn load(&self, entries: Vec<IndexEntry>) {
        let mut state = self.state.write();
        state.id_to_index.clear();
        state.content_hashes.clear();
        for (idx, entry) in entries.iter().enumerate() {
            state.id_to_index.insert(entry.chunk.id.clone(), idx);
            state.content_hashes.insert(entry.chunk.content_hash, entry.chunk.id.clone());
        }
        state.entries = entries;
        state.dirty = true;
    }

    /// Whether a chunk with this content hash is already present, for
    /// deduplication.
    #[must_use]
    pub fn contains_hash(&self, hash: u64) -> bool {
        self.state.read().content_hashes.contains_key(&hash)
    }

    /// Looks up the entry already indexed under this content hash, so a
    /// caller can reuse its embedding instead of re-embedding unchanged
    /// text.
    #[must_use]
    pub fn find_by_hash(&self, hash: u64) -> Option<IndexEntry> {
        let state = self.state.read();
        let id = state.content_hashes.get(&hash)?;
        let idx = state.id_to_index.get(id)?;
        Some(state.entries[*idx].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;

    fn entry(id: &str, text: &str, vec: Vec<f32>) -> IndexEntry {
        let chunk = Chunk::new("doc1", 0, text, crate::dedup::content_hash(text));
        let mut chunk = chunk;
        chunk.id = id.to_string();
        IndexEntry::new(chunk, vec)
    }

    #[test]
    fn insert_and_search_returns_closest() {
        let index = VectorIndex::new(3);
        index.insert(entry("a", "a", vec![1.0, 0.0, 0.0])).unwrap();
        index.insert(entry("b", "b", vec![0.0, 1.0, 0.0])).unwrap();
        let results = index.search(&[1.0, 0.0, 0.0], 1, 0.0);
        assert_eq!(results[0].0, "a");
    }

    #[test]
    fn dimension_mismatch_rejected() {
        let index = VectorIndex::new(3);
        let err = index.insert(entry("a", "a", vec![1.0, 0.0])).unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { expected: 3, actual: 2 }));
    }

    #[test]
    fn remove_then_search_excludes_entry() {
        let index = VectorIndex::new(3);
        index.insert(entry("a", "a", vec![1.0, 0.0, 0.0])).unwrap();
        index.insert(entry("b", "b", vec![0.0, 1.0, 0.0])).unwrap();
        assert!(index.remove("a"));
        let results = index.search(&[1.0, 0.0, 0.0], 2, 0.0);
        assert!(results.iter().all(|(id, _)| id != "a"));
    }

    #[test]
    fn threshold_filters_dissimilar_results() {
        let index = VectorIndex::new(3);
        index.insert(entry("a", "a", vec![1.0, 0.0, 0.0])).unwrap();
        index.insert(entry("b", "b", vec![-1.0, 0.0, 0.0])).unwrap();
        let results = index.search(&[1.0, 0.0, 0.0], 2, 0.5);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "a");
    }

    #[test]
    fn contains_hash_tracks_dedup_state() {
        let index = VectorIndex::new(3);
        let e = entry("a", "same text", vec![1.0, 0.0, 0.0]);
        let hash = e.chunk.content_hash;
        index.insert(e).unwrap();
        assert!(index.contains_hash(hash));
    }

    #[test]
    fn find_by_hash_returns_the_indexed_entry() {
        let index = VectorIndex::new(3);
        let e = entry("a", "same text", vec![1.0, 0.0, 0.0]);
        let hash = e.chunk.content_hash;
        index.insert(e).unwrap();
        assert_eq!(index.find_by_hash(hash).unwrap().chunk.id, "a");
        assert!(index.find_by_hash(999).is_none());
    }

    #[test]
    fn get_returns_stored_entry() {
        let index = VectorIndex::new(3);
        index.insert(entry("a", "a", vec![1.0, 0.0, 0.0])).unwrap();
        assert_eq!(index.get("a").unwrap().chunk.id, "a");
        assert!(index.get("missing").is_none());
    }

    #[test]
    fn clear_resets_state() {
        let index = VectorIndex::new(3);
        index.insert(entry("a", "a", vec![1.0, 0.0, 0.0])).unwrap();
        index.clear();
        assert!(index.is_empty());
    }
}
