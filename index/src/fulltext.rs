//! A from-scratch BM25 inverted index over chunk text.
//!
//! The teacher crate has no lexical index at all (it is a pure vector
//! RAG store); this module exists to make the dual-index store dual —
//! grounded on the retrieval pack's hybrid-search examples, which pair
//! an FTS5/BM25 lexical index with a vector store behind one search
//! entry point.

use std::collections::HashMap;

use parking_lot::RwLock;

/// BM25 k1 parameter: term-frequency saturation.
const K1: f32 = 1.2;
/// BM25 b parameter: length normalization strength.
const B: f32 = 0.75;

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[derive(Default)]
struct State {
    /// term -> (chunk_id -> term frequency in that chunk)
    postings: HashMap<String, HashMap<String, u32>>,
    /// chunk_id -> token count
    doc_lengths: HashMap<String, u32>,
    total_length: u64,
}

/// An in-memory BM25 index keyed by `chunk_id`.
#[derive(Default)]
pub struct FullTextIndex {
    state: RwLock<State>,
}

impl std::fmt::Debug for FullTextIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FullTextIndex").field("docs", &self.len()).finish()
    }
}

impl FullTextIndex {
    /// Builds an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes or re-indexes a chunk's text under `chunk_id`. Replaces
    /// any prior postings for the same id.
    pub fn insert(&self, chunk_id: &str, text: &str) {
        self.remove(chunk_id);
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return;
        }
        let mut state = self.state.write();
        let mut freqs: HashMap<String, u32> = HashMap::new();
        for t in &tokens {
            *freqs.entry(t.clone()).or_insert(0) += 1;
        }
        state.doc_lengths.insert(chunk_id.to_string(), tokens.len() as u32);
        state.total_length += tokens.len() as u64;
        for (term, freq) in freqs {
            state.postings.entry(term).or_default().insert(chunk_id.to_string(), freq);
        }
    }

    /// Removes a chunk's postings, if present.
    pub fn remove(&self, chunk_id: &str) {
        let mut state = self.state.write();
        if let Some(len) = state.doc_lengths.remove(chunk_id) {
            state.total_length = state.total_length.saturating_sub(u64::from(len));
        }
        for postings in state.postings.values_mut() {
            postings.remove(chunk_id);
        }
    }

    /// Number of indexed chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().doc_lengths.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Searches for the `top_k` chunks scoring highest by BM25 against
    /// `query`, sorted descending, ties broken by lower `chunk_id`.
    #[must_use]
    pub fn search(&self, query: &str, top_k: usize) -> Vec<(String, f32)> {
        let state = self.state.read();
        let n = state.doc_lengths.len();
        if n == 0 {
            return Vec::new();
        }
        let avgdl = state.total_length as f32 / n as f32;
        let mut scores: HashMap<String, f32> = HashMap::new();

        for term in tokenize(query) {
            let Some(postings) = state.postings.get(&term) else { continue };
            let n_t = postings.len() as f32;
            let idf = ((n as f32 - n_t + 0.5) / (n_t + 0.5) + 1.0).ln();
            for (chunk_id, &freq) in postings {
                let dl = f32::from(u16::try_from(state.doc_lengths[chunk_id]).unwrap_or(u16::MAX));
                let freq = freq as f32;
                let denom = freq + K1 * (1.0 - B + B * dl / avgdl.max(1.0));
                let score = idf * (freq * (K1 + 1.0)) / denom.max(f32::EPSILON);
                *scores.entry(chunk_id.clone()).or_insert(0.0) += score;
            }
        }

        let mut results: Vec<(String, f32)> = scores.into_iter().collect();
        results.sort_by(|a, b| {
            b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0))
        });
        results.truncate(top_k);
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_matches_outrank_non_matches() {
        let index = FullTextIndex::new();
        index.insert("c1", "the quick brown fox");
        index.insert("c2", "jumps over the lazy dog");
        index.insert("c3", "brown fox sleeps");
        let results = index.search("brown fox", 10);
        let ids: Vec<&str> = results.iter().map(|(id, _)| id.as_str()).collect();
        assert!(ids.contains(&"c1"));
        assert!(ids.contains(&"c3"));
        assert!(!ids.contains(&"c2"), "c2 shares no query term and should score zero");
    }

    #[test]
    fn remove_drops_from_results() {
        let index = FullTextIndex::new();
        index.insert("c1", "brown fox");
        index.remove("c1");
        assert!(index.search("brown fox", 10).is_empty());
    }

    #[test]
    fn empty_query_returns_no_results() {
        let index = FullTextIndex::new();
        index.insert("c1", "brown fox");
        assert!(index.search("", 10).is_empty());
    }

    #[test]
    fn reinsert_replaces_postings() {
        let index = FullTextIndex::new();
        index.insert("c1", "alpha");
        index.insert("c1", "beta");
        assert!(index.search("alpha", 10).is_empty());
        assert_eq!(index.search("beta", 10)[0].0, "c1");
    }
}
