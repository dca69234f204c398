//! Chunking, embedding gateway, dual-index store, and hybrid search
//! engine for `local-doc-search`.
//!
//! # Architecture
//!
//! - [`types`]: `Document`, `Chunk`, `IndexEntry`, `SearchResult` — the
//!   shapes that flow between every other module.
//! - [`chunking`]: splits extracted text into overlapping, locator-aware
//!   chunks (§4.2).
//! - [`embedding`]: batches and caches calls to a
//!   [`localdoc_core::EmbeddingModel`] (§4.5).
//! - [`vector`]: an HNSW-backed approximate nearest-neighbor index over
//!   chunk embeddings.
//! - [`fulltext`]: a from-scratch BM25 inverted index over chunk text.
//! - [`store`]: the dual-index store tying the relational registry,
//!   vector index, and full-text index together behind a two-phase apply
//!   (§4.6).
//! - [`search`]: the hybrid search engine fusing vector and BM25 ranks
//!   via Reciprocal Rank Fusion (§4.7).
//!
//! # Quick start
//!
//! ```rust,no_run
//! # async fn run() -> localdoc_core::Result<()> {
//! use localdoc_index::{DualIndexStore, StoreConfig};
//!
//! let store = DualIndexStore::open(StoreConfig::default())?;
//! let hits = store.search("brown fox", 10, Default::default()).await?;
//! # let _ = hits;
//! # Ok(())
//! # }
//! ```

pub mod chunking;
mod dedup;
pub mod embedding;
pub mod error;
pub mod fulltext;
pub mod search;
pub mod store;
pub mod types;
pub mod vector;

pub use chunking::{Chunker, Locator, SlidingWindowChunker};
pub use embedding::EmbeddingGateway;
pub use error::{IndexError, Result};
pub use search::{HybridSearchEngine, Reranker, SearchFilters, SearchResult};
pub use store::{DirectoryStats, DocumentStats, DualIndexStore, StoreConfig};
pub use types::{Chunk, Document, IndexEntry, Transcript};
