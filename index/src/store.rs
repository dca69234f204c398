//! Dual-index store (§4.6): a relational document/chunk registry, a
//! vector index, and a BM25 full-text index, kept consistent behind a
//! two-phase apply.
//!
//! A document upsert is a single logical operation: delete all prior
//! chunks/embeddings for the document, then insert the new ones, then
//! update the Document row. Because the vector index lives outside the
//! relational store, commits happen in two phases so a crash between
//! them is recoverable (§4.6 step 4, scenario 6).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::fulltext::FullTextIndex;
use crate::search::{HybridSearchEngine, SearchFilters, SearchResult};
use crate::types::{Chunk, Document, IndexEntry, Transcript};
use crate::vector::VectorIndex;
use localdoc_core::{EmbeddingModel, MediaType};

const DOCUMENTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("documents");
const CHUNKS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("chunks");
const VECTORS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("vectors");
const PENDING_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("pending");
const TRANSCRIPTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("transcripts");

/// The phase of an in-flight two-phase apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingPhase {
    /// Vector-index changes may or may not have landed yet.
    Staged,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PendingMarker {
    document_id: String,
    phase: PendingPhase,
}

/// Aggregate counts for `GET /api/documents/stats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentStats {
    /// Non-tombstoned document count.
    pub total_documents: u64,
    /// Non-tombstoned document count, keyed by media type (`"document"`,
    /// `"image"`, `"audio"`, `"video"`).
    pub by_media_type: std::collections::BTreeMap<String, u64>,
    /// Live chunk count across every non-tombstoned document.
    pub total_chunks: u64,
    /// The latest `indexed_at` among non-tombstoned documents, if any.
    pub last_indexed_at: Option<std::time::SystemTime>,
}

/// One entry of `GET /api/documents/directories`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryStats {
    /// Absolute directory path.
    pub path: PathBuf,
    /// Non-tombstoned document count directly under this directory.
    pub file_count: u64,
}

/// Configuration for opening a [`DualIndexStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the on-disk `redb` database file.
    pub path: PathBuf,
    /// Fixed embedding dimension (d = 1024 in production).
    pub dimension: usize,
    /// Whether to skip re-embedding chunks whose content hash already
    /// exists in the vector index.
    pub deduplication: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("./docs.redb"), dimension: 1024, deduplication: true }
    }
}

/// The dual-index store: documents + chunks (relational, `redb`),
/// vectors (HNSW), and full text (BM25), all keyed by `chunk_id`.
pub struct DualIndexStore {
    db: Database,
    vector: Arc<VectorIndex>,
    fulltext: Arc<FullTextIndex>,
    writer_lock: tokio::sync::Mutex<()>,
    config: StoreConfig,
}

impl std::fmt::Debug for DualIndexStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualIndexStore")
            .field("path", &self.config.path)
            .field("vector_len", &self.vector.len())
            .field("fulltext_len", &self.fulltext.len())
            .finish()
    }
}

impl DualIndexStore {
    /// Opens (creating if absent) the store at `config.path`, loads the
    /// vector index and full-text index from the relational tables, and
    /// runs the crash-recovery pass over any `staged` pending markers.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or a persisted
    /// record fails to deserialize.
    pub fn open(config: StoreConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(&config.path).map_err(|e| IndexError::Store(e.to_string()))?;

        // Ensure tables exist.
        {
            let txn = db.begin_write().map_err(|e| IndexError::Store(e.to_string()))?;
            txn.open_table(DOCUMENTS_TABLE).map_err(|e| IndexError::Store(e.to_string()))?;
            txn.open_table(CHUNKS_TABLE).map_err(|e| IndexError::Store(e.to_string()))?;
            txn.open_table(VECTORS_TABLE).map_err(|e| IndexError::Store(e.to_string()))?;
            txn.open_table(PENDING_TABLE).map_err(|e| IndexError::Store(e.to_string()))?;
            txn.open_table(TRANSCRIPTS_TABLE).map_err(|e| IndexError::Store(e.to_string()))?;
            txn.commit().map_err(|e| IndexError::Store(e.to_string()))?;
        }

        let vector = Arc::new(VectorIndex::new(config.dimension));
        let fulltext = Arc::new(FullTextIndex::new());

        let store = Self { db, vector, fulltext, writer_lock: tokio::sync::Mutex::new(()), config };
        store.load_vector_entries()?;
        store.rebuild_fulltext()?;
        store.recovery_pass()?;
        Ok(store)
    }

    fn load_vector_entries(&self) -> Result<()> {
        let txn = self.db.begin_read().map_err(|e| IndexError::Store(e.to_string()))?;
        let table = txn.open_table(VECTORS_TABLE).map_err(|e| IndexError::Store(e.to_string()))?;
        let mut entries = Vec::new();
        for row in table.iter().map_err(|e| IndexError::Store(e.to_string()))? {
            let (_, value) = row.map_err(|e| IndexError::Store(e.to_string()))?;
            let entry: IndexEntry =
                serde_json::from_slice(value.value()).map_err(|e| IndexError::Serialization(e.to_string()))?;
            entries.push(entry);
        }
        self.vector.load(entries);
        Ok(())
    }

    fn rebuild_fulltext(&self) -> Result<()> {
        let txn = self.db.begin_read().map_err(|e| IndexError::Store(e.to_string()))?;
        let table = txn.open_table(CHUNKS_TABLE).map_err(|e| IndexError::Store(e.to_string()))?;
        for row in table.iter().map_err(|e| IndexError::Store(e.to_string()))? {
            let (_, value) = row.map_err(|e| IndexError::Store(e.to_string()))?;
            let chunk: Chunk =
                serde_json::from_slice(value.value()).map_err(|e| IndexError::Serialization(e.to_string()))?;
            self.fulltext.insert(&chunk.id, &chunk.text);
        }
        Ok(())
    }

    fn chunk_ids_for_document(&self, document_id: &str) -> Result<Vec<String>> {
        let txn = self.db.begin_read().map_err(|e| IndexError::Store(e.to_string()))?;
        let table = txn.open_table(CHUNKS_TABLE).map_err(|e| IndexError::Store(e.to_string()))?;
        let mut ids = Vec::new();
        for row in table.iter().map_err(|e| IndexError::Store(e.to_string()))? {
            let (key, value) = row.map_err(|e| IndexError::Store(e.to_string()))?;
            let chunk: Chunk =
                serde_json::from_slice(value.value()).map_err(|e| IndexError::Serialization(e.to_string()))?;
            if chunk.document_id == document_id {
                ids.push(key.value().to_string());
            }
        }
        Ok(ids)
    }

    /// Replaces all chunks/embeddings for `document` wholesale: deletes
    /// every prior chunk owned by `document.id`, inserts `new_chunks`,
    /// and writes the updated Document row — a single logical
    /// transaction backed by a two-phase apply against the external
    /// vector index (§4.6).
    ///
    /// # Errors
    /// Returns an error if the backing store or vector index rejects a
    /// write (e.g. dimension mismatch).
    pub async fn upsert_document(&self, document: Document, new_chunks: Vec<IndexEntry>) -> Result<()> {
        let _guard = self.writer_lock.lock().await;

        let old_chunk_ids = self.chunk_ids_for_document(&document.id)?;

        self.write_pending_marker(&document.id)?;

        // Phase 2: vector index — insert new rows first, then delete old.
        for entry in &new_chunks {
            self.vector.insert(entry.clone())?;
            self.persist_vector_entry(entry)?;
        }
        for old_id in &old_chunk_ids {
            self.vector.remove(old_id);
            self.delete_vector_entry(old_id)?;
        }

        // Phase 3: relational transaction — flips the marker by removing it.
        {
            let txn = self.db.begin_write().map_err(|e| IndexError::Store(e.to_string()))?;
            {
                let mut chunks_table =
                    txn.open_table(CHUNKS_TABLE).map_err(|e| IndexError::Store(e.to_string()))?;
                for old_id in &old_chunk_ids {
                    chunks_table.remove(old_id.as_str()).map_err(|e| IndexError::Store(e.to_string()))?;
                }
                for entry in &new_chunks {
                    let bytes = serde_json::to_vec(&entry.chunk)
                        .map_err(|e| IndexError::Serialization(e.to_string()))?;
                    chunks_table
                        .insert(entry.chunk.id.as_str(), bytes.as_slice())
                        .map_err(|e| IndexError::Store(e.to_string()))?;
                }

                let mut documents_table =
                    txn.open_table(DOCUMENTS_TABLE).map_err(|e| IndexError::Store(e.to_string()))?;
                let doc_bytes =
                    serde_json::to_vec(&document).map_err(|e| IndexError::Serialization(e.to_string()))?;
                documents_table
                    .insert(document.id.as_str(), doc_bytes.as_slice())
                    .map_err(|e| IndexError::Store(e.to_string()))?;

                let mut pending_table =
                    txn.open_table(PENDING_TABLE).map_err(|e| IndexError::Store(e.to_string()))?;
                pending_table.remove(document.id.as_str()).map_err(|e| IndexError::Store(e.to_string()))?;
            }
            txn.commit().map_err(|e| IndexError::Store(e.to_string()))?;
        }

        for old_id in &old_chunk_ids {
            self.fulltext.remove(old_id);
        }
        for entry in &new_chunks {
            self.fulltext.insert(&entry.chunk.id, &entry.chunk.text);
        }

        Ok(())
    }

    /// Tombstones a document: marks it deleted and removes its live
    /// chunks from every index (I5).
    ///
    /// # Errors
    /// Returns an error if the document does not exist or a write fails.
    pub async fn tombstone_document(&self, document_id: &str) -> Result<()> {
        let _guard = self.writer_lock.lock().await;
        let mut document = self
            .get_document(document_id)?
            .ok_or_else(|| IndexError::NotFound(document_id.to_string()))?;
        document.tombstone();
        let old_chunk_ids = self.chunk_ids_for_document(document_id)?;
        for id in &old_chunk_ids {
            self.vector.remove(id);
            self.delete_vector_entry(id)?;
            self.fulltext.remove(id);
        }
        let txn = self.db.begin_write().map_err(|e| IndexError::Store(e.to_string()))?;
        {
            let mut chunks_table = txn.open_table(CHUNKS_TABLE).map_err(|e| IndexError::Store(e.to_string()))?;
            for id in &old_chunk_ids {
                chunks_table.remove(id.as_str()).map_err(|e| IndexError::Store(e.to_string()))?;
            }
            let mut documents_table =
                txn.open_table(DOCUMENTS_TABLE).map_err(|e| IndexError::Store(e.to_string()))?;
            let bytes = serde_json::to_vec(&document).map_err(|e| IndexError::Serialization(e.to_string()))?;
            documents_table
                .insert(document.id.as_str(), bytes.as_slice())
                .map_err(|e| IndexError::Store(e.to_string()))?;
        }
        txn.commit().map_err(|e| IndexError::Store(e.to_string()))?;
        Ok(())
    }

    /// Updates a document's path in place without touching its chunks,
    /// embeddings, or full-text entries (§4.1 `Rename`: content is
    /// unchanged, so no new embedding calls are ever made).
    ///
    /// # Errors
    /// Returns an error if the document does not exist or the write
    /// fails.
    pub async fn rename_document(&self, document_id: &str, new_path: PathBuf) -> Result<()> {
        let _guard = self.writer_lock.lock().await;
        let mut document = self
            .get_document(document_id)?
            .ok_or_else(|| IndexError::NotFound(document_id.to_string()))?;
        document.path = new_path;
        document.indexed_at = std::time::SystemTime::now();

        let txn = self.db.begin_write().map_err(|e| IndexError::Store(e.to_string()))?;
        {
            let mut documents_table =
                txn.open_table(DOCUMENTS_TABLE).map_err(|e| IndexError::Store(e.to_string()))?;
            let bytes = serde_json::to_vec(&document).map_err(|e| IndexError::Serialization(e.to_string()))?;
            documents_table
                .insert(document.id.as_str(), bytes.as_slice())
                .map_err(|e| IndexError::Store(e.to_string()))?;
        }
        txn.commit().map_err(|e| IndexError::Store(e.to_string()))?;
        Ok(())
    }

    /// Whether chunk-level deduplication is enabled for this store.
    #[must_use]
    pub const fn deduplication(&self) -> bool {
        self.config.deduplication
    }

    /// Records a processing failure against a document's row without
    /// touching its chunks, vectors, or full-text entries — unlike
    /// [`Self::upsert_document`], a failed extraction should not wipe out
    /// content that indexed successfully on a prior run. Creates a
    /// minimal document row first if none exists yet.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub async fn record_failure(
        &self,
        document_id: &str,
        path: &Path,
        media_type: Option<MediaType>,
        size: u64,
        error: &str,
    ) -> Result<()> {
        let _guard = self.writer_lock.lock().await;
        let mut document = self.get_document(document_id)?.unwrap_or_else(|| {
            Document::new(
                document_id,
                String::new(),
                path.to_path_buf(),
                media_type.unwrap_or(MediaType::Document),
                size,
            )
        });
        document.last_error = Some(error.to_string());

        let txn = self.db.begin_write().map_err(|e| IndexError::Store(e.to_string()))?;
        {
            let mut documents_table =
                txn.open_table(DOCUMENTS_TABLE).map_err(|e| IndexError::Store(e.to_string()))?;
            let bytes = serde_json::to_vec(&document).map_err(|e| IndexError::Serialization(e.to_string()))?;
            documents_table
                .insert(document.id.as_str(), bytes.as_slice())
                .map_err(|e| IndexError::Store(e.to_string()))?;
        }
        txn.commit().map_err(|e| IndexError::Store(e.to_string()))?;
        Ok(())
    }

    /// Fetches a document by id, if present (tombstoned or not).
    ///
    /// # Errors
    /// Returns an error if the stored record fails to deserialize.
    pub fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let txn = self.db.begin_read().map_err(|e| IndexError::Store(e.to_string()))?;
        let table = txn.open_table(DOCUMENTS_TABLE).map_err(|e| IndexError::Store(e.to_string()))?;
        match table.get(id).map_err(|e| IndexError::Store(e.to_string()))? {
            None => Ok(None),
            Some(value) => Ok(Some(
                serde_json::from_slice(value.value()).map_err(|e| IndexError::Serialization(e.to_string()))?,
            )),
        }
    }

    /// Looks up a non-deleted document by content hash, for identity
    /// resolution (rename/restore detection, §4.1).
    ///
    /// # Errors
    /// Returns an error if a stored record fails to deserialize.
    pub fn find_by_content_hash(&self, hash: &str, include_deleted: bool) -> Result<Option<Document>> {
        let txn = self.db.begin_read().map_err(|e| IndexError::Store(e.to_string()))?;
        let table = txn.open_table(DOCUMENTS_TABLE).map_err(|e| IndexError::Store(e.to_string()))?;
        for row in table.iter().map_err(|e| IndexError::Store(e.to_string()))? {
            let (_, value) = row.map_err(|e| IndexError::Store(e.to_string()))?;
            let doc: Document =
                serde_json::from_slice(value.value()).map_err(|e| IndexError::Serialization(e.to_string()))?;
            if doc.content_hash == hash && (include_deleted || !doc.is_deleted) {
                return Ok(Some(doc));
            }
        }
        Ok(None)
    }

    /// Looks up a document by its current path, regardless of tombstone
    /// state.
    ///
    /// # Errors
    /// Returns an error if a stored record fails to deserialize.
    pub fn find_by_path(&self, path: &Path) -> Result<Option<Document>> {
        let txn = self.db.begin_read().map_err(|e| IndexError::Store(e.to_string()))?;
        let table = txn.open_table(DOCUMENTS_TABLE).map_err(|e| IndexError::Store(e.to_string()))?;
        for row in table.iter().map_err(|e| IndexError::Store(e.to_string()))? {
            let (_, value) = row.map_err(|e| IndexError::Store(e.to_string()))?;
            let doc: Document =
                serde_json::from_slice(value.value()).map_err(|e| IndexError::Serialization(e.to_string()))?;
            if doc.path == path {
                return Ok(Some(doc));
            }
        }
        Ok(None)
    }

    /// Stores (or replaces) the transcript summary for an audio/video
    /// document.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub async fn put_transcript(&self, transcript: &Transcript) -> Result<()> {
        let _guard = self.writer_lock.lock().await;
        let txn = self.db.begin_write().map_err(|e| IndexError::Store(e.to_string()))?;
        {
            let mut table =
                txn.open_table(TRANSCRIPTS_TABLE).map_err(|e| IndexError::Store(e.to_string()))?;
            let bytes =
                serde_json::to_vec(transcript).map_err(|e| IndexError::Serialization(e.to_string()))?;
            table
                .insert(transcript.document_id.as_str(), bytes.as_slice())
                .map_err(|e| IndexError::Store(e.to_string()))?;
        }
        txn.commit().map_err(|e| IndexError::Store(e.to_string()))?;
        Ok(())
    }

    /// Fetches the transcript summary for a document, if one was stored.
    ///
    /// # Errors
    /// Returns an error if the stored record fails to deserialize.
    pub fn get_transcript(&self, document_id: &str) -> Result<Option<Transcript>> {
        let txn = self.db.begin_read().map_err(|e| IndexError::Store(e.to_string()))?;
        let table =
            txn.open_table(TRANSCRIPTS_TABLE).map_err(|e| IndexError::Store(e.to_string()))?;
        match table.get(document_id).map_err(|e| IndexError::Store(e.to_string()))? {
            None => Ok(None),
            Some(value) => Ok(Some(
                serde_json::from_slice(value.value()).map_err(|e| IndexError::Serialization(e.to_string()))?,
            )),
        }
    }

    fn persist_vector_entry(&self, entry: &IndexEntry) -> Result<()> {
        let txn = self.db.begin_write().map_err(|e| IndexError::Store(e.to_string()))?;
        {
            let mut table = txn.open_table(VECTORS_TABLE).map_err(|e| IndexError::Store(e.to_string()))?;
            let bytes = serde_json::to_vec(entry).map_err(|e| IndexError::Serialization(e.to_string()))?;
            table
                .insert(entry.chunk.id.as_str(), bytes.as_slice())
                .map_err(|e| IndexError::Store(e.to_string()))?;
        }
        txn.commit().map_err(|e| IndexError::Store(e.to_string()))?;
        Ok(())
    }

    fn delete_vector_entry(&self, chunk_id: &str) -> Result<()> {
        let txn = self.db.begin_write().map_err(|e| IndexError::Store(e.to_string()))?;
        {
            let mut table = txn.open_table(VECTORS_TABLE).map_err(|e| IndexError::Store(e.to_string()))?;
            table.remove(chunk_id).map_err(|e| IndexError::Store(e.to_string()))?;
        }
        txn.commit().map_err(|e| IndexError::Store(e.to_string()))?;
        Ok(())
    }

    fn write_pending_marker(&self, document_id: &str) -> Result<()> {
        let txn = self.db.begin_write().map_err(|e| IndexError::Store(e.to_string()))?;
        {
            let mut table = txn.open_table(PENDING_TABLE).map_err(|e| IndexError::Store(e.to_string()))?;
            let marker = PendingMarker { document_id: document_id.to_string(), phase: PendingPhase::Staged };
            let bytes = serde_json::to_vec(&marker).map_err(|e| IndexError::Serialization(e.to_string()))?;
            table.insert(document_id, bytes.as_slice()).map_err(|e| IndexError::Store(e.to_string()))?;
        }
        txn.commit().map_err(|e| IndexError::Store(e.to_string()))?;
        Ok(())
    }

    /// Deletes orphaned vector rows whose `chunk_id` has no relational
    /// row, for every pending marker left `staged` by a crash between
    /// the two-phase apply's steps (§4.6 step 4, scenario 6).
    ///
    /// # Errors
    /// Returns an error if a persisted record fails to deserialize.
    pub fn recovery_pass(&self) -> Result<usize> {
        let stale_markers: Vec<String> = {
            let txn = self.db.begin_read().map_err(|e| IndexError::Store(e.to_string()))?;
            let table = txn.open_table(PENDING_TABLE).map_err(|e| IndexError::Store(e.to_string()))?;
            table
                .iter()
                .map_err(|e| IndexError::Store(e.to_string()))?
                .filter_map(std::result::Result::ok)
                .map(|(k, _)| k.value().to_string())
                .collect()
        };

        if stale_markers.is_empty() {
            return Ok(0);
        }

        let live_chunk_ids: std::collections::HashSet<String> = {
            let txn = self.db.begin_read().map_err(|e| IndexError::Store(e.to_string()))?;
            let table = txn.open_table(CHUNKS_TABLE).map_err(|e| IndexError::Store(e.to_string()))?;
            table
                .iter()
                .map_err(|e| IndexError::Store(e.to_string()))?
                .filter_map(std::result::Result::ok)
                .map(|(k, _)| k.value().to_string())
                .collect()
        };

        let mut removed = 0;
        for entry in self.vector.entries() {
            if !live_chunk_ids.contains(&entry.chunk.id) {
                self.vector.remove(&entry.chunk.id);
                self.delete_vector_entry(&entry.chunk.id)?;
                self.fulltext.remove(&entry.chunk.id);
                removed += 1;
            }
        }

        let txn = self.db.begin_write().map_err(|e| IndexError::Store(e.to_string()))?;
        {
            let mut table = txn.open_table(PENDING_TABLE).map_err(|e| IndexError::Store(e.to_string()))?;
            for marker in &stale_markers {
                table.remove(marker.as_str()).map_err(|e| IndexError::Store(e.to_string()))?;
            }
        }
        txn.commit().map_err(|e| IndexError::Store(e.to_string()))?;

        if removed > 0 {
            tracing::warn!(removed, "recovery pass removed orphaned vector rows");
        }
        Ok(removed)
    }

    /// Lists non-deleted documents, most recently indexed first, capped
    /// at `limit` (`GET /api/documents?limit=`).
    ///
    /// # Errors
    /// Returns an error if a stored record fails to deserialize.
    pub fn list_recent_documents(&self, limit: usize) -> Result<Vec<Document>> {
        let txn = self.db.begin_read().map_err(|e| IndexError::Store(e.to_string()))?;
        let table = txn.open_table(DOCUMENTS_TABLE).map_err(|e| IndexError::Store(e.to_string()))?;
        let mut docs = Vec::new();
        for row in table.iter().map_err(|e| IndexError::Store(e.to_string()))? {
            let (_, value) = row.map_err(|e| IndexError::Store(e.to_string()))?;
            let doc: Document =
                serde_json::from_slice(value.value()).map_err(|e| IndexError::Serialization(e.to_string()))?;
            if !doc.is_deleted {
                docs.push(doc);
            }
        }
        docs.sort_by(|a, b| b.indexed_at.cmp(&a.indexed_at));
        docs.truncate(limit);
        Ok(docs)
    }

    /// Aggregates document/chunk counts for `GET /api/documents/stats`.
    ///
    /// # Errors
    /// Returns an error if a stored record fails to deserialize.
    pub fn document_stats(&self) -> Result<DocumentStats> {
        let txn = self.db.begin_read().map_err(|e| IndexError::Store(e.to_string()))?;
        let documents = txn.open_table(DOCUMENTS_TABLE).map_err(|e| IndexError::Store(e.to_string()))?;

        let mut by_media_type: std::collections::BTreeMap<String, u64> = std::collections::BTreeMap::new();
        let mut total_documents = 0u64;
        let mut last_indexed_at = None;
        for row in documents.iter().map_err(|e| IndexError::Store(e.to_string()))? {
            let (_, value) = row.map_err(|e| IndexError::Store(e.to_string()))?;
            let doc: Document =
                serde_json::from_slice(value.value()).map_err(|e| IndexError::Serialization(e.to_string()))?;
            if doc.is_deleted {
                continue;
            }
            total_documents += 1;
            *by_media_type.entry(format!("{:?}", doc.media_type).to_lowercase()).or_insert(0) += 1;
            last_indexed_at = Some(last_indexed_at.map_or(doc.indexed_at, |prev| std::cmp::max(prev, doc.indexed_at)));
        }

        let chunks = txn.open_table(CHUNKS_TABLE).map_err(|e| IndexError::Store(e.to_string()))?;
        let total_chunks = chunks.len().map_err(|e| IndexError::Store(e.to_string()))?;

        Ok(DocumentStats { total_documents, by_media_type, total_chunks, last_indexed_at })
    }

    /// Lists distinct parent directories of non-deleted documents with
    /// their file counts (`GET /api/documents/directories`).
    ///
    /// # Errors
    /// Returns an error if a stored record fails to deserialize.
    pub fn directories(&self) -> Result<Vec<DirectoryStats>> {
        let txn = self.db.begin_read().map_err(|e| IndexError::Store(e.to_string()))?;
        let table = txn.open_table(DOCUMENTS_TABLE).map_err(|e| IndexError::Store(e.to_string()))?;
        let mut counts: std::collections::BTreeMap<PathBuf, u64> = std::collections::BTreeMap::new();
        for row in table.iter().map_err(|e| IndexError::Store(e.to_string()))? {
            let (_, value) = row.map_err(|e| IndexError::Store(e.to_string()))?;
            let doc: Document =
                serde_json::from_slice(value.value()).map_err(|e| IndexError::Serialization(e.to_string()))?;
            if doc.is_deleted {
                continue;
            }
            if let Some(parent) = doc.path.parent() {
                *counts.entry(parent.to_path_buf()).or_insert(0) += 1;
            }
        }
        Ok(counts.into_iter().map(|(path, file_count)| DirectoryStats { path, file_count }).collect())
    }

    /// Shared vector index handle, for the search engine.
    #[must_use]
    pub fn vector(&self) -> Arc<VectorIndex> {
        Arc::clone(&self.vector)
    }

    /// Shared full-text index handle, for the search engine.
    #[must_use]
    pub fn fulltext(&self) -> Arc<FullTextIndex> {
        Arc::clone(&self.fulltext)
    }

    /// Builds a [`HybridSearchEngine`] bound to this store's indexes.
    pub fn search_engine<M: EmbeddingModel>(
        &self,
        embedder: Arc<M>,
    ) -> HybridSearchEngine<'static, M> {
        HybridSearchEngine::new(embedder, self.vector(), self.fulltext())
    }

    /// Runs a hybrid search against this store's indexes, filtering out
    /// tombstoned documents and anything `filters` excludes, using
    /// `embedder` for the query vector.
    ///
    /// Document-level filters are resolved and applied to the full fused
    /// candidate pool inside the engine, before it cuts down to `k` — a
    /// document-level exclusion at rank 3 of the pool must not suppress a
    /// match sitting at rank 11 of that same pool.
    ///
    /// # Errors
    /// Returns an error if embedding the query fails.
    pub async fn search<M: EmbeddingModel>(
        &self,
        embedder: &M,
        query: &str,
        k: usize,
        filters: SearchFilters,
    ) -> Result<Vec<SearchResult>> {
        let engine = HybridSearchEngine::new_borrowed(embedder, &self.vector, &self.fulltext);
        let mut doc_cache: std::collections::HashMap<String, bool> = std::collections::HashMap::new();
        let lookup_err = std::cell::RefCell::new(None);
        let keep = |chunk: &Chunk| -> bool {
            if lookup_err.borrow().is_some() {
                return false;
            }
            if let Some(&cached) = doc_cache.get(&chunk.document_id) {
                return cached;
            }
            let passes = match self.get_document(&chunk.document_id) {
                Ok(Some(doc)) => !doc.is_deleted && filters.matches(&doc),
                Ok(None) => false,
                Err(e) => {
                    *lookup_err.borrow_mut() = Some(e);
                    false
                }
            };
            doc_cache.insert(chunk.document_id.clone(), passes);
            passes
        };
        let results = engine.search(query, k, keep).await?;
        if let Some(err) = lookup_err.into_inner() {
            return Err(err);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use localdoc_core::MediaType;
    use tempfile::tempdir;

    fn entry(doc_id: &str, idx: usize, text: &str) -> IndexEntry {
        let chunk = Chunk::new(doc_id, idx, text, crate::dedup::content_hash(text));
        IndexEntry::new(chunk, vec![1.0, 0.0, 0.0])
    }

    fn doc(id: &str) -> Document {
        Document::new(id, format!("hash-{id}"), PathBuf::from(format!("/{id}.txt")), MediaType::Document, 100)
    }

    #[derive(Debug)]
    struct FixedEmbedder;

    impl localdoc_core::EmbeddingModel for FixedEmbedder {
        fn dim(&self) -> usize {
            3
        }

        async fn embed(&self, _text: &str) -> localdoc_core::Result<localdoc_core::Embedding> {
            Ok(vec![1.0, 0.0, 0.0])
        }
    }

    #[tokio::test]
    async fn upsert_then_tombstone_clears_live_chunks() {
        let dir = tempdir().unwrap();
        let store =
            DualIndexStore::open(StoreConfig { path: dir.path().join("t.redb"), dimension: 3, deduplication: true })
                .unwrap();

        store.upsert_document(doc("d1"), vec![entry("d1", 0, "hello world")]).await.unwrap();
        assert_eq!(store.vector().len(), 1);
        assert_eq!(store.fulltext().len(), 1);

        store.tombstone_document("d1").await.unwrap();
        assert_eq!(store.vector().len(), 0);
        assert_eq!(store.fulltext().len(), 0);
        assert!(store.get_document("d1").unwrap().unwrap().is_deleted);
    }

    #[tokio::test]
    async fn upsert_replaces_chunks_wholesale() {
        let dir = tempdir().unwrap();
        let store =
            DualIndexStore::open(StoreConfig { path: dir.path().join("t.redb"), dimension: 3, deduplication: true })
                .unwrap();

        store.upsert_document(doc("d1"), vec![entry("d1", 0, "version one")]).await.unwrap();
        assert_eq!(store.vector().len(), 1);

        store
            .upsert_document(doc("d1"), vec![entry("d1", 0, "version two, now longer")])
            .await
            .unwrap();
        assert_eq!(store.vector().len(), 1);
        let ids: Vec<_> = store.vector().entries().into_iter().map(|e| e.chunk.text).collect();
        assert_eq!(ids, vec!["version two, now longer".to_string()]);
    }

    #[tokio::test]
    async fn reopen_recovers_persisted_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.redb");
        {
            let store =
                DualIndexStore::open(StoreConfig { path: path.clone(), dimension: 3, deduplication: true }).unwrap();
            store.upsert_document(doc("d1"), vec![entry("d1", 0, "persisted text")]).await.unwrap();
        }
        let reopened = DualIndexStore::open(StoreConfig { path, dimension: 3, deduplication: true }).unwrap();
        assert_eq!(reopened.vector().len(), 1);
        assert_eq!(reopened.fulltext().len(), 1);
    }

    #[tokio::test]
    async fn recovery_pass_is_noop_without_stale_markers() {
        let dir = tempdir().unwrap();
        let store =
            DualIndexStore::open(StoreConfig { path: dir.path().join("t.redb"), dimension: 3, deduplication: true })
                .unwrap();
        store.upsert_document(doc("d1"), vec![entry("d1", 0, "hello")]).await.unwrap();
        assert_eq!(store.recovery_pass().unwrap(), 0);
    }

    #[tokio::test]
    async fn transcript_roundtrips() {
        let dir = tempdir().unwrap();
        let store =
            DualIndexStore::open(StoreConfig { path: dir.path().join("t.redb"), dimension: 3, deduplication: true })
                .unwrap();
        let transcript = crate::types::Transcript::new("d1", "hello there", Some("en".into()), 3.5);
        store.put_transcript(&transcript).await.unwrap();
        let fetched = store.get_transcript("d1").unwrap().unwrap();
        assert_eq!(fetched.word_count, 2);
        assert!(store.get_transcript("missing").unwrap().is_none());
    }

    #[tokio::test]
    async fn rename_preserves_chunks_and_embeddings() {
        let dir = tempdir().unwrap();
        let store =
            DualIndexStore::open(StoreConfig { path: dir.path().join("t.redb"), dimension: 3, deduplication: true })
                .unwrap();
        store.upsert_document(doc("d1"), vec![entry("d1", 0, "hello world")]).await.unwrap();

        store.rename_document("d1", PathBuf::from("/moved/d1.txt")).await.unwrap();

        assert_eq!(store.vector().len(), 1);
        assert_eq!(store.fulltext().len(), 1);
        assert_eq!(store.get_document("d1").unwrap().unwrap().path, PathBuf::from("/moved/d1.txt"));
    }

    #[tokio::test]
    async fn search_filters_by_media_type_without_under_returning() {
        let dir = tempdir().unwrap();
        let store =
            DualIndexStore::open(StoreConfig { path: dir.path().join("t.redb"), dimension: 3, deduplication: true })
                .unwrap();

        let mut image_doc = doc("img1");
        image_doc.media_type = MediaType::Image;
        store.upsert_document(doc("doc1"), vec![entry("doc1", 0, "brown fox document")]).await.unwrap();
        store.upsert_document(image_doc, vec![entry("img1", 0, "brown fox image")]).await.unwrap();

        let embedder = FixedEmbedder;
        let mut filters = SearchFilters::default();
        filters.media_type = vec![MediaType::Image];

        let results = store.search(&embedder, "brown fox", 5, filters).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.document_id, "img1");
    }
}
