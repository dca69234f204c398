//! Indexing scheduler (§4.8): a bounded FIFO queue drained by N worker
//! tasks, each running a resolved event through the processor registry,
//! the chunker, and the embedding gateway before committing it to the
//! dual-index store.
//!
//! Grounded on the same streaming-pipeline shape as a background job
//! registry elsewhere in this codebase: a cloneable handle around
//! shared state, workers pulling from one queue, cooperative
//! cancellation via a token instead of hard aborts.

mod error;
pub mod locks;
pub mod stats;

pub use error::{Result, SchedulerError};
pub use locks::DocumentLocks;
pub use stats::{Stats, StatsSnapshot};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use localdoc_core::{EmbeddingModel, Error as CoreError, MediaType};
use localdoc_index::chunking::Chunker;
use localdoc_index::{Chunk, Document, DualIndexStore, EmbeddingGateway, IndexEntry};
use localdoc_processors::ProcessorRegistry;
use localdoc_watch::{EventSink, FileEvent, IdentityResolver, ResolvedAction, ResolvedEvent};

/// Retry attempts for a document before its failure is recorded and the
/// event dropped (§4.8 step 4).
const MAX_ATTEMPTS: u32 = 3;

/// Tuning knobs for a [`Scheduler`].
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Bounded queue capacity.
    pub queue_capacity: usize,
    /// Number of worker tasks pulling from the queue.
    pub workers: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { queue_capacity: 10_000, workers: 4 }
    }
}

/// The bounded-queue indexing scheduler. Cheaply cloneable: every clone
/// shares the same queue, store, stats, and cancellation tree.
pub struct Scheduler<M: EmbeddingModel> {
    store: Arc<DualIndexStore>,
    registry: Arc<ProcessorRegistry>,
    chunker: Arc<dyn Chunker>,
    gateway: Arc<EmbeddingGateway<M>>,
    sender: mpsc::Sender<ResolvedEvent>,
    receiver: Arc<AsyncMutex<mpsc::Receiver<ResolvedEvent>>>,
    stats: Arc<Stats>,
    doc_locks: DocumentLocks,
    cancel: CancellationToken,
    config: SchedulerConfig,
}

impl<M: EmbeddingModel> std::fmt::Debug for Scheduler<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("workers", &self.config.workers)
            .field("queue_capacity", &self.config.queue_capacity)
            .finish_non_exhaustive()
    }
}

impl<M: EmbeddingModel> Clone for Scheduler<M> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            chunker: Arc::clone(&self.chunker),
            gateway: Arc::clone(&self.gateway),
            sender: self.sender.clone(),
            receiver: Arc::clone(&self.receiver),
            stats: Arc::clone(&self.stats),
            doc_locks: self.doc_locks.clone(),
            cancel: self.cancel.clone(),
            config: self.config,
        }
    }
}

impl<M: EmbeddingModel + 'static> Scheduler<M> {
    /// Builds a scheduler bound to the given store and capability
    /// objects. Does not start any workers; call [`Self::spawn_workers`]
    /// to begin draining the queue.
    #[must_use]
    pub fn new(
        config: SchedulerConfig,
        store: Arc<DualIndexStore>,
        registry: Arc<ProcessorRegistry>,
        chunker: Arc<dyn Chunker>,
        gateway: Arc<EmbeddingGateway<M>>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        Self {
            store,
            registry,
            chunker,
            gateway,
            sender,
            receiver: Arc::new(AsyncMutex::new(receiver)),
            stats: Arc::new(Stats::new()),
            doc_locks: DocumentLocks::new(),
            cancel: CancellationToken::new(),
            config,
        }
    }

    /// A snapshot of progress counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// The root cancellation token. Cancelling it stops every worker
    /// after its current document and causes in-flight model calls to
    /// return [`CoreError::Cancelled`].
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Submits a resolved event to the queue.
    ///
    /// # Errors
    /// Returns [`SchedulerError::QueueFull`] if the queue is at
    /// capacity.
    pub fn enqueue(&self, event: ResolvedEvent) -> Result<()> {
        self.sender
            .try_send(event)
            .map_err(|_| SchedulerError::QueueFull { capacity: self.config.queue_capacity })
    }

    /// Spawns `config.workers` tasks, each looping on the shared queue
    /// until cancelled and the queue drains.
    pub fn spawn_workers(&self) -> Vec<JoinHandle<()>> {
        (0..self.config.workers.max(1))
            .map(|worker_id| {
                let scheduler = self.clone();
                tokio::spawn(async move { scheduler.worker_loop(worker_id).await })
            })
            .collect()
    }

    async fn worker_loop(&self, worker_id: usize) {
        loop {
            let event = {
                let mut receiver = self.receiver.lock().await;
                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => None,
                    item = receiver.recv() => item,
                }
            };
            let Some(event) = event else {
                tracing::debug!(worker_id, "worker shutting down");
                return;
            };
            self.process_with_retry(event).await;
        }
    }

    async fn process_with_retry(&self, event: ResolvedEvent) {
        let _guard = self.doc_locks.lock(&event.doc_id).await;
        let mut attempt = 0;
        loop {
            attempt += 1;
            if self.cancel.is_cancelled() {
                return;
            }
            match self.process_once(&event).await {
                Ok(()) => return,
                Err(err) if err.is_fatal() => {
                    tracing::error!(document_id = %event.doc_id, error = %err, "fatal error, halting scheduler");
                    self.cancel.cancel();
                    self.record_failure(&event, &err).await;
                    return;
                }
                Err(err) if attempt < MAX_ATTEMPTS && err.retryable() => {
                    let backoff = Duration::from_millis(200u64 * u64::from(attempt).pow(2));
                    tracing::warn!(document_id = %event.doc_id, attempt, error = %err, "retrying after backoff");
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => {
                    tracing::warn!(document_id = %event.doc_id, attempts = attempt, error = %err, "giving up on document");
                    self.record_failure(&event, &err).await;
                    return;
                }
            }
        }
    }

    async fn record_failure(&self, event: &ResolvedEvent, err: &CoreError) {
        if let Err(store_err) = self
            .store
            .record_failure(&event.doc_id, &event.path, event.media_type, event.size, &err.to_string())
            .await
        {
            tracing::error!(document_id = %event.doc_id, error = %store_err, "failed to record failure on document");
        }
    }

    async fn process_once(&self, event: &ResolvedEvent) -> std::result::Result<(), CoreError> {
        match event.action {
            ResolvedAction::Tombstone => {
                self.store.tombstone_document(&event.doc_id).await.map_err(CoreError::from)?;
                self.stats.record_skipped();
                Ok(())
            }
            ResolvedAction::Rename => {
                self.store
                    .rename_document(&event.doc_id, event.path.clone())
                    .await
                    .map_err(CoreError::from)?;
                self.stats.record_skipped();
                Ok(())
            }
            ResolvedAction::Insert | ResolvedAction::Update | ResolvedAction::Restore => {
                self.reprocess(event).await
            }
        }
    }

    async fn reprocess(&self, event: &ResolvedEvent) -> std::result::Result<(), CoreError> {
        let media_type = event.media_type.expect("non-tombstone events always carry a media type");
        let content_hash = event.content_hash.clone().expect("non-tombstone events always carry a hash");

        if self.cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        let budget = media_type.processing_budget();
        let processed = tokio::time::timeout(
            budget,
            self.registry.process(media_type, &event.path, &event.doc_id),
        )
        .await
        .map_err(|_| CoreError::Extraction(format!("processing exceeded {budget:?} budget")))?
        .map_err(CoreError::from)?;

        let chunks = self
            .chunker
            .chunk(&event.doc_id, &processed.segments)
            .map_err(CoreError::from)?;

        if self.cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        let entries = self.embed_chunks(chunks).await?;

        let mut document = self.resolve_document_row(event, &content_hash, media_type)?;
        document.duration_seconds = processed.duration_seconds;
        document.width = processed.width;
        document.height = processed.height;
        document.last_error = None;

        if let Some(transcript) = &processed.transcript {
            self.store.put_transcript(transcript).await.map_err(CoreError::from)?;
        }

        self.store.upsert_document(document, entries).await.map_err(CoreError::from)?;

        self.record_media_stats(&event.path, media_type, processed.vlm_pages_processed);
        Ok(())
    }

    /// Embeds every chunk, reusing a cached vector-index entry when the
    /// store has deduplication enabled and an identical chunk content
    /// hash already has an embedding (§4.6: "skip re-embedding chunks
    /// whose content hash already exists").
    async fn embed_chunks(
        &self,
        chunks: Vec<Chunk>,
    ) -> std::result::Result<Vec<IndexEntry>, CoreError> {
        let vector = self.store.vector();
        let mut entries: Vec<Option<IndexEntry>> = vec![None; chunks.len()];
        let mut to_embed_idx = Vec::new();
        let mut to_embed_text = Vec::new();

        for (i, chunk) in chunks.iter().enumerate() {
            if self.store.deduplication()
                && let Some(existing) = vector.find_by_hash(chunk.content_hash)
            {
                entries[i] = Some(IndexEntry::new(chunk.clone(), existing.embedding));
                continue;
            }
            to_embed_idx.push(i);
            to_embed_text.push(chunk.text.clone());
        }

        if !to_embed_text.is_empty() {
            if self.cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }
            let embeddings =
                self.gateway.embed_batch(&to_embed_text).await.map_err(CoreError::from)?;
            for (slot, embedding) in to_embed_idx.into_iter().zip(embeddings) {
                entries[slot] = Some(IndexEntry::new(chunks[slot].clone(), embedding));
            }
        }

        Ok(entries.into_iter().map(|e| e.expect("every chunk embedded or reused")).collect())
    }

    fn resolve_document_row(
        &self,
        event: &ResolvedEvent,
        content_hash: &str,
        media_type: MediaType,
    ) -> std::result::Result<Document, CoreError> {
        match event.action {
            ResolvedAction::Insert => Ok(Document::new(
                event.doc_id.clone(),
                content_hash.to_string(),
                event.path.clone(),
                media_type,
                event.size,
            )),
            ResolvedAction::Update => {
                let mut document = self
                    .store
                    .get_document(&event.doc_id)
                    .map_err(CoreError::from)?
                    .unwrap_or_else(|| {
                        Document::new(
                            event.doc_id.clone(),
                            content_hash.to_string(),
                            event.path.clone(),
                            media_type,
                            event.size,
                        )
                    });
                document.content_hash = content_hash.to_string();
                document.size = event.size;
                document.modified_at = event.mtime;
                document.indexed_at = std::time::SystemTime::now();
                Ok(document)
            }
            ResolvedAction::Restore => {
                let mut document = self
                    .store
                    .get_document(&event.doc_id)
                    .map_err(CoreError::from)?
                    .ok_or_else(|| CoreError::Extraction(format!("restore target {} missing", event.doc_id)))?;
                document.restore(content_hash.to_string(), event.path.clone());
                document.size = event.size;
                Ok(document)
            }
            ResolvedAction::Rename | ResolvedAction::Tombstone => {
                unreachable!("resolve_document_row only called for reprocessing actions")
            }
        }
    }

    fn record_media_stats(&self, path: &std::path::Path, media_type: MediaType, vlm_pages: usize) {
        match media_type {
            MediaType::Document => {
                let extension = path.extension().map(|e| e.to_string_lossy().to_lowercase());
                if extension.as_deref() == Some("pdf") {
                    self.stats.record_pdf(vlm_pages);
                } else {
                    self.stats.record_text();
                }
            }
            MediaType::Image => self.stats.record_image(),
            MediaType::Audio => self.stats.record_audio(),
            MediaType::Video => self.stats.record_video(),
        }
    }
}

/// Bridges the watcher's raw [`FileEvent`] stream into the scheduler's
/// queue: resolves identity against the store, then enqueues. Dropping
/// an event here (size gate, unclassifiable type, or a full queue) is
/// logged, never propagated, per [`EventSink`]'s no-error contract.
impl<M: EmbeddingModel + 'static> EventSink for Scheduler<M> {
    fn handle<'a>(
        &'a self,
        event: FileEvent,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let resolved = match IdentityResolver.resolve(&self.store, &event) {
                Ok(resolved) => resolved,
                Err(err) => {
                    tracing::warn!(path = %event.path.display(), error = %err, "identity resolution failed");
                    return;
                }
            };
            let Some(resolved) = resolved else {
                return;
            };
            if let Err(err) = self.enqueue(resolved) {
                tracing::warn!(path = %event.path.display(), error = %err, "dropping event, queue full");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use localdoc_core::{Embedding, Result as CoreResult, VlmModel};
    use localdoc_index::chunking::SlidingWindowChunker;
    use localdoc_index::StoreConfig;
    use localdoc_pdf::PdfPipelineConfig;
    use localdoc_processors::DocumentPipeline;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[derive(Debug, Default)]
    struct MockEmbeddingModel {
        dim: usize,
    }

    impl EmbeddingModel for MockEmbeddingModel {
        fn dim(&self) -> usize {
            self.dim
        }

        async fn embed(&self, text: &str) -> CoreResult<Embedding> {
            let len = text.len() as f32;
            Ok((0..self.dim).map(|i| (len + i as f32) * 0.01).collect())
        }
    }

    #[derive(Debug, Default)]
    struct MockVlmModel;

    impl VlmModel for MockVlmModel {
        async fn describe(&self, _image: &[u8], _prompt: &str) -> CoreResult<String> {
            Ok(String::new())
        }
    }

    fn build_scheduler(
        dir: &std::path::Path,
    ) -> Scheduler<MockEmbeddingModel> {
        let store = Arc::new(
            DualIndexStore::open(StoreConfig {
                path: dir.join("t.redb"),
                dimension: 4,
                deduplication: true,
            })
            .unwrap(),
        );
        let mut registry = ProcessorRegistry::new();
        registry.register(
            MediaType::Document,
            Arc::new(DocumentPipeline::new(PdfPipelineConfig::default(), MockVlmModel)),
        );
        let chunker: Arc<dyn Chunker> = Arc::new(SlidingWindowChunker::default());
        let gateway = Arc::new(EmbeddingGateway::with_defaults(MockEmbeddingModel { dim: 4 }));
        Scheduler::new(SchedulerConfig::default(), store, Arc::new(registry), chunker, gateway)
    }

    fn insert_event(doc_id: &str, path: PathBuf, size: u64) -> ResolvedEvent {
        ResolvedEvent {
            doc_id: doc_id.to_string(),
            action: ResolvedAction::Insert,
            path,
            prev_path: None,
            content_hash: Some("hash".to_string()),
            media_type: Some(MediaType::Document),
            size,
            mtime: std::time::SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn insert_event_indexes_and_updates_stats() {
        let dir = tempdir().unwrap();
        let scheduler = build_scheduler(dir.path());
        let file = dir.path().join("note.txt");
        std::fs::write(&file, "hello world, this is a note").unwrap();

        scheduler.process_once(&insert_event("d1", file, 28)).await.unwrap();

        assert_eq!(scheduler.stats().text_count, 1);
        let doc = scheduler.store.get_document("d1").unwrap().unwrap();
        assert!(!doc.is_deleted);
    }

    #[tokio::test]
    async fn tombstone_event_is_counted_as_skipped() {
        let dir = tempdir().unwrap();
        let scheduler = build_scheduler(dir.path());
        let file = dir.path().join("note.txt");
        std::fs::write(&file, "hello world, this is a note").unwrap();
        scheduler.process_once(&insert_event("d1", file.clone(), 28)).await.unwrap();

        let tombstone = ResolvedEvent {
            doc_id: "d1".to_string(),
            action: ResolvedAction::Tombstone,
            path: file,
            prev_path: None,
            content_hash: None,
            media_type: None,
            size: 0,
            mtime: std::time::SystemTime::now(),
        };
        scheduler.process_once(&tombstone).await.unwrap();

        assert_eq!(scheduler.stats().skipped_count, 1);
        let doc = scheduler.store.get_document("d1").unwrap().unwrap();
        assert!(doc.is_deleted);
    }

    #[tokio::test]
    async fn enqueue_and_drain_via_workers() {
        let dir = tempdir().unwrap();
        let scheduler = build_scheduler(dir.path());
        let file = dir.path().join("note.txt");
        std::fs::write(&file, "hello world, this is a note").unwrap();

        scheduler.enqueue(insert_event("d1", file, 28)).unwrap();
        let handles = scheduler.spawn_workers();

        for _ in 0..50 {
            if scheduler.store.get_document("d1").unwrap().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        scheduler.cancellation_token().cancel();
        for h in handles {
            let _ = h.await;
        }

        assert!(scheduler.store.get_document("d1").unwrap().is_some());
    }
}
