//! Composition root (§9 design note: `CoreContext` replaces global
//! mutable state). Wires the watcher, the indexing scheduler, the
//! processor registry, and the dual-index store around one set of
//! Ollama-compatible model clients, and exposes the entry points the
//! CLI and HTTP surface call into: a cold directory walk, live
//! watching, search, and status.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use localdoc_core::MediaType;
use localdoc_index::chunking::{Chunker, SlidingWindowChunker};
use localdoc_index::search::{SearchFilters, SearchResult};
use localdoc_index::{DualIndexStore, EmbeddingGateway, StoreConfig};
use localdoc_pdf::PdfPipelineConfig;
use localdoc_processors::{AudioPipeline, DocumentPipeline, ImagePipeline, ProcessorRegistry, VideoPipeline};
use localdoc_scheduler::{Scheduler, SchedulerConfig, StatsSnapshot};
use localdoc_watch::{EventSink, FileEvent, FileEventKind, PathFilter, WatchManager};

use crate::config::Config;
use crate::ollama::{OllamaEmbedder, OllamaTranscriber, OllamaVlm};

/// The embedding dimension the production Ollama-compatible runtime is
/// fixed at (§6: "returns `{embedding: float[1024]}`").
const EMBEDDING_DIM: usize = 1024;

/// Default `ffmpeg` binary name, resolved from `PATH`.
const DEFAULT_FFMPEG: &str = "ffmpeg";

/// Everything the CLI and HTTP surface need, built once at startup.
pub struct CoreContext {
    config: Config,
    store: Arc<DualIndexStore>,
    embedder: Arc<OllamaEmbedder>,
    scheduler: Scheduler<OllamaEmbedder>,
    watcher: WatchManager,
}

impl std::fmt::Debug for CoreContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreContext").field("data_dir", &self.config.data_dir).finish_non_exhaustive()
    }
}

impl CoreContext {
    /// Opens the store, runs its startup recovery pass, and wires the
    /// processor registry, scheduler, and watcher around a shared set of
    /// Ollama-compatible clients.
    ///
    /// # Errors
    /// Returns an error if the store cannot be opened.
    pub fn build(config: Config) -> localdoc_core::Result<Self> {
        let store = Arc::new(
            DualIndexStore::open(StoreConfig {
                path: config.store_path(),
                dimension: EMBEDDING_DIM,
                deduplication: true,
            })
            .map_err(localdoc_core::Error::from)?,
        );

        let http = reqwest::Client::new();
        let embedder = Arc::new(OllamaEmbedder::new(
            http.clone(),
            config.ollama_host.clone(),
            config.embedding_model.clone(),
            EMBEDDING_DIM,
            std::time::Duration::from_secs(60),
        ));
        let vlm = OllamaVlm::new(
            http.clone(),
            config.ollama_host.clone(),
            config.vlm_model.clone(),
            config.pdf.vlm_timeout,
        );
        let pdf_vlm = OllamaVlm::new(
            http.clone(),
            config.ollama_host.clone(),
            config.pdf.vlm_model.clone(),
            config.pdf.vlm_timeout,
        );
        let transcriber = OllamaTranscriber::new(
            http,
            config.ollama_host.clone(),
            "whisper".to_string(),
            std::time::Duration::from_secs(30 * 60),
        );

        let pdf_config = PdfPipelineConfig {
            min_chars_per_page: config.pdf.min_chars_per_page,
            max_pages: config.pdf.max_pages,
            dpi: config.pdf.dpi,
            workers: config.pdf.workers,
            vlm_timeout: config.pdf.vlm_timeout,
            pdfium_library_path: config.pdf.pdfium_library_path.clone(),
        };

        let mut registry = ProcessorRegistry::new();
        registry.register(MediaType::Document, Arc::new(DocumentPipeline::new(pdf_config, pdf_vlm)));
        registry.register(MediaType::Image, Arc::new(ImagePipeline::new(vlm)));
        registry.register(MediaType::Audio, Arc::new(AudioPipeline::new(transcriber.clone())));
        registry.register(MediaType::Video, Arc::new(VideoPipeline::new(transcriber, DEFAULT_FFMPEG)));

        let chunker: Arc<dyn Chunker> = Arc::new(SlidingWindowChunker::default());
        let gateway = Arc::new(EmbeddingGateway::with_defaults((*embedder).clone()));

        let scheduler = Scheduler::new(
            SchedulerConfig::default(),
            Arc::clone(&store),
            Arc::new(registry),
            chunker,
            gateway,
        );

        let watcher = WatchManager::new(PathFilter::default(), std::time::Duration::from_millis(500));
        watcher.register_handler(Arc::new(scheduler.clone()));

        Ok(Self { config, store, embedder, scheduler, watcher })
    }

    /// Spawns the scheduler's worker pool. Call once at startup, after
    /// [`Self::build`] and before [`Self::watch`]/[`Self::index_directory`].
    pub fn start_workers(&self) -> Vec<tokio::task::JoinHandle<()>> {
        self.scheduler.spawn_workers()
    }

    /// Walks `path` (recursively, if requested), builds a synthetic
    /// `Created` event per file, and feeds it through the same identity
    /// resolution + scheduling path the live watcher uses (§4.8: one
    /// `process_document` entry point for both callers).
    ///
    /// Grounded on the retrieval pack's own directory-collection pass: an
    /// iterative stack-based walk, sorted output, no extra crate.
    ///
    /// # Errors
    /// Returns an error if the root path cannot be read.
    pub async fn index_directory(&self, path: &Path, recursive: bool) -> localdoc_core::Result<Vec<PathBuf>> {
        let filter = PathFilter::default();
        let files = collect_files(path, recursive, &filter)?;
        for file in &files {
            let metadata = match std::fs::metadata(file) {
                Ok(m) => m,
                Err(_) => continue,
            };
            let event = FileEvent {
                kind: FileEventKind::Created,
                path: file.clone(),
                prev_path: None,
                inode: 0,
                size: metadata.len(),
                mtime: metadata.modified().unwrap_or_else(|_| SystemTime::now()),
            };
            self.scheduler.handle(event).await;
        }
        Ok(files)
    }

    /// Begins watching `path` for live changes, forwarding resolved
    /// events into the scheduler's queue.
    ///
    /// # Errors
    /// Returns an error if the underlying watch cannot be installed.
    pub fn watch(&self, path: impl Into<PathBuf>, recursive: bool) -> localdoc_core::Result<()> {
        self.watcher.add_watch(path, recursive).map_err(localdoc_core::Error::from)
    }

    /// Runs a hybrid search against the store, using the shared embedder
    /// for the query vector.
    ///
    /// # Errors
    /// Returns an error if embedding the query fails.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        filters: SearchFilters,
    ) -> localdoc_core::Result<Vec<SearchResult>> {
        self.store.search(self.embedder.as_ref(), query, k, filters).await.map_err(localdoc_core::Error::from)
    }

    /// A snapshot of the scheduler's progress counters (§4.8 `status`).
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.scheduler.stats()
    }

    /// Recent non-tombstoned documents, most recently indexed first
    /// (`GET /api/documents`).
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub fn recent_documents(&self, limit: usize) -> localdoc_core::Result<Vec<localdoc_index::Document>> {
        self.store.list_recent_documents(limit).map_err(localdoc_core::Error::from)
    }

    /// Aggregate document/chunk counts (`GET /api/documents/stats`).
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub fn document_stats(&self) -> localdoc_core::Result<localdoc_index::DocumentStats> {
        self.store.document_stats().map_err(localdoc_core::Error::from)
    }

    /// Distinct watched-document directories with file counts
    /// (`GET /api/documents/directories`).
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub fn directories(&self) -> localdoc_core::Result<Vec<localdoc_index::DirectoryStats>> {
        self.store.directories().map_err(localdoc_core::Error::from)
    }

    /// The store handle, for read-only document listing/stats surfaces.
    #[must_use]
    pub fn store(&self) -> &Arc<DualIndexStore> {
        &self.store
    }

    /// The loaded configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Stops every worker and watch.
    pub fn shutdown(&self) {
        self.watcher.shutdown();
        self.scheduler.cancellation_token().cancel();
    }
}

fn collect_files(root: &Path, recursive: bool, filter: &PathFilter) -> localdoc_core::Result<Vec<PathBuf>> {
    let mut stack = vec![root.to_path_buf()];
    let mut files = Vec::new();

    while let Some(path) = stack.pop() {
        let metadata = match std::fs::metadata(&path) {
            Ok(meta) => meta,
            Err(_) => continue,
        };

        if metadata.is_dir() {
            if path != root && !recursive {
                continue;
            }
            for entry in std::fs::read_dir(&path).map_err(|e| localdoc_core::Error::io(path.clone(), e))? {
                let entry = entry.map_err(|e| localdoc_core::Error::io(path.clone(), e))?;
                stack.push(entry.path());
            }
        } else if metadata.is_file() && filter.matches(&path) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_files_is_sorted_and_filters_hidden() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git").join("HEAD"), "ref").unwrap();

        let files = collect_files(dir.path(), true, &PathFilter::default()).unwrap();
        assert_eq!(files, vec![dir.path().join("a.txt"), dir.path().join("b.txt")]);
    }

    #[test]
    fn non_recursive_walk_skips_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("top.txt"), "x").unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("nested.txt"), "x").unwrap();

        let files = collect_files(dir.path(), false, &PathFilter::default()).unwrap();
        assert_eq!(files, vec![dir.path().join("top.txt")]);
    }
}
