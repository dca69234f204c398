//! The watcher half of C1: a debounced, filtered stream of raw
//! [`FileEvent`]s delivered to one registered [`EventSink`] — by
//! convention the indexing scheduler's queue (§4.1, §4.8).

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use notify::RecursiveMode;
use notify_debouncer_full::{DebounceEventResult, Debouncer, FileIdMap, new_debouncer};
use parking_lot::Mutex;

use crate::error::{Result, WatchError};
use crate::event::{FileEvent, FileEventKind};
use crate::filter::PathFilter;

/// Backoff schedule for a file whose metadata cannot yet be read (e.g.
/// still being written). Capped at 3 attempts per §4.1.
const BACKOFF_MS: [u64; 3] = [50, 200, 1000];

/// Receives raw file events forwarded by a [`WatchManager`].
///
/// Dyn-compatible by hand-boxing the returned future, the same pattern
/// used for [`localdoc_index::Reranker`], since the manager stores one
/// shared sink behind `Arc<dyn EventSink>`.
pub trait EventSink: Send + Sync {
    /// Handles one resolved raw event. Never expected to return an
    /// error: failures are the sink's responsibility to record.
    fn handle<'a>(&'a self, event: FileEvent) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// A snapshot of the watcher's activity, for `status` surfaces.
#[derive(Debug, Clone, Default)]
pub struct WatchStatus {
    /// Directories currently being watched.
    pub watched_paths: Vec<PathBuf>,
    /// Events successfully forwarded to the sink.
    pub events_processed: u64,
    /// Events dropped by the filter, size gate, or exhausted backoff.
    pub events_dropped: u64,
}

struct Inner {
    handler: Option<Arc<dyn EventSink>>,
    debouncers: HashMap<PathBuf, Debouncer<notify::RecommendedWatcher, FileIdMap>>,
    events_processed: u64,
    events_dropped: u64,
}

/// Owns zero or more debounced `notify` watches and forwards filtered,
/// size-gated events to a single registered [`EventSink`].
pub struct WatchManager {
    filter: PathFilter,
    debounce: Duration,
    inner: Arc<Mutex<Inner>>,
    runtime: tokio::runtime::Handle,
}

impl std::fmt::Debug for WatchManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("WatchManager")
            .field("watched", &inner.debouncers.len())
            .field("events_processed", &inner.events_processed)
            .finish()
    }
}

impl WatchManager {
    /// Builds a manager bound to the current Tokio runtime (handler
    /// invocations are spawned onto it from `notify`'s background
    /// thread).
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime context.
    #[must_use]
    pub fn new(filter: PathFilter, debounce: Duration) -> Self {
        Self {
            filter,
            debounce,
            inner: Arc::new(Mutex::new(Inner {
                handler: None,
                debouncers: HashMap::new(),
                events_processed: 0,
                events_dropped: 0,
            })),
            runtime: tokio::runtime::Handle::current(),
        }
    }

    /// Registers the single event sink every future watch forwards to.
    /// Replaces any previously registered sink.
    pub fn register_handler(&self, handler: Arc<dyn EventSink>) {
        self.inner.lock().handler = Some(handler);
    }

    /// Begins watching `path`. Idempotent: re-adding an already-watched
    /// path is a no-op.
    ///
    /// # Errors
    /// Returns an error if the underlying `notify` watcher cannot be
    /// installed.
    pub fn add_watch(&self, path: impl Into<PathBuf>, recursive: bool) -> Result<()> {
        let path = path.into();
        if self.inner.lock().debouncers.contains_key(&path) {
            return Ok(());
        }

        let filter = self.filter.clone();
        let inner = Arc::clone(&self.inner);
        let runtime = self.runtime.clone();

        let mut debouncer = new_debouncer(self.debounce, None, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    for debounced in events {
                        if let Some(file_event) = classify(&debounced) {
                            dispatch(&inner, &runtime, &filter, file_event);
                        }
                    }
                }
                Err(errors) => {
                    for e in errors {
                        tracing::warn!(error = %e, "watcher backend error");
                    }
                }
            }
        })
        .map_err(|e| WatchError::Notify(e.to_string()))?;

        let mode = if recursive { RecursiveMode::Recursive } else { RecursiveMode::NonRecursive };
        debouncer.watch(&path, mode).map_err(|e| WatchError::Notify(e.to_string()))?;

        self.inner.lock().debouncers.insert(path, debouncer);
        Ok(())
    }

    /// Stops every watch and drops the registered handler.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock();
        inner.debouncers.clear();
        inner.handler = None;
    }

    /// A snapshot of current watch activity.
    #[must_use]
    pub fn get_status(&self) -> WatchStatus {
        let inner = self.inner.lock();
        WatchStatus {
            watched_paths: inner.debouncers.keys().cloned().collect(),
            events_processed: inner.events_processed,
            events_dropped: inner.events_dropped,
        }
    }
}

fn classify(event: &notify_debouncer_full::DebouncedEvent) -> Option<FileEvent> {
    use notify::EventKind;
    let path = event.paths.first()?.clone();
    let kind = match event.kind {
        EventKind::Create(_) => FileEventKind::Created,
        EventKind::Modify(notify::event::ModifyKind::Name(_)) => FileEventKind::Moved,
        EventKind::Modify(_) => FileEventKind::Modified,
        EventKind::Remove(_) => FileEventKind::Deleted,
        _ => return None,
    };
    let prev_path = (event.paths.len() > 1).then(|| event.paths[0].clone());
    let path = if prev_path.is_some() { event.paths[1].clone() } else { path };
    Some(FileEvent { kind, path, prev_path, inode: 0, size: 0, mtime: SystemTime::now() })
}

fn dispatch(
    inner: &Arc<Mutex<Inner>>,
    runtime: &tokio::runtime::Handle,
    filter: &PathFilter,
    mut event: FileEvent,
) {
    if !filter.matches(&event.path) {
        inner.lock().events_dropped += 1;
        return;
    }

    let handler = inner.lock().handler.clone();
    let Some(handler) = handler else {
        return;
    };

    if event.kind != FileEventKind::Deleted {
        match stat_with_backoff(&event.path) {
            Some((size, mtime)) => {
                if !PathFilter::size_gate(size) {
                    tracing::debug!(path = %event.path.display(), size, "SizeGate");
                    inner.lock().events_dropped += 1;
                    return;
                }
                event.size = size;
                event.mtime = mtime;
            }
            None => {
                tracing::warn!(path = %event.path.display(), "giving up on unreadable file after backoff");
                inner.lock().events_dropped += 1;
                return;
            }
        }
    }

    let inner = Arc::clone(inner);
    runtime.spawn(async move {
        handler.handle(event).await;
        inner.lock().events_processed += 1;
    });
}

fn stat_with_backoff(path: &Path) -> Option<(u64, SystemTime)> {
    if let Ok(meta) = std::fs::metadata(path) {
        return Some((meta.len(), meta.modified().unwrap_or(SystemTime::now())));
    }
    for delay_ms in BACKOFF_MS {
        std::thread::sleep(Duration::from_millis(delay_ms));
        if let Ok(meta) = std::fs::metadata(path) {
            return Some((meta.len(), meta.modified().unwrap_or(SystemTime::now())));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct CountingSink {
        count: Arc<AtomicUsize>,
    }

    impl EventSink for CountingSink {
        fn handle<'a>(&'a self, _event: FileEvent) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
            let count = Arc::clone(&self.count);
            Box::pin(async move {
                count.fetch_add(1, Ordering::SeqCst);
            })
        }
    }

    #[tokio::test]
    async fn add_watch_is_idempotent() {
        let dir = tempdir().unwrap();
        let manager = WatchManager::new(PathFilter::default(), Duration::from_millis(50));
        manager.add_watch(dir.path(), true).unwrap();
        manager.add_watch(dir.path(), true).unwrap();
        assert_eq!(manager.get_status().watched_paths.len(), 1);
    }

    #[tokio::test]
    async fn status_reports_watched_paths() {
        let dir = tempdir().unwrap();
        let manager = WatchManager::new(PathFilter::default(), Duration::from_millis(50));
        let count = Arc::new(AtomicUsize::new(0));
        manager.register_handler(Arc::new(CountingSink { count }));
        manager.add_watch(dir.path(), true).unwrap();
        assert_eq!(manager.get_status().watched_paths, vec![dir.path().to_path_buf()]);
    }

    #[tokio::test]
    async fn shutdown_clears_watches() {
        let dir = tempdir().unwrap();
        let manager = WatchManager::new(PathFilter::default(), Duration::from_millis(50));
        manager.add_watch(dir.path(), true).unwrap();
        manager.shutdown();
        assert!(manager.get_status().watched_paths.is_empty());
    }
}
