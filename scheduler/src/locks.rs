//! Per-document serialization (§5 ordering guarantees: "events for the
//! same document are serialized by `document_id`; events across
//! documents may interleave freely").

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A registry of per-document async mutexes, keyed by `document_id`.
///
/// Cloneable and thread-safe, mirroring the shared-handle shape used
/// for job tracking elsewhere in this codebase. Locks are created
/// lazily and never removed, so the map grows with the number of
/// distinct documents ever seen in a process lifetime — acceptable
/// since each entry is a zero-sized mutex plus a string key.
#[derive(Debug, Clone, Default)]
pub struct DocumentLocks {
    locks: Arc<SyncMutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl DocumentLocks {
    /// Builds an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for `document_id`, creating it if this is the
    /// first time the id has been seen. Held across awaits via an
    /// owned guard so the caller can process the document without
    /// re-locking the registry itself.
    pub async fn lock(&self, document_id: &str) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(document_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))))
        };
        mutex.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_document_serializes() {
        let locks = DocumentLocks::new();
        let order = Arc::new(SyncMutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..3 {
            let locks = locks.clone();
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock("doc-1").await;
                tokio::time::sleep(Duration::from_millis(5)).await;
                order.lock().push(i);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(order.lock().len(), 3);
    }

    #[tokio::test]
    async fn different_documents_do_not_block_each_other() {
        let locks = DocumentLocks::new();
        let concurrent = Arc::new(AtomicU32::new(0));
        let max_concurrent = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for i in 0..4 {
            let locks = locks.clone();
            let concurrent = Arc::clone(&concurrent);
            let max_concurrent = Arc::clone(&max_concurrent);
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock(&format!("doc-{i}")).await;
                let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                max_concurrent.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                concurrent.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(max_concurrent.load(Ordering::SeqCst) > 1);
    }
}
