//! Content-addressed identity resolution (§4.1 steps 1-4).

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use sha2::{Digest, Sha256};

use localdoc_core::MediaType;
use localdoc_index::DualIndexStore;

use crate::error::Result;
use crate::event::{FileEvent, FileEventKind, ResolvedAction, ResolvedEvent};

/// Bytes read from the head and tail of a file for its content hash.
const HASH_WINDOW: usize = 64 * 1024;
/// Bytes sampled to decide whether an unrecognized extension is
/// text-decodable enough to treat as a `document`.
const SNIFF_WINDOW: usize = 8 * 1024;

/// Computes the content hash used for identity: SHA-256 over
/// `{first 64 KiB || last 64 KiB || size}`.
///
/// # Errors
/// Returns an error if the file cannot be opened or read.
pub fn compute_content_hash(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let size = file.metadata()?.len();

    let head_len = HASH_WINDOW.min(usize::try_from(size).unwrap_or(usize::MAX));
    let mut head = vec![0u8; head_len];
    file.read_exact(&mut head)?;

    let tail_start = size.saturating_sub(HASH_WINDOW as u64);
    file.seek(SeekFrom::Start(tail_start))?;
    let tail_len = usize::try_from(size - tail_start).unwrap_or(0);
    let mut tail = vec![0u8; tail_len];
    file.read_exact(&mut tail)?;

    let mut hasher = Sha256::new();
    hasher.update(&head);
    hasher.update(&tail);
    hasher.update(size.to_le_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Classifies a path's media type, falling back to `document` for
/// unrecognized extensions that sniff as text, per §4.1.
///
/// # Errors
/// Returns an error if the file cannot be read for sniffing.
pub fn classify(path: &Path) -> std::io::Result<Option<MediaType>> {
    if let Some(media_type) = MediaType::from_path(path) {
        return Ok(Some(media_type));
    }
    let mut file = std::fs::File::open(path)?;
    let mut buf = vec![0u8; SNIFF_WINDOW];
    let n = file.read(&mut buf)?;
    buf.truncate(n);
    if looks_like_text(&buf) {
        Ok(Some(MediaType::Document))
    } else {
        Ok(None)
    }
}

fn looks_like_text(sample: &[u8]) -> bool {
    if sample.is_empty() {
        return true;
    }
    match std::str::from_utf8(sample) {
        Ok(s) => {
            let control = s.chars().filter(|c| c.is_control() && *c != '\n' && *c != '\t' && *c != '\r').count();
            (control as f32 / s.chars().count().max(1) as f32) < 0.05
        }
        Err(_) => false,
    }
}

/// Resolves a raw [`FileEvent`] against the document registry into a
/// [`ResolvedEvent`], implementing the priority order in §4.1 step 3.
/// Returns `None` when the event should be silently dropped (size gate
/// or unclassifiable media type, for non-delete events).
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityResolver;

impl IdentityResolver {
    /// Resolves one event against `store`.
    ///
    /// # Errors
    /// Returns an error if the store cannot be queried or the file
    /// cannot be hashed/sniffed.
    pub fn resolve(&self, store: &DualIndexStore, event: &FileEvent) -> Result<Option<ResolvedEvent>> {
        if event.kind == FileEventKind::Deleted {
            return self.resolve_deleted(store, event);
        }

        if !crate::filter::PathFilter::size_gate(event.size) {
            tracing::debug!(path = %event.path.display(), size = event.size, "SizeGate");
            return Ok(None);
        }

        let Some(media_type) = classify(&event.path)? else {
            tracing::debug!(path = %event.path.display(), "unclassifiable media type, dropping");
            return Ok(None);
        };

        let content_hash = compute_content_hash(&event.path)?;

        if let Some(doc) = store.find_by_content_hash(&content_hash, false)? {
            let action = if doc.path == event.path { ResolvedAction::Update } else { ResolvedAction::Rename };
            return Ok(Some(ResolvedEvent {
                doc_id: doc.id,
                action,
                path: event.path.clone(),
                prev_path: event.prev_path.clone(),
                content_hash: Some(content_hash),
                media_type: Some(media_type),
                size: event.size,
                mtime: event.mtime,
            }));
        }

        if let Some(doc) = store.find_by_content_hash(&content_hash, true)? {
            return Ok(Some(ResolvedEvent {
                doc_id: doc.id,
                action: ResolvedAction::Restore,
                path: event.path.clone(),
                prev_path: event.prev_path.clone(),
                content_hash: Some(content_hash),
                media_type: Some(media_type),
                size: event.size,
                mtime: event.mtime,
            }));
        }

        if let Some(doc) = store.find_by_path(&event.path)?
            && !doc.is_deleted
            && doc.content_hash != content_hash
        {
            return Ok(Some(ResolvedEvent {
                doc_id: doc.id,
                action: ResolvedAction::Update,
                path: event.path.clone(),
                prev_path: None,
                content_hash: Some(content_hash),
                media_type: Some(media_type),
                size: event.size,
                mtime: event.mtime,
            }));
        }

        Ok(Some(ResolvedEvent {
            doc_id: uuid_like(&event.path, &content_hash),
            action: ResolvedAction::Insert,
            path: event.path.clone(),
            prev_path: None,
            content_hash: Some(content_hash),
            media_type: Some(media_type),
            size: event.size,
            mtime: event.mtime,
        }))
    }

    fn resolve_deleted(&self, store: &DualIndexStore, event: &FileEvent) -> Result<Option<ResolvedEvent>> {
        let Some(doc) = store.find_by_path(&event.path)? else {
            tracing::debug!(path = %event.path.display(), "delete for untracked path, dropping");
            return Ok(None);
        };
        Ok(Some(ResolvedEvent {
            doc_id: doc.id,
            action: ResolvedAction::Tombstone,
            path: event.path.clone(),
            prev_path: None,
            content_hash: None,
            media_type: None,
            size: 0,
            mtime: event.mtime,
        }))
    }
}

/// Derives a stable id for a newly-seen document from its path and
/// content hash, so re-running identity resolution on the same inputs
/// is deterministic.
fn uuid_like(path: &Path, content_hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    hasher.update(content_hash.as_bytes());
    format!("{:x}", hasher.finalize())[..32].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::time::SystemTime;
    use tempfile::tempdir;

    fn event(path: PathBuf, size: u64) -> FileEvent {
        FileEvent { kind: FileEventKind::Created, path, prev_path: None, inode: 1, size, mtime: SystemTime::now() }
    }

    #[test]
    fn same_bytes_same_hash() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "hello world").unwrap();
        let h1 = compute_content_hash(&path).unwrap();
        let h2 = compute_content_hash(&path).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn different_bytes_different_hash() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, "hello world").unwrap();
        std::fs::write(&b, "goodbye world").unwrap();
        assert_ne!(compute_content_hash(&a).unwrap(), compute_content_hash(&b).unwrap());
    }

    #[test]
    fn classifies_unknown_extension_text_file_as_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.xyz");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"just some plain ascii text, nothing fancy here").unwrap();
        assert_eq!(classify(&path).unwrap(), Some(MediaType::Document));
    }

    #[test]
    fn classifies_binary_unknown_extension_as_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blob.xyz");
        std::fs::write(&path, [0u8, 159, 146, 150, 1, 2, 3, 255, 254, 253]).unwrap();
        assert_eq!(classify(&path).unwrap(), None);
    }

    #[tokio::test]
    async fn new_file_resolves_to_insert() {
        let dir = tempdir().unwrap();
        let store = DualIndexStore::open(localdoc_index::StoreConfig {
            path: dir.path().join("t.redb"),
            dimension: 3,
            deduplication: true,
        })
        .unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, "x".repeat(2000)).unwrap();
        let resolver = IdentityResolver;
        let resolved = resolver.resolve(&store, &event(path, 2000)).unwrap().unwrap();
        assert_eq!(resolved.action, ResolvedAction::Insert);
    }

    #[tokio::test]
    async fn undersized_file_is_dropped() {
        let dir = tempdir().unwrap();
        let store = DualIndexStore::open(localdoc_index::StoreConfig {
            path: dir.path().join("t.redb"),
            dimension: 3,
            deduplication: true,
        })
        .unwrap();
        let path = dir.path().join("tiny.txt");
        std::fs::write(&path, "hello world").unwrap();
        let resolver = IdentityResolver;
        assert!(resolver.resolve(&store, &event(path, 11)).unwrap().is_none());
    }
}
