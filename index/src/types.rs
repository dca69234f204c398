//! Core data shapes: `Document`, `Chunk`, `IndexEntry`, `Transcript`.
//!
//! These mirror the data model (spec §3) exactly; invariants I1-I5 are
//! enforced by [`crate::store::DualIndexStore`], not by these types
//! themselves — the types are plain data.

use localdoc_core::MediaType;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::SystemTime;

/// Free-form key/value metadata attached to a chunk, bounded in size.
pub type Metadata = BTreeMap<String, String>;

/// A tracked file, one row per distinct content-addressed identity.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Document {
    /// Stable identity, preserved across renames and in-place edits.
    pub id: String,
    /// SHA-256 over {first 64 KiB ‖ last 64 KiB ‖ size}.
    pub content_hash: String,
    /// Absolute path on disk.
    pub path: PathBuf,
    /// File name component of `path`.
    pub filename: String,
    /// Extension, lowercased, without the leading dot.
    pub extension: String,
    /// Media class used to select a processor.
    pub media_type: MediaType,
    /// Size in bytes.
    pub size: u64,
    /// Filesystem creation time.
    pub created_at: SystemTime,
    /// Filesystem modification time.
    pub modified_at: SystemTime,
    /// When this document was last (re-)indexed.
    pub indexed_at: SystemTime,
    /// Soft-delete marker.
    pub is_deleted: bool,
    /// When the document was tombstoned, if it was.
    pub deleted_at: Option<SystemTime>,
    /// Duration for audio/video documents.
    pub duration_seconds: Option<f64>,
    /// Pixel width for image/video documents.
    pub width: Option<u32>,
    /// Pixel height for image/video documents.
    pub height: Option<u32>,
    /// Last error recorded against this document, if processing failed.
    pub last_error: Option<String>,
}

impl Document {
    /// Builds a freshly-seen, non-deleted document row.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        content_hash: impl Into<String>,
        path: PathBuf,
        media_type: MediaType,
        size: u64,
    ) -> Self {
        let now = SystemTime::now();
        let filename = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        Self {
            id: id.into(),
            content_hash: content_hash.into(),
            path,
            filename,
            extension,
            media_type,
            size,
            created_at: now,
            modified_at: now,
            indexed_at: now,
            is_deleted: false,
            deleted_at: None,
            duration_seconds: None,
            width: None,
            height: None,
            last_error: None,
        }
    }

    /// Marks this document as tombstoned.
    pub fn tombstone(&mut self) {
        self.is_deleted = true;
        self.deleted_at = Some(SystemTime::now());
    }

    /// Clears a tombstone, reusing the same `id` (resurrection).
    pub fn restore(&mut self, content_hash: impl Into<String>, path: PathBuf) {
        self.is_deleted = false;
        self.deleted_at = None;
        self.content_hash = content_hash.into();
        self.path = path;
        self.indexed_at = SystemTime::now();
    }
}

/// A retrievable unit owned by exactly one [`Document`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Chunk {
    /// Unique id, conventionally `"{document_id}#chunk_{chunk_index}"`.
    pub id: String,
    /// Owning document's id.
    pub document_id: String,
    /// 0-based, dense index within the owning document.
    pub chunk_index: usize,
    /// Normalized UTF-8 text.
    pub text: String,
    /// Start time in seconds, for audio/video chunks.
    pub start_time: Option<f64>,
    /// End time in seconds, for audio/video chunks.
    pub end_time: Option<f64>,
    /// Page number, for document chunks.
    pub page: Option<u32>,
    /// Free-form metadata.
    pub metadata: Metadata,
    /// Content hash used for chunk-level deduplication.
    pub content_hash: u64,
}

impl Chunk {
    /// Builds a new chunk with no locators and empty metadata.
    #[must_use]
    pub fn new(
        document_id: impl Into<String>,
        chunk_index: usize,
        text: impl Into<String>,
        content_hash: u64,
    ) -> Self {
        let document_id = document_id.into();
        let id = format!("{document_id}#chunk_{chunk_index}");
        Self {
            id,
            document_id,
            chunk_index,
            text: text.into(),
            start_time: None,
            end_time: None,
            page: None,
            metadata: Metadata::new(),
            content_hash,
        }
    }

    /// Returns a `file://` playback URL with a time fragment, for
    /// audio/video chunks with a known start time.
    #[must_use]
    pub fn playback_url(&self, path: &std::path::Path) -> Option<String> {
        self.start_time
            .map(|t| format!("file://{}#t={}", path.display(), t.floor()))
    }
}

/// A chunk paired with its dense embedding, the unit stored in the
/// vector index.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct IndexEntry {
    /// The chunk this embedding represents.
    pub chunk: Chunk,
    /// Dense embedding vector, dimension fixed by the store.
    pub embedding: Vec<f32>,
}

impl IndexEntry {
    /// Pairs a chunk with its embedding.
    #[must_use]
    pub const fn new(chunk: Chunk, embedding: Vec<f32>) -> Self {
        Self { chunk, embedding }
    }
}

/// An optional audio/video summary, one per [`Document`] of media type
/// `audio` or `video`. Language is whatever the transcriber runtime
/// returns, recorded verbatim without validation (design note §9, open
/// question (b)).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Transcript {
    /// Owning document's id.
    pub document_id: String,
    /// Full transcript text, all segments concatenated in order.
    pub full_text: String,
    /// Language code reported by the transcriber runtime, if any.
    pub language: Option<String>,
    /// Total duration of the source recording, in seconds.
    pub duration_seconds: f64,
    /// Word count of `full_text`.
    pub word_count: usize,
}

impl Transcript {
    /// Builds a transcript from its full text, computing `word_count`.
    #[must_use]
    pub fn new(
        document_id: impl Into<String>,
        full_text: impl Into<String>,
        language: Option<String>,
        duration_seconds: f64,
    ) -> Self {
        let full_text = full_text.into();
        let word_count = full_text.split_whitespace().count();
        Self { document_id: document_id.into(), full_text, language, duration_seconds, word_count }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_word_count_matches_whitespace_split() {
        let t = Transcript::new("d1", "hello there world", Some("en".into()), 12.0);
        assert_eq!(t.word_count, 3);
    }

    #[test]
    fn chunk_id_follows_convention() {
        let c = Chunk::new("doc1", 3, "text", 42);
        assert_eq!(c.id, "doc1#chunk_3");
    }

    #[test]
    fn playback_url_only_for_timed_chunks() {
        let mut c = Chunk::new("doc1", 0, "text", 1);
        assert!(c.playback_url(std::path::Path::new("/a.mp4")).is_none());
        c.start_time = Some(12.7);
        assert_eq!(
            c.playback_url(std::path::Path::new("/a.mp4")).unwrap(),
            "file:///a.mp4#t=12"
        );
    }

    #[test]
    fn tombstone_and_restore_roundtrip() {
        let mut d = Document::new(
            "id1",
            "hash1",
            PathBuf::from("/a.txt"),
            MediaType::Document,
            10,
        );
        d.tombstone();
        assert!(d.is_deleted);
        d.restore("hash2", PathBuf::from("/b.txt"));
        assert!(!d.is_deleted);
        assert_eq!(d.id, "id1");
        assert_eq!(d.content_hash, "hash2");
    }
}
