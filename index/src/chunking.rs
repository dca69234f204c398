//! Locator-aware text chunking (§4.2).
//!
//! `chunk(text, locator_hint) -> [Chunk]`. Target size 800 chars, hard
//! max 1000, min 100, overlap 100. Boundaries prefer, in order: double
//! newline, single newline, sentence terminator, whitespace, hard cut.
//! Page boundaries for documents are never crossed (at least one chunk
//! per page); time boundaries for transcripts are never crossed when the
//! gap between adjacent source segments exceeds `max_time_gap` (2s).
//!
//! This generalizes the fixed-size and sentence-aware chunkers a plain
//! RAG pipeline would ship into one chunker that understands the extra
//! structure PDFs and transcripts carry.

use crate::dedup::content_hash;
use crate::error::Result;
use crate::types::Chunk;
use unicode_segmentation::UnicodeSegmentation;

/// Where a piece of source text came from, so the chunker can preserve
/// locator boundaries instead of just splitting on length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Locator {
    /// No locator information (e.g. plain text/Markdown).
    None,
    /// A page number, for document chunks. Two segments on different
    /// pages are never merged into one chunk.
    Page(u32),
    /// A time interval in seconds, for audio/video chunks. Two adjacent
    /// segments are only merged if the gap between them does not exceed
    /// the chunker's `max_time_gap`.
    Time {
        /// Segment start time, seconds.
        start: f64,
        /// Segment end time, seconds.
        end: f64,
    },
}

/// One piece of extracted text plus the locator it came from.
///
/// Processors emit one `TextSegment` per page (documents) or per
/// transcribed utterance (audio/video); the chunker regroups and splits
/// them into `Chunk`s without ever violating the locator boundary rules
/// above.
#[derive(Debug, Clone)]
pub struct TextSegment {
    /// Extracted text for this segment.
    pub text: String,
    /// The locator this segment carries.
    pub locator: Locator,
}

impl TextSegment {
    /// Builds a segment with no locator.
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into(), locator: Locator::None }
    }

    /// Builds a page-located segment.
    #[must_use]
    pub fn page(text: impl Into<String>, page: u32) -> Self {
        Self { text: text.into(), locator: Locator::Page(page) }
    }

    /// Builds a time-located segment.
    #[must_use]
    pub fn time(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self { text: text.into(), locator: Locator::Time { start, end } }
    }
}

/// Trait for chunking strategies over locator-tagged text segments.
pub trait Chunker: Send + Sync {
    /// Splits segments into chunks owned by `document_id`, with a dense,
    /// document-order `chunk_index`.
    ///
    /// # Errors
    /// Returns an error if chunker configuration is invalid for the
    /// given input (this implementation never fails in practice; the
    /// `Result` return exists so alternative chunkers can surface
    /// configuration errors).
    fn chunk(&self, document_id: &str, segments: &[TextSegment]) -> Result<Vec<Chunk>>;
}

/// The chunker used throughout the pipeline: boundary-preferring,
/// locator-respecting, with configurable target/max/min size and
/// overlap.
#[derive(Debug, Clone)]
pub struct SlidingWindowChunker {
    target_size: usize,
    hard_max: usize,
    min_size: usize,
    overlap: usize,
    max_time_gap: f64,
}

impl SlidingWindowChunker {
    /// Builds a chunker with explicit bounds.
    ///
    /// # Panics
    /// Panics if the bounds are inconsistent (`min <= target <= hard_max`,
    /// `overlap < target`).
    #[must_use]
    pub fn new(target_size: usize, hard_max: usize, min_size: usize, overlap: usize, max_time_gap: f64) -> Self {
        assert!(min_size <= target_size, "min_size must be <= target_size");
        assert!(target_size <= hard_max, "target_size must be <= hard_max");
        assert!(overlap < target_size, "overlap must be < target_size");
        Self { target_size, hard_max, min_size, overlap, max_time_gap }
    }

    /// Defaults from the component contract: target 800, hard max 1000,
    /// min 100, overlap 100, max time gap 2s.
    #[must_use]
    pub const fn default_settings() -> Self {
        Self { target_size: 800, hard_max: 1000, min_size: 100, overlap: 100, max_time_gap: 2.0 }
    }

    /// Groups segments into merge runs: consecutive segments that are
    /// allowed to share a chunk. A page segment always starts a new run
    /// relative to a different page; a time segment starts a new run if
    /// the gap since the previous segment's end exceeds `max_time_gap`.
    fn merge_runs<'s>(&self, segments: &'s [TextSegment]) -> Vec<Vec<&'s TextSegment>> {
        let mut runs: Vec<Vec<&TextSegment>> = Vec::new();
        for seg in segments {
            let starts_new_run = match (runs.last().and_then(|r| r.last()), seg.locator) {
                (None, _) => true,
                (Some(prev), Locator::Page(p)) => !matches!(prev.locator, Locator::Page(pp) if pp == p),
                (Some(prev), Locator::Time { start, .. }) => match prev.locator {
                    Locator::Time { end: prev_end, .. } => (start - prev_end) > self.max_time_gap,
                    _ => true,
                },
                (Some(prev), Locator::None) => !matches!(prev.locator, Locator::None),
            };
            if starts_new_run {
                runs.push(vec![seg]);
            } else {
                runs.last_mut().expect("just pushed or non-empty").push(seg);
            }
        }
        runs
    }

    /// Finds the best boundary at or before `limit` within `text`,
    /// preferring double newline, then newline, then sentence
    /// terminator, then whitespace, then a hard cut at `limit`.
    fn find_boundary(text: &str, limit: usize) -> usize {
        let window = &text[..limit.min(text.len())];
        if let Some(pos) = window.rfind("\n\n") {
            return pos + 2;
        }
        if let Some(pos) = window.rfind('\n') {
            return pos + 1;
        }
        if let Some(pos) = window.unicode_sentences().last().and_then(|s| {
            let offset = s.as_ptr() as usize - window.as_ptr() as usize;
            Some(offset + s.len())
        }) {
            if pos > 0 && pos <= window.len() {
                return pos;
            }
        }
        if let Some(pos) = window.rfind(char::is_whitespace) {
            return pos + 1;
        }
        limit.min(text.len())
    }

    /// Splits one contiguous run's text into chunk-sized pieces, at
    /// boundary-preferred cut points, with overlap between consecutive
    /// pieces. Returns `(text, char_start, char_end)` per piece.
    fn split_run(&self, text: &str) -> Vec<(String, usize, usize)> {
        if text.len() <= self.hard_max {
            return vec![(text.to_string(), 0, text.len())];
        }

        let mut pieces = Vec::new();
        let mut start = 0;
        while start < text.len() {
            let remaining = text.len() - start;
            if remaining <= self.hard_max {
                pieces.push((text[start..].to_string(), start, text.len()));
                break;
            }

            let window_limit = self.target_size.min(remaining);
            let mut cut = Self::find_boundary(&text[start..], window_limit);
            if cut == 0 || cut < self.min_size.min(window_limit) {
                // No usable boundary; hard cut at target size.
                cut = window_limit.max(1);
            }
            let end = start + cut;
            pieces.push((text[start..end].to_string(), start, end));

            if end >= text.len() {
                break;
            }
            // Advance, carrying overlap back into the next piece.
            start = end.saturating_sub(self.overlap).max(start + 1);
        }
        pieces
    }
}

impl Default for SlidingWindowChunker {
    fn default() -> Self {
        Self::default_settings()
    }
}

impl Chunker for SlidingWindowChunker {
    fn chunk(&self, document_id: &str, segments: &[TextSegment]) -> Result<Vec<Chunk>> {
        let mut out = Vec::new();
        let mut chunk_index = 0usize;

        for run in self.merge_runs(segments) {
            // Concatenate the run, remembering each source segment's
            // char range within the concatenated buffer so time
            // locators can be recovered per output piece.
            let mut buffer = String::new();
            let mut sub_ranges: Vec<(usize, usize, Locator)> = Vec::new();
            for seg in &run {
                let start = buffer.len();
                if !buffer.is_empty() {
                    buffer.push(' ');
                }
                let text_start = buffer.len();
                buffer.push_str(&seg.text);
                sub_ranges.push((text_start, buffer.len(), seg.locator));
                let _ = start;
            }

            let run_locator_page = match run.first().map(|s| s.locator) {
                Some(Locator::Page(p)) => Some(p),
                _ => None,
            };

            if buffer.trim().is_empty() {
                continue;
            }

            let pieces = self.split_run(&buffer);
            for (text, range_start, range_end) in pieces {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let hash = content_hash(trimmed);
                let mut chunk = Chunk::new(document_id, chunk_index, trimmed, hash);

                if let Some(page) = run_locator_page {
                    chunk.page = Some(page);
                } else {
                    // Time locator: min start / max end of overlapping sub-ranges.
                    let mut start_time = None;
                    let mut end_time = None;
                    for (s, e, locator) in &sub_ranges {
                        if *e <= range_start || *s >= range_end {
                            continue;
                        }
                        if let Locator::Time { start, end } = locator {
                            start_time = Some(start_time.map_or(*start, |v: f64| v.min(*start)));
                            end_time = Some(end_time.map_or(*end, |v: f64| v.max(*end)));
                        }
                    }
                    chunk.start_time = start_time;
                    chunk.end_time = end_time;
                }

                out.push(chunk);
                chunk_index += 1;
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_single_chunk() {
        let chunker = SlidingWindowChunker::default_settings();
        let chunks = chunker.chunk("doc1", &[TextSegment::plain("short text")]).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "short text");
        assert_eq!(chunks[0].chunk_index, 0);
    }

    #[test]
    fn never_merges_across_pages() {
        let chunker = SlidingWindowChunker::default_settings();
        let segments = vec![TextSegment::page("page one", 1), TextSegment::page("page two", 2)];
        let chunks = chunker.chunk("doc1", &segments).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].page, Some(1));
        assert_eq!(chunks[1].page, Some(2));
    }

    #[test]
    fn emits_at_least_one_chunk_per_page_even_if_short() {
        let chunker = SlidingWindowChunker::default_settings();
        let segments = vec![TextSegment::page("x", 1), TextSegment::page("y", 2)];
        let chunks = chunker.chunk("doc1", &segments).unwrap();
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn never_crosses_time_gap() {
        let chunker = SlidingWindowChunker::default_settings();
        let segments = vec![
            TextSegment::time("hello there", 0.0, 1.0),
            TextSegment::time("world again", 10.0, 11.0),
        ];
        let chunks = chunker.chunk("doc1", &segments).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].start_time, Some(0.0));
        assert_eq!(chunks[1].start_time, Some(10.0));
    }

    #[test]
    fn merges_close_time_segments() {
        let chunker = SlidingWindowChunker::default_settings();
        let segments = vec![
            TextSegment::time("hello there", 0.0, 1.0),
            TextSegment::time("world again", 1.5, 2.5),
        ];
        let chunks = chunker.chunk("doc1", &segments).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_time, Some(0.0));
        assert_eq!(chunks[0].end_time, Some(2.5));
    }

    #[test]
    fn long_text_splits_into_multiple_chunks_in_document_order() {
        let chunker = SlidingWindowChunker::default_settings();
        let paragraph = "Sentence one here. Sentence two here. ".repeat(60);
        let chunks = chunker.chunk("doc1", &[TextSegment::plain(paragraph)]).unwrap();
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i);
            assert!(c.text.len() <= 1000);
        }
    }

    #[test]
    fn empty_segment_produces_zero_chunks() {
        let chunker = SlidingWindowChunker::default_settings();
        let chunks = chunker.chunk("doc1", &[]).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    #[should_panic(expected = "overlap")]
    fn rejects_overlap_not_less_than_target() {
        let _ = SlidingWindowChunker::new(100, 200, 10, 100, 2.0);
    }
}
