//! Progress statistics accumulated across a scheduler's lifetime.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A point-in-time snapshot of [`Stats`], suitable for serializing onto
/// an API/CLI surface.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct StatsSnapshot {
    /// PDF documents processed.
    pub pdf_count: u64,
    /// Pages submitted to the VLM fallback across all PDFs.
    pub vlm_pages_processed: u64,
    /// Image documents processed.
    pub image_count: u64,
    /// Audio documents processed.
    pub audio_count: u64,
    /// Video documents processed.
    pub video_count: u64,
    /// Plain-text/Office documents processed.
    pub text_count: u64,
    /// Events resolved to `Rename`/`Tombstone` — no processor ran.
    pub skipped_count: u64,
    /// Wall-clock seconds since the scheduler was built.
    pub elapsed_seconds: f64,
}

/// Accumulates counters the indexing scheduler reports via `status`
/// (§4.8). All fields are lock-free so workers never contend on a mutex
/// just to bump a counter.
#[derive(Debug)]
pub struct Stats {
    pdf_count: AtomicU64,
    vlm_pages_processed: AtomicU64,
    image_count: AtomicU64,
    audio_count: AtomicU64,
    video_count: AtomicU64,
    text_count: AtomicU64,
    skipped_count: AtomicU64,
    started_at: Instant,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    /// Starts a fresh, zeroed counter set with the clock running.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pdf_count: AtomicU64::new(0),
            vlm_pages_processed: AtomicU64::new(0),
            image_count: AtomicU64::new(0),
            audio_count: AtomicU64::new(0),
            video_count: AtomicU64::new(0),
            text_count: AtomicU64::new(0),
            skipped_count: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// Records one processed PDF and the VLM-fallback pages it took.
    pub fn record_pdf(&self, vlm_pages: usize) {
        self.pdf_count.fetch_add(1, Ordering::Relaxed);
        if vlm_pages > 0 {
            self.vlm_pages_processed.fetch_add(vlm_pages as u64, Ordering::Relaxed);
        }
    }

    /// Records one processed image.
    pub fn record_image(&self) {
        self.image_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one processed audio document.
    pub fn record_audio(&self) {
        self.audio_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one processed video document.
    pub fn record_video(&self) {
        self.video_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one processed plain-text/Office document.
    pub fn record_text(&self) {
        self.text_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an event that required no processor run (`Rename`,
    /// `Tombstone`).
    pub fn record_skipped(&self) {
        self.skipped_count.fetch_add(1, Ordering::Relaxed);
    }

    /// A consistent snapshot of every counter.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            pdf_count: self.pdf_count.load(Ordering::Relaxed),
            vlm_pages_processed: self.vlm_pages_processed.load(Ordering::Relaxed),
            image_count: self.image_count.load(Ordering::Relaxed),
            audio_count: self.audio_count.load(Ordering::Relaxed),
            video_count: self.video_count.load(Ordering::Relaxed),
            text_count: self.text_count.load(Ordering::Relaxed),
            skipped_count: self.skipped_count.load(Ordering::Relaxed),
            elapsed_seconds: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_independently() {
        let stats = Stats::new();
        stats.record_pdf(3);
        stats.record_pdf(0);
        stats.record_image();
        stats.record_skipped();

        let snap = stats.snapshot();
        assert_eq!(snap.pdf_count, 2);
        assert_eq!(snap.vlm_pages_processed, 3);
        assert_eq!(snap.image_count, 1);
        assert_eq!(snap.skipped_count, 1);
        assert_eq!(snap.audio_count, 0);
    }
}
