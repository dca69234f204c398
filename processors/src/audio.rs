//! Audio pipeline (§4.3): transcribes a WAV byte buffer into
//! timestamped segments, emitting one time-located [`TextSegment`] per
//! utterance so the chunker never merges across a transcriber-reported
//! silence gap wider than `max_time_gap`.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use localdoc_core::{MediaType, Transcriber};
use localdoc_index::Transcript;
use localdoc_index::chunking::TextSegment;

use crate::error::Result;
use crate::registry::{MediaPipeline, ProcessedMedia};

/// Audio pipeline: reads the source file whole (it is already mono
/// 16 kHz WAV, or small enough for the video pipeline to have
/// transcoded it into one) and hands it to a [`Transcriber`].
pub struct AudioPipeline<T> {
    transcriber: T,
}

impl<T: Transcriber> AudioPipeline<T> {
    /// Builds an audio pipeline backed by `transcriber`.
    #[must_use]
    pub const fn new(transcriber: T) -> Self {
        Self { transcriber }
    }

    /// Transcribes `wav` and assembles the resulting [`ProcessedMedia`],
    /// shared with the video pipeline once it has extracted a WAV
    /// track.
    pub(crate) async fn process_wav(&self, document_id: &str, wav: &[u8]) -> Result<ProcessedMedia> {
        let (segments, language) = self.transcriber.transcribe(wav).await?;

        let duration_seconds = segments.iter().map(|s| s.end_time).fold(0.0_f64, f64::max);
        let full_text = segments.iter().map(|s| s.text.as_str()).collect::<Vec<_>>().join(" ");
        let transcript = Transcript::new(document_id, full_text, language, duration_seconds);

        let text_segments = segments
            .into_iter()
            .map(|s| TextSegment::time(s.text, s.start_time, s.end_time))
            .collect();

        Ok(ProcessedMedia {
            segments: text_segments,
            duration_seconds: Some(duration_seconds),
            transcript: Some(transcript),
            ..Default::default()
        })
    }
}

impl<T: Transcriber + Send + Sync> MediaPipeline for AudioPipeline<T> {
    fn can_process(&self, media_type: MediaType) -> bool {
        media_type == MediaType::Audio
    }

    fn process<'a>(
        &'a self,
        path: &'a Path,
        document_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ProcessedMedia>> + Send + 'a>> {
        Box::pin(async move {
            let wav = tokio::fs::read(path).await?;
            self.process_wav(document_id, &wav).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use localdoc_core::{Result as CoreResult, TranscriptSegment};

    #[derive(Debug, Default)]
    struct FixedTranscriber {
        segments: Vec<TranscriptSegment>,
        language: Option<String>,
    }

    impl Transcriber for FixedTranscriber {
        async fn transcribe(&self, _wav: &[u8]) -> CoreResult<(Vec<TranscriptSegment>, Option<String>)> {
            Ok((self.segments.clone(), self.language.clone()))
        }
    }

    #[tokio::test]
    async fn builds_time_located_segments_and_transcript() {
        let transcriber = FixedTranscriber {
            segments: vec![
                TranscriptSegment { start_time: 0.0, end_time: 2.0, text: "hello".into() },
                TranscriptSegment { start_time: 2.0, end_time: 4.5, text: "world".into() },
            ],
            language: Some("en".into()),
        };
        let pipeline = AudioPipeline::new(transcriber);
        let out = pipeline.process_wav("d1", &[0u8; 8]).await.unwrap();

        assert_eq!(out.segments.len(), 2);
        assert_eq!(out.duration_seconds, Some(4.5));
        let transcript = out.transcript.unwrap();
        assert_eq!(transcript.full_text, "hello world");
        assert_eq!(transcript.language.as_deref(), Some("en"));
    }
}
