//! Audio transcription capability (a Whisper-family runtime in
//! production).

use crate::Result;

/// A single timestamped segment of a transcript.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TranscriptSegment {
    /// Segment start time, seconds from the start of the recording.
    pub start_time: f64,
    /// Segment end time, seconds from the start of the recording.
    pub end_time: f64,
    /// Transcribed text for this segment.
    pub text: String,
}

/// A model capable of transcribing audio into timestamped segments.
///
/// Language detection is delegated entirely to the runtime: the store
/// records whatever language code comes back without validation (design
/// note §9, open question (b)).
pub trait Transcriber: Send + Sync {
    /// Transcribes a mono 16 kHz WAV byte buffer.
    ///
    /// # Errors
    /// Returns an error if the runtime is unreachable or exceeds its
    /// per-file deadline (30 minutes).
    fn transcribe(
        &self,
        wav: &[u8],
    ) -> impl Future<Output = Result<(Vec<TranscriptSegment>, Option<String>)>> + Send;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::{Transcriber, TranscriptSegment};
    use crate::Result;

    /// Deterministic transcriber stub for tests.
    #[derive(Debug, Default)]
    pub struct MockTranscriber {
        pub segments: Vec<TranscriptSegment>,
        pub language: Option<String>,
    }

    impl Transcriber for MockTranscriber {
        async fn transcribe(
            &self,
            _wav: &[u8],
        ) -> Result<(Vec<TranscriptSegment>, Option<String>)> {
            Ok((self.segments.clone(), self.language.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::MockTranscriber;
    use super::*;

    #[tokio::test]
    async fn passes_through_segments_and_language() {
        let t = MockTranscriber {
            segments: vec![TranscriptSegment { start_time: 0.0, end_time: 1.5, text: "hi".into() }],
            language: Some("en".into()),
        };
        let (segments, lang) = t.transcribe(&[0u8; 4]).await.unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(lang.as_deref(), Some("en"));
    }
}
