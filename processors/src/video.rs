//! Video pipeline (§4.3): video is "processed via its extracted audio
//! track" — `ffmpeg` transcodes the source to mono 16 kHz WAV, then
//! the result is handed to the same transcription path the audio
//! pipeline uses.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use tokio::process::Command;

use localdoc_core::{MediaType, Transcriber};

use crate::audio::AudioPipeline;
use crate::error::{ProcessorError, Result};
use crate::registry::{MediaPipeline, ProcessedMedia};

/// Video pipeline: delegates transcription to an inner
/// [`AudioPipeline`] after extracting the audio track to WAV.
pub struct VideoPipeline<T> {
    audio: AudioPipeline<T>,
    ffmpeg_path: String,
}

impl<T: Transcriber> VideoPipeline<T> {
    /// Builds a video pipeline that shells out to `ffmpeg` (resolved
    /// from `PATH` unless `ffmpeg_path` names an explicit binary) to
    /// extract the audio track before transcribing it.
    #[must_use]
    pub fn new(transcriber: T, ffmpeg_path: impl Into<String>) -> Self {
        Self { audio: AudioPipeline::new(transcriber), ffmpeg_path: ffmpeg_path.into() }
    }
}

/// Invokes `ffmpeg` to transcode `path` into mono 16 kHz PCM WAV
/// bytes written to stdout, never touching disk for the intermediate
/// file.
async fn extract_wav_track(ffmpeg_path: &str, path: &Path) -> Result<Vec<u8>> {
    let output = Command::new(ffmpeg_path)
        .arg("-i")
        .arg(path)
        .args(["-vn", "-ac", "1", "-ar", "16000", "-f", "wav", "-"])
        .output()
        .await
        .map_err(|e| ProcessorError::Ffmpeg(format!("failed to spawn {ffmpeg_path}: {e}")))?;

    if !output.status.success() {
        return Err(ProcessorError::Ffmpeg(format!(
            "ffmpeg exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    Ok(output.stdout)
}

impl<T: Transcriber + Send + Sync> MediaPipeline for VideoPipeline<T> {
    fn can_process(&self, media_type: MediaType) -> bool {
        media_type == MediaType::Video
    }

    fn process<'a>(
        &'a self,
        path: &'a Path,
        document_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ProcessedMedia>> + Send + 'a>> {
        Box::pin(async move {
            let wav = extract_wav_track(&self.ffmpeg_path, path).await?;
            // Pixel dimensions are not probed here: doing so needs a
            // second ffprobe round-trip the component contract never
            // asked for; Document.width/height simply stay unset for
            // video documents.
            self.audio.process_wav(document_id, &wav).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use localdoc_core::Result as CoreResult;
    use localdoc_core::TranscriptSegment;

    #[derive(Debug, Default)]
    struct FixedTranscriber;

    impl Transcriber for FixedTranscriber {
        async fn transcribe(&self, _wav: &[u8]) -> CoreResult<(Vec<TranscriptSegment>, Option<String>)> {
            Ok((vec![TranscriptSegment { start_time: 0.0, end_time: 1.0, text: "hi".into() }], None))
        }
    }

    #[tokio::test]
    async fn missing_ffmpeg_binary_errors_cleanly() {
        let pipeline = VideoPipeline::new(FixedTranscriber, "definitely-not-a-real-binary-xyz");
        let result = pipeline.process(Path::new("/nonexistent.mp4"), "d1").await;
        assert!(matches!(result, Err(ProcessorError::Ffmpeg(_))));
    }
}
