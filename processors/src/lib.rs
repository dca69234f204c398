//! Media processors (§4.3): one pipeline per [`localdoc_core::MediaType`],
//! dispatched through a [`ProcessorRegistry`] so the scheduler never
//! matches on media type itself.
//!
//! - [`document`]: PDF (via [`localdoc_pdf`]), Office formats (zip+XML
//!   text pulls), Markdown/plain text (direct UTF-8 read).
//! - [`image`]: a single VLM describe call plus pixel dimensions.
//! - [`audio`]: transcription into time-located text segments.
//! - [`video`]: `ffmpeg` audio-track extraction, then the audio path.

pub mod audio;
pub mod document;
pub mod error;
pub mod image;
pub mod registry;
pub mod video;

pub use audio::AudioPipeline;
pub use document::DocumentPipeline;
pub use error::{ProcessorError, Result};
pub use image::ImagePipeline;
pub use registry::{MediaPipeline, ProcessedMedia, ProcessorRegistry};
pub use video::VideoPipeline;
