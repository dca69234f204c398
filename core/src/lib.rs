//! Shared domain types, capability traits, and error kinds for
//! `local-doc-search`.
//!
//! This crate has no opinions about storage, chunking, or scheduling — it
//! only defines the vocabulary every other crate in the workspace shares:
//!
//! - [`MediaType`]: the four media classes the system understands.
//! - [`EmbeddingModel`], [`VlmModel`], [`Transcriber`]: capability traits
//!   implemented by whatever local model runtime is wired in at the edges.
//! - [`Error`]/[`Result`]: the crate-wide error taxonomy from the error
//!   handling design, shared so the engine and API layer can match on
//!   error *kind* regardless of which crate raised it.

mod embedding;
mod error;
mod media;
mod transcribe;
mod vlm;

pub use embedding::{Embedding, EmbeddingModel};
pub use error::{Error, Result};
pub use media::MediaType;
pub use transcribe::{TranscriptSegment, Transcriber};
pub use vlm::VlmModel;
