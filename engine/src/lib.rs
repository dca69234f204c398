//! Composition root for `local-doc-search` (§9 design note: `CoreContext`
//! replaces global mutable state).
//!
//! - [`config`]: environment-variable configuration (§6).
//! - [`ollama`]: Ollama-compatible embedding/VLM/transcription clients.
//! - [`context`]: [`CoreContext`], wiring the watcher, scheduler,
//!   processor registry, and dual-index store around one set of model
//!   clients, plus the entry points the CLI and HTTP surface call into.

pub mod config;
pub mod context;
pub mod error;
pub mod ollama;

pub use config::{Config, PdfConfig};
pub use context::CoreContext;
pub use error::{EngineError, Result};
pub use ollama::{OllamaEmbedder, OllamaTranscriber, OllamaVlm};
