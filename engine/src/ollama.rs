//! Ollama-compatible model runtime clients (§6): thin `reqwest`
//! wrappers implementing `core::EmbeddingModel`/`core::VlmModel`/
//! `core::Transcriber` against the documented wire protocol.
//!
//! Grounded on the retrieval pack's own Ollama backend (a `reqwest::Client`
//! held behind the client struct, `.post(url).json(&req).send().await`,
//! a status check before decoding the body) — adapted here to the three
//! capability traits this system's processors and embedding gateway
//! depend on, with a per-call `tokio::time::timeout` instead of relying
//! on the transport's own deadline.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use localdoc_core::{Embedding, Error as CoreError, Result as CoreResult};
use localdoc_core::{EmbeddingModel, TranscriptSegment, Transcriber, VlmModel};

use crate::error::EngineError;

fn engine_to_core(err: EngineError) -> CoreError {
    err.into()
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

async fn post_json<R: Serialize, T: for<'de> Deserialize<'de>>(
    client: &reqwest::Client,
    url: &str,
    body: &R,
    timeout: Duration,
) -> Result<T, EngineError> {
    let send = client.post(url).json(body).send();
    let response = match tokio::time::timeout(timeout, send).await {
        Err(_elapsed) => return Err(EngineError::Timeout { url: url.to_string(), timeout }),
        Ok(Err(source)) => return Err(EngineError::Request { url: url.to_string(), source }),
        Ok(Ok(response)) => response,
    };

    if !response.status().is_success() {
        return Err(EngineError::Status { url: url.to_string(), status: response.status() });
    }

    response.json::<T>().await.map_err(|source| EngineError::Decode { url: url.to_string(), source })
}

/// Embeds text via an Ollama-compatible embedding endpoint
/// (`POST {host}/api/embeddings`).
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: reqwest::Client,
    host: String,
    model: String,
    dim: usize,
    timeout: Duration,
}

impl OllamaEmbedder {
    /// Builds an embedder bound to `host`, fixing the declared dimension
    /// at construction per the embedding capability's contract (the
    /// dimension is established once, not probed per call).
    #[must_use]
    pub fn new(client: reqwest::Client, host: impl Into<String>, model: impl Into<String>, dim: usize, timeout: Duration) -> Self {
        Self { client, host: host.into(), model: model.into(), dim, timeout }
    }
}

impl EmbeddingModel for OllamaEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str) -> CoreResult<Embedding> {
        let url = format!("{}/api/embeddings", self.host.trim_end_matches('/'));
        let request = EmbedRequest { model: &self.model, prompt: text };
        let decoded: EmbedResponse =
            post_json(&self.client, &url, &request, self.timeout).await.map_err(engine_to_core)?;

        if decoded.embedding.len() != self.dim {
            return Err(CoreError::ModelShapeMismatch { expected: self.dim, actual: decoded.embedding.len() });
        }
        Ok(decoded.embedding)
    }
}

/// Describes images via an Ollama-compatible generation endpoint
/// (`POST {host}/api/generate`), carrying the image as base64 per the
/// documented wire protocol.
#[derive(Debug, Clone)]
pub struct OllamaVlm {
    client: reqwest::Client,
    host: String,
    model: String,
    timeout: Duration,
}

impl OllamaVlm {
    /// Builds a VLM client bound to `host`.
    #[must_use]
    pub fn new(client: reqwest::Client, host: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self { client, host: host.into(), model: model.into(), timeout }
    }
}

impl VlmModel for OllamaVlm {
    async fn describe(&self, image: &[u8], prompt: &str) -> CoreResult<String> {
        let url = format!("{}/api/generate", self.host.trim_end_matches('/'));
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            images: vec![BASE64.encode(image)],
            stream: false,
        };
        let decoded: GenerateResponse =
            post_json(&self.client, &url, &request, self.timeout).await.map_err(engine_to_core)?;
        Ok(decoded.response)
    }
}

#[derive(Debug, Serialize)]
struct TranscribeRequest<'a> {
    model: &'a str,
    audio: String,
}

#[derive(Debug, Deserialize)]
struct TranscribeSegmentWire {
    start: f64,
    end: f64,
    text: String,
}

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    segments: Vec<TranscribeSegmentWire>,
    language: Option<String>,
}

/// Transcribes mono 16 kHz WAV audio via an Ollama-compatible
/// generation endpoint running a Whisper-family model
/// (`POST {host}/api/generate`, audio carried as base64 the same way
/// the VLM endpoint carries images).
#[derive(Debug, Clone)]
pub struct OllamaTranscriber {
    client: reqwest::Client,
    host: String,
    model: String,
    timeout: Duration,
}

impl OllamaTranscriber {
    /// Builds a transcriber bound to `host`.
    #[must_use]
    pub fn new(client: reqwest::Client, host: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self { client, host: host.into(), model: model.into(), timeout }
    }
}

impl Transcriber for OllamaTranscriber {
    async fn transcribe(&self, wav: &[u8]) -> CoreResult<(Vec<TranscriptSegment>, Option<String>)> {
        let url = format!("{}/api/transcribe", self.host.trim_end_matches('/'));
        let request = TranscribeRequest { model: &self.model, audio: BASE64.encode(wav) };
        let decoded: TranscribeResponse =
            post_json(&self.client, &url, &request, self.timeout).await.map_err(engine_to_core)?;

        let segments = decoded
            .segments
            .into_iter()
            .map(|s| TranscriptSegment { start_time: s.start, end_time: s.end, text: s.text })
            .collect();
        Ok((segments, decoded.language))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn embed_parses_fixed_dimension_vector() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embedding": vec![0.1_f32; 4],
            })))
            .mount(&server)
            .await;

        let embedder = OllamaEmbedder::new(
            reqwest::Client::new(),
            server.uri(),
            "nomic-embed-text",
            4,
            Duration::from_secs(5),
        );
        let v = embedder.embed("hello").await.unwrap();
        assert_eq!(v.len(), 4);
    }

    #[tokio::test]
    async fn embed_rejects_dimension_drift() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embedding": vec![0.1_f32; 3],
            })))
            .mount(&server)
            .await;

        let embedder = OllamaEmbedder::new(
            reqwest::Client::new(),
            server.uri(),
            "nomic-embed-text",
            4,
            Duration::from_secs(5),
        );
        let err = embedder.embed("hello").await.unwrap_err();
        assert!(matches!(err, CoreError::ModelShapeMismatch { expected: 4, actual: 3 }));
    }

    #[tokio::test]
    async fn describe_sends_base64_image_and_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": "a chart showing quarterly revenue",
            })))
            .mount(&server)
            .await;

        let vlm = OllamaVlm::new(reqwest::Client::new(), server.uri(), "llava", Duration::from_secs(5));
        let text = vlm.describe(b"\x89PNG", "describe this page").await.unwrap();
        assert_eq!(text, "a chart showing quarterly revenue");
    }

    #[tokio::test]
    async fn unreachable_host_surfaces_model_unavailable() {
        let embedder = OllamaEmbedder::new(
            reqwest::Client::new(),
            "http://127.0.0.1:1",
            "nomic-embed-text",
            4,
            Duration::from_secs(1),
        );
        let err = embedder.embed("hello").await.unwrap_err();
        assert!(matches!(err, CoreError::ModelUnavailable(_)));
    }
}
