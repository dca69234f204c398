//! Localhost-only HTTP API (§6): the same surface the browser UI and OS
//! launcher call into, expressed as a thin `axum` router over
//! [`CoreContext`].
//!
//! Grounded on the retrieval pack's own `axum` service: a `Router` built
//! from a shared `Arc<State>`, and a single `thiserror` error type that
//! implements [`IntoResponse`] once so every handler can just use `?`.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use localdoc_core::{Error as CoreError, MediaType};
use localdoc_engine::CoreContext;
use localdoc_index::search::{SearchFilters, SearchResult};

use crate::actions;

/// Builds the full API router, bound to a shared [`CoreContext`].
pub fn router(context: Arc<CoreContext>) -> Router {
    Router::new()
        .route("/api/search", get(search))
        .route("/api/documents/index", post(index_path))
        .route("/api/documents/stats", get(document_stats))
        .route("/api/documents/directories", get(directories))
        .route("/api/documents", get(recent_documents))
        .route("/api/actions/open", post(open_action))
        .route("/api/actions/reveal", post(reveal_action))
        .with_state(context)
}

/// A wire-level wrapper around [`CoreError`] that maps each kind to an
/// HTTP status and the `{error: {kind, message, retryable}}` body (§7).
struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoreError::ConfigInvalid(_) => StatusCode::BAD_REQUEST,
            CoreError::ModelUnavailable(_) | CoreError::ModelTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::ModelShapeMismatch { .. } | CoreError::StoreCorruption(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            CoreError::QueueFull { .. } => StatusCode::TOO_MANY_REQUESTS,
            CoreError::Io { .. } | CoreError::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CoreError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = Json(serde_json::json!({
            "error": {
                "kind": self.0.kind(),
                "message": self.0.to_string(),
                "retryable": self.0.retryable(),
            }
        }));
        (status, body).into_response()
    }
}

/// A search hit enriched with the owning document's path/filename, the
/// shape the HTTP API and `--json` CLI output share.
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchHit {
    /// The matched chunk's id.
    pub chunk_id: String,
    /// The owning document's id.
    pub document_id: String,
    /// Matched chunk text.
    pub text: String,
    /// Absolute path of the owning document, if it could still be
    /// resolved (it may have been tombstoned between index and read).
    pub path: Option<String>,
    /// File name of the owning document.
    pub filename: Option<String>,
    /// Media type of the owning document.
    pub media_type: Option<MediaType>,
    /// Final fusion (or rerank) score.
    pub score: f32,
    /// Start time in seconds, for audio/video chunks.
    pub start_time: Option<f64>,
    /// End time in seconds, for audio/video chunks.
    pub end_time: Option<f64>,
    /// Page number, for document chunks.
    pub page: Option<u32>,
    /// `file://` playback URL with a time fragment, for timed chunks.
    pub playback_url: Option<String>,
}

/// Enriches a raw [`SearchResult`] with its owning document's
/// path/filename/media type, best-effort: a lookup miss just leaves
/// those fields `None` rather than failing the whole response.
pub fn to_search_hit(context: &CoreContext, result: &SearchResult) -> SearchHit {
    let document = context.store().get_document(&result.chunk.document_id).ok().flatten();
    let playback_url = document.as_ref().and_then(|doc| result.chunk.playback_url(&doc.path));
    SearchHit {
        chunk_id: result.chunk.id.clone(),
        document_id: result.chunk.document_id.clone(),
        text: result.chunk.text.clone(),
        path: document.as_ref().map(|d| d.path.display().to_string()),
        filename: document.as_ref().map(|d| d.filename.clone()),
        media_type: document.as_ref().map(|d| d.media_type),
        score: result.score,
        start_time: result.chunk.start_time,
        end_time: result.chunk.end_time,
        page: result.chunk.page,
        playback_url,
    }
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: String,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default, rename = "type")]
    media_type: Option<String>,
}

const fn default_limit() -> usize {
    10
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    results: Vec<SearchHit>,
    total: usize,
}

async fn search(
    State(context): State<Arc<CoreContext>>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    let mut filters = SearchFilters::default();
    if let Some(raw) = &params.media_type {
        filters.media_type.push(parse_media_type(raw)?);
    }
    let results = context.search(&params.q, params.limit, filters).await?;
    let hits: Vec<SearchHit> = results.iter().map(|r| to_search_hit(&context, r)).collect();
    Ok(Json(SearchResponse { total: hits.len(), results: hits }))
}

fn parse_media_type(raw: &str) -> Result<MediaType, CoreError> {
    match raw.to_ascii_lowercase().as_str() {
        "document" | "doc" => Ok(MediaType::Document),
        "image" => Ok(MediaType::Image),
        "audio" => Ok(MediaType::Audio),
        "video" => Ok(MediaType::Video),
        other => Err(CoreError::ConfigInvalid(format!("unknown media type {other:?}"))),
    }
}

#[derive(Debug, Deserialize)]
struct IndexRequest {
    path: std::path::PathBuf,
    #[serde(default)]
    recursive: bool,
}

#[derive(Debug, Serialize)]
struct IndexResponse {
    indexed_count: usize,
    paths: Vec<String>,
}

async fn index_path(
    State(context): State<Arc<CoreContext>>,
    Json(request): Json<IndexRequest>,
) -> Result<Json<IndexResponse>, ApiError> {
    let files = context.index_directory(&request.path, request.recursive).await?;
    let paths = files.iter().map(|p| p.display().to_string()).collect();
    Ok(Json(IndexResponse { indexed_count: files.len(), paths }))
}

async fn document_stats(
    State(context): State<Arc<CoreContext>>,
) -> Result<Json<localdoc_index::DocumentStats>, ApiError> {
    Ok(Json(context.document_stats()?))
}

async fn directories(
    State(context): State<Arc<CoreContext>>,
) -> Result<Json<Vec<localdoc_index::DirectoryStats>>, ApiError> {
    Ok(Json(context.directories()?))
}

#[derive(Debug, Deserialize)]
struct RecentQuery {
    #[serde(default = "default_recent_limit")]
    limit: usize,
}

const fn default_recent_limit() -> usize {
    50
}

async fn recent_documents(
    State(context): State<Arc<CoreContext>>,
    Query(params): Query<RecentQuery>,
) -> Result<Json<Vec<localdoc_index::Document>>, ApiError> {
    Ok(Json(context.recent_documents(params.limit)?))
}

#[derive(Debug, Deserialize)]
struct OpenRequest {
    path: std::path::PathBuf,
    #[serde(default)]
    start_time: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RevealRequest {
    path: std::path::PathBuf,
}

#[derive(Debug, Serialize)]
struct ActionResponse {
    ok: bool,
}

async fn open_action(Json(request): Json<OpenRequest>) -> Result<Json<ActionResponse>, ApiError> {
    actions::open(&request.path, request.start_time)?;
    Ok(Json(ActionResponse { ok: true }))
}

async fn reveal_action(Json(request): Json<RevealRequest>) -> Result<Json<ActionResponse>, ApiError> {
    actions::reveal(&request.path)?;
    Ok(Json(ActionResponse { ok: true }))
}
