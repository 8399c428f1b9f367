//! HTTP surface for Rusty Digest.
//!
//! This module exposes a compact Axum router with a handful of endpoints:
//!
//! - `POST /summarize` – Chunk, extract, merge and render a document. Accepts `title`, `text` and
//!   optional `model` (context-window lookup), `preset` and `style`; returns the full
//!   `SummarizationResult`.
//! - `GET /summaries/:id` – Fetch a stored result by document id.
//! - `DELETE /summaries/:id` – Remove a stored result.
//! - `POST /summaries/:id/regenerate` – Produce a dramatically different styled summary without
//!   re-running extraction.
//! - `GET /metrics` – Observe pipeline counters.
//! - `GET /health` – Probe the generation backend.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.

use crate::metrics::MetricsSnapshot;
use crate::processing::{
    ChunkingError, Document, ProcessingPreset, StyleGuide, SummarizationApi, SummarizationResult,
    SummarizeError, SummarizeOptions,
};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

const DEFAULT_TITLE: &str = "Untitled document";

/// Build the HTTP router exposing the summarization API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: SummarizationApi + 'static,
{
    Router::new()
        .route("/summarize", post(summarize_document::<S>))
        .route(
            "/summaries/:id",
            get(get_summary::<S>).delete(delete_summary::<S>),
        )
        .route("/summaries/:id/regenerate", post(regenerate_summary::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/health", get(get_health::<S>))
        .route("/commands", get(get_commands))
        .with_state(service)
}

/// Request body for the `POST /summarize` endpoint.
#[derive(Deserialize)]
struct SummarizeRequest {
    /// Raw document contents.
    text: String,
    /// Optional human-readable title.
    #[serde(default)]
    title: Option<String>,
    /// Optional model identifier used for context-window lookups.
    #[serde(default)]
    model: Option<String>,
    /// Optional processing preset (defaults to `PROCESSING_PRESET`).
    #[serde(default)]
    preset: Option<ProcessingPreset>,
    /// Optional style guide for the styled summary.
    #[serde(default)]
    style: Option<StyleGuide>,
}

/// Summarize a document.
async fn summarize_document<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<SummarizeRequest>,
) -> Result<Json<SummarizationResult>, AppError>
where
    S: SummarizationApi,
{
    let SummarizeRequest {
        text,
        title,
        model,
        preset,
        style,
    } = request;
    let document = Document::new(title.unwrap_or_else(|| DEFAULT_TITLE.to_string()), text);
    let mut options = SummarizeOptions::new(service.processing_config(preset))
        .with_style(style.unwrap_or_default());
    if let Some(model) = model {
        options = options.with_target_model(model);
    }

    let result = service.summarize(document, options).await?;
    tracing::info!(
        document_id = %result.document.id,
        chunks = result.processing_stats.total_chunks,
        failed_chunks = result.processing_stats.failed_chunks,
        fast_path = result.processing_stats.fast_path,
        "Summarize request completed"
    );
    Ok(Json(result))
}

/// Fetch a stored result.
async fn get_summary<S>(
    State(service): State<Arc<S>>,
    Path(id): Path<String>,
) -> Result<Json<SummarizationResult>, AppError>
where
    S: SummarizationApi,
{
    Ok(Json(service.get_summary(&id).await?))
}

/// Delete a stored result.
async fn delete_summary<S>(
    State(service): State<Arc<S>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError>
where
    S: SummarizationApi,
{
    service.delete_summary(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Request body for `POST /summaries/:id/regenerate`.
#[derive(Deserialize, Default)]
struct RegenerateRequest {
    /// Optional replacement style guide.
    #[serde(default)]
    style: Option<StyleGuide>,
}

/// Regenerate the styled summary of a stored result.
async fn regenerate_summary<S>(
    State(service): State<Arc<S>>,
    Path(id): Path<String>,
    Json(request): Json<RegenerateRequest>,
) -> Result<Json<SummarizationResult>, AppError>
where
    S: SummarizationApi,
{
    let result = service.regenerate(&id, request.style).await?;
    tracing::info!(
        document_id = %id,
        regeneration = result.regeneration_count,
        "Regenerate request completed"
    );
    Ok(Json(result))
}

/// Return the pipeline counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: SummarizationApi,
{
    Json(service.metrics_snapshot())
}

/// Response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    backend_available: bool,
}

/// Report whether the generation backend is reachable.
async fn get_health<S>(State(service): State<Arc<S>>) -> Json<HealthResponse>
where
    S: SummarizationApi,
{
    let backend_available = service.backend_available().await;
    Json(HealthResponse {
        status: if backend_available { "ok" } else { "degraded" },
        backend_available,
    })
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "summarize",
                method: "POST",
                path: "/summarize",
                description: "Chunk a document, extract facts per chunk, merge them and render raw and styled summaries. Returns the full result, stored under its document id.",
                request_example: Some(json!({
                    "title": "Ownership in Rust",
                    "text": "Document contents",
                    "model": "llama3.1",
                    "preset": "balanced",
                    "style": {
                        "formality": 30,
                        "enthusiasm": 70,
                        "technicality": 60,
                        "keywords": ["borrow checker"]
                    }
                })),
            },
            CommandDescriptor {
                name: "get_summary",
                method: "GET",
                path: "/summaries/:id",
                description: "Return a stored summarization result.",
                request_example: None,
            },
            CommandDescriptor {
                name: "delete_summary",
                method: "DELETE",
                path: "/summaries/:id",
                description: "Remove a stored summarization result.",
                request_example: None,
            },
            CommandDescriptor {
                name: "regenerate",
                method: "POST",
                path: "/summaries/:id/regenerate",
                description: "Rewrite the styled summary of a stored result without re-running extraction.",
                request_example: Some(json!({ "style": { "formality": 90 } })),
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return pipeline counters useful for observability dashboards.",
                request_example: None,
            },
            CommandDescriptor {
                name: "health",
                method: "GET",
                path: "/health",
                description: "Probe the generation backend.",
                request_example: None,
            },
        ],
    })
}

struct AppError(SummarizeError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            SummarizeError::NotFound(_) => StatusCode::NOT_FOUND,
            SummarizeError::Chunking(ChunkingError::EmptyText) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        (status, self.0.to_string()).into_response()
    }
}

impl From<SummarizeError> for AppError {
    fn from(inner: SummarizeError) -> Self {
        Self(inner)
    }
}
