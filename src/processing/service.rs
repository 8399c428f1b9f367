//! Orchestrator coordinating chunking, path selection, extraction, merging and rendering.

use crate::{
    backend::{ChatBackend, OllamaBackend},
    config::Config,
    metrics::{MetricsSnapshot, PipelineMetrics},
    processing::{
        chunking::{chunk_document, context_window_for_model},
        combine::{COMBINE_TARGET_CHARS, combine_chunks, should_combine},
        extraction::process_chunks,
        merge::merge_facts,
        path::select_path,
        presets::{ProcessingConfig, ProcessingPreset},
        progress::{CancelHandle, Progress},
        prompts::describe_facts,
        render::{RenderedSummary, SummaryRenderer},
        sanitize::sanitize_style,
        types::{
            ChunkFacts, Document, FactSet, ProcessingStats, SummarizationResult, SummarizeError,
            StyleGuide, TextChunk,
        },
    },
    store::{InMemoryResultStore, ResultStore},
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Fallback label: the requested chunking failed and the aggressive configuration was used.
pub const FALLBACK_AGGRESSIVE_CHUNKING: &str = "aggressive-chunking";
/// Fallback label: the fast path failed and the standard path produced the result.
pub const FALLBACK_FAST_PATH_FAILED: &str = "fast-path-failed";
/// Fallback label: the combined reply was rejected and two calls were made.
pub const FALLBACK_TWO_CALL_RENDER: &str = "two-call-render";
/// Fallback label: the styled call failed and the summary was assembled locally.
pub const FALLBACK_LOCAL_STYLED_SUMMARY: &str = "local-styled-summary";

/// Per-run inputs besides the document itself.
#[derive(Debug, Clone, Default)]
pub struct SummarizeOptions {
    /// Voice of the styled summary.
    pub style: StyleGuide,
    /// Model whose context window drives chunking and path selection. Defaults to the backend's.
    pub target_model: Option<String>,
    /// Processing configuration for this run.
    pub config: ProcessingConfig,
    /// Progress observer.
    pub progress: Progress,
    /// Cancellation flag.
    pub cancel: CancelHandle,
}

impl SummarizeOptions {
    /// Options for `config` with a neutral style and no observers.
    pub fn new(config: ProcessingConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Set the style guide.
    pub fn with_style(mut self, style: StyleGuide) -> Self {
        self.style = style;
        self
    }

    /// Set the target model used for context-window lookups.
    pub fn with_target_model(mut self, model: impl Into<String>) -> Self {
        self.target_model = Some(model.into());
        self
    }

    /// Set the progress observer.
    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    /// Set the cancellation flag.
    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Runs the summarization pipeline and persists its results.
///
/// The service owns long-lived handles to the backend, the result store and the metrics registry
/// so that the HTTP surface and the CLI share the same components. Construct it once and share it
/// through an `Arc`.
pub struct SummarizationService {
    backend: Arc<dyn ChatBackend>,
    store: Arc<dyn ResultStore>,
    metrics: Arc<PipelineMetrics>,
    defaults: Config,
    regeneration_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

/// Abstraction over the pipeline used by external surfaces (HTTP, CLI).
#[async_trait]
pub trait SummarizationApi: Send + Sync {
    /// Summarize a document and store the result under its identifier.
    async fn summarize(
        &self,
        document: Document,
        options: SummarizeOptions,
    ) -> Result<SummarizationResult, SummarizeError>;

    /// Regenerate the styled summary of a stored result.
    async fn regenerate(
        &self,
        id: &str,
        style: Option<StyleGuide>,
    ) -> Result<SummarizationResult, SummarizeError>;

    /// Fetch a stored result.
    async fn get_summary(&self, id: &str) -> Result<SummarizationResult, SummarizeError>;

    /// Delete a stored result.
    async fn delete_summary(&self, id: &str) -> Result<(), SummarizeError>;

    /// Whether the generation backend answers its health probe.
    async fn backend_available(&self) -> bool;

    /// Processing configuration for a preset, with configured overrides applied.
    fn processing_config(&self, preset: Option<ProcessingPreset>) -> ProcessingConfig;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl SummarizationService {
    /// Build a service over explicit collaborators, using default process settings.
    pub fn new(backend: Arc<dyn ChatBackend>, store: Arc<dyn ResultStore>) -> Self {
        Self {
            backend,
            store,
            metrics: Arc::new(PipelineMetrics::new()),
            defaults: Config::default(),
            regeneration_locks: Mutex::default(),
        }
    }

    /// Build a service talking to the configured Ollama runtime, with an in-memory store.
    pub fn from_config(config: &Config) -> Self {
        tracing::info!(
            ollama_url = %config.ollama_url,
            model = %config.generation_model,
            "Initializing generation backend"
        );
        let backend = OllamaBackend::new(config.ollama_url.clone(), config.generation_model.clone());
        Self {
            backend: Arc::new(backend),
            store: Arc::new(InMemoryResultStore::new()),
            metrics: Arc::new(PipelineMetrics::new()),
            defaults: config.clone(),
            regeneration_locks: Mutex::default(),
        }
    }

    /// Model identifier every backend call is served by.
    pub fn model(&self) -> &str {
        self.backend.model()
    }

    /// Summarize `document`.
    ///
    /// Only unrecoverable failures are returned: chunking that fails with the fallback
    /// configuration too, a failed raw summary, or cancellation. Degraded outcomes (failed chunks,
    /// local fallback summaries) are reported through [`ProcessingStats`].
    pub async fn summarize(
        &self,
        document: Document,
        options: SummarizeOptions,
    ) -> Result<SummarizationResult, SummarizeError> {
        let started = Instant::now();
        let SummarizeOptions {
            style,
            target_model,
            mut config,
            progress,
            cancel,
        } = options;
        let style = sanitize_style(&style);
        let target_model = target_model.unwrap_or_else(|| self.backend.model().to_string());

        tracing::info!(
            document_id = %document.id,
            title = %document.title,
            chars = document.char_len(),
            target_model = %target_model,
            "Starting summarization"
        );
        progress.report(0, Some("Starting summarization"));
        ensure_not_cancelled(&cancel)?;

        progress.report(5, Some("Chunking document"));
        let mut fallbacks = Vec::new();
        let chunks = chunk_with_fallback(&document, &mut config, &target_model, &mut fallbacks)?;
        let status = format!("Document split into {} chunk(s)", chunks.len());
        progress.report(10, Some(status.as_str()));

        let decision = select_path(
            document.char_len(),
            chunks.len(),
            context_window_for_model(&target_model),
        );
        if decision.fast_path {
            ensure_not_cancelled(&cancel)?;
            progress.report(20, Some("Generating summary in a single pass"));
            let renderer = SummaryRenderer::new(self.backend.as_ref());
            match renderer.render_combined(&document, &style).await {
                Ok(rendered) => {
                    let result =
                        self.fast_path_result(document, rendered, fallbacks, started);
                    return Ok(self.finish(result, &progress).await);
                }
                Err(error) => {
                    tracing::warn!(
                        document_id = %document.id,
                        error = %error,
                        "Fast path failed; falling back to standard processing"
                    );
                    fallbacks.push(FALLBACK_FAST_PATH_FAILED.to_string());
                    self.metrics.record_fast_path_fallback();
                    progress.report(15, Some("Fast path failed; continuing with standard processing"));
                }
            }
        }

        let result = self
            .standard_path(document, chunks, &style, &config, &progress, &cancel, fallbacks, started)
            .await?;
        Ok(self.finish(result, &progress).await)
    }

    #[allow(clippy::too_many_arguments)]
    async fn standard_path(
        &self,
        document: Document,
        chunks: Vec<TextChunk>,
        style: &StyleGuide,
        config: &ProcessingConfig,
        progress: &Progress,
        cancel: &CancelHandle,
        mut fallbacks: Vec<String>,
        started: Instant,
    ) -> Result<SummarizationResult, SummarizeError> {
        let chunks = if should_combine(chunks.len()) {
            tracing::info!(
                document_id = %document.id,
                chunks = chunks.len(),
                "Combining small chunks to reduce backend calls"
            );
            combine_chunks(chunks, COMBINE_TARGET_CHARS)
        } else {
            chunks
        };

        let chunk_facts = process_chunks(
            self.backend.as_ref(),
            &chunks,
            style,
            &document.id,
            config,
            progress,
            cancel,
        )
        .await?;
        ensure_not_cancelled(cancel)?;

        progress.report(75, Some("Merging extracted facts"));
        let merged_facts = merge_facts(&chunk_facts);

        let renderer = SummaryRenderer::new(self.backend.as_ref());
        let raw_summary = if config.include_raw_summary {
            progress.report(80, Some("Writing raw summary"));
            Some(renderer.render_raw_from_facts(&document, &merged_facts).await?)
        } else {
            None
        };

        progress.report(90, Some("Styling summary"));
        let (styled_summary, fell_back) = renderer
            .render_styled_or_fallback(raw_summary.as_deref(), &document, &merged_facts, style)
            .await;
        if fell_back {
            fallbacks.push(FALLBACK_LOCAL_STYLED_SUMMARY.to_string());
        }

        let processing_stats = self.stats_for(&chunk_facts, false, fallbacks, started);
        Ok(SummarizationResult {
            document,
            chunk_facts,
            merged_facts,
            raw_summary,
            styled_summary,
            processing_stats,
            regeneration_count: 0,
            created_at: now_rfc3339(),
            regenerated_at: None,
        })
    }

    fn fast_path_result(
        &self,
        document: Document,
        rendered: RenderedSummary,
        mut fallbacks: Vec<String>,
        started: Instant,
    ) -> SummarizationResult {
        if rendered.used_two_calls {
            fallbacks.push(FALLBACK_TWO_CALL_RENDER.to_string());
        }
        SummarizationResult {
            document,
            chunk_facts: Vec::new(),
            merged_facts: FactSet::default(),
            raw_summary: Some(rendered.raw_summary),
            styled_summary: rendered.styled_summary,
            processing_stats: ProcessingStats {
                total_chunks: 1,
                successful_chunks: 1,
                failed_chunks: 0,
                processing_time_ms: elapsed_ms(started),
                model_used: self.backend.model().to_string(),
                fast_path: true,
                fallbacks,
            },
            regeneration_count: 0,
            created_at: now_rfc3339(),
            regenerated_at: None,
        }
    }

    fn stats_for(
        &self,
        chunk_facts: &[ChunkFacts],
        fast_path: bool,
        fallbacks: Vec<String>,
        started: Instant,
    ) -> ProcessingStats {
        let successful_chunks = chunk_facts.iter().filter(|facts| facts.parse_success).count();
        ProcessingStats {
            total_chunks: chunk_facts.len(),
            successful_chunks,
            failed_chunks: chunk_facts.len() - successful_chunks,
            processing_time_ms: elapsed_ms(started),
            model_used: self.backend.model().to_string(),
            fast_path,
            fallbacks,
        }
    }

    async fn finish(&self, result: SummarizationResult, progress: &Progress) -> SummarizationResult {
        let stats = &result.processing_stats;
        self.metrics.record_run(
            stats.fast_path,
            stats.total_chunks as u64,
            stats.failed_chunks as u64,
        );
        self.persist(&result).await;
        progress.report(100, Some("Summary complete"));
        tracing::info!(
            document_id = %result.document.id,
            fast_path = stats.fast_path,
            total_chunks = stats.total_chunks,
            successful_chunks = stats.successful_chunks,
            failed_chunks = stats.failed_chunks,
            processing_time_ms = stats.processing_time_ms,
            fallbacks = ?stats.fallbacks,
            "Summarization complete"
        );
        result
    }

    async fn persist(&self, result: &SummarizationResult) {
        if let Err(error) = self.store.save(&result.document.id, result).await {
            tracing::warn!(
                document_id = %result.document.id,
                error = %error,
                "Failed to persist summarization result"
            );
        }
    }

    /// Produce a new styled summary for an existing result without re-running extraction.
    ///
    /// Regenerations of one document are serialized. When the store already holds a copy of
    /// `result`, that copy is the base, so concurrent callers get distinct, increasing
    /// `regeneration_count` values. The updated result is written back to the store.
    pub async fn regenerate(
        &self,
        result: &SummarizationResult,
        style: &StyleGuide,
    ) -> Result<SummarizationResult, SummarizeError> {
        let id = result.document.id.as_str();
        let lock = self.regeneration_lock(id).await;
        let outcome = {
            let _guard = lock.lock().await;
            match self.store.get(id).await {
                Ok(latest) => {
                    let base = latest.unwrap_or_else(|| result.clone());
                    self.regenerate_locked(&base, style).await
                }
                Err(error) => Err(error.into()),
            }
        };
        self.release_regeneration_lock(id, lock).await;
        outcome
    }

    /// Regenerate the stored result for `id`.
    pub async fn regenerate_by_id(
        &self,
        id: &str,
        style: &StyleGuide,
    ) -> Result<SummarizationResult, SummarizeError> {
        let lock = self.regeneration_lock(id).await;
        let outcome = {
            let _guard = lock.lock().await;
            match self.get_summary(id).await {
                Ok(stored) => self.regenerate_locked(&stored, style).await,
                Err(error) => Err(error),
            }
        };
        self.release_regeneration_lock(id, lock).await;
        outcome
    }

    async fn regenerate_locked(
        &self,
        result: &SummarizationResult,
        style: &StyleGuide,
    ) -> Result<SummarizationResult, SummarizeError> {
        let style = sanitize_style(style);
        let regeneration = result.regeneration_count + 1;
        let timestamp = now_rfc3339();
        let source = regeneration_source(result);

        tracing::info!(
            document_id = %result.document.id,
            regeneration,
            "Regenerating styled summary"
        );
        let styled_summary = SummaryRenderer::new(self.backend.as_ref())
            .regenerate_styled(&source, &style, regeneration, &timestamp)
            .await?;

        let mut updated = result.clone();
        updated.styled_summary = styled_summary;
        updated.regeneration_count = regeneration;
        updated.regenerated_at = Some(timestamp);

        self.metrics.record_regeneration();
        self.persist(&updated).await;
        Ok(updated)
    }

    async fn regeneration_lock(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.regeneration_locks.lock().await;
        Arc::clone(locks.entry(id.to_string()).or_default())
    }

    /// Drop the per-document lock once no other regeneration holds or waits on it.
    async fn release_regeneration_lock(&self, id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.regeneration_locks.lock().await;
        drop(lock);
        if locks.get(id).is_some_and(|entry| Arc::strong_count(entry) == 1) {
            locks.remove(id);
        }
    }

    /// Fetch the stored result for `id`.
    pub async fn get_summary(&self, id: &str) -> Result<SummarizationResult, SummarizeError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| SummarizeError::NotFound(id.to_string()))
    }

    /// Delete the stored result for `id`.
    pub async fn delete_summary(&self, id: &str) -> Result<(), SummarizeError> {
        if self.store.delete(id).await? {
            tracing::info!(document_id = id, "Deleted summarization result");
            Ok(())
        } else {
            Err(SummarizeError::NotFound(id.to_string()))
        }
    }

    /// Probe the generation backend.
    pub async fn backend_available(&self) -> bool {
        self.backend.is_available().await
    }

    /// Processing configuration for a preset, with configured overrides applied.
    pub fn processing_config(&self, preset: Option<ProcessingPreset>) -> ProcessingConfig {
        self.defaults.processing_config(preset)
    }

    /// Return the current pipeline metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

fn chunk_with_fallback(
    document: &Document,
    config: &mut ProcessingConfig,
    target_model: &str,
    fallbacks: &mut Vec<String>,
) -> Result<Vec<TextChunk>, SummarizeError> {
    let error = match chunk_document(document, &config.chunking, target_model) {
        Ok(chunks) if !chunks.is_empty() => return Ok(chunks),
        Ok(_) => "chunker produced no chunks".to_string(),
        Err(error) => error.to_string(),
    };

    tracing::warn!(
        document_id = %document.id,
        error = %error,
        "Chunking failed; retrying with the aggressive fallback configuration"
    );
    fallbacks.push(FALLBACK_AGGRESSIVE_CHUNKING.to_string());
    config.chunking = config.chunking.aggressive_fallback();

    chunk_document(document, &config.chunking, target_model).map_err(|error| {
        tracing::error!(
            document_id = %document.id,
            error = %error,
            "Fallback chunking failed"
        );
        SummarizeError::Chunking(error)
    })
}

fn regeneration_source(result: &SummarizationResult) -> String {
    match &result.raw_summary {
        Some(raw) => raw.clone(),
        None if result.merged_facts.is_empty() => result.styled_summary.clone(),
        None => format!(
            "{}\n\nFacts:\n{}",
            result.styled_summary,
            describe_facts(&result.merged_facts)
        ),
    }
}

fn ensure_not_cancelled(cancel: &CancelHandle) -> Result<(), SummarizeError> {
    if cancel.is_cancelled() {
        tracing::info!("Summarization cancelled");
        Err(SummarizeError::Cancelled)
    } else {
        Ok(())
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

#[async_trait]
impl SummarizationApi for SummarizationService {
    async fn summarize(
        &self,
        document: Document,
        options: SummarizeOptions,
    ) -> Result<SummarizationResult, SummarizeError> {
        SummarizationService::summarize(self, document, options).await
    }

    async fn regenerate(
        &self,
        id: &str,
        style: Option<StyleGuide>,
    ) -> Result<SummarizationResult, SummarizeError> {
        SummarizationService::regenerate_by_id(self, id, &style.unwrap_or_default()).await
    }

    async fn get_summary(&self, id: &str) -> Result<SummarizationResult, SummarizeError> {
        SummarizationService::get_summary(self, id).await
    }

    async fn delete_summary(&self, id: &str) -> Result<(), SummarizeError> {
        SummarizationService::delete_summary(self, id).await
    }

    async fn backend_available(&self) -> bool {
        SummarizationService::backend_available(self).await
    }

    fn processing_config(&self, preset: Option<ProcessingPreset>) -> ProcessingConfig {
        SummarizationService::processing_config(self, preset)
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        SummarizationService::metrics_snapshot(self)
    }
}
