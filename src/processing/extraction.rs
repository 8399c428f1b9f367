//! Chunk Processor: per-chunk fact extraction with bounded parallelism.
//!
//! Every chunk gets its own timeout and retry budget. A chunk that exhausts its retries is
//! recorded as failed and the run continues; only cancellation aborts the whole stage.

use futures_util::future::join_all;
use tokio::time::{sleep, timeout};

use crate::backend::ChatBackend;

use super::parse::parse_facts;
use super::presets::ProcessingConfig;
use super::progress::{CancelHandle, ChunkTracker, Progress};
use super::prompts;
use super::retry::{RetryPolicy, with_retry};
use super::types::{ChunkFacts, ExtractionError, FactSet, StyleGuide, SummarizeError, TextChunk};

/// First percentage reported by the extraction stage.
pub const EXTRACTION_PROGRESS_START: u32 = 15;
/// Percentage reported once every chunk has finished.
pub const EXTRACTION_PROGRESS_END: u32 = 70;

/// Extract facts from every chunk.
///
/// Results are returned in chunk order regardless of completion order. Runs in parallel batches
/// when [`ProcessingConfig::runs_in_parallel`] holds, sequentially otherwise.
pub async fn process_chunks(
    backend: &dyn ChatBackend,
    chunks: &[TextChunk],
    style: &StyleGuide,
    document_id: &str,
    config: &ProcessingConfig,
    progress: &Progress,
    cancel: &CancelHandle,
) -> Result<Vec<ChunkFacts>, SummarizeError> {
    let tracker = ChunkTracker::new(
        progress,
        chunks.len(),
        EXTRACTION_PROGRESS_START,
        EXTRACTION_PROGRESS_END,
    );
    let parallel = config.runs_in_parallel();
    tracing::info!(
        document_id,
        chunks = chunks.len(),
        parallel,
        batch_size = config.chunking.batch_size,
        "Starting fact extraction"
    );

    let mut results = if parallel {
        process_in_batches(backend, chunks, style, config, &tracker, cancel).await?
    } else {
        process_sequentially(backend, chunks, style, config, &tracker, cancel).await?
    };
    results.sort_by_key(|facts| facts.chunk_index);

    let failed = results.iter().filter(|facts| !facts.parse_success).count();
    tracing::info!(
        document_id,
        successful = results.len() - failed,
        failed,
        "Fact extraction finished"
    );
    Ok(results)
}

async fn process_sequentially(
    backend: &dyn ChatBackend,
    chunks: &[TextChunk],
    style: &StyleGuide,
    config: &ProcessingConfig,
    tracker: &ChunkTracker<'_>,
    cancel: &CancelHandle,
) -> Result<Vec<ChunkFacts>, SummarizeError> {
    let mut results = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        if cancel.is_cancelled() {
            tracing::info!(chunk_index = chunk.chunk_index, "Extraction cancelled");
            return Err(SummarizeError::Cancelled);
        }
        if !config.pacing.chunk_delay.is_zero() {
            sleep(config.pacing.chunk_delay).await;
        }
        tracker.started(chunk.chunk_index);
        let facts = extract_chunk(backend, chunk, chunks.len(), style, config).await;
        tracker.finished(chunk.chunk_index);
        results.push(facts);
    }
    Ok(results)
}

async fn process_in_batches(
    backend: &dyn ChatBackend,
    chunks: &[TextChunk],
    style: &StyleGuide,
    config: &ProcessingConfig,
    tracker: &ChunkTracker<'_>,
    cancel: &CancelHandle,
) -> Result<Vec<ChunkFacts>, SummarizeError> {
    let batch_size = config.chunking.batch_size.max(1);
    let mut results = Vec::with_capacity(chunks.len());

    for (batch_index, batch) in chunks.chunks(batch_size).enumerate() {
        if cancel.is_cancelled() {
            tracing::info!(batch_index, "Extraction cancelled");
            return Err(SummarizeError::Cancelled);
        }
        if batch_index > 0 && !config.pacing.batch_delay.is_zero() {
            sleep(config.pacing.batch_delay).await;
        }

        tracing::debug!(batch_index, batch_len = batch.len(), "Dispatching extraction batch");
        let futures = batch.iter().map(|chunk| async move {
            tracker.started(chunk.chunk_index);
            let facts = extract_chunk(backend, chunk, chunks.len(), style, config).await;
            tracker.finished(chunk.chunk_index);
            facts
        });
        results.extend(join_all(futures).await);
    }
    Ok(results)
}

/// Extract facts from one chunk, never failing: exhausted retries yield a failed record.
async fn extract_chunk(
    backend: &dyn ChatBackend,
    chunk: &TextChunk,
    total_chunks: usize,
    style: &StyleGuide,
    config: &ProcessingConfig,
) -> ChunkFacts {
    let prompt = prompts::fact_extraction(chunk, total_chunks, style);
    let messages = prompt.as_slice();
    let policy = RetryPolicy::from_retries(config.max_retries, config.pacing.retry_delay);
    let limit = config.fact_extraction_timeout;

    let outcome = with_retry(policy, "fact_extraction", move |attempt| async move {
        tracing::debug!(chunk_index = chunk.chunk_index, attempt, "Requesting fact extraction");
        let raw = match timeout(limit, backend.chat(messages)).await {
            Ok(reply) => reply?,
            Err(_) => return Err(ExtractionError::Timeout(limit)),
        };
        match parse_facts(&raw) {
            Ok(facts) => Ok((facts, raw)),
            Err(source) => Err(ExtractionError::Parse { source, raw }),
        }
    })
    .await;

    match outcome {
        Ok((facts, raw_response)) => ChunkFacts {
            chunk_id: chunk.id.clone(),
            chunk_index: chunk.chunk_index,
            facts,
            parse_success: true,
            raw_response,
            error: None,
        },
        Err(error) => {
            tracing::warn!(
                chunk_index = chunk.chunk_index,
                chunk_id = %chunk.id,
                error = %error,
                "Chunk extraction failed; continuing without its facts"
            );
            let raw_response = match &error {
                ExtractionError::Parse { raw, .. } => raw.clone(),
                _ => String::new(),
            };
            ChunkFacts {
                chunk_id: chunk.id.clone(),
                chunk_index: chunk.chunk_index,
                facts: FactSet::default(),
                parse_success: false,
                raw_response,
                error: Some(error.to_string()),
            }
        }
    }
}
