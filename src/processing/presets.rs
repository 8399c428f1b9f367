//! Per-run processing configuration and the named presets callers pick from.
//!
//! A [`ProcessingConfig`] is selected before a run and passed by value through the pipeline; no
//! stage reads process-wide state, so concurrent runs with different presets stay isolated.

use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// How the chunker cuts a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkingMode {
    /// Fixed-size windows broken at word boundaries.
    Fixed,
    /// One chunk per blank-line paragraph when the document's structure allows it.
    Paragraph,
    /// Sized from the target model's context window.
    ModelAware,
}

/// Chunking parameters for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkingOptions {
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Overlap in characters (applied by the paragraph mode only).
    pub overlap: usize,
    /// Hard cap on the number of chunks.
    pub max_chunks: Option<usize>,
    /// Allow concurrent extraction within a batch.
    pub parallel_processing: bool,
    /// Chunks per concurrent batch.
    pub batch_size: usize,
    /// Splitting strategy.
    pub mode: ChunkingMode,
}

impl ChunkingOptions {
    /// Aggressive variant used when these options fail to chunk: large fixed-size chunks, no
    /// overlap, few chunks. Parallelism and batch size are kept.
    pub fn aggressive_fallback(&self) -> Self {
        Self {
            chunk_size: 20_000,
            overlap: 0,
            max_chunks: Some(5),
            mode: ChunkingMode::Fixed,
            ..self.clone()
        }
    }
}

/// Fixed delays inserted between backend calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Delay before each chunk in sequential mode.
    pub chunk_delay: Duration,
    /// Delay between batches in parallel mode.
    pub batch_delay: Duration,
    /// Delay between retry attempts.
    pub retry_delay: Duration,
}

impl Pacing {
    /// No delays at all.
    pub const fn immediate() -> Self {
        Self {
            chunk_delay: Duration::ZERO,
            batch_delay: Duration::ZERO,
            retry_delay: Duration::ZERO,
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            chunk_delay: Duration::from_millis(100),
            batch_delay: Duration::from_millis(250),
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Everything a summarization run needs to know about how to process a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingConfig {
    /// Chunking parameters.
    pub chunking: ChunkingOptions,
    /// Allow concurrent fact extraction.
    pub enable_parallel_fact_extraction: bool,
    /// Timeout applied to each extraction call.
    pub fact_extraction_timeout: Duration,
    /// Retries after the first failed extraction attempt.
    pub max_retries: u32,
    /// Produce the unstyled raw summary on the standard path.
    pub include_raw_summary: bool,
    /// Fixed delays between calls.
    pub pacing: Pacing,
}

impl ProcessingConfig {
    /// Configuration for a named preset.
    pub fn from_preset(preset: ProcessingPreset) -> Self {
        match preset {
            ProcessingPreset::UltraFast => Self {
                chunking: ChunkingOptions {
                    chunk_size: 60_000,
                    overlap: 0,
                    max_chunks: Some(3),
                    parallel_processing: true,
                    batch_size: 3,
                    mode: ChunkingMode::ModelAware,
                },
                enable_parallel_fact_extraction: true,
                fact_extraction_timeout: Duration::from_secs(45),
                max_retries: 1,
                include_raw_summary: false,
                pacing: Pacing::default(),
            },
            ProcessingPreset::Fast => Self {
                chunking: ChunkingOptions {
                    chunk_size: 50_000,
                    overlap: 200,
                    max_chunks: Some(5),
                    parallel_processing: true,
                    batch_size: 3,
                    mode: ChunkingMode::ModelAware,
                },
                enable_parallel_fact_extraction: true,
                fact_extraction_timeout: Duration::from_secs(60),
                max_retries: 2,
                include_raw_summary: false,
                pacing: Pacing::default(),
            },
            ProcessingPreset::Balanced => Self {
                chunking: ChunkingOptions {
                    chunk_size: 30_000,
                    overlap: 500,
                    max_chunks: None,
                    parallel_processing: true,
                    batch_size: 2,
                    mode: ChunkingMode::Fixed,
                },
                enable_parallel_fact_extraction: true,
                fact_extraction_timeout: Duration::from_secs(90),
                max_retries: 2,
                include_raw_summary: true,
                pacing: Pacing::default(),
            },
            ProcessingPreset::Quality => Self {
                chunking: ChunkingOptions {
                    chunk_size: 8_000,
                    overlap: 800,
                    max_chunks: None,
                    parallel_processing: false,
                    batch_size: 1,
                    mode: ChunkingMode::Paragraph,
                },
                enable_parallel_fact_extraction: false,
                fact_extraction_timeout: Duration::from_secs(120),
                max_retries: 3,
                include_raw_summary: true,
                pacing: Pacing::default(),
            },
        }
    }

    /// Replace the pacing delays.
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Whether chunks are extracted in concurrent batches.
    pub fn runs_in_parallel(&self) -> bool {
        self.chunking.parallel_processing && self.enable_parallel_fact_extraction
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self::from_preset(ProcessingPreset::default())
    }
}

/// Named processing presets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingPreset {
    /// Fewest backend calls; skips the raw summary.
    UltraFast,
    /// Few backend calls; skips the raw summary.
    Fast,
    /// Default trade-off.
    #[default]
    Balanced,
    /// Small paragraph-aligned chunks processed one at a time.
    Quality,
}

impl fmt::Display for ProcessingPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::UltraFast => "ultra-fast",
            Self::Fast => "fast",
            Self::Balanced => "balanced",
            Self::Quality => "quality",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for ProcessingPreset {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "ultra-fast" | "ultrafast" => Ok(Self::UltraFast),
            "fast" => Ok(Self::Fast),
            "balanced" => Ok(Self::Balanced),
            "quality" => Ok(Self::Quality),
            _ => Err(()),
        }
    }
}
