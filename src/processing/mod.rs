//! Document summarization pipeline: chunking, path selection, extraction, merging and rendering.

pub mod chunking;
pub mod combine;
pub mod extraction;
pub mod merge;
pub mod parse;
pub mod path;
pub mod presets;
pub mod progress;
pub mod prompts;
pub mod render;
pub mod retry;
pub mod sanitize;
mod service;
pub mod types;

pub use presets::{ChunkingMode, ChunkingOptions, Pacing, ProcessingConfig, ProcessingPreset};
pub use progress::{CancelHandle, Progress};
pub use service::{
    FALLBACK_AGGRESSIVE_CHUNKING, FALLBACK_FAST_PATH_FAILED, FALLBACK_LOCAL_STYLED_SUMMARY,
    FALLBACK_TWO_CALL_RENDER, SummarizationApi, SummarizationService, SummarizeOptions,
};
pub use types::{
    ChunkFacts, ChunkingError, Document, DocumentMetadata, ExamplePhrases, ExtractionError,
    FactSet, ParseError, ProcessingStats, RenderError, StyleGuide, SummarizationResult,
    SummarizeError, TextChunk,
};
