//! Core data types and error definitions for the summarization pipeline.

use crate::{backend::BackendError, store::StoreError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use thiserror::Error;

/// Errors produced while turning raw text into chunks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkingError {
    /// Configuration requested an impossible chunk size.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Overlap would consume the whole chunk.
    #[error("overlap ({overlap}) must be smaller than the chunk size ({chunk_size})")]
    InvalidOverlap {
        /// Requested overlap in characters.
        overlap: usize,
        /// Requested chunk size in characters.
        chunk_size: usize,
    },
    /// Document contained no non-whitespace text.
    #[error("document contains no text to chunk")]
    EmptyText,
}

/// Errors raised while turning a model reply into structured data.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Reply did not contain a `{...}` span.
    #[error("response contains no JSON object")]
    NoJsonObject,
    /// The isolated span was not valid JSON.
    #[error("response is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    /// Valid JSON, but not an object.
    #[error("response JSON is not an object")]
    NotAnObject,
    /// Object lacks the fields the caller needs.
    #[error("response JSON is missing required fields: {0}")]
    MissingFields(String),
}

/// Failure of a single fact-extraction attempt.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Backend call failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// Backend call did not finish within the configured timeout.
    #[error("backend call timed out after {0:?}")]
    Timeout(Duration),
    /// Backend answered with something that is not a fact object.
    #[error("failed to parse extracted facts: {source}")]
    Parse {
        /// Underlying parse failure.
        #[source]
        source: ParseError,
        /// Reply that failed to parse.
        raw: String,
    },
}

/// Errors raised while rendering summaries.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Backend call failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// Backend returned an empty summary.
    #[error("backend returned an empty {0}")]
    EmptyResponse(&'static str),
    /// Combined-generation reply could not be parsed.
    #[error("failed to parse combined summary: {0}")]
    Parse(#[from] ParseError),
}

/// Run-level failures surfaced to callers.
#[derive(Debug, Error)]
pub enum SummarizeError {
    /// Chunking failed with both the requested and the fallback configuration.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Raw summary (or a regeneration) could not be produced.
    #[error("Failed to render summary: {0}")]
    Render(#[from] RenderError),
    /// Result store rejected an operation the caller asked for directly.
    #[error("Result store failure: {0}")]
    Store(#[from] StoreError),
    /// No stored result exists for the requested document.
    #[error("No summary stored for document '{0}'")]
    NotFound(String),
    /// The caller cancelled the run.
    #[error("Summarization cancelled")]
    Cancelled,
}

/// Descriptive metadata attached to a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Whitespace-delimited word count of the text.
    pub word_count: usize,
    /// Size of the text in bytes.
    pub file_size: u64,
    /// Optional origin of the document (path, URL).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Immutable input document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier, used as the result-store key.
    pub id: String,
    /// Human-readable title.
    pub title: String,
    /// Full document text.
    pub text: String,
    /// Derived metadata.
    pub metadata: DocumentMetadata,
}

impl Document {
    /// Build a document whose identifier is derived from its text.
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let id = document_id_for(&text);
        Self::with_id(id, title, text)
    }

    /// Build a document with an explicit identifier.
    pub fn with_id(id: impl Into<String>, title: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let metadata = DocumentMetadata {
            word_count: text.split_whitespace().count(),
            file_size: text.len() as u64,
            source: None,
        };
        Self {
            id: id.into(),
            title: title.into(),
            text,
            metadata,
        }
    }

    /// Attach a source location.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.metadata.source = Some(source.into());
        self
    }

    /// Length of the text in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Deterministic document identifier: `doc-` followed by 16 hex chars of the text's SHA-256.
pub fn document_id_for(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    format!("doc-{}", &hex::encode(digest)[..16])
}

/// Ordered fragment of a document handed to fact extraction.
///
/// `start_index`/`end_index` are character offsets into the original text. They are exact for
/// fixed-size chunks and approximate once chunks have been combined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    /// Unique chunk identifier.
    pub id: String,
    /// Document the chunk was cut from.
    pub document_id: String,
    /// Fragment text.
    pub text: String,
    /// Start offset (characters).
    pub start_index: usize,
    /// End offset (characters, exclusive).
    pub end_index: usize,
    /// Processing order.
    pub chunk_index: usize,
}

impl TextChunk {
    /// Create a chunk with a fresh identifier.
    pub fn new(
        document_id: &str,
        text: impl Into<String>,
        start_index: usize,
        end_index: usize,
        chunk_index: usize,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            text: text.into(),
            start_index,
            end_index,
            chunk_index,
        }
    }
}

/// Structured facts extracted from a document (or a fragment of it).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactSet {
    /// Title of the class, talk or document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_title: Option<String>,
    /// Intended audience.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    /// Date or series the document belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_or_series: Option<String>,
    /// What the reader is expected to learn.
    pub learning_objectives: Vec<String>,
    /// Most important points.
    pub key_takeaways: Vec<String>,
    /// Subjects covered.
    pub topics: Vec<String>,
    /// Methods, tools or practices described.
    pub techniques: Vec<String>,
    /// Verbatim quotes worth keeping.
    pub notable_quotes: Vec<String>,
    /// Follow-up tasks.
    pub action_items: Vec<String>,
    /// Questions left unanswered.
    pub open_questions: Vec<String>,
    /// Works, links or people referenced.
    pub references: Vec<String>,
}

impl FactSet {
    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        self.class_title.is_none()
            && self.audience.is_none()
            && self.date_or_series.is_none()
            && self.list_fields().iter().all(|(_, values)| values.is_empty())
    }

    /// List-valued fields paired with their display labels, in rendering order.
    pub fn list_fields(&self) -> [(&'static str, &Vec<String>); 8] {
        [
            ("Learning Objectives", &self.learning_objectives),
            ("Key Takeaways", &self.key_takeaways),
            ("Topics", &self.topics),
            ("Techniques", &self.techniques),
            ("Notable Quotes", &self.notable_quotes),
            ("Action Items", &self.action_items),
            ("Open Questions", &self.open_questions),
            ("References", &self.references),
        ]
    }
}

/// Outcome of extracting facts from one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkFacts {
    /// Chunk the facts came from.
    pub chunk_id: String,
    /// Processing order of that chunk.
    pub chunk_index: usize,
    /// Extracted facts; empty when extraction failed.
    pub facts: FactSet,
    /// Whether the reply parsed into facts.
    pub parse_success: bool,
    /// Last reply received from the backend.
    pub raw_response: String,
    /// Last error message when extraction failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Counters describing a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingStats {
    /// Chunks the document was split into.
    pub total_chunks: usize,
    /// Chunks whose facts were extracted.
    pub successful_chunks: usize,
    /// Chunks that exhausted every retry.
    pub failed_chunks: usize,
    /// Wall-clock duration of the run in milliseconds.
    pub processing_time_ms: u64,
    /// Model that served the run.
    pub model_used: String,
    /// Whether the single-call fast path produced the result.
    pub fast_path: bool,
    /// Degraded strategies taken during the run, in order.
    #[serde(default)]
    pub fallbacks: Vec<String>,
}

/// Final, caller-visible artifact of a summarization run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizationResult {
    /// Summarized document.
    pub document: Document,
    /// Per-chunk extraction outcomes, in chunk order.
    pub chunk_facts: Vec<ChunkFacts>,
    /// Canonical facts merged across chunks.
    pub merged_facts: FactSet,
    /// Unstyled summary following the fixed section template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_summary: Option<String>,
    /// Summary rewritten in the requested style.
    pub styled_summary: String,
    /// Run statistics.
    pub processing_stats: ProcessingStats,
    /// Number of times the styled summary has been regenerated.
    #[serde(default)]
    pub regeneration_count: u32,
    /// RFC 3339 timestamp of the run.
    pub created_at: String,
    /// RFC 3339 timestamp of the latest regeneration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regenerated_at: Option<String>,
}

/// Buckets of example phrases the styled summary may borrow from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExamplePhrases {
    /// Ways to open the summary.
    pub openings: Vec<String>,
    /// Ways to move between sections.
    pub transitions: Vec<String>,
    /// Ways to close the summary.
    pub closings: Vec<String>,
    /// Ways to emphasize a point.
    pub emphasis: Vec<String>,
}

impl ExamplePhrases {
    /// True when every bucket is empty.
    pub fn is_empty(&self) -> bool {
        self.openings.is_empty()
            && self.transitions.is_empty()
            && self.closings.is_empty()
            && self.emphasis.is_empty()
    }
}

/// Voice the styled summary should be written in.
///
/// Levels range from 0 to 100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleGuide {
    /// 0 = casual, 100 = formal.
    pub formality: u8,
    /// 0 = reserved, 100 = exuberant.
    pub enthusiasm: u8,
    /// 0 = plain language, 100 = expert jargon.
    pub technicality: u8,
    /// Free-text instructions.
    pub instructions: String,
    /// Words the summary should use where natural.
    pub keywords: Vec<String>,
    /// Example phrases to borrow from.
    pub example_phrases: ExamplePhrases,
}

impl Default for StyleGuide {
    fn default() -> Self {
        Self {
            formality: 50,
            enthusiasm: 50,
            technicality: 50,
            instructions: String::new(),
            keywords: Vec::new(),
            example_phrases: ExamplePhrases::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_ids_are_content_derived() {
        let first = Document::new("Notes", "Same body");
        let second = Document::new("Other title", "Same body");
        let third = Document::new("Notes", "Different body");
        assert_eq!(first.id, second.id);
        assert_ne!(first.id, third.id);
        assert!(first.id.starts_with("doc-"));
        assert_eq!(first.id.len(), "doc-".len() + 16);
    }

    #[test]
    fn document_metadata_counts_words_and_bytes() {
        let document = Document::new("Notes", "one two  three\nfour").with_source("notes.txt");
        assert_eq!(document.metadata.word_count, 4);
        assert_eq!(document.metadata.file_size, 19);
        assert_eq!(document.metadata.source.as_deref(), Some("notes.txt"));
    }

    #[test]
    fn fact_set_deserializes_partial_objects() {
        let facts: FactSet =
            serde_json::from_str(r#"{"class_title": "Intro", "topics": ["Ownership"]}"#)
                .expect("facts");
        assert_eq!(facts.class_title.as_deref(), Some("Intro"));
        assert_eq!(facts.topics, vec!["Ownership".to_string()]);
        assert!(facts.key_takeaways.is_empty());
        assert!(!facts.is_empty());
        assert!(FactSet::default().is_empty());
    }

    #[test]
    fn style_guide_defaults_to_neutral_levels() {
        let style: StyleGuide = serde_json::from_str(r#"{"formality": 90}"#).expect("style");
        assert_eq!(style.formality, 90);
        assert_eq!(style.enthusiasm, 50);
        assert_eq!(style.technicality, 50);
    }
}
