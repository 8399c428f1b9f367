//! Chunk-size heuristics and document splitting.
//!
//! This module decides how a document is cut before fact extraction. Highlights:
//!
//! - Single chunk first: when the whole text fits in one chunk it is returned untouched (trimmed),
//!   which is the common case and skips every other heuristic.
//! - Fixed-size windows: chunks of `chunk_size` characters whose right edge is pulled back to the
//!   nearest whitespace past 70% of the window, so words are never split.
//! - Paragraph-aware mode: when most blank-line paragraphs have a sane size, each paragraph
//!   becomes one chunk and `overlap` carries the tail of the previous paragraph forward.
//! - Model-aware mode: sizes are derived from the target model's context window (estimated at
//!   four characters per token); oversized documents are forced into at most three large chunks.
//!
//! Sizes and offsets are measured in characters (Unicode scalar values), never bytes.

use super::presets::{ChunkingMode, ChunkingOptions};
use super::types::{ChunkingError, Document, TextChunk};
use tiktoken_rs::model::get_context_size;

/// Context window assumed for models missing from the lookup table.
pub const DEFAULT_CONTEXT_WINDOW: usize = 4096;

const CHARS_PER_TOKEN: usize = 4;
const SINGLE_CHUNK_WINDOW_PERCENT: usize = 95;
const FORCED_CHUNK_CHARS: usize = 15_000;
const FORCED_MAX_CHUNKS: usize = 3;
const WORD_BREAK_PERCENT: usize = 70;
const PARAGRAPH_MIN_CHARS: usize = 50;
const PARAGRAPH_MAX_CHARS: usize = 2_000;
const PARAGRAPH_BAND_PERCENT: usize = 70;
const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Context windows (tokens) of common local models, matched by prefix.
///
/// More specific prefixes must precede the shorter ones they extend.
const MODEL_CONTEXT_WINDOWS: &[(&str, usize)] = &[
    ("llama3.3", 131_072),
    ("llama3.2", 131_072),
    ("llama3.1", 131_072),
    ("llama3", 8_192),
    ("llama2", 4_096),
    ("mistral-nemo", 131_072),
    ("mistral-large", 131_072),
    ("mistral-small", 32_768),
    ("mistral", 32_768),
    ("mixtral", 32_768),
    ("qwen3", 40_960),
    ("qwen2.5", 32_768),
    ("qwen2", 32_768),
    ("gemma3", 131_072),
    ("gemma2", 8_192),
    ("gemma", 8_192),
    ("phi4", 16_384),
    ("phi3.5", 131_072),
    ("phi3", 4_096),
    ("deepseek-r1", 131_072),
    ("command-r", 131_072),
    ("tinyllama", 2_048),
];

/// Look up the context window (in tokens) for a model identifier.
///
/// Ollama tags (`llama3.1:8b`) and registry namespaces (`library/llama3.1`) are ignored. OpenAI
/// model names defer to `tiktoken-rs`; anything unknown gets [`DEFAULT_CONTEXT_WINDOW`].
pub fn context_window_for_model(model: &str) -> usize {
    let normalized = model.trim().to_lowercase();
    let without_tag = normalized.split(':').next().unwrap_or_default();
    let base = without_tag.rsplit('/').next().unwrap_or_default();

    if let Some((_, window)) = MODEL_CONTEXT_WINDOWS
        .iter()
        .find(|(prefix, _)| base.starts_with(prefix))
    {
        return *window;
    }

    if base.starts_with("gpt-") || base.starts_with("o1") || base.starts_with("o3") {
        return get_context_size(base);
    }

    tracing::trace!(model, "Using default context window estimate");
    DEFAULT_CONTEXT_WINDOW
}

/// Estimate the token count of `text` as `ceil(chars / 4)`.
pub fn estimate_tokens(text: &str) -> usize {
    estimate_tokens_for_len(text.chars().count())
}

/// Estimate the token count of a text of `char_len` characters.
pub fn estimate_tokens_for_len(char_len: usize) -> usize {
    char_len.div_ceil(CHARS_PER_TOKEN)
}

/// Split a document using the strategy named by `options.mode`.
///
/// `model` is only consulted by [`ChunkingMode::ModelAware`].
pub fn chunk_document(
    document: &Document,
    options: &ChunkingOptions,
    model: &str,
) -> Result<Vec<TextChunk>, ChunkingError> {
    match options.mode {
        ChunkingMode::Fixed => split_text(&document.text, &document.id, options),
        ChunkingMode::Paragraph => split_by_paragraphs(&document.text, &document.id, options),
        ChunkingMode::ModelAware => split_for_model(&document.text, &document.id, model, options),
    }
}

/// Split text into fixed-size chunks broken at word boundaries.
///
/// `overlap` is informational here: each chunk starts exactly where the previous one ended.
pub fn split_text(
    text: &str,
    document_id: &str,
    options: &ChunkingOptions,
) -> Result<Vec<TextChunk>, ChunkingError> {
    validate_options(options)?;
    ensure_not_blank(text)?;

    let index = CharIndex::new(text);
    if index.len() <= options.chunk_size {
        return Ok(vec![single_chunk(text, document_id, index.len())]);
    }

    let chunks = fixed_size_chunks(&index, document_id, options.chunk_size);
    Ok(cap_chunks(chunks, options.max_chunks))
}

/// Split text into one chunk per paragraph when the document's structure supports it.
///
/// Falls back to [`split_text`] unless at least 70% of the non-empty paragraphs are between 50
/// and 2000 characters long.
pub fn split_by_paragraphs(
    text: &str,
    document_id: &str,
    options: &ChunkingOptions,
) -> Result<Vec<TextChunk>, ChunkingError> {
    validate_options(options)?;
    ensure_not_blank(text)?;

    let total = text.chars().count();
    if total <= options.chunk_size {
        return Ok(vec![single_chunk(text, document_id, total)]);
    }

    let mut paragraphs = Vec::new();
    let mut position = 0;
    for raw in text.split(PARAGRAPH_SEPARATOR) {
        let len = raw.chars().count();
        if !raw.trim().is_empty() {
            paragraphs.push((position, raw));
        }
        position += len + PARAGRAPH_SEPARATOR.len();
    }

    let in_band = paragraphs
        .iter()
        .filter(|(_, raw)| {
            (PARAGRAPH_MIN_CHARS..=PARAGRAPH_MAX_CHARS).contains(&raw.trim().chars().count())
        })
        .count();
    if paragraphs.is_empty() || in_band * 100 < paragraphs.len() * PARAGRAPH_BAND_PERCENT {
        tracing::debug!(
            paragraphs = paragraphs.len(),
            in_band,
            "Paragraph structure unsuitable; using fixed-size chunks"
        );
        return split_text(text, document_id, options);
    }

    let mut chunks: Vec<TextChunk> = Vec::with_capacity(paragraphs.len());
    let mut previous: Option<(&str, usize)> = None;
    for (start, raw) in paragraphs {
        let (leading, trimmed) = trim_with_offset(raw);
        let start_index = start + leading;
        let end_index = start_index + trimmed.chars().count();

        let chunk = match previous {
            Some((previous_text, previous_end)) if options.overlap > 0 => {
                let tail = tail_with_char_limit(previous_text, options.overlap);
                if tail.is_empty() {
                    TextChunk::new(document_id, trimmed, start_index, end_index, chunks.len())
                } else {
                    TextChunk::new(
                        document_id,
                        format!("{tail} {trimmed}"),
                        previous_end.saturating_sub(tail.chars().count()),
                        end_index,
                        chunks.len(),
                    )
                }
            }
            _ => TextChunk::new(document_id, trimmed, start_index, end_index, chunks.len()),
        };
        chunks.push(chunk);
        previous = Some((trimmed, end_index));
    }

    Ok(cap_chunks(chunks, options.max_chunks))
}

/// Split text using sizes derived from the target model's context window.
///
/// Text whose estimated token count fits under 95% of the window stays in one chunk. Anything
/// larger is forced into at most three large chunks to bound the number of backend calls.
pub fn split_for_model(
    text: &str,
    document_id: &str,
    model: &str,
    options: &ChunkingOptions,
) -> Result<Vec<TextChunk>, ChunkingError> {
    ensure_not_blank(text)?;

    let index = CharIndex::new(text);
    let window = context_window_for_model(model);
    let estimated_tokens = estimate_tokens_for_len(index.len());
    if estimated_tokens * 100 <= window * SINGLE_CHUNK_WINDOW_PERCENT {
        return Ok(vec![single_chunk(text, document_id, index.len())]);
    }

    let chunk_size = FORCED_CHUNK_CHARS.max(index.len().div_ceil(FORCED_MAX_CHUNKS));
    let cap = options
        .max_chunks
        .map_or(FORCED_MAX_CHUNKS, |max| max.min(FORCED_MAX_CHUNKS));
    tracing::warn!(
        model,
        window,
        estimated_tokens,
        chunk_size,
        max_chunks = cap,
        "Document exceeds the model context window; forcing a large-chunk split"
    );

    let chunks = fixed_size_chunks(&index, document_id, chunk_size);
    Ok(cap_chunks(chunks, Some(cap)))
}

fn validate_options(options: &ChunkingOptions) -> Result<(), ChunkingError> {
    if options.chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if options.overlap >= options.chunk_size {
        return Err(ChunkingError::InvalidOverlap {
            overlap: options.overlap,
            chunk_size: options.chunk_size,
        });
    }
    Ok(())
}

fn ensure_not_blank(text: &str) -> Result<(), ChunkingError> {
    if text.trim().is_empty() {
        Err(ChunkingError::EmptyText)
    } else {
        Ok(())
    }
}

fn single_chunk(text: &str, document_id: &str, char_len: usize) -> TextChunk {
    TextChunk::new(document_id, text.trim(), 0, char_len, 0)
}

fn fixed_size_chunks(index: &CharIndex<'_>, document_id: &str, chunk_size: usize) -> Vec<TextChunk> {
    let total = index.len();
    let min_break = (chunk_size * WORD_BREAK_PERCENT / 100).max(1);
    let mut chunks = Vec::with_capacity(total.div_ceil(chunk_size));
    let mut position = 0;

    while position < total {
        let mut end = (position + chunk_size).min(total);
        if end < total {
            if let Some(space) = (position + min_break..=end)
                .rev()
                .find(|&offset| index.is_whitespace_at(offset))
            {
                end = space;
            }
        }

        let (leading, trimmed) = trim_with_offset(index.slice(position, end));
        if !trimmed.is_empty() {
            let start_index = position + leading;
            let end_index = start_index + trimmed.chars().count();
            chunks.push(TextChunk::new(
                document_id,
                trimmed,
                start_index,
                end_index,
                chunks.len(),
            ));
        }
        position = end;
    }

    chunks
}

/// Enforce a chunk cap by folding overflow chunks into the last retained one.
fn cap_chunks(mut chunks: Vec<TextChunk>, max_chunks: Option<usize>) -> Vec<TextChunk> {
    let Some(max) = max_chunks.map(|max| max.max(1)) else {
        return chunks;
    };
    if chunks.len() <= max {
        return chunks;
    }

    let overflow = chunks.split_off(max);
    tracing::debug!(
        kept = max,
        folded = overflow.len(),
        "Chunk cap reached; folding overflow into the final chunk"
    );
    if let Some(last) = chunks.last_mut() {
        for extra in overflow {
            last.text.push_str(PARAGRAPH_SEPARATOR);
            last.text.push_str(&extra.text);
            last.end_index = extra.end_index;
        }
    }
    chunks
}

/// Trim `text`, returning the number of leading characters removed alongside the result.
fn trim_with_offset(text: &str) -> (usize, &str) {
    let trimmed_start = text.trim_start();
    let leading = text[..text.len() - trimmed_start.len()].chars().count();
    (leading, trimmed_start.trim_end())
}

/// Take at most `limit` trailing characters of `text`, starting on a word boundary.
fn tail_with_char_limit(text: &str, limit: usize) -> &str {
    if limit == 0 {
        return "";
    }

    let total = text.chars().count();
    if total <= limit {
        return text;
    }

    let start = text
        .char_indices()
        .nth(total - limit)
        .map(|(offset, _)| offset)
        .unwrap_or(text.len());
    let candidate = &text[start..];
    if text[..start].ends_with(char::is_whitespace) {
        return candidate.trim_start();
    }
    match candidate.find(char::is_whitespace) {
        Some(space) => candidate[space..].trim_start(),
        None => "",
    }
}

/// Character-offset view over a string slice.
struct CharIndex<'a> {
    text: &'a str,
    offsets: Vec<usize>,
}

impl<'a> CharIndex<'a> {
    fn new(text: &'a str) -> Self {
        let offsets = text
            .char_indices()
            .map(|(offset, _)| offset)
            .chain(std::iter::once(text.len()))
            .collect();
        Self { text, offsets }
    }

    fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.text[self.offsets[start]..self.offsets[end]]
    }

    fn is_whitespace_at(&self, position: usize) -> bool {
        self.text[self.offsets[position]..]
            .chars()
            .next()
            .is_some_and(char::is_whitespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn options(chunk_size: usize, overlap: usize, mode: ChunkingMode) -> ChunkingOptions {
        ChunkingOptions {
            chunk_size,
            overlap,
            max_chunks: None,
            parallel_processing: false,
            batch_size: 1,
            mode,
        }
    }

    fn sample_words(count: usize) -> String {
        (0..count)
            .map(|i| format!("word{i}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn assert_covers(text: &str, chunks: &[TextChunk]) {
        let produced: HashSet<&str> = chunks
            .iter()
            .flat_map(|chunk| chunk.text.split_whitespace())
            .collect();
        for token in text.split_whitespace() {
            assert!(produced.contains(token), "token {token:?} missing from chunks");
        }
    }

    #[test]
    fn short_text_yields_single_trimmed_chunk() {
        let text = "   A short document with padding.  \n";
        let chunks = split_text(text, "doc", &options(100, 0, ChunkingMode::Fixed)).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text.trim());
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].start_index, 0);
        assert_eq!(chunks[0].document_id, "doc");
    }

    #[test]
    fn rejects_invalid_configuration_and_blank_text() {
        let error = split_text("hello", "doc", &options(0, 0, ChunkingMode::Fixed)).unwrap_err();
        assert_eq!(error, ChunkingError::InvalidChunkSize);

        let error = split_text("hello", "doc", &options(10, 10, ChunkingMode::Fixed)).unwrap_err();
        assert!(matches!(error, ChunkingError::InvalidOverlap { .. }));

        let error = split_text(" \n\t ", "doc", &options(10, 0, ChunkingMode::Fixed)).unwrap_err();
        assert_eq!(error, ChunkingError::EmptyText);
    }

    #[test]
    fn fixed_chunks_break_on_whitespace_and_cover_every_token() {
        let text = sample_words(200);
        let chunks = split_text(&text, "doc", &options(64, 0, ChunkingMode::Fixed)).unwrap();
        assert!(chunks.len() > 1);

        let words: HashSet<&str> = text.split_whitespace().collect();
        for (position, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, position);
            assert!(chunk.text.chars().count() <= 64);
            for word in chunk.text.split_whitespace() {
                assert!(words.contains(word), "split inside a word: {word:?}");
            }
        }
        assert_covers(&text, &chunks);
    }

    #[test]
    fn fixed_chunk_offsets_point_into_the_original_text() {
        let text = "Ünïcödé text keeps character offsets honest across many windows of words.";
        let chunks = split_text(text, "doc", &options(20, 0, ChunkingMode::Fixed)).unwrap();
        let chars: Vec<char> = text.chars().collect();
        for chunk in &chunks {
            let expected: String = chars[chunk.start_index..chunk.end_index].iter().collect();
            assert_eq!(chunk.text, expected);
        }
    }

    #[test]
    fn unbroken_text_is_cut_at_the_window_edge() {
        let text = "x".repeat(25);
        let chunks = split_text(&text, "doc", &options(10, 0, ChunkingMode::Fixed)).unwrap();
        let lengths: Vec<usize> = chunks.iter().map(|chunk| chunk.text.len()).collect();
        assert_eq!(lengths, vec![10, 10, 5]);
    }

    #[test]
    fn window_edge_on_whitespace_keeps_the_full_window() {
        let chunks = split_text("aa bb cc dd ee", "doc", &options(8, 0, ChunkingMode::Fixed)).unwrap();
        let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["aa bb cc", "dd ee"]);
    }

    #[test]
    fn tail_starts_on_a_word_boundary() {
        let text = "stand alone as a chunk of text.";
        assert_eq!(tail_with_char_limit(text, 20), "as a chunk of text.");
        assert_eq!(tail_with_char_limit(text, 19), "as a chunk of text.");
        assert_eq!(tail_with_char_limit(text, 18), "a chunk of text.");
        assert_eq!(tail_with_char_limit(text, 3), "");
        assert_eq!(tail_with_char_limit(text, 0), "");
    }

    #[test]
    fn chunk_cap_folds_overflow_without_losing_text() {
        let text = sample_words(120);
        let mut capped = options(60, 0, ChunkingMode::Fixed);
        capped.max_chunks = Some(2);
        let chunks = split_text(&text, "doc", &capped).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].end_index, text.chars().count());
        assert_covers(&text, &chunks);
    }

    #[test]
    fn context_window_lookup_handles_tags_and_unknown_models() {
        assert_eq!(context_window_for_model("llama3.1:8b"), 131_072);
        assert_eq!(context_window_for_model("library/Llama3.2"), 131_072);
        assert_eq!(context_window_for_model("llama3"), 8_192);
        assert_eq!(context_window_for_model("mistral:7b-instruct"), 32_768);
        assert_eq!(context_window_for_model("gpt-4o"), 128_000);
        assert_eq!(context_window_for_model("my-custom-model"), DEFAULT_CONTEXT_WINDOW);
    }

    #[test]
    fn estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn model_aware_split_keeps_fitting_documents_whole() {
        let text = sample_words(2_000);
        let chunks = split_for_model(
            &text,
            "doc",
            "llama3.1",
            &options(1_000, 0, ChunkingMode::ModelAware),
        )
        .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
    }

    #[test]
    fn model_aware_split_caps_oversized_documents() {
        let text = sample_words(20_000);
        assert!(estimate_tokens(&text) > DEFAULT_CONTEXT_WINDOW);
        let chunks = split_for_model(
            &text,
            "doc",
            "tiny-unknown-model",
            &options(1_000, 0, ChunkingMode::ModelAware),
        )
        .unwrap();
        assert!(chunks.len() > 1);
        assert!(chunks.len() <= FORCED_MAX_CHUNKS);
        assert_covers(&text, &chunks);
    }

    fn paragraph_document(count: usize) -> String {
        (0..count)
            .map(|i| {
                format!(
                    "Paragraph {i} explains one idea in enough detail to stand alone as a chunk of text."
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[test]
    fn paragraph_mode_emits_one_chunk_per_paragraph() {
        let text = paragraph_document(5);
        let chunks =
            split_by_paragraphs(&text, "doc", &options(300, 0, ChunkingMode::Paragraph)).unwrap();
        assert_eq!(chunks.len(), 5);
        for (i, chunk) in chunks.iter().enumerate() {
            assert!(chunk.text.starts_with(&format!("Paragraph {i} ")));
            let chars: Vec<char> = text.chars().collect();
            let expected: String = chars[chunk.start_index..chunk.end_index].iter().collect();
            assert_eq!(chunk.text, expected);
        }
    }

    #[test]
    fn paragraph_mode_carries_overlap_forward() {
        let text = paragraph_document(3);
        let chunks =
            split_by_paragraphs(&text, "doc", &options(200, 20, ChunkingMode::Paragraph)).unwrap();
        assert_eq!(chunks.len(), 3);
        assert!(chunks[1].text.starts_with("as a chunk of text. Paragraph 1 "));
        assert!(chunks[1].text.contains("Paragraph 1 "));
        assert!(chunks[1].start_index < chunks[0].end_index);
    }

    #[test]
    fn paragraph_mode_falls_back_to_fixed_windows() {
        let text = (0..40)
            .map(|i| format!("p{i}"))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks =
            split_by_paragraphs(&text, "doc", &options(30, 0, ChunkingMode::Paragraph)).unwrap();
        assert!(chunks.len() < 40);
        assert_covers(&text, &chunks);
    }

    #[test]
    fn chunk_document_dispatches_on_mode() {
        let document = Document::new("Notes", paragraph_document(4));
        let fixed = chunk_document(&document, &options(150, 0, ChunkingMode::Fixed), "x").unwrap();
        let paragraphs =
            chunk_document(&document, &options(150, 0, ChunkingMode::Paragraph), "x").unwrap();
        assert_eq!(paragraphs.len(), 4);
        assert_ne!(fixed.len(), 0);
        assert!(fixed.iter().all(|chunk| chunk.document_id == document.id));
    }
}
