//! Merge many small chunks into fewer large ones.
//!
//! Fewer chunks means fewer extraction calls. The price is precision: facts from merged fragments
//! are extracted together, and the offsets of a combined chunk only describe its first fragment.

use super::types::TextChunk;

/// Chunk count above which the standard path combines chunks before extraction.
pub const COMBINE_THRESHOLD: usize = 8;

/// Target size, in characters, of a combined chunk.
pub const COMBINE_TARGET_CHARS: usize = 10_000;

const JOINER: &str = "\n\n";

/// Whether a chunk list is long enough to be worth combining.
pub fn should_combine(chunk_count: usize) -> bool {
    chunk_count > COMBINE_THRESHOLD
}

/// Concatenate consecutive chunks until adding the next would exceed `target_chars`.
///
/// Every input text appears exactly once, in order. A single chunk larger than the target is kept
/// as-is. Combined chunks are re-indexed from zero.
pub fn combine_chunks(chunks: Vec<TextChunk>, target_chars: usize) -> Vec<TextChunk> {
    let input_count = chunks.len();
    let mut combined: Vec<TextChunk> = Vec::new();
    let mut current: Option<(TextChunk, usize)> = None;

    for chunk in chunks {
        let next_len = chunk.text.chars().count();
        current = match current.take() {
            None => Some((chunk, next_len)),
            Some((mut buffer, buffer_len)) => {
                if buffer_len + JOINER.len() + next_len > target_chars {
                    combined.push(buffer);
                    Some((chunk, next_len))
                } else {
                    buffer.text.push_str(JOINER);
                    buffer.text.push_str(&chunk.text);
                    Some((buffer, buffer_len + JOINER.len() + next_len))
                }
            }
        };
    }
    if let Some((buffer, _)) = current {
        combined.push(buffer);
    }

    for (index, chunk) in combined.iter_mut().enumerate() {
        chunk.chunk_index = index;
    }

    tracing::debug!(
        input_chunks = input_count,
        combined_chunks = combined.len(),
        target_chars,
        "Combined small chunks"
    );
    combined
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks_of(count: usize, len: usize) -> Vec<TextChunk> {
        (0..count)
            .map(|i| {
                let text = format!("{i:0>width$}", width = len);
                TextChunk::new("doc", text, i * len, (i + 1) * len, i)
            })
            .collect()
    }

    #[test]
    fn threshold_is_exclusive() {
        assert!(!should_combine(COMBINE_THRESHOLD));
        assert!(should_combine(COMBINE_THRESHOLD + 1));
    }

    #[test]
    fn combines_in_order_without_losing_text() {
        let chunks = chunks_of(10, 100);
        let originals: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let combined = combine_chunks(chunks, 350);

        assert_eq!(combined.len(), 4);
        let rejoined: Vec<&str> = combined
            .iter()
            .flat_map(|chunk| chunk.text.split(JOINER))
            .collect();
        assert_eq!(rejoined, originals);
        for (index, chunk) in combined.iter().enumerate() {
            assert_eq!(chunk.chunk_index, index);
            assert!(chunk.text.chars().count() <= 350);
        }
        assert_eq!(combined[1].start_index, 300);
    }

    #[test]
    fn oversized_chunk_stays_alone() {
        let mut chunks = chunks_of(2, 50);
        chunks.insert(1, TextChunk::new("doc", "x".repeat(500), 50, 550, 1));
        let combined = combine_chunks(chunks, 200);
        assert_eq!(combined.len(), 3);
        assert_eq!(combined[1].text.len(), 500);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(combine_chunks(Vec::new(), COMBINE_TARGET_CHARS).is_empty());
    }
}
