//! Choose between the single-call fast path and the standard multi-stage path.

use serde::Serialize;

use super::chunking::estimate_tokens_for_len;

/// Minimum context window (tokens) for which the fast path is considered.
pub const LARGE_CONTEXT_THRESHOLD: usize = 32_768;

/// Outcome of path selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PathDecision {
    /// Run the single-call fast path first.
    pub fast_path: bool,
    /// Estimated token count of the document.
    pub estimated_tokens: usize,
    /// Context window of the target model.
    pub context_window: usize,
}

/// Decide which path a run should take.
///
/// The fast path is taken only when the whole document is one chunk and the model's context window
/// is at least [`LARGE_CONTEXT_THRESHOLD`] tokens.
pub fn select_path(text_len: usize, chunk_count: usize, context_window: usize) -> PathDecision {
    let decision = PathDecision {
        fast_path: chunk_count == 1 && context_window >= LARGE_CONTEXT_THRESHOLD,
        estimated_tokens: estimate_tokens_for_len(text_len),
        context_window,
    };
    tracing::debug!(
        chunk_count,
        estimated_tokens = decision.estimated_tokens,
        context_window,
        fast_path = decision.fast_path,
        "Selected processing path"
    );
    decision
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_context_models_take_the_standard_path() {
        let decision = select_path(10_000, 1, 4_096);
        assert!(!decision.fast_path);
        assert_eq!(decision.estimated_tokens, 2_500);
    }

    #[test]
    fn large_context_single_chunk_takes_the_fast_path() {
        assert!(select_path(10_000, 1, 131_072).fast_path);
        assert!(select_path(10_000, 1, LARGE_CONTEXT_THRESHOLD).fast_path);
    }

    #[test]
    fn multiple_chunks_never_take_the_fast_path() {
        assert!(!select_path(100_000, 3, 131_072).fast_path);
    }
}
