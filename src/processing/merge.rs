//! Fact Merger: fold per-chunk facts into one canonical [`FactSet`].

use super::sanitize::dedupe_case_insensitive;
use super::types::{ChunkFacts, FactSet};

fn first_present(values: &mut Option<String>, candidate: &Option<String>) {
    if values.is_none() {
        if let Some(candidate) = candidate.as_deref().map(str::trim) {
            if !candidate.is_empty() {
                *values = Some(candidate.to_string());
            }
        }
    }
}

fn collect_list<F>(sources: &[&ChunkFacts], field: F) -> Vec<String>
where
    F: Fn(&FactSet) -> &Vec<String>,
{
    dedupe_case_insensitive(
        sources
            .iter()
            .flat_map(|chunk| field(&chunk.facts).iter().cloned()),
    )
}

/// Merge the facts of successfully parsed chunks.
///
/// Chunks are visited in `chunk_index` order. Singular fields keep the first non-empty value;
/// list fields are concatenated and deduplicated case-insensitively, keeping the first casing.
/// Failed chunks contribute nothing. The result is independent of input order.
pub fn merge_facts(chunk_facts: &[ChunkFacts]) -> FactSet {
    let mut sources: Vec<&ChunkFacts> = chunk_facts
        .iter()
        .filter(|chunk| chunk.parse_success)
        .collect();
    sources.sort_by_key(|chunk| chunk.chunk_index);

    let mut merged = FactSet::default();
    for chunk in &sources {
        first_present(&mut merged.class_title, &chunk.facts.class_title);
        first_present(&mut merged.audience, &chunk.facts.audience);
        first_present(&mut merged.date_or_series, &chunk.facts.date_or_series);
    }

    merged.learning_objectives = collect_list(&sources, |facts| &facts.learning_objectives);
    merged.key_takeaways = collect_list(&sources, |facts| &facts.key_takeaways);
    merged.topics = collect_list(&sources, |facts| &facts.topics);
    merged.techniques = collect_list(&sources, |facts| &facts.techniques);
    merged.notable_quotes = collect_list(&sources, |facts| &facts.notable_quotes);
    merged.action_items = collect_list(&sources, |facts| &facts.action_items);
    merged.open_questions = collect_list(&sources, |facts| &facts.open_questions);
    merged.references = collect_list(&sources, |facts| &facts.references);

    tracing::debug!(
        merged_chunks = sources.len(),
        skipped_chunks = chunk_facts.len() - sources.len(),
        "Merged chunk facts"
    );
    merged
}
