//! Helpers for normalizing model-produced values and caller-supplied style guides.

use serde_json::Value;
use std::collections::HashSet;

use super::types::StyleGuide;

const MAX_LEVEL: u8 = 100;

/// Sanitize arbitrary string input by trimming whitespace and dropping empties.
pub(crate) fn sanitize_string(value: Option<String>) -> Option<String> {
    value.and_then(|input| {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Trim values, drop empties and remove case-insensitive duplicates.
///
/// The first occurrence of each value keeps its original casing and position.
pub fn dedupe_case_insensitive<I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    let mut unique = Vec::new();

    for value in values {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_lowercase()) {
            unique.push(trimmed.to_string());
        }
    }

    unique
}

/// Read a scalar JSON value as a trimmed string.
///
/// Numbers and booleans are stringified; nulls, arrays and objects yield `None`.
pub(crate) fn extract_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => sanitize_string(Some(text.clone())),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Read a JSON value as a list of strings.
///
/// A bare string becomes a one-element list; non-scalar entries are skipped.
pub(crate) fn extract_string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(values)) => dedupe_case_insensitive(
            values
                .iter()
                .filter_map(|entry| extract_string(Some(entry))),
        ),
        Some(Value::String(single)) => dedupe_case_insensitive([single.clone()]),
        _ => Vec::new(),
    }
}

/// Clamp levels into `0..=100` and tidy free-text fields of a style guide.
pub fn sanitize_style(style: &StyleGuide) -> StyleGuide {
    let mut sanitized = style.clone();
    sanitized.formality = sanitized.formality.min(MAX_LEVEL);
    sanitized.enthusiasm = sanitized.enthusiasm.min(MAX_LEVEL);
    sanitized.technicality = sanitized.technicality.min(MAX_LEVEL);
    sanitized.instructions = sanitized.instructions.trim().to_string();
    sanitized.keywords = dedupe_case_insensitive(sanitized.keywords);

    let phrases = &mut sanitized.example_phrases;
    phrases.openings = dedupe_case_insensitive(std::mem::take(&mut phrases.openings));
    phrases.transitions = dedupe_case_insensitive(std::mem::take(&mut phrases.transitions));
    phrases.closings = dedupe_case_insensitive(std::mem::take(&mut phrases.closings));
    phrases.emphasis = dedupe_case_insensitive(std::mem::take(&mut phrases.emphasis));
    sanitized
}
