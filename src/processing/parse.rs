//! Lenient parsing of JSON embedded in model replies.
//!
//! Models wrap JSON in code fences, prepend commentary, or return a bare string where a list was
//! asked for. The parsers here isolate the outermost object and read each field forgivingly.

use serde_json::{Map, Value};

use super::sanitize::{extract_string, extract_string_list, sanitize_string};
use super::types::{FactSet, ParseError};

const SINGULAR_FIELDS: [(&str, &str); 3] = [
    ("class_title", "classTitle"),
    ("audience", "audience"),
    ("date_or_series", "dateOrSeries"),
];

const LIST_FIELDS: [(&str, &str); 8] = [
    ("learning_objectives", "learningObjectives"),
    ("key_takeaways", "keyTakeaways"),
    ("topics", "topics"),
    ("techniques", "techniques"),
    ("notable_quotes", "notableQuotes"),
    ("action_items", "actionItems"),
    ("open_questions", "openQuestions"),
    ("references", "references"),
];

/// Raw and styled summaries produced by a single combined-generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedSummary {
    /// Unstyled summary following the section template.
    pub raw_summary: String,
    /// Summary in the requested style.
    pub styled_summary: String,
}

/// Isolate the outermost JSON object in a reply.
///
/// Code fences are stripped first; the object spans from the first `{` to the last `}`.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    if let Some(fenced) = fenced_body(raw) {
        if let Some(object) = outermost_object(fenced) {
            return Some(object);
        }
    }
    outermost_object(raw)
}

fn fenced_body(raw: &str) -> Option<&str> {
    let open = raw.find("```")?;
    let after = &raw[open + 3..];
    let after = after
        .strip_prefix("json")
        .or_else(|| after.strip_prefix("JSON"))
        .unwrap_or(after);
    let close = after.find("```")?;
    Some(&after[..close])
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn parse_object(raw: &str) -> Result<Map<String, Value>, ParseError> {
    let json = extract_json_object(raw).ok_or(ParseError::NoJsonObject)?;
    match serde_json::from_str::<Value>(json)? {
        Value::Object(map) => Ok(map),
        _ => Err(ParseError::NotAnObject),
    }
}

fn field<'a>(map: &'a Map<String, Value>, snake: &str, camel: &str) -> Option<&'a Value> {
    map.get(snake).or_else(|| map.get(camel))
}

/// Parse a fact-extraction reply into a [`FactSet`].
///
/// Missing fields default to empty, but at least one known field must be present.
pub fn parse_facts(raw: &str) -> Result<FactSet, ParseError> {
    let map = parse_object(raw)?;

    let recognized = SINGULAR_FIELDS
        .iter()
        .chain(LIST_FIELDS.iter())
        .any(|(snake, camel)| field(&map, snake, camel).is_some());
    if !recognized {
        return Err(ParseError::MissingFields(
            "expected at least one fact field such as key_takeaways or topics".into(),
        ));
    }

    let singular = |index: usize| {
        let (snake, camel) = SINGULAR_FIELDS[index];
        extract_string(field(&map, snake, camel))
    };
    let list = |index: usize| {
        let (snake, camel) = LIST_FIELDS[index];
        extract_string_list(field(&map, snake, camel))
    };

    Ok(FactSet {
        class_title: singular(0),
        audience: singular(1),
        date_or_series: singular(2),
        learning_objectives: list(0),
        key_takeaways: list(1),
        topics: list(2),
        techniques: list(3),
        notable_quotes: list(4),
        action_items: list(5),
        open_questions: list(6),
        references: list(7),
    })
}

/// Parse a combined-generation reply carrying `rawSummary` and `styledSummary`.
pub fn parse_combined_summary(raw: &str) -> Result<CombinedSummary, ParseError> {
    let map = parse_object(raw)?;
    let text = |snake: &str, camel: &str| {
        field(&map, camel, snake)
            .and_then(Value::as_str)
            .and_then(|value| sanitize_string(Some(value.to_string())))
    };

    match (
        text("raw_summary", "rawSummary"),
        text("styled_summary", "styledSummary"),
    ) {
        (Some(raw_summary), Some(styled_summary)) => Ok(CombinedSummary {
            raw_summary,
            styled_summary,
        }),
        (raw_summary, styled_summary) => {
            let mut missing = Vec::new();
            if raw_summary.is_none() {
                missing.push("rawSummary");
            }
            if styled_summary.is_none() {
                missing.push("styledSummary");
            }
            Err(ParseError::MissingFields(missing.join(", ")))
        }
    }
}
