//! Prompt builders for every backend call the pipeline makes.
//!
//! Each builder returns a `[system, user]` message pair. The system messages differ per call kind
//! so logs and test doubles can tell the calls apart.

use crate::backend::ChatMessage;

use super::types::{Document, FactSet, StyleGuide, TextChunk};

/// System message for per-chunk fact extraction.
pub const EXTRACTION_SYSTEM: &str = "You extract structured facts from a fragment of a longer document. Reply with a single JSON object and nothing else.";

/// System message for the unstyled raw summary.
pub const RAW_SUMMARY_SYSTEM: &str =
    "You write factual, unstyled summaries that follow a fixed section template exactly.";

/// System message for the styled rewrite.
pub const STYLED_SUMMARY_SYSTEM: &str =
    "You rewrite summaries in a requested voice without adding or dropping facts.";

/// System message for the single-call combined generation.
pub const COMBINED_SUMMARY_SYSTEM: &str = "You summarize documents in one pass and reply with a JSON object with two fields: rawSummary and styledSummary.";

/// System message for regeneration.
pub const REGENERATE_SYSTEM: &str = "You produce dramatically different renderings of an existing summary while keeping every fact intact.";

/// Sections of the raw summary template, in order.
pub const TEMPLATE_SECTIONS: [&str; 7] = [
    "Synopsis",
    "Learning Objectives",
    "Key Takeaways",
    "Topics",
    "Techniques",
    "Notable Quotes",
    "Open Questions",
];

const FACT_KEYS: &str = "class_title, audience, date_or_series, learning_objectives, key_takeaways, topics, techniques, notable_quotes, action_items, open_questions, references";

fn section_template() -> String {
    let mut template = String::from(
        "## Synopsis\nExactly 4 sentences describing what the document covers and why it matters.\n",
    );
    for section in &TEMPLATE_SECTIONS[1..] {
        template.push_str(&format!("\n## {section}\n- one bullet per item\n"));
    }
    template
}

fn level_label(level: u8, labels: [&'static str; 3]) -> &'static str {
    match level {
        0..=33 => labels[0],
        34..=66 => labels[1],
        _ => labels[2],
    }
}

fn push_phrases(out: &mut String, label: &str, phrases: &[String]) {
    if !phrases.is_empty() {
        out.push_str(&format!("- {label}: {}\n", phrases.join(" | ")));
    }
}

/// Describe a style guide as prompt text.
pub fn describe_style(style: &StyleGuide) -> String {
    let mut out = format!(
        "Formality: {}/100 ({})\nEnthusiasm: {}/100 ({})\nTechnicality: {}/100 ({})\n",
        style.formality,
        level_label(style.formality, ["casual", "conversational", "formal"]),
        style.enthusiasm,
        level_label(style.enthusiasm, ["reserved", "warm", "energetic"]),
        style.technicality,
        level_label(style.technicality, ["plain language", "some terminology", "expert jargon"]),
    );
    if !style.instructions.is_empty() {
        out.push_str(&format!("Instructions: {}\n", style.instructions));
    }
    if !style.keywords.is_empty() {
        out.push_str(&format!(
            "Work these keywords in where natural: {}\n",
            style.keywords.join(", ")
        ));
    }
    let phrases = &style.example_phrases;
    if !phrases.is_empty() {
        out.push_str("Example phrases to borrow from:\n");
        push_phrases(&mut out, "Openings", &phrases.openings);
        push_phrases(&mut out, "Transitions", &phrases.transitions);
        push_phrases(&mut out, "Closings", &phrases.closings);
        push_phrases(&mut out, "Emphasis", &phrases.emphasis);
    }
    out
}

/// Describe a fact set as a markdown outline.
pub fn describe_facts(facts: &FactSet) -> String {
    let mut out = String::new();
    let singular = [
        ("Title", &facts.class_title),
        ("Audience", &facts.audience),
        ("Date or series", &facts.date_or_series),
    ];
    for (label, value) in singular {
        if let Some(value) = value {
            out.push_str(&format!("{label}: {value}\n"));
        }
    }
    for (label, values) in facts.list_fields() {
        if values.is_empty() {
            continue;
        }
        out.push_str(&format!("\n{label}:\n"));
        for value in values {
            out.push_str(&format!("- {value}\n"));
        }
    }
    if out.is_empty() {
        out.push_str("(no facts were extracted)\n");
    }
    out
}

/// Prompt extracting facts from one chunk.
pub fn fact_extraction(chunk: &TextChunk, total_chunks: usize, style: &StyleGuide) -> Vec<ChatMessage> {
    let user = format!(
        "Fragment {} of {} from document {}.\n\n\
         The final summary will be written for this audience:\n{}\n\
         Return a JSON object with these keys: {FACT_KEYS}.\n\
         Use arrays of short strings for list fields and null for unknown singular fields.\n\
         Only include facts stated in the fragment. Quote notable lines verbatim.\n\n\
         Fragment text:\n\"\"\"\n{}\n\"\"\"",
        chunk.chunk_index + 1,
        total_chunks,
        chunk.document_id,
        describe_style(style),
        chunk.text,
    );
    vec![ChatMessage::system(EXTRACTION_SYSTEM), ChatMessage::user(user)]
}

/// Prompt writing the raw summary from merged facts.
pub fn raw_summary_from_facts(document: &Document, facts: &FactSet) -> Vec<ChatMessage> {
    let user = format!(
        "Write the summary of \"{}\" using only these facts:\n\n{}\n\
         Follow this template exactly, keeping every header:\n\n{}\n\
         Write \"None identified.\" under a header with no facts.",
        document.title,
        describe_facts(facts),
        section_template(),
    );
    vec![ChatMessage::system(RAW_SUMMARY_SYSTEM), ChatMessage::user(user)]
}

/// Prompt writing the raw summary directly from the document text.
pub fn raw_summary_from_text(document: &Document) -> Vec<ChatMessage> {
    let user = format!(
        "Summarize the document \"{}\".\n\n\
         Follow this template exactly, keeping every header:\n\n{}\n\
         Document text:\n\"\"\"\n{}\n\"\"\"",
        document.title,
        section_template(),
        document.text,
    );
    vec![ChatMessage::system(RAW_SUMMARY_SYSTEM), ChatMessage::user(user)]
}

/// Prompt restyling an existing raw summary.
pub fn styled_from_raw(raw_summary: &str, style: &StyleGuide) -> Vec<ChatMessage> {
    let user = format!(
        "Rewrite this summary in the following voice:\n{}\n\
         Keep every section and every fact. Do not invent anything.\n\n\
         Summary:\n{raw_summary}",
        describe_style(style),
    );
    vec![ChatMessage::system(STYLED_SUMMARY_SYSTEM), ChatMessage::user(user)]
}

/// Prompt writing the styled summary straight from facts, used when no raw summary exists.
pub fn styled_from_facts(document: &Document, facts: &FactSet, style: &StyleGuide) -> Vec<ChatMessage> {
    let user = format!(
        "Write a summary of \"{}\" in the following voice:\n{}\n\
         Cover these sections in order: {}.\n\
         Use only these facts and do not invent anything:\n\n{}",
        document.title,
        describe_style(style),
        TEMPLATE_SECTIONS.join(", "),
        describe_facts(facts),
    );
    vec![ChatMessage::system(STYLED_SUMMARY_SYSTEM), ChatMessage::user(user)]
}

/// Prompt asking for both summaries in one JSON reply.
pub fn combined_summary(document: &Document, style: &StyleGuide) -> Vec<ChatMessage> {
    let user = format!(
        "Summarize the document \"{}\".\n\n\
         rawSummary must follow this template exactly, with at least one bullet per list section:\n\n{}\n\
         styledSummary must carry the same sections and facts, rewritten in this voice:\n{}\n\
         Reply with only the JSON object.\n\n\
         Document text:\n\"\"\"\n{}\n\"\"\"",
        document.title,
        section_template(),
        describe_style(style),
        document.text,
    );
    vec![
        ChatMessage::system(COMBINED_SUMMARY_SYSTEM),
        ChatMessage::user(user),
    ]
}

/// Prompt asking for a dramatically different styled rendering.
///
/// The regeneration number and timestamp make each request unique.
pub fn regenerate_styled(
    source: &str,
    style: &StyleGuide,
    regeneration: u32,
    timestamp: &str,
) -> Vec<ChatMessage> {
    let user = format!(
        "Regeneration #{regeneration} requested at {timestamp}.\n\n\
         Write a dramatically different version of this summary: change the opening, the sentence \
         structure and the phrasing. Keep every section and every fact.\n\n\
         Voice:\n{}\n\
         Content:\n{source}",
        describe_style(style),
    );
    vec![ChatMessage::system(REGENERATE_SYSTEM), ChatMessage::user(user)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ChatRole;

    #[test]
    fn extraction_prompt_embeds_chunk_and_position() {
        let chunk = TextChunk::new("doc-1", "Ownership moves values.", 0, 23, 1);
        let messages = fact_extraction(&chunk, 3, &StyleGuide::default());
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::System);
        assert_eq!(messages[0].content, EXTRACTION_SYSTEM);
        assert!(messages[1].content.contains("Fragment 2 of 3"));
        assert!(messages[1].content.contains("Ownership moves values."));
        assert!(messages[1].content.contains("notable_quotes"));
    }

    #[test]
    fn style_description_reflects_levels_and_keywords() {
        let style = StyleGuide {
            formality: 90,
            enthusiasm: 10,
            keywords: vec!["borrow checker".into()],
            ..StyleGuide::default()
        };
        let text = describe_style(&style);
        assert!(text.contains("Formality: 90/100 (formal)"));
        assert!(text.contains("Enthusiasm: 10/100 (reserved)"));
        assert!(text.contains("borrow checker"));
    }

    #[test]
    fn raw_prompt_lists_every_template_section() {
        let document = Document::new("Notes", "Body");
        let messages = raw_summary_from_facts(&document, &FactSet::default());
        for section in TEMPLATE_SECTIONS {
            assert!(messages[1].content.contains(&format!("## {section}")));
        }
        assert!(messages[1].content.contains("no facts were extracted"));
    }

    #[test]
    fn regeneration_prompt_is_unique_per_request() {
        let style = StyleGuide::default();
        let first = regenerate_styled("Summary", &style, 1, "2024-01-01T00:00:00Z");
        let second = regenerate_styled("Summary", &style, 2, "2024-01-01T00:05:00Z");
        assert_ne!(first[1].content, second[1].content);
        assert!(second[1].content.contains("Regeneration #2"));
        assert!(second[1].content.contains("dramatically different"));
    }
}
