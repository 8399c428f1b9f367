//! Summary Renderer: raw and styled summaries, the combined-call quality gate, local fallback
//! assembly and regeneration.
//!
//! Failure semantics differ per output. A raw summary failure is returned to the caller. A styled
//! summary failure can be absorbed by [`SummaryRenderer::render_styled_or_fallback`], which
//! assembles a summary from the facts without calling the backend.

use crate::backend::{ChatBackend, ChatMessage};

use super::parse::parse_combined_summary;
use super::prompts;
use super::types::{Document, FactSet, RenderError, StyleGuide};

/// Minimum length (characters) of an acceptable raw summary from the combined call.
pub const MIN_RAW_SUMMARY_CHARS: usize = 200;

/// Sections the combined call's raw summary must contain with at least one bullet.
pub const REQUIRED_SECTIONS: [&str; 4] = [
    "Notable Quotes",
    "Learning Objectives",
    "Key Takeaways",
    "Techniques",
];

/// Sampling temperature used for regeneration.
pub const REGENERATION_TEMPERATURE: f32 = 0.9;

/// Outcome of the raw-summary quality check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityReport {
    /// Raw summary reached [`MIN_RAW_SUMMARY_CHARS`].
    pub length_ok: bool,
    /// Required sections that were absent or had no bulleted item.
    pub missing_sections: Vec<&'static str>,
}

impl QualityReport {
    /// Whether the summary passed every check.
    pub fn passed(&self) -> bool {
        self.length_ok && self.missing_sections.is_empty()
    }
}

/// Check a raw summary's structure.
///
/// Sections are located by header text (a `#` heading or a `**bold**` line), and a section only
/// counts when a bullet follows it before the next header.
// TODO: validate against the merged FactSet instead of header wording once combined replies are
// parsed into sections.
pub fn check_quality(raw_summary: &str) -> QualityReport {
    QualityReport {
        length_ok: raw_summary.trim().chars().count() >= MIN_RAW_SUMMARY_CHARS,
        missing_sections: REQUIRED_SECTIONS
            .iter()
            .copied()
            .filter(|section| !section_has_bullets(raw_summary, section))
            .collect(),
    }
}

fn is_header(line: &str) -> bool {
    let line = line.trim();
    line.starts_with('#') || (line.len() > 4 && line.starts_with("**") && line.ends_with("**"))
}

fn bullet_body(line: &str) -> Option<&str> {
    let line = line.trim_start();
    for marker in ["- ", "* ", "• "] {
        if let Some(body) = line.strip_prefix(marker) {
            return Some(body);
        }
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        return rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") "));
    }
    None
}

fn section_has_bullets(raw_summary: &str, section: &str) -> bool {
    let needle = section.to_lowercase();
    let mut in_section = false;
    for line in raw_summary.lines() {
        if is_header(line) {
            in_section = line.to_lowercase().contains(&needle);
            continue;
        }
        if in_section && bullet_body(line).is_some_and(|body| !body.trim().is_empty()) {
            return true;
        }
    }
    false
}

/// Assemble a summary locally from facts, used when the styled call fails.
pub fn fallback_summary(document: &Document, facts: &FactSet) -> String {
    let title = facts.class_title.as_deref().unwrap_or(&document.title);
    let mut out = format!("# {title}\n");
    if let Some(audience) = &facts.audience {
        out.push_str(&format!("\nAudience: {audience}\n"));
    }
    if let Some(date) = &facts.date_or_series {
        out.push_str(&format!("Date or series: {date}\n"));
    }

    out.push_str("\n## Synopsis\n");
    if facts.topics.is_empty() {
        out.push_str(&format!("Summary of \"{}\" assembled from extracted facts.\n", document.title));
    } else {
        out.push_str(&format!(
            "Summary of \"{}\" covering {}.\n",
            document.title,
            facts.topics.join(", ")
        ));
    }

    for (label, values) in facts.list_fields() {
        out.push_str(&format!("\n## {label}\n"));
        if values.is_empty() {
            out.push_str(&format!("No specific {} identified.\n", label.to_lowercase()));
        } else {
            for value in values {
                out.push_str(&format!("- {value}\n"));
            }
        }
    }
    out
}

/// Raw and styled summaries produced together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSummary {
    /// Unstyled summary.
    pub raw_summary: String,
    /// Styled summary.
    pub styled_summary: String,
    /// Whether the combined reply was rejected and two separate calls were made.
    pub used_two_calls: bool,
}

/// Turns facts or document text into summaries via the backend.
pub struct SummaryRenderer<'a> {
    backend: &'a dyn ChatBackend,
}

impl<'a> SummaryRenderer<'a> {
    /// Renderer issuing calls to `backend`.
    pub fn new(backend: &'a dyn ChatBackend) -> Self {
        Self { backend }
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        what: &'static str,
    ) -> Result<String, RenderError> {
        let reply = self.backend.chat(messages).await?;
        non_empty(reply, what)
    }

    /// Raw summary from merged facts.
    pub async fn render_raw_from_facts(
        &self,
        document: &Document,
        facts: &FactSet,
    ) -> Result<String, RenderError> {
        self.generate(&prompts::raw_summary_from_facts(document, facts), "raw summary")
            .await
    }

    /// Raw summary straight from the document text.
    pub async fn render_raw_from_text(&self, document: &Document) -> Result<String, RenderError> {
        self.generate(&prompts::raw_summary_from_text(document), "raw summary")
            .await
    }

    /// Styled summary from the raw summary when present, from the facts otherwise.
    pub async fn render_styled(
        &self,
        raw_summary: Option<&str>,
        document: &Document,
        facts: &FactSet,
        style: &StyleGuide,
    ) -> Result<String, RenderError> {
        let messages = match raw_summary {
            Some(raw) => prompts::styled_from_raw(raw, style),
            None => prompts::styled_from_facts(document, facts, style),
        };
        self.generate(&messages, "styled summary").await
    }

    /// Styled summary, falling back to [`fallback_summary`] when the backend fails.
    ///
    /// The flag is `true` when the fallback was used.
    pub async fn render_styled_or_fallback(
        &self,
        raw_summary: Option<&str>,
        document: &Document,
        facts: &FactSet,
        style: &StyleGuide,
    ) -> (String, bool) {
        match self.render_styled(raw_summary, document, facts, style).await {
            Ok(styled) => (styled, false),
            Err(error) => {
                tracing::warn!(
                    document_id = %document.id,
                    error = %error,
                    "Styled summary failed; assembling fallback from facts"
                );
                (fallback_summary(document, facts), true)
            }
        }
    }

    /// Both summaries from one call, falling back to two calls when the reply is rejected.
    ///
    /// The combined reply must parse and pass [`check_quality`]. Errors from the two-call
    /// fallback propagate.
    pub async fn render_combined(
        &self,
        document: &Document,
        style: &StyleGuide,
    ) -> Result<RenderedSummary, RenderError> {
        let reply = self
            .backend
            .chat(&prompts::combined_summary(document, style))
            .await?;

        match parse_combined_summary(&reply) {
            Ok(combined) => {
                let report = check_quality(&combined.raw_summary);
                if report.passed() {
                    return Ok(RenderedSummary {
                        raw_summary: combined.raw_summary,
                        styled_summary: combined.styled_summary,
                        used_two_calls: false,
                    });
                }
                tracing::warn!(
                    document_id = %document.id,
                    length_ok = report.length_ok,
                    missing_sections = ?report.missing_sections,
                    "Combined summary failed the quality check; using separate calls"
                );
            }
            Err(error) => {
                tracing::warn!(
                    document_id = %document.id,
                    error = %error,
                    "Combined summary reply unusable; using separate calls"
                );
            }
        }

        let raw_summary = self.render_raw_from_text(document).await?;
        let styled_summary = self
            .render_styled(Some(&raw_summary), document, &FactSet::default(), style)
            .await?;
        Ok(RenderedSummary {
            raw_summary,
            styled_summary,
            used_two_calls: true,
        })
    }

    /// A dramatically different styled rendering of `source`.
    pub async fn regenerate_styled(
        &self,
        source: &str,
        style: &StyleGuide,
        regeneration: u32,
        timestamp: &str,
    ) -> Result<String, RenderError> {
        let messages = prompts::regenerate_styled(source, style, regeneration, timestamp);
        let reply = self
            .backend
            .chat_with_temperature(&messages, REGENERATION_TEMPERATURE)
            .await?;
        non_empty(reply, "regenerated summary")
    }
}

fn non_empty(reply: String, what: &'static str) -> Result<String, RenderError> {
    let trimmed = reply.trim();
    if trimmed.is_empty() {
        Err(RenderError::EmptyResponse(what))
    } else {
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::backend::testing::{ScriptedBackend, system_of};
    use crate::processing::prompts::{
        COMBINED_SUMMARY_SYSTEM, RAW_SUMMARY_SYSTEM, REGENERATE_SYSTEM, STYLED_SUMMARY_SYSTEM,
    };
    use serde_json::json;

    fn complete_raw() -> String {
        let mut raw = String::from(
            "## Synopsis\nThe talk introduces ownership. It covers borrowing rules. It shows common \
             errors. It ends with exercises.\n",
        );
        for section in prompts::TEMPLATE_SECTIONS.iter().skip(1) {
            raw.push_str(&format!("\n## {section}\n- An item about {section}\n"));
        }
        raw
    }

    #[test]
    fn quality_check_accepts_complete_summary() {
        let report = check_quality(&complete_raw());
        assert!(report.passed(), "{report:?}");
    }

    #[test]
    fn quality_check_rejects_empty_section_and_short_text() {
        let raw = complete_raw().replace("- An item about Notable Quotes\n", "");
        let report = check_quality(&raw);
        assert_eq!(report.missing_sections, vec!["Notable Quotes"]);

        let short = check_quality("## Notable Quotes\n- \"Hi\"");
        assert!(!short.length_ok);
        assert_eq!(short.missing_sections.len(), 3);
    }

    #[test]
    fn quality_check_accepts_bold_headers_and_numbered_items() {
        let raw = format!(
            "{}\n**Learning Objectives**\n1. Understand moves\n**Key Takeaways**\n* Borrow often\n\
             **Techniques**\n• Clone sparingly\n**Notable Quotes**\n- \"Fearless\"\n",
            "x".repeat(200)
        );
        assert!(check_quality(&raw).passed());
    }

    #[test]
    fn fallback_summary_marks_empty_sections() {
        let document = Document::new("Ownership 101", "text");
        let facts = FactSet {
            key_takeaways: vec!["Values have one owner".into()],
            ..FactSet::default()
        };
        let summary = fallback_summary(&document, &facts);
        assert!(summary.starts_with("# Ownership 101"));
        assert!(summary.contains("## Key Takeaways\n- Values have one owner"));
        assert!(summary.contains("No specific notable quotes identified."));
    }

    #[tokio::test]
    async fn combined_reply_passing_quality_uses_one_call() {
        let backend = ScriptedBackend::new(|_| {
            Ok(json!({ "rawSummary": complete_raw(), "styledSummary": "Styled!" }).to_string())
        });
        let renderer = SummaryRenderer::new(&backend);
        let document = Document::new("Talk", "text");
        let rendered = renderer
            .render_combined(&document, &StyleGuide::default())
            .await
            .expect("rendered");

        assert!(!rendered.used_two_calls);
        assert_eq!(rendered.styled_summary, "Styled!");
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn rejected_combined_reply_falls_back_to_two_calls() {
        let backend = ScriptedBackend::new(|messages| {
            let system = system_of(messages);
            if system == COMBINED_SUMMARY_SYSTEM {
                Ok(json!({ "rawSummary": "too short", "styledSummary": "x" }).to_string())
            } else if system == RAW_SUMMARY_SYSTEM {
                Ok(complete_raw())
            } else {
                Ok("Styled from raw".into())
            }
        });
        let renderer = SummaryRenderer::new(&backend);
        let rendered = renderer
            .render_combined(&Document::new("Talk", "text"), &StyleGuide::default())
            .await
            .expect("rendered");

        assert!(rendered.used_two_calls);
        assert!(check_quality(&rendered.raw_summary).passed());
        assert_eq!(rendered.styled_summary, "Styled from raw");
        assert_eq!(backend.calls_with_system(RAW_SUMMARY_SYSTEM), 1);
        assert_eq!(backend.calls_with_system(STYLED_SUMMARY_SYSTEM), 1);
    }

    #[tokio::test]
    async fn styled_failure_uses_local_fallback() {
        let backend =
            ScriptedBackend::new(|_| Err(BackendError::Unavailable("offline".into())));
        let renderer = SummaryRenderer::new(&backend);
        let document = Document::new("Talk", "text");
        let (styled, fell_back) = renderer
            .render_styled_or_fallback(None, &document, &FactSet::default(), &StyleGuide::default())
            .await;
        assert!(fell_back);
        assert!(styled.contains("## Learning Objectives"));
    }

    #[tokio::test]
    async fn raw_failure_is_an_error() {
        let backend = ScriptedBackend::new(|_| Ok("   ".into()));
        let renderer = SummaryRenderer::new(&backend);
        let error = renderer
            .render_raw_from_facts(&Document::new("Talk", "text"), &FactSet::default())
            .await
            .expect_err("empty reply");
        assert!(matches!(error, RenderError::EmptyResponse("raw summary")));
    }

    #[tokio::test]
    async fn regeneration_uses_its_own_prompt() {
        let backend = ScriptedBackend::new(|_| Ok("A fresh take".into()));
        let renderer = SummaryRenderer::new(&backend);
        let regenerated = renderer
            .regenerate_styled("Old summary", &StyleGuide::default(), 3, "2024-05-01T10:00:00Z")
            .await
            .expect("regenerated");
        assert_eq!(regenerated, "A fresh take");
        assert_eq!(backend.calls_with_system(REGENERATE_SYSTEM), 1);
        assert!(
            backend
                .last_user_message()
                .is_some_and(|message| message.contains("Regeneration #3"))
        );
    }
}
