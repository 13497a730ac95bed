//! S6 Scribe - markdown documentation of the finished cycle.

use super::{two_path, Stage, StageEnv, StageOutcome};
use crate::parser::parse_documentation;
use crate::prompts;
use cogloop_core::{
    truncate_chars, AuditResult, CyclePhase, DocumentationResult, StageStrategy, SynthesisResult, Thought, Trigger,
};
use std::fmt::Write;

pub const SCRIBE_AGENT: &str = "scribe";

const SUMMARY_CHARS: usize = 280;

#[derive(Clone, Copy)]
pub struct ScribeInput<'a> {
    pub clock: u64,
    pub trigger: &'a Trigger,
    pub thoughts: &'a [Thought],
    pub synthesis: &'a SynthesisResult,
    pub audit: Option<&'a AuditResult>,
}

pub async fn run(env: StageEnv<'_>, provider: Option<&str>, input: ScribeInput<'_>) -> StageOutcome<DocumentationResult> {
    two_path(
        Stage::Documentation,
        provider,
        |provider| async move {
            let ctx = env.context(SCRIBE_AGENT, CyclePhase::Documentation, vec![input.synthesis.content.clone()]);
            let prompt = prompts::scribe_prompt(input.trigger, input.synthesis, input.audit);
            let reply = env.call(&provider, &prompt, prompts::SCRIBE_SYSTEM_PROMPT, &ctx).await?;
            let parsed = parse_documentation(&reply);
            if parsed.body.is_empty() {
                return Err(cogloop_core::Error::parse_degradation("documentation", "empty document body"));
            }
            let title = parsed.title.unwrap_or_else(|| default_title(input));
            let summary = parsed
                .summary
                .unwrap_or_else(|| first_sentence(&parsed.body).to_string());
            let insights = if parsed.insights.is_empty() {
                input.synthesis.key_themes.clone()
            } else {
                parsed.insights
            };
            Ok(DocumentationResult {
                id: uuid::Uuid::new_v4().to_string(),
                title,
                summary,
                markdown: parsed.body,
                insights,
                strategy: StageStrategy::Ai,
                timestamp: chrono::Utc::now(),
            })
        },
        || heuristic_documentation(input),
    )
    .await
}

fn default_title(input: ScribeInput<'_>) -> String {
    format!("Cycle {}: {}", input.clock, input.trigger.question)
}

fn first_sentence(text: &str) -> &str {
    let text = text.trim_start_matches(|c: char| c == '#' || c.is_whitespace());
    let end = text
        .char_indices()
        .find(|(_, c)| matches!(c, '.' | '!' | '?' | '\n'))
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(text.len());
    truncate_chars(text[..end].trim(), SUMMARY_CHARS)
}

/// Fixed markdown template over the cycle's records.
pub fn heuristic_documentation(input: ScribeInput<'_>) -> DocumentationResult {
    let title = default_title(input);
    let mut md = String::new();
    let _ = writeln!(md, "# {}\n", title);
    let _ = writeln!(md, "**Question:** {}  ", input.trigger.question);
    let _ = writeln!(md, "**Category:** {}  ", input.trigger.category);
    let _ = writeln!(md, "**Importance:** {:.2}\n", input.trigger.importance);

    let _ = writeln!(md, "## Synthesis\n\n{}\n", input.synthesis.content.trim());
    let _ = writeln!(md, "Consensus: {:.2}\n", input.synthesis.consensus_level);

    if !input.synthesis.key_themes.is_empty() {
        md.push_str("## Themes\n\n");
        for theme in &input.synthesis.key_themes {
            let _ = writeln!(md, "- {}", theme);
        }
        md.push('\n');
    }

    md.push_str("## Voices\n\n");
    for thought in input.thoughts {
        let _ = writeln!(md, "- **{}** ({:.2}): {}", thought.agent_id, thought.confidence, first_sentence(&thought.content));
    }
    md.push('\n');

    md.push_str("## Audit\n\n");
    match input.audit {
        Some(audit) => {
            let _ = writeln!(
                md,
                "Risk {} (safety {:.2}, ethics {:.2}), {}.",
                audit.risk_level.as_str(),
                audit.safety_score,
                audit.ethics_score,
                if audit.approved { "approved" } else { "not approved" }
            );
            for concern in &audit.concerns {
                let _ = writeln!(md, "- {}", concern);
            }
        }
        None => md.push_str("Audit skipped this cycle.\n"),
    }

    let summary = format!(
        "{} voices answered \"{}\"; consensus {:.2}.",
        input.thoughts.len(),
        input.trigger.question,
        input.synthesis.consensus_level
    );

    DocumentationResult {
        id: uuid::Uuid::new_v4().to_string(),
        title,
        summary,
        markdown: md,
        insights: input.synthesis.key_themes.clone(),
        strategy: StageStrategy::Heuristic,
        timestamp: chrono::Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sentence_stops_at_punctuation() {
        assert_eq!(first_sentence("# Title. More text."), "Title.");
        assert_eq!(first_sentence("No terminator"), "No terminator");
        assert_eq!(first_sentence("Line one\nLine two"), "Line one");
    }
}
