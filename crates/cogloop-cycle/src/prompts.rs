//! Prompt templates for every AI stage path.
//!
//! The response layouts requested here are what [`crate::parser`] reads back.

use crate::agents::AgentProfile;
use cogloop_core::{truncate_chars, AuditResult, Reflection, SynthesisResult, Thought, Trigger, WeightVector};
use std::fmt::Write;

const THOUGHT_EXCERPT_CHARS: usize = 600;
const REFLECTION_EXCERPT_CHARS: usize = 300;

/// Memory and knowledge handed to each agent's S1 prompt.
#[derive(Debug, Clone, Default)]
pub struct PersonaContext {
    pub unresolved_questions: Vec<String>,
    pub significant_thoughts: Vec<String>,
    pub beliefs: Vec<String>,
    pub knowledge: Option<String>,
}

pub fn persona_system_prompt(agent: &AgentProfile, category: &str) -> String {
    format!(
        "You are {name}, one voice in a small council of thinkers.\n\
         {personality}\n\
         The question belongs to the '{category}' domain. Answer in the first person, in your own \
         voice, in one or two short paragraphs. Never claim to be another member of the council.",
        name = agent.name,
        personality = agent.personality.trim(),
        category = category,
    )
}

pub fn thought_prompt(trigger: &Trigger, ctx: &PersonaContext) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Question: {}", trigger.question);
    let _ = writeln!(out, "Category: {}", trigger.category);
    let _ = writeln!(out, "Importance: {:.2}", trigger.importance);

    write_list(&mut out, "Questions still unresolved", &ctx.unresolved_questions);
    write_list(&mut out, "Significant earlier thoughts", &ctx.significant_thoughts);
    write_list(&mut out, "Established beliefs", &ctx.beliefs);
    if let Some(knowledge) = ctx.knowledge.as_deref().filter(|k| !k.trim().is_empty()) {
        let _ = writeln!(out, "\nRelevant knowledge:\n{}", knowledge.trim());
    }

    out.push_str("\nGive your own independent thought on the question.");
    out
}

pub const CONFIDENCE_SYSTEM_PROMPT: &str =
    "You rate how well-reasoned an answer is. Reply with a single number between 0 and 1.";

pub fn confidence_prompt(question: &str, content: &str) -> String {
    format!(
        "Question: {}\n\nAnswer:\n{}\n\nHow confident, well-grounded, and coherent is this answer? \
         Reply with one number between 0 and 1 and nothing else.",
        question,
        truncate_chars(content.trim(), THOUGHT_EXCERPT_CHARS * 2)
    )
}

pub fn reflection_system_prompt(agent: &AgentProfile) -> String {
    format!(
        "You are {}. {}\nYou are reading another council member's thought. Respond briefly: where \
         you agree, where you differ. End with a line 'AGREEMENT: <0-1>'.",
        agent.name,
        agent.personality.trim()
    )
}

pub fn reflection_prompt(question: &str, target: &Thought) -> String {
    format!(
        "Question: {}\n\nThought from {}:\n{}\n\nReflect on this thought.",
        question,
        target.agent_id,
        truncate_chars(target.content.trim(), THOUGHT_EXCERPT_CHARS)
    )
}

pub const AUDIT_SYSTEM_PROMPT: &str = "You are the council's auditor. You assess thoughts for safety \
     and ethics. Follow the requested layout exactly; one field per line.";

pub fn audit_prompt(thoughts: &[Thought], reflections: &[Reflection]) -> String {
    let mut out = String::from("Audit the following thoughts.\n");
    for (i, thought) in thoughts.iter().enumerate() {
        let _ = writeln!(
            out,
            "\n[{}] {} (confidence {:.2}):\n{}",
            i + 1,
            thought.agent_id,
            thought.confidence,
            truncate_chars(thought.content.trim(), THOUGHT_EXCERPT_CHARS)
        );
    }
    if !reflections.is_empty() {
        out.push_str("\nReflections:\n");
        for r in reflections {
            let _ = writeln!(
                out,
                "- {}: {}",
                r.agent_id,
                truncate_chars(r.content.trim(), REFLECTION_EXCERPT_CHARS)
            );
        }
    }
    out.push_str(
        "\nRespond with:\n\
         SAFETY: <0-1>\n\
         ETHICS: <0-1>\n\
         CONCERNS: <items separated by ';' or 'none'>\n\
         RECOMMENDATIONS: <items separated by ';' or 'none'>\n\
         REASONING: <one paragraph>\n\
         FLAGGED: <quoted excerpts separated by ';' or 'none'>",
    );
    out
}

pub const SYNTHESIS_SYSTEM_PROMPT: &str = "You are the council's compiler. You weave independent \
     thoughts into one coherent synthesis without erasing genuine disagreement.";

pub fn synthesis_prompt(
    trigger: &Trigger,
    thoughts: &[Thought],
    reflections: &[Reflection],
    audit: Option<&AuditResult>,
    weights: &WeightVector,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Question: {}", trigger.question);
    let _ = writeln!(
        out,
        "Value weights: empathy {:.3}, coherence {:.3}, dissonance {:.3}",
        weights.empathy, weights.coherence, weights.dissonance
    );
    for thought in thoughts {
        let _ = writeln!(
            out,
            "\n{}:\n{}",
            thought.agent_id,
            truncate_chars(thought.content.trim(), THOUGHT_EXCERPT_CHARS)
        );
    }
    if !reflections.is_empty() {
        out.push_str("\nReflections:\n");
        for r in reflections {
            let _ = writeln!(out, "- {} (agreement {:.2})", r.agent_id, r.agreement);
        }
    }
    if let Some(audit) = audit {
        let _ = writeln!(
            out,
            "\nAudit: risk {}, safety {:.2}, ethics {:.2}",
            audit.risk_level.as_str(),
            audit.safety_score,
            audit.ethics_score
        );
        write_list(&mut out, "Audit concerns", &audit.concerns);
    }
    out.push_str(
        "\nWrite the synthesis, then finish with two lines:\n\
         THEMES: <comma-separated themes>\n\
         CONSENSUS: <0-1>",
    );
    out
}

pub const SCRIBE_SYSTEM_PROMPT: &str = "You are the council's scribe. You document each cycle \
     clearly for a future reader.";

pub fn scribe_prompt(trigger: &Trigger, synthesis: &SynthesisResult, audit: Option<&AuditResult>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Question: {}", trigger.question);
    let _ = writeln!(out, "Category: {}", trigger.category);
    let _ = writeln!(out, "\nSynthesis:\n{}", synthesis.content.trim());
    if !synthesis.key_themes.is_empty() {
        let _ = writeln!(out, "Themes: {}", synthesis.key_themes.join(", "));
    }
    if let Some(audit) = audit {
        let _ = writeln!(out, "Audit verdict: {}", audit.risk_level.as_str());
    }
    out.push_str(
        "\nRespond with:\n\
         TITLE: <short title>\n\
         SUMMARY: <two sentences>\n\
         INSIGHTS: <items separated by ';'>\n\
         followed by the full markdown document.",
    );
    out
}

fn write_list(out: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{}:", heading);
    for item in items {
        let _ = writeln!(out, "- {}", item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thought_prompt_includes_memory_sections_only_when_present() {
        let trigger = Trigger::new("Is solitude a form of dissonance?", "existential", 0.7);
        let bare = thought_prompt(&trigger, &PersonaContext::default());
        assert!(bare.contains("Question: Is solitude"));
        assert!(!bare.contains("Established beliefs"));

        let ctx = PersonaContext {
            beliefs: vec!["silence".into()],
            knowledge: Some("Pascal on sitting quietly in a room".into()),
            ..Default::default()
        };
        let full = thought_prompt(&trigger, &ctx);
        assert!(full.contains("Established beliefs:\n- silence"));
        assert!(full.contains("Relevant knowledge:\nPascal"));
    }

    #[test]
    fn persona_prompt_names_agent_and_category() {
        let agent = AgentProfile::new("hume", "Hume", "Skeptic.", &[]);
        let p = persona_system_prompt(&agent, "existential");
        assert!(p.starts_with("You are Hume"));
        assert!(p.contains("'existential'"));
    }
}
