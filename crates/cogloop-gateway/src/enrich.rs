//! Context injection. Output depends only on the inputs, so the same
//! context always yields the same enriched prompts.

use cogloop_core::{truncate_chars, ExecutionContext};

/// How many prior thoughts are carried into a prompt.
pub const PRIOR_THOUGHTS_IN_PROMPT: usize = 2;
const PRIOR_THOUGHT_CHARS: usize = 280;

pub fn enrich_prompt(prompt: &str, ctx: &ExecutionContext) -> String {
    let mut out = String::with_capacity(prompt.len() + 512);
    out.push_str("[Cycle context]\n");
    out.push_str(&format!("Agent: {}\n", ctx.agent_id));
    out.push_str(&format!("Logical clock: {}\n", ctx.logical_clock));
    out.push_str(&format!("Phase: {}\n", ctx.phase));
    out.push_str(&format!("Energy level: {:.2}\n", ctx.energy_level));

    if let Some(question) = &ctx.recent_question {
        out.push_str(&format!("Recent question: {}\n", question));
    }

    let skip = ctx.prior_thoughts.len().saturating_sub(PRIOR_THOUGHTS_IN_PROMPT);
    let recent: Vec<&String> = ctx.prior_thoughts.iter().skip(skip).collect();
    if !recent.is_empty() {
        out.push_str("Prior thoughts:\n");
        for thought in recent {
            out.push_str(&format!("- {}\n", truncate_chars(thought.trim(), PRIOR_THOUGHT_CHARS)));
        }
    }

    out.push('\n');
    out.push_str(prompt);
    out
}

pub fn enrich_system_prompt(system_prompt: &str, ctx: &ExecutionContext) -> String {
    let line = format!(
        "You are participating as agent '{}' in the {} phase of cognitive cycle {}.",
        ctx.agent_id, ctx.phase, ctx.logical_clock
    );
    if system_prompt.trim().is_empty() {
        line
    } else {
        format!("{}\n\n{}", system_prompt.trim_end(), line)
    }
}
