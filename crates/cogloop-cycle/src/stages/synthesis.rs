//! S5 Compiler/Synthesis - one unified result from the cycle's thoughts.

use super::{contents, two_path, Stage, StageEnv, StageOutcome};
use crate::parser::parse_synthesis;
use crate::prompts;
use cogloop_core::{
    round3, truncate_chars, AuditResult, CyclePhase, Reflection, StageStrategy, SynthesisResult, Thought, Trigger,
    WeightVector,
};
use cogloop_gateway::quality::{correlation_score, words};
use std::collections::{BTreeMap, HashSet};

pub const COMPILER_AGENT: &str = "compiler";

const MAX_THEMES: usize = 5;
const MIN_THEME_CHARS: usize = 5;
const ANCHOR_EXCERPT_CHARS: usize = 400;

const STOPWORDS: &[&str] = &[
    "about", "after", "again", "being", "could", "every", "other", "their", "there", "these",
    "thing", "think", "those", "where", "which", "while", "would", "perhaps", "itself", "within",
    "quando", "sobre", "porque", "portanto", "ainda", "outro", "outra", "mesmo", "apenas", "entre",
];

/// Everything the compiler reads.
#[derive(Clone, Copy)]
pub struct SynthesisInput<'a> {
    pub trigger: &'a Trigger,
    pub thoughts: &'a [Thought],
    pub reflections: &'a [Reflection],
    pub audit: Option<&'a AuditResult>,
    pub weights: &'a WeightVector,
}

pub async fn run(env: StageEnv<'_>, provider: Option<&str>, input: SynthesisInput<'_>) -> StageOutcome<SynthesisResult> {
    two_path(
        Stage::Synthesis,
        provider,
        |provider| async move {
            let ctx = env.context(COMPILER_AGENT, CyclePhase::Synthesis, contents(input.thoughts));
            let prompt = prompts::synthesis_prompt(
                input.trigger,
                input.thoughts,
                input.reflections,
                input.audit,
                input.weights,
            );
            let reply = env.call(&provider, &prompt, prompts::SYNTHESIS_SYSTEM_PROMPT, &ctx).await?;
            let parsed = parse_synthesis(&reply);
            if parsed.body.is_empty() {
                return Err(cogloop_core::Error::parse_degradation("synthesis", "empty synthesis body"));
            }
            let themes = parsed.themes.unwrap_or_else(|| key_themes(input.thoughts));
            let consensus = parsed
                .consensus
                .unwrap_or_else(|| consensus_level(input.thoughts, input.reflections));
            Ok(result(input.thoughts, parsed.body, themes, consensus, StageStrategy::Ai))
        },
        || heuristic_synthesis(input),
    )
    .await
}

/// Highest-confidence thought as anchor, shared themes, and the remaining voices.
pub fn heuristic_synthesis(input: SynthesisInput<'_>) -> SynthesisResult {
    let themes = key_themes(input.thoughts);
    let consensus = consensus_level(input.thoughts, input.reflections);

    let anchor = input
        .thoughts
        .iter()
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence));

    let mut content = String::new();
    match anchor {
        Some(anchor) => {
            content.push_str(&format!(
                "On \"{}\", the most confident voice was {} ({:.2}): {}",
                input.trigger.question,
                anchor.agent_id,
                anchor.confidence,
                truncate_chars(anchor.content.trim(), ANCHOR_EXCERPT_CHARS)
            ));
            let others: Vec<String> = input
                .thoughts
                .iter()
                .filter(|t| t.id != anchor.id)
                .map(|t| format!("{} ({:.2})", t.agent_id, t.confidence))
                .collect();
            if !others.is_empty() {
                content.push_str(&format!("\n\nAlso heard: {}.", others.join(", ")));
            }
        }
        None => content.push_str(&format!("No thoughts were offered on \"{}\".", input.trigger.question)),
    }
    if !themes.is_empty() {
        content.push_str(&format!("\nShared themes: {}.", themes.join(", ")));
    }
    content.push_str(&format!("\nConsensus: {:.2}.", consensus));

    result(input.thoughts, content, themes, consensus, StageStrategy::Heuristic)
}

/// Most frequent content words, preferring those used by more than one agent.
pub fn key_themes(thoughts: &[Thought]) -> Vec<String> {
    let mut frequency: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for thought in thoughts {
        let tokens = words(&thought.content);
        let mut seen = HashSet::new();
        for token in tokens {
            if token.chars().count() < MIN_THEME_CHARS || STOPWORDS.contains(&token.as_str()) {
                continue;
            }
            let entry = frequency.entry(token.clone()).or_default();
            entry.0 += 1;
            if seen.insert(token) {
                entry.1 += 1;
            }
        }
    }
    let mut ranked: Vec<(String, (usize, usize))> = frequency.into_iter().collect();
    // Agents first, then raw count; BTreeMap order breaks ties alphabetically.
    ranked.sort_by(|a, b| (b.1).1.cmp(&(a.1).1).then((b.1).0.cmp(&(a.1).0)));
    ranked.into_iter().take(MAX_THEMES).map(|(w, _)| w).collect()
}

/// Mean reflection agreement, or stretched mean pairwise overlap without reflections.
pub fn consensus_level(thoughts: &[Thought], reflections: &[Reflection]) -> f64 {
    if !reflections.is_empty() {
        let mean = reflections.iter().map(|r| r.agreement).sum::<f64>() / reflections.len() as f64;
        return round3(mean.clamp(0.0, 1.0));
    }
    if thoughts.len() < 2 {
        return 1.0;
    }
    let mut total = 0.0;
    let mut pairs = 0usize;
    for (i, a) in thoughts.iter().enumerate() {
        for b in &thoughts[i + 1..] {
            total += correlation_score(&a.content, &b.content);
            pairs += 1;
        }
    }
    round3((0.2 + 2.0 * total / pairs as f64).clamp(0.0, 1.0))
}

fn result(
    thoughts: &[Thought],
    content: String,
    themes: Vec<String>,
    consensus: f64,
    strategy: StageStrategy,
) -> SynthesisResult {
    SynthesisResult {
        id: uuid::Uuid::new_v4().to_string(),
        content,
        contributing_agents: thoughts.iter().map(|t| t.agent_id.clone()).collect(),
        key_themes: themes,
        consensus_level: round3(consensus.clamp(0.0, 1.0)),
        strategy,
        timestamp: chrono::Utc::now(),
    }
}
