//! S1 Individual Thought - one gateway call per roster agent, bounded concurrency.

use super::StageEnv;
use crate::agents::AgentProfile;
use crate::parser::parse_unit_number;
use crate::prompts::{self, PersonaContext, CONFIDENCE_SYSTEM_PROMPT};
use cogloop_core::{round3, CyclePhase, Thought, Trigger};
use cogloop_gateway::quality::{count_cues, words};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

pub const MIN_CONFIDENCE: f64 = 0.05;
pub const MAX_CONFIDENCE: f64 = 0.95;

const SWEET_SPOT_MIN_CHARS: usize = 150;
const SWEET_SPOT_MAX_CHARS: usize = 1_200;

const DOMAIN_TERMS: &[&str] = &[
    "consciousness", "existence", "meaning", "truth", "ethics", "moral", "freedom", "identity",
    "self", "solitude", "dissonance", "empathy", "virtue", "reason", "mind", "being", "paradox",
    "consciência", "existência", "sentido", "verdade", "ética", "liberdade", "identidade",
    "solidão", "dissonância", "empatia", "virtude", "razão", "mente",
];

const CONNECTIVES: &[&str] = &[
    "because", "therefore", "however", "although", "thus", "hence", "whereas", "since",
    "porque", "portanto", "contudo", "embora", "logo", "entretanto", "pois",
];

pub const CONFIDENCE_TAG_AI: &str = "confidence:ai";
pub const CONFIDENCE_TAG_HEURISTIC: &str = "confidence:heuristic";

/// S1 settings taken from the pipeline config.
#[derive(Clone, Debug)]
pub struct ThoughtSettings {
    pub default_provider: String,
    pub max_concurrency: usize,
    pub ai_confidence: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ThoughtStageResult {
    /// Roster order, responding agents only.
    pub thoughts: Vec<Thought>,
    pub failed_agents: Vec<String>,
    /// Thoughts whose confidence came from the heuristic.
    pub heuristic_confidence: usize,
}

pub async fn run(
    env: StageEnv<'_>,
    settings: &ThoughtSettings,
    trigger: &Trigger,
    roster: &[AgentProfile],
    persona: &PersonaContext,
) -> ThoughtStageResult {
    let permits = settings.max_concurrency.min(roster.len()).max(1);
    let semaphore = Arc::new(Semaphore::new(permits));
    let names: Vec<&str> = roster.iter().map(|a| a.name.as_str()).collect();
    let prompt = prompts::thought_prompt(trigger, persona);

    let calls = roster.iter().map(|agent| {
        let semaphore = semaphore.clone();
        let prompt = prompt.as_str();
        let names = names.as_slice();
        async move {
            // The semaphore is never closed.
            let _permit = semaphore.acquire().await.ok();
            think(env, settings, trigger, agent, prompt, persona, names).await
        }
    });

    let mut result = ThoughtStageResult::default();
    for (agent, outcome) in roster.iter().zip(join_all(calls).await) {
        match outcome {
            Some((thought, ai_rated)) => {
                if !ai_rated {
                    result.heuristic_confidence += 1;
                }
                result.thoughts.push(thought);
            }
            None => result.failed_agents.push(agent.id.clone()),
        }
    }
    result
}

async fn think(
    env: StageEnv<'_>,
    settings: &ThoughtSettings,
    trigger: &Trigger,
    agent: &AgentProfile,
    prompt: &str,
    persona: &PersonaContext,
    roster_names: &[&str],
) -> Option<(Thought, bool)> {
    let provider = agent.provider.as_deref().unwrap_or(&settings.default_provider);
    let system = prompts::persona_system_prompt(agent, &trigger.category);
    let ctx = env.context(agent.agent_id(), CyclePhase::Thought, persona.significant_thoughts.clone());

    let content = match env.call(provider, prompt, &system, &ctx).await {
        Ok(content) => content.trim().to_string(),
        Err(e) => {
            warn!(agent = agent.id.as_str(), provider, "Agent produced no thought: {}", e);
            return None;
        }
    };

    let rated = if settings.ai_confidence {
        rate_confidence(env, provider, agent, &trigger.question, &content).await
    } else {
        None
    };
    let ai_rated = rated.is_some();
    let confidence = rated.unwrap_or_else(|| heuristic_confidence(&content, roster_names));
    debug!(agent = agent.id.as_str(), confidence, ai_rated, "Thought produced");

    let tag = if ai_rated { CONFIDENCE_TAG_AI } else { CONFIDENCE_TAG_HEURISTIC };
    let thought = Thought::new(agent.agent_id(), content, confidence, trigger)
        .with_tags([trigger.category.to_lowercase(), tag.to_string()]);
    Some((thought, ai_rated))
}

async fn rate_confidence(
    env: StageEnv<'_>,
    provider: &str,
    agent: &AgentProfile,
    question: &str,
    content: &str,
) -> Option<f64> {
    let ctx = env.context(agent.agent_id(), CyclePhase::Confidence, vec![content.to_string()]);
    let prompt = prompts::confidence_prompt(question, content);
    match env.call(provider, &prompt, CONFIDENCE_SYSTEM_PROMPT, &ctx).await {
        Ok(reply) => {
            let parsed = parse_unit_number(&reply);
            if parsed.is_none() {
                warn!(agent = agent.id.as_str(), "Unparseable confidence rating, using heuristic");
            }
            parsed.map(|c| round3(c.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)))
        }
        Err(e) => {
            debug!(agent = agent.id.as_str(), "Confidence rating failed: {}", e);
            None
        }
    }
}

/// Lexical confidence estimate in [0.05, 0.95].
pub fn heuristic_confidence(content: &str, roster_names: &[&str]) -> f64 {
    let len = content.chars().count();
    let mut score = 0.5;

    score += if (SWEET_SPOT_MIN_CHARS..=SWEET_SPOT_MAX_CHARS).contains(&len) {
        0.15
    } else if len < 40 {
        -0.15
    } else {
        0.05
    };
    score += (count_cues(content, DOMAIN_TERMS) as f64 * 0.03).min(0.15);
    score += (count_cues(content, CONNECTIVES) as f64 * 0.03).min(0.12);
    if content.contains('?') {
        score += 0.05;
    }
    if persona_leak(content, roster_names) {
        score -= 0.2;
    }

    round3(score.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE))
}

/// First-person self-identification with a roster persona ("I am Hume", "eu sou Laozi").
pub fn persona_leak(content: &str, roster_names: &[&str]) -> bool {
    let joined = format!(" {} ", words(content).join(" "));
    roster_names.iter().any(|name| {
        let name = name.to_lowercase();
        ["i am", "i m", "as", "eu sou", "como"]
            .iter()
            .any(|lead| joined.contains(&format!(" {} {} ", lead, name)))
    })
}
