//! S2 Mutual Reflection - each agent reads the next agent's thought, in ring order.

use super::{contents, two_path, Stage, StageEnv, StageOutcome};
use crate::agents::AgentProfile;
use crate::parser::{parse_agreement, strip_agreement};
use crate::prompts;
use cogloop_core::{round3, AgentId, CyclePhase, Reflection, StageStrategy, Thought};
use cogloop_gateway::quality::{correlation_score, words};
use futures::future::join_all;
use std::collections::BTreeSet;

const SHARED_TERMS_SHOWN: usize = 4;

/// One reflection per thought; empty when fewer than two agents responded.
pub async fn run(
    env: StageEnv<'_>,
    provider: Option<&str>,
    thoughts: &[Thought],
    roster: &[AgentProfile],
) -> StageOutcome<Vec<Reflection>> {
    if thoughts.len() < 2 {
        return StageOutcome::heuristic(Vec::new(), "fewer than two thoughts");
    }
    let prior = contents(thoughts);
    let calls = thoughts.iter().enumerate().map(|(i, own)| {
        let target = &thoughts[(i + 1) % thoughts.len()];
        let prior = prior.clone();
        async move {
            two_path(
                Stage::Reflection,
                provider,
                |provider| async move {
                    let profile = roster
                        .iter()
                        .find(|a| a.id == own.agent_id.as_str())
                        .cloned()
                        .unwrap_or_else(|| AgentProfile::new(own.agent_id.as_str(), own.agent_id.as_str(), "", &[]));
                    let ctx = env.context(own.agent_id.clone(), CyclePhase::Reflection, prior);
                    let reply = env
                        .call(
                            &provider,
                            &prompts::reflection_prompt(env.question, target),
                            &prompts::reflection_system_prompt(&profile),
                            &ctx,
                        )
                        .await?;
                    let agreement = parse_agreement(&reply)
                        .unwrap_or_else(|| lexical_agreement(&own.content, &target.content));
                    Ok(reflection(own.agent_id.clone(), target, strip_agreement(&reply), agreement, StageStrategy::Ai))
                },
                || heuristic_reflection(own, target),
            )
            .await
        }
    });

    let outcomes = join_all(calls).await;
    let fallback = outcomes
        .iter()
        .filter_map(|o| o.fallback_reason.clone())
        .next();
    let reflections: Vec<Reflection> = outcomes.into_iter().map(|o| o.value).collect();
    match fallback {
        None => StageOutcome::ai(reflections),
        Some(reason) => StageOutcome::heuristic(reflections, reason),
    }
}

/// Jaccard overlap stretched onto [0, 1]; unrelated texts land at 0.3.
pub fn lexical_agreement(own: &str, target: &str) -> f64 {
    round3((0.3 + correlation_score(own, target) * 2.0).clamp(0.0, 1.0))
}

pub fn heuristic_reflection(own: &Thought, target: &Thought) -> Reflection {
    let agreement = lexical_agreement(&own.content, &target.content);
    let own_terms: BTreeSet<String> = words(&own.content).into_iter().filter(|w| w.chars().count() > 4).collect();
    let shared: Vec<String> = words(&target.content)
        .into_iter()
        .filter(|w| own_terms.contains(w))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .take(SHARED_TERMS_SHOWN)
        .collect();

    let content = if shared.is_empty() {
        format!(
            "{} approaches the question from a different angle than {}; their thoughts share no key terms.",
            own.agent_id, target.agent_id
        )
    } else {
        format!(
            "{} finds common ground with {} on {}.",
            own.agent_id,
            target.agent_id,
            shared.join(", ")
        )
    };
    reflection(own.agent_id.clone(), target, content, agreement, StageStrategy::Heuristic)
}

fn reflection(agent_id: AgentId, target: &Thought, content: String, agreement: f64, strategy: StageStrategy) -> Reflection {
    Reflection {
        id: uuid::Uuid::new_v4().to_string(),
        agent_id,
        target_thought_id: target.id.clone(),
        content,
        agreement: round3(agreement.clamp(0.0, 1.0)),
        strategy,
        timestamp: chrono::Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cogloop_core::Trigger;

    #[test]
    fn heuristic_reflection_cites_shared_terms() {
        let trigger = Trigger::new("q", "c", 0.5);
        let a = Thought::new(AgentId::new("a"), "Solitude breeds dissonance within", 0.5, &trigger);
        let b = Thought::new(AgentId::new("b"), "Dissonance is what solitude reveals", 0.5, &trigger);
        let r = heuristic_reflection(&a, &b);
        assert_eq!(r.target_thought_id, b.id);
        assert!(r.content.contains("dissonance"));
        assert!(r.agreement > 0.3);
        assert_eq!(r.strategy, StageStrategy::Heuristic);
    }
}
