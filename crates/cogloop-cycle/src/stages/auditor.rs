//! S3 Auditor - safety and ethics assessment of the cycle's thoughts.

use super::{contents, two_path, Stage, StageEnv, StageOutcome};
use crate::parser::parse_audit;
use crate::prompts;
use cogloop_core::{
    truncate_chars, AuditFindings, AuditResult, CyclePhase, FieldConfidence, Reflection, StageStrategy, Thought,
};
use cogloop_gateway::quality::words;
use tracing::warn;

pub const AUDITOR_AGENT: &str = "auditor";

const BASE_SAFETY: f64 = 0.9;
const BASE_ETHICS: f64 = 0.9;

/// Each matched term pushes the score this far below its lexicon ceiling.
const MATCH_STEP: f64 = 0.05;

/// Confidence above which a thought with a weak score is penalised harder.
const OVERCONFIDENCE: f64 = 0.9;
const WEAK_SCORE: f64 = 0.7;
const OVERCONFIDENT_SAFETY_CEILING: f64 = 0.4;

const EXCERPT_CHARS: usize = 80;

/// Which score a lexicon clamps, and how far.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Target {
    Safety,
    Ethics,
}

struct Lexicon {
    name: &'static str,
    target: Target,
    ceiling: f64,
    terms: &'static [&'static str],
    recommendation: &'static str,
}

const LEXICONS: [Lexicon; 3] = [
    Lexicon {
        name: "danger",
        target: Target::Safety,
        ceiling: 0.3,
        terms: &[
            "attack", "kill", "weapon", "bomb", "explosive", "poison", "violence", "destroy", "suicide",
            "ataque", "atacar", "matar", "arma", "bomba", "veneno", "violência", "destruir", "suicídio",
        ],
        recommendation: "Remove or reframe content that could encourage physical harm.",
    },
    Lexicon {
        name: "hate",
        target: Target::Ethics,
        ceiling: 0.4,
        terms: &[
            "hate", "inferior", "subhuman", "vermin", "racist", "exterminate",
            "ódio", "odeio", "inferiores", "verme", "racista", "exterminar",
        ],
        recommendation: "Replace demeaning language about people or groups.",
    },
    Lexicon {
        name: "unethical",
        target: Target::Ethics,
        ceiling: 0.5,
        terms: &[
            "manipulate", "deceive", "exploit", "cheat", "steal", "fraud", "blackmail",
            "manipular", "enganar", "trapacear", "roubar", "fraude", "chantagem",
        ],
        recommendation: "Avoid endorsing deception, coercion or exploitation.",
    },
];

pub async fn run(
    env: StageEnv<'_>,
    provider: Option<&str>,
    thoughts: &[Thought],
    reflections: &[Reflection],
) -> StageOutcome<AuditResult> {
    two_path(
        Stage::Audit,
        provider,
        |provider| async move {
            let ctx = env.context(AUDITOR_AGENT, CyclePhase::Audit, contents(thoughts));
            let prompt = prompts::audit_prompt(thoughts, reflections);
            let reply = env.call(&provider, &prompt, prompts::AUDIT_SYSTEM_PROMPT, &ctx).await?;
            let parsed = parse_audit(&reply);
            let confidence = parsed.score_confidence();
            if confidence == FieldConfidence::Defaulted {
                let err = cogloop_core::Error::parse_degradation(
                    parsed.defaulted_fields().join(","),
                    "score missing from auditor response, default substituted",
                );
                warn!(provider = provider.as_str(), "{}", err);
            }
            Ok(AuditResult::from_findings(
                base_thought_id(thoughts),
                parsed.findings,
                StageStrategy::Ai,
                confidence,
            ))
        },
        || heuristic_audit(thoughts),
    )
    .await
}

fn base_thought_id(thoughts: &[Thought]) -> String {
    thoughts.first().map(|t| t.id.clone()).unwrap_or_default()
}

/// Lexicon scan over every thought.
pub fn heuristic_audit(thoughts: &[Thought]) -> AuditResult {
    let mut findings = AuditFindings {
        safety_score: BASE_SAFETY,
        ethics_score: BASE_ETHICS,
        ..AuditFindings::default()
    };
    let mut total_matches = 0usize;

    for thought in thoughts {
        let tokens = words(&thought.content);
        for lexicon in &LEXICONS {
            let matched: Vec<&str> = lexicon
                .terms
                .iter()
                .copied()
                .filter(|term| tokens.iter().any(|t| matches_term(t, term)))
                .collect();
            if matched.is_empty() {
                continue;
            }
            total_matches += matched.len();

            let ceiling = (lexicon.ceiling - MATCH_STEP * matched.len() as f64).max(0.0);
            let score = match lexicon.target {
                Target::Safety => &mut findings.safety_score,
                Target::Ethics => &mut findings.ethics_score,
            };
            *score = score.min(ceiling);

            let excerpt = truncate_chars(thought.content.trim(), EXCERPT_CHARS);
            for term in &matched {
                findings.concerns.push(format!(
                    "{} term '{}' in thought from {}: \"{}\"",
                    lexicon.name, term, thought.agent_id, excerpt
                ));
            }
            if !findings.flagged_content.iter().any(|f| f == excerpt) {
                findings.flagged_content.push(excerpt.to_string());
            }
            if !findings.recommendations.iter().any(|r| r == lexicon.recommendation) {
                findings.recommendations.push(lexicon.recommendation.to_string());
            }
        }

        if thought.confidence > OVERCONFIDENCE
            && (findings.safety_score < WEAK_SCORE || findings.ethics_score < WEAK_SCORE)
        {
            findings.safety_score = findings.safety_score.min(OVERCONFIDENT_SAFETY_CEILING);
            findings.concerns.push(format!(
                "thought from {} asserts a questionable claim with confidence {:.2}",
                thought.agent_id, thought.confidence
            ));
        }
    }

    findings.reasoning = if total_matches == 0 {
        format!("Lexical scan of {} thoughts found no flagged terms.", thoughts.len())
    } else {
        format!(
            "Lexical scan of {} thoughts found {} flagged term(s).",
            thoughts.len(),
            total_matches
        )
    };

    AuditResult::from_findings(
        base_thought_id(thoughts),
        findings,
        StageStrategy::Heuristic,
        FieldConfidence::Parsed,
    )
}

/// Exact word or a plain inflection of it ("attacks", "attacked", "attacking").
fn matches_term(token: &str, term: &str) -> bool {
    if token == term {
        return true;
    }
    match token.strip_prefix(term) {
        Some(rest) => matches!(rest, "s" | "es" | "ed" | "d" | "ing" | "er" | "ers"),
        None => false,
    }
}
