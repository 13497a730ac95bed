//! Lexical quality heuristics. Thresholds are tuning policy; none of these
//! measure semantic quality.

use crate::types::QualityMetrics;
use cogloop_core::round3;
use std::collections::HashSet;

const IDEAL_MIN_WORDS_PER_SENTENCE: f64 = 12.0;
const IDEAL_MAX_WORDS_PER_SENTENCE: f64 = 25.0;
/// Response length at which the depth length component saturates.
const DEPTH_FULL_LENGTH: f64 = 800.0;
/// Length at which the confidence length bonus saturates.
const BONUS_FULL_LENGTH: f64 = 1000.0;
const DEFAULT_PROVIDER_CONFIDENCE: f64 = 0.75;
/// Relevance when there is nothing to compare against.
const NEUTRAL_RELEVANCE: f64 = 0.5;

const SURPRISE_MARKERS: &[char] = &['!', '?', '…', '—', ';'];

const COUNTERFACTUAL_CUES: &[&str] = &[
    "what if", "imagine", "suppose", "perhaps", "alternatively", "otherwise", "might", "could it be",
    "e se", "imagine-se", "suponha", "talvez", "caso contrário",
];

const CAUSAL_CUES: &[&str] = &[
    "because", "therefore", "thus", "hence", "since", "consequently", "as a result", "implies",
    "porque", "portanto", "logo", "pois", "consequentemente", "implica",
];

const PHILOSOPHICAL_TERMS: &[&str] = &[
    "consciousness", "existence", "being", "meaning", "truth", "ethics", "moral", "freedom",
    "identity", "self", "essence", "paradox", "dissonance", "empathy", "solitude", "mind",
    "reality", "virtue", "consciência", "existência", "ser", "sentido", "verdade", "ética",
    "liberdade", "identidade", "essência", "paradoxo", "dissonância", "empatia", "solidão",
];

/// Lowercased alphanumeric words.
pub fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '-')
        .map(|w| w.trim_matches('-').to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Jaccard similarity over words longer than three chars, 0.0-1.0.
pub fn correlation_score(text_a: &str, text_b: &str) -> f64 {
    let significant = |t: &str| -> HashSet<String> {
        words(t).into_iter().filter(|w| w.chars().count() > 3).collect()
    };
    let a = significant(text_a);
    let b = significant(text_b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(&b).count();
    let union = a.union(&b).count();
    intersection as f64 / union as f64
}

/// Number of distinct cues present, matched on word boundaries.
pub fn count_cues(text: &str, cues: &[&str]) -> usize {
    let tokens = words(text);
    let joined = format!(" {} ", tokens.join(" "));
    let set: HashSet<&str> = tokens.iter().map(String::as_str).collect();
    cues.iter()
        .filter(|cue| {
            if cue.contains(' ') {
                joined.contains(&format!(" {} ", cue))
            } else {
                set.contains(**cue)
            }
        })
        .count()
}

fn sentence_count(text: &str) -> usize {
    text.split(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .count()
        .max(1)
}

fn coherence(text: &str) -> f64 {
    let word_count = words(text).len() as f64;
    if word_count == 0.0 {
        return 0.0;
    }
    let ratio = word_count / sentence_count(text) as f64;
    if ratio < IDEAL_MIN_WORDS_PER_SENTENCE {
        ratio / IDEAL_MIN_WORDS_PER_SENTENCE
    } else if ratio <= IDEAL_MAX_WORDS_PER_SENTENCE {
        1.0
    } else {
        1.0 - (ratio - IDEAL_MAX_WORDS_PER_SENTENCE) / IDEAL_MAX_WORDS_PER_SENTENCE
    }
}

fn creativity(text: &str) -> f64 {
    let markers = text.chars().filter(|c| SURPRISE_MARKERS.contains(c)).count().min(6);
    let counterfactual = if count_cues(text, COUNTERFACTUAL_CUES) > 0 { 0.25 } else { 0.0 };
    0.3 + markers as f64 * 0.05 + counterfactual
}

fn depth(text: &str) -> f64 {
    let length = (text.chars().count() as f64 / DEPTH_FULL_LENGTH).min(1.0) * 0.6;
    let causal = (count_cues(text, CAUSAL_CUES) as f64 * 0.1).min(0.4);
    length + causal
}

fn relevance(text: &str, prior_thoughts: &[String]) -> f64 {
    if prior_thoughts.is_empty() {
        return NEUTRAL_RELEVANCE;
    }
    let best = prior_thoughts
        .iter()
        .map(|p| correlation_score(text, p))
        .fold(0.0, f64::max);
    0.3 + best * 2.0
}

fn philosophical_depth(text: &str) -> f64 {
    count_cues(text, PHILOSOPHICAL_TERMS) as f64 * 0.15
}

fn finish(v: f64) -> f64 {
    round3(v.clamp(0.0, 1.0))
}

pub fn score_quality(content: &str, prior_thoughts: &[String]) -> QualityMetrics {
    QualityMetrics {
        coherence: finish(coherence(content)),
        creativity: finish(creativity(content)),
        depth: finish(depth(content)),
        relevance: finish(relevance(content, prior_thoughts)),
        philosophical_depth: finish(philosophical_depth(content)),
    }
}

/// 60% provider confidence, 30% mean quality, 10% length bonus; in [0.1, 1.0].
pub fn confidence_score(provider_confidence: Option<f64>, quality: &QualityMetrics, content_len: usize) -> f64 {
    let provider = provider_confidence
        .filter(|c| c.is_finite())
        .unwrap_or(DEFAULT_PROVIDER_CONFIDENCE)
        .clamp(0.0, 1.0);
    let length_bonus = (content_len as f64 / BONUS_FULL_LENGTH).min(1.0) * 0.1;
    let blended = 0.6 * provider + 0.3 * quality.mean() + length_bonus;
    round3(blended.clamp(0.1, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_scores_low() {
        let q = score_quality("", &[]);
        assert_eq!(q.coherence, 0.0);
        assert_eq!(q.depth, 0.0);
        assert_eq!(q.relevance, 0.5);
    }

    #[test]
    fn causal_and_counterfactual_cues_raise_scores() {
        let plain = score_quality("The sky is blue today.", &[]);
        let rich = score_quality(
            "Perhaps solitude is needed because the self must hear itself; therefore, what if silence is a trainer?",
            &[],
        );
        assert!(rich.creativity > plain.creativity);
        assert!(rich.depth > plain.depth);
    }

    #[test]
    fn philosophical_vocabulary_counts_distinct_terms() {
        let q = score_quality("Consciousness, existence, and meaning. Meaning again.", &[]);
        assert_eq!(q.philosophical_depth, 0.45);
    }

    #[test]
    fn relevance_tracks_overlap_with_prior_thoughts() {
        let prior = vec!["Solitude reveals the inner dissonance of identity".to_string()];
        let related = score_quality("Solitude sharpens the dissonance within identity", &prior);
        let unrelated = score_quality("Bananas ripen quickly when stored warm", &prior);
        assert!(related.relevance > unrelated.relevance);
        assert_eq!(unrelated.relevance, 0.3);
    }

    #[test]
    fn bilingual_cues_are_recognised() {
        assert_eq!(count_cues("Talvez seja assim, porque a solidão ensina.", COUNTERFACTUAL_CUES), 1);
        assert_eq!(count_cues("Talvez seja assim, porque a solidão ensina.", CAUSAL_CUES), 1);
    }

    #[test]
    fn confidence_blend_and_clamp() {
        let q = QualityMetrics {
            coherence: 1.0,
            creativity: 1.0,
            depth: 1.0,
            relevance: 1.0,
            philosophical_depth: 1.0,
        };
        assert_eq!(confidence_score(Some(1.0), &q, 5000), 1.0);
        assert_eq!(confidence_score(None, &QualityMetrics::default(), 0), 0.45);
        assert_eq!(confidence_score(Some(0.0), &QualityMetrics::default(), 0), 0.1);
    }

    #[test]
    fn correlation_of_identical_texts_is_one() {
        assert_eq!(correlation_score("solitude speaks softly", "solitude speaks softly"), 1.0);
        assert_eq!(correlation_score("", "anything here"), 0.0);
    }
}
