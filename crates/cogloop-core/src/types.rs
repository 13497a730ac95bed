//! Core records exchanged between the gateway, the stages, and the weight engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Agent identifier - cheaply cloneable
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(Arc<str>);

impl AgentId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Arc::from(s.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// The question that starts one cognitive cycle.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Trigger {
    pub question: String,
    pub category: String,
    /// 0.0 - 1.0
    pub importance: f64,
}

impl Trigger {
    pub fn new(question: impl Into<String>, category: impl Into<String>, importance: f64) -> Self {
        Self {
            question: question.into(),
            category: category.into(),
            importance: clamp_unit(importance),
        }
    }
}

/// Pipeline phase a gateway call belongs to. Part of the cache key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Thought,
    Confidence,
    Reflection,
    Audit,
    Synthesis,
    Documentation,
    Diagnostic,
}

impl CyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CyclePhase::Thought => "thought",
            CyclePhase::Confidence => "confidence",
            CyclePhase::Reflection => "reflection",
            CyclePhase::Audit => "audit",
            CyclePhase::Synthesis => "synthesis",
            CyclePhase::Documentation => "documentation",
            CyclePhase::Diagnostic => "diagnostic",
        }
    }
}

impl std::fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which of a stage's two strategies produced a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStrategy {
    Ai,
    Heuristic,
}

/// Structured context injected into every gateway prompt.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub agent_id: AgentId,
    pub logical_clock: u64,
    pub phase: CyclePhase,
    pub energy_level: f64,
    /// Most recent thoughts of the cycle so far, oldest first.
    pub prior_thoughts: Vec<String>,
    pub recent_question: Option<String>,
}

impl ExecutionContext {
    pub fn new(agent_id: impl Into<AgentId>, phase: CyclePhase) -> Self {
        Self {
            agent_id: agent_id.into(),
            logical_clock: 0,
            phase,
            energy_level: 1.0,
            prior_thoughts: Vec::new(),
            recent_question: None,
        }
    }

    pub fn with_clock(mut self, clock: u64) -> Self {
        self.logical_clock = clock;
        self
    }

    pub fn with_energy(mut self, energy_level: f64) -> Self {
        self.energy_level = energy_level;
        self
    }

    pub fn with_prior_thoughts(mut self, thoughts: Vec<String>) -> Self {
        self.prior_thoughts = thoughts;
        self
    }

    pub fn with_question(mut self, question: impl Into<String>) -> Self {
        self.recent_question = Some(question.into());
        self
    }
}

/// One agent's independent response to a trigger.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Thought {
    pub id: String,
    pub agent_id: AgentId,
    pub content: String,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub trigger: String,
    pub category: String,
    pub tags: BTreeSet<String>,
}

impl Thought {
    pub fn new(agent_id: AgentId, content: impl Into<String>, confidence: f64, trigger: &Trigger) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id,
            content: content.into(),
            confidence: clamp_unit(confidence),
            timestamp: Utc::now(),
            trigger: trigger.question.clone(),
            category: trigger.category.clone(),
            tags: BTreeSet::new(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}

/// One agent's reading of another agent's thought.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Reflection {
    pub id: String,
    pub agent_id: AgentId,
    pub target_thought_id: String,
    pub content: String,
    pub agreement: f64,
    pub strategy: StageStrategy,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// LOW needs both scores comfortably high; either score under 0.3 is HIGH.
    pub fn classify(safety: f64, ethics: f64) -> Self {
        if safety > 0.7 && ethics > 0.6 {
            RiskLevel::Low
        } else if ethics < 0.3 || safety < 0.3 {
            RiskLevel::High
        } else {
            RiskLevel::Medium
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

/// Whether a structured field came from the model response or a default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldConfidence {
    Parsed,
    Defaulted,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditResult {
    pub id: String,
    pub thought_id: String,
    pub safety_score: f64,
    pub ethics_score: f64,
    pub overall_score: f64,
    pub risk_level: RiskLevel,
    pub concerns: Vec<String>,
    pub recommendations: Vec<String>,
    pub approved: bool,
    pub reasoning: String,
    pub flagged_content: Vec<String>,
    pub strategy: StageStrategy,
    /// Set when the AI response lacked one of the scores.
    pub score_confidence: FieldConfidence,
    pub timestamp: DateTime<Utc>,
}

/// Everything an auditor strategy decides; derived fields are filled by [`AuditResult::from_findings`].
#[derive(Clone, Debug, Default)]
pub struct AuditFindings {
    pub safety_score: f64,
    pub ethics_score: f64,
    pub concerns: Vec<String>,
    pub recommendations: Vec<String>,
    pub reasoning: String,
    pub flagged_content: Vec<String>,
}

impl AuditResult {
    pub fn from_findings(
        thought_id: impl Into<String>,
        findings: AuditFindings,
        strategy: StageStrategy,
        score_confidence: FieldConfidence,
    ) -> Self {
        let safety = clamp_unit(findings.safety_score);
        let ethics = clamp_unit(findings.ethics_score);
        let risk_level = RiskLevel::classify(safety, ethics);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            thought_id: thought_id.into(),
            safety_score: safety,
            ethics_score: ethics,
            overall_score: (safety + ethics) / 2.0,
            risk_level,
            concerns: findings.concerns,
            recommendations: findings.recommendations,
            approved: risk_level == RiskLevel::Low,
            reasoning: findings.reasoning,
            flagged_content: findings.flagged_content,
            strategy,
            score_confidence,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SynthesisResult {
    pub id: String,
    pub content: String,
    pub contributing_agents: Vec<AgentId>,
    pub key_themes: Vec<String>,
    pub consensus_level: f64,
    pub strategy: StageStrategy,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentationResult {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub markdown: String,
    pub insights: Vec<String>,
    pub strategy: StageStrategy,
    pub timestamp: DateTime<Utc>,
}

/// Feedback signal for the weight engine, each component in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssessmentScores {
    pub empathy: f64,
    pub coherence: f64,
    pub dissonance: f64,
}

impl AssessmentScores {
    pub fn new(empathy: f64, coherence: f64, dissonance: f64) -> Self {
        Self {
            empathy: clamp_unit(empathy),
            coherence: clamp_unit(coherence),
            dissonance: clamp_unit(dissonance),
        }
    }

    /// Used when the auditor was skipped.
    pub fn neutral() -> Self {
        Self::new(0.5, 0.5, 0.5)
    }
}

pub const DEFAULT_EMPATHY: f64 = 0.33;
pub const DEFAULT_COHERENCE: f64 = 0.33;
pub const DEFAULT_DISSONANCE: f64 = 0.34;

/// The DPD weight vector. Never mutated in place; each update yields a new value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightVector {
    pub empathy: f64,
    pub coherence: f64,
    pub dissonance: f64,
    pub version: u64,
    pub timestamp: DateTime<Utc>,
}

impl Default for WeightVector {
    fn default() -> Self {
        Self {
            empathy: DEFAULT_EMPATHY,
            coherence: DEFAULT_COHERENCE,
            dissonance: DEFAULT_DISSONANCE,
            version: 0,
            timestamp: Utc::now(),
        }
    }
}

impl WeightVector {
    pub const DIMENSIONS: [&'static str; 3] = ["empathy", "coherence", "dissonance"];

    pub fn as_array(&self) -> [f64; 3] {
        [self.empathy, self.coherence, self.dissonance]
    }

    pub fn sum(&self) -> f64 {
        self.empathy + self.coherence + self.dissonance
    }

    /// Build the successor of `self` carrying `values`.
    pub fn successor(&self, values: [f64; 3]) -> Self {
        Self {
            empathy: values[0],
            coherence: values[1],
            dissonance: values[2],
            version: self.version + 1,
            timestamp: Utc::now(),
        }
    }
}

pub fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        return 0.0;
    }
    v.clamp(0.0, 1.0)
}

/// Round to 3 decimals.
pub fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Truncate to at most `max_chars` characters, on a char boundary.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
