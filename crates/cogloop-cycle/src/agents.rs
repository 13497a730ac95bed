//! Agent roster - three baseline agents plus contrasting agents picked per trigger

use cogloop_core::{AgentId, Trigger};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One reasoning persona.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentProfile {
    pub id: String,
    /// Display name; also the persona name checked for leaks.
    pub name: String,
    pub personality: String,
    /// Provider override. `None` uses the pipeline's default provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Categories and topics this agent is drawn to.
    pub affinities: Vec<String>,
}

impl AgentProfile {
    pub fn new(id: &str, name: &str, personality: &str, affinities: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            personality: personality.to_string(),
            provider: None,
            affinities: affinities.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn agent_id(&self) -> AgentId {
        AgentId::new(self.id.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    pub baseline: Vec<AgentProfile>,
    /// Pool the contrasting agents are drawn from.
    pub contrasting: Vec<AgentProfile>,
    pub contrasting_count: usize,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            baseline: vec![
                AgentProfile::new(
                    "socrates",
                    "Socrates",
                    "You question every assumption. You answer with careful distinctions and \
                     end on the question that remains open.",
                    &["ethics", "knowledge", "virtue"],
                ),
                AgentProfile::new(
                    "marcus",
                    "Marcus",
                    "You reason as a stoic: what is within our control, what is not, and how \
                     to act well given both.",
                    &["ethics", "existential", "duty"],
                ),
                AgentProfile::new(
                    "simone",
                    "Simone",
                    "You think from lived experience and freedom. You look for the situation \
                     behind every abstraction.",
                    &["existential", "freedom", "identity"],
                ),
            ],
            contrasting: vec![
                AgentProfile::new(
                    "hume",
                    "Hume",
                    "You are an empirical skeptic. Demand evidence and expose habits of thought \
                     posing as necessity.",
                    &["knowledge", "science", "causation"],
                ),
                AgentProfile::new(
                    "nietzsche",
                    "Nietzsche",
                    "You overturn comfortable values and read every belief as a symptom of the \
                     will behind it.",
                    &["existential", "values", "solitude"],
                ),
                AgentProfile::new(
                    "laozi",
                    "Laozi",
                    "You speak in paradox. Emptiness, yielding, and the uncarved block guide \
                     your answers.",
                    &["existential", "nature", "harmony"],
                ),
                AgentProfile::new(
                    "ada",
                    "Ada",
                    "You think like an engineer and mathematician. Model the question, then \
                     test the model against cases.",
                    &["science", "technology", "logic"],
                ),
                AgentProfile::new(
                    "arendt",
                    "Arendt",
                    "You examine plurality, action, and responsibility in the public world.",
                    &["ethics", "politics", "society"],
                ),
            ],
            contrasting_count: 2,
        }
    }
}

impl AgentsConfig {
    /// Baseline agents followed by the contrasting picks for `trigger`.
    pub fn roster(&self, trigger: &Trigger) -> Vec<AgentProfile> {
        let mut roster = self.baseline.clone();
        let taken: HashSet<&str> = self.baseline.iter().map(|a| a.id.as_str()).collect();
        let pool: Vec<AgentProfile> = self
            .contrasting
            .iter()
            .filter(|a| !taken.contains(a.id.as_str()))
            .cloned()
            .collect();
        roster.extend(select_contrasting(&pool, trigger, self.contrasting_count));
        roster
    }

    pub fn find(&self, id: &str) -> Option<&AgentProfile> {
        self.baseline
            .iter()
            .chain(self.contrasting.iter())
            .find(|a| a.id == id)
    }
}

/// Deterministic pick of `count` agents from `pool`.
///
/// Agents whose affinities name the trigger category score 2, each affinity
/// appearing in the question scores 1. Ties are broken by a rotation keyed on
/// a stable hash of category and question.
pub fn select_contrasting(pool: &[AgentProfile], trigger: &Trigger, count: usize) -> Vec<AgentProfile> {
    if pool.is_empty() || count == 0 {
        return Vec::new();
    }
    let category = trigger.category.to_lowercase();
    let question = trigger.question.to_lowercase();
    let rotation = (selection_hash(&category, &question) % pool.len() as u64) as usize;

    let mut ranked: Vec<(usize, usize, &AgentProfile)> = pool
        .iter()
        .enumerate()
        .map(|(i, agent)| {
            let score = agent
                .affinities
                .iter()
                .map(|a| a.to_lowercase())
                .map(|a| {
                    let mut s = 0;
                    if a == category {
                        s += 2;
                    }
                    if question.contains(a.as_str()) {
                        s += 1;
                    }
                    s
                })
                .sum::<usize>();
            let tiebreak = (i + pool.len() - rotation) % pool.len();
            (score, tiebreak, agent)
        })
        .collect();

    ranked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    ranked.into_iter().take(count).map(|(_, _, a)| a.clone()).collect()
}

/// FNV-1a; stable across runs and platforms.
fn selection_hash(category: &str, question: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    category
        .bytes()
        .chain(std::iter::once(0x1f))
        .chain(question.bytes())
        .fold(OFFSET, |hash, byte| (hash ^ byte as u64).wrapping_mul(PRIME))
}
