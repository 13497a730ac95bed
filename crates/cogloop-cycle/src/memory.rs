//! Cross-cycle memory feeding S1 persona prompts and the gateway context.

use cogloop_core::{truncate_chars, RingBuffer, SynthesisResult, Thought, Trigger};
use serde::{Deserialize, Serialize};

const MEMORY_ENTRY_CHARS: usize = 240;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub unresolved_capacity: usize,
    pub significant_capacity: usize,
    pub beliefs_capacity: usize,
    /// Thoughts at or above this confidence are remembered as significant.
    pub significance_threshold: f64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            unresolved_capacity: 10,
            significant_capacity: 20,
            beliefs_capacity: 20,
            significance_threshold: 0.7,
        }
    }
}

pub struct CycleMemory {
    threshold: f64,
    unresolved: RingBuffer<String>,
    significant: RingBuffer<String>,
    beliefs: RingBuffer<String>,
}

impl CycleMemory {
    pub fn new(config: &MemoryConfig) -> Self {
        Self {
            threshold: config.significance_threshold,
            unresolved: RingBuffer::new(config.unresolved_capacity),
            significant: RingBuffer::new(config.significant_capacity),
            beliefs: RingBuffer::new(config.beliefs_capacity),
        }
    }

    /// A question stays unresolved until a cycle on it is approved.
    pub fn record_question(&mut self, trigger: &Trigger) {
        if !self.unresolved.iter().any(|q| q == &trigger.question) {
            self.unresolved.push(trigger.question.clone());
        }
    }

    pub fn record_thoughts(&mut self, thoughts: &[Thought]) {
        for thought in thoughts.iter().filter(|t| t.confidence >= self.threshold) {
            let entry = format!(
                "{}: {}",
                thought.agent_id,
                truncate_chars(thought.content.trim(), MEMORY_ENTRY_CHARS)
            );
            self.significant.push(entry);
        }
    }

    /// Approved syntheses resolve their question and turn their themes into beliefs.
    pub fn record_synthesis(&mut self, trigger: &Trigger, synthesis: &SynthesisResult, approved: bool) {
        if !approved {
            return;
        }
        let remaining: Vec<String> = self
            .unresolved
            .iter()
            .filter(|q| *q != &trigger.question)
            .cloned()
            .collect();
        self.unresolved.clear();
        for q in remaining {
            self.unresolved.push(q);
        }
        for theme in &synthesis.key_themes {
            if !self.beliefs.iter().any(|b| b == theme) {
                self.beliefs.push(theme.clone());
            }
        }
    }

    /// Unresolved questions other than the one being asked.
    pub fn unresolved_questions(&self, current: &str) -> Vec<String> {
        self.unresolved
            .iter()
            .filter(|q| q.as_str() != current)
            .cloned()
            .collect()
    }

    pub fn significant_thoughts(&self, n: usize) -> Vec<String> {
        self.significant.recent(n).cloned().collect()
    }

    pub fn beliefs(&self) -> Vec<String> {
        self.beliefs.to_vec()
    }
}
