use serde::{Deserialize, Serialize};

/// Tunables for the weight engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DpdConfig {
    pub learning_rate: f64,
    /// Fraction of each weight kept per update; the rest drifts to 1/3.
    pub decay: f64,
    pub perturbation_enabled: bool,
    /// Every Nth update is a perturbation round.
    pub perturbation_interval: u64,
    /// Upper bound on the magnitude of any perturbation component.
    pub perturbation_strength: f64,
    pub min_weight: f64,
    pub max_weight: f64,
    pub performance_target: f64,
    pub history_capacity: usize,
    /// Fixed seed for reproducible perturbations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for DpdConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.05,
            decay: 0.99,
            perturbation_enabled: true,
            perturbation_interval: 10,
            perturbation_strength: 0.15,
            min_weight: 0.10,
            max_weight: 0.75,
            performance_target: 0.75,
            history_capacity: 100,
            seed: None,
        }
    }
}

impl DpdConfig {
    pub fn without_perturbation(mut self) -> Self {
        self.perturbation_enabled = false;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}
