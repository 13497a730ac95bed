//! WeightEngine - pure transitions WeightVector × AssessmentScores → WeightVector

use crate::config::DpdConfig;
use cogloop_core::{
    round3, AssessmentScores, RingBuffer, WeightVector, DEFAULT_COHERENCE, DEFAULT_DISSONANCE, DEFAULT_EMPATHY,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Dissonance is steered toward this share of the performance target.
pub const DISSONANCE_TARGET_RATIO: f64 = 0.65;

/// Window of update magnitudes behind the convergence metric.
const CONVERGENCE_WINDOW: usize = 5;
/// A mean step of 0.05 or more reads as fully unconverged.
const CONVERGENCE_SCALE: f64 = 20.0;

const DEFAULT_SPLIT: [f64; 3] = [DEFAULT_EMPATHY, DEFAULT_COHERENCE, DEFAULT_DISSONANCE];

/// Everything one update produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightUpdate {
    pub previous: WeightVector,
    pub new_weights: WeightVector,
    pub scores: AssessmentScores,
    /// Per-dimension loss, in [empathy, coherence, dissonance] order.
    pub losses: [f64; 3],
    /// The zero-sum triple added this round, if any.
    pub perturbation: Option<[f64; 3]>,
    /// Normalization hit a non-finite or non-positive sum and reset to the default split.
    pub collapsed: bool,
    pub update_magnitude: f64,
    /// 0.0 = settled, 1.0 = moving (or not enough data yet).
    pub convergence_metric: f64,
    pub explanation: String,
}

pub struct WeightEngine {
    config: DpdConfig,
    update_count: u64,
    history: RingBuffer<WeightUpdate>,
    rng: StdRng,
}

impl WeightEngine {
    pub fn new(mut config: DpdConfig) -> Self {
        if config.min_weight > config.max_weight {
            warn!(
                min = config.min_weight,
                max = config.max_weight,
                "min_weight above max_weight, swapping"
            );
            std::mem::swap(&mut config.min_weight, &mut config.max_weight);
        }
        if config.min_weight * 3.0 > 1.0 || config.max_weight * 3.0 < 1.0 {
            warn!(
                min = config.min_weight,
                max = config.max_weight,
                "Weight bounds cannot hold a sum of 1"
            );
        }
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            history: RingBuffer::new(config.history_capacity),
            config,
            update_count: 0,
            rng,
        }
    }

    pub fn config(&self) -> &DpdConfig {
        &self.config
    }

    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    /// Oldest first.
    pub fn history(&self) -> impl Iterator<Item = &WeightUpdate> + '_ {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn last_update(&self) -> Option<&WeightUpdate> {
        self.history.last()
    }

    /// Update against the configured performance target.
    pub fn update(&mut self, current: &WeightVector, scores: &AssessmentScores) -> WeightUpdate {
        let target = self.config.performance_target;
        self.update_weights(current, scores, target)
    }

    pub fn update_weights(
        &mut self,
        current: &WeightVector,
        scores: &AssessmentScores,
        performance_target: f64,
    ) -> WeightUpdate {
        self.update_count += 1;
        let perturb = self.config.perturbation_enabled
            && self.config.perturbation_interval > 0
            && self.update_count % self.config.perturbation_interval == 0;

        let losses = compute_losses(scores, performance_target);
        let old = current.as_array();

        let mut w = [0.0; 3];
        for i in 0..3 {
            w[i] = old[i] * (-self.config.learning_rate * losses[i]).exp();
            w[i] = w[i] * self.config.decay + (1.0 - self.config.decay) / 3.0;
        }

        let perturbation = perturb.then(|| self.perturbation_triple());
        if let Some(p) = perturbation {
            debug!(update = self.update_count, ?p, "Perturbation round");
            for i in 0..3 {
                w[i] += p[i];
            }
        }

        let (w, collapsed_first) = normalize(w);
        let w = project_bounded(w, self.config.min_weight, self.config.max_weight);
        let (w, collapsed_second) = normalize(w);
        let collapsed = collapsed_first || collapsed_second;
        if collapsed {
            warn!(update = self.update_count, "Weight normalization collapsed, reset to default split");
        }
        let w = round_preserving_sum(w, self.config.min_weight, self.config.max_weight);

        let new_weights = current.successor(w);
        let update_magnitude = euclidean(&old, &w);
        let convergence_metric = self.convergence_metric(update_magnitude);
        let explanation = explain(&old, &w, update_magnitude, perturbation.is_some());

        let update = WeightUpdate {
            previous: current.clone(),
            new_weights,
            scores: *scores,
            losses,
            perturbation,
            collapsed,
            update_magnitude,
            convergence_metric,
            explanation,
        };
        self.history.push(update.clone());
        update
    }

    /// Zero-sum triple `(r, r2, -(r + r2))`; no component exceeds the strength.
    pub fn perturbation_triple(&mut self) -> [f64; 3] {
        let half = self.config.perturbation_strength.abs() / 2.0;
        let r = self.rng.random_range(-half..=half);
        let r2 = self.rng.random_range(-half..=half);
        [r, r2, -(r + r2)]
    }

    fn convergence_metric(&self, current_magnitude: f64) -> f64 {
        if self.history.len() < CONVERGENCE_WINDOW {
            return 1.0;
        }
        let recent: f64 = self
            .history
            .recent(CONVERGENCE_WINDOW - 1)
            .map(|u| u.update_magnitude)
            .sum::<f64>()
            + current_magnitude;
        let mean = recent / CONVERGENCE_WINDOW as f64;
        round3((mean * CONVERGENCE_SCALE).clamp(0.0, 1.0))
    }
}

fn compute_losses(scores: &AssessmentScores, target: f64) -> [f64; 3] {
    let hinge = |t: f64, s: f64| (t - s).max(0.0).powi(2);
    [
        hinge(target, scores.empathy),
        hinge(target, scores.coherence),
        hinge(target * DISSONANCE_TARGET_RATIO, scores.dissonance),
    ]
}

/// Scale to sum 1. A non-finite or non-positive sum resets to the default split.
fn normalize(w: [f64; 3]) -> ([f64; 3], bool) {
    let sum: f64 = w.iter().sum();
    if !sum.is_finite() || sum <= 0.0 || w.iter().any(|v| !v.is_finite()) {
        return (DEFAULT_SPLIT, true);
    }
    (w.map(|v| v / sum), false)
}

/// Clamp into [lo, hi] while keeping the sum at 1: pinned dimensions are
/// frozen and the remaining budget is redistributed over the free ones.
fn project_bounded(mut w: [f64; 3], lo: f64, hi: f64) -> [f64; 3] {
    let mut pinned = [false; 3];
    for _ in 0..=3 {
        let free: Vec<usize> = (0..3).filter(|&i| !pinned[i]).collect();
        if free.is_empty() {
            break;
        }
        let pinned_sum: f64 = (0..3).filter(|&i| pinned[i]).map(|i| w[i]).sum();
        let budget = 1.0 - pinned_sum;
        let free_sum: f64 = free.iter().map(|&i| w[i].max(0.0)).sum();
        for &i in &free {
            w[i] = if free_sum > 0.0 {
                w[i].max(0.0) / free_sum * budget
            } else {
                budget / free.len() as f64
            };
        }

        // Pin the high side first: lowering it raises the others, which
        // may lift a low dimension back into range.
        let over: Vec<usize> = free.iter().copied().filter(|&i| w[i] > hi).collect();
        let violators = if over.is_empty() {
            free.iter().copied().filter(|&i| w[i] < lo).collect()
        } else {
            over
        };
        if violators.is_empty() {
            break;
        }
        for i in violators {
            w[i] = w[i].clamp(lo, hi);
            pinned[i] = true;
        }
    }
    w
}

/// Round to 3 decimals, then hand the rounding residual to the largest
/// dimension that can absorb it without leaving the bounds.
fn round_preserving_sum(w: [f64; 3], lo: f64, hi: f64) -> [f64; 3] {
    let mut r = w.map(round3);
    let residual = round3(1.0 - r.iter().sum::<f64>());
    if residual != 0.0 {
        let mut order = [0usize, 1, 2];
        order.sort_by(|&a, &b| r[b].total_cmp(&r[a]));
        for i in order {
            let candidate = round3(r[i] + residual);
            if candidate >= lo - 1e-12 && candidate <= hi + 1e-12 {
                r[i] = candidate;
                break;
            }
        }
    }
    r
}

fn euclidean(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
}

fn explain(old: &[f64; 3], new: &[f64; 3], magnitude: f64, perturbed: bool) -> String {
    let tier = if magnitude < 0.01 {
        "Negligible"
    } else if magnitude < 0.05 {
        "Minor"
    } else {
        "Major"
    };

    let deltas: Vec<f64> = new.iter().zip(old).map(|(n, o)| n - o).collect();
    let (idx, delta) = deltas
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
        .unwrap_or((0, 0.0));

    let change = if delta.abs() < 1e-12 {
        "no dimension changed".to_string()
    } else {
        let direction = if delta > 0.0 { "increased" } else { "decreased" };
        format!(
            "{} {} by {:.3}",
            WeightVector::DIMENSIONS[idx],
            direction,
            delta.abs()
        )
    };

    let mut text = format!("{} adjustment (magnitude {:.4}): {}", tier, magnitude, change);
    if perturbed {
        text.push_str("; exploration perturbation applied");
    }
    text
}
