//! Cogloop DPD - Weight adaptation over the empathy / coherence / dissonance simplex
//!
//! Each update is a multiplicative-weights step:
//! - squared hinge loss per dimension against a performance target
//!   (dissonance aims at 65% of it, never at zero)
//! - decay toward the uniform split
//! - a zero-sum random nudge every `perturbation_interval` updates
//! - renormalize, clamp into `[min_weight, max_weight]`, round to 3 decimals

pub mod config;
pub mod engine;

pub use config::DpdConfig;
pub use engine::{WeightEngine, WeightUpdate, DISSONANCE_TARGET_RATIO};
