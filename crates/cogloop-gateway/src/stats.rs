//! Running gateway statistics. Cache hits are counted but stay out of the
//! latency and confidence averages.

use crate::types::{ExecutionResult, QualityMetrics};
use cogloop_core::RingBuffer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub(crate) struct GatewayStats {
    successes: u64,
    failures: u64,
    cache_hits: u64,
    fallback_successes: u64,
    provider_usage: BTreeMap<String, u64>,
    model_usage: BTreeMap<String, u64>,
    avg_latency_ms: f64,
    avg_confidence: f64,
    quality: [RingBuffer<f64>; 5],
}

/// Point-in-time copy of the statistics.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_executions: u64,
    pub successes: u64,
    pub failures: u64,
    pub cache_hits: u64,
    pub fallback_successes: u64,
    pub success_rate: f64,
    pub provider_usage: BTreeMap<String, u64>,
    pub model_usage: BTreeMap<String, u64>,
    pub avg_latency_ms: f64,
    pub avg_confidence: f64,
    /// Mean of the retained samples per metric.
    pub avg_quality: QualityMetrics,
}

impl GatewayStats {
    pub(crate) fn new(quality_window: usize) -> Self {
        Self {
            successes: 0,
            failures: 0,
            cache_hits: 0,
            fallback_successes: 0,
            provider_usage: BTreeMap::new(),
            model_usage: BTreeMap::new(),
            avg_latency_ms: 0.0,
            avg_confidence: 0.0,
            quality: std::array::from_fn(|_| RingBuffer::new(quality_window)),
        }
    }

    pub(crate) fn record_success(&mut self, result: &ExecutionResult) {
        self.successes += 1;
        if result.metadata.fallback_used {
            self.fallback_successes += 1;
        }
        *self.provider_usage.entry(result.provider_used.clone()).or_default() += 1;
        *self.model_usage.entry(result.model_used.clone()).or_default() += 1;

        let n = self.successes as f64;
        self.avg_latency_ms += (result.processing_time_ms as f64 - self.avg_latency_ms) / n;
        self.avg_confidence += (result.confidence_score - self.avg_confidence) / n;

        for (ring, value) in self.quality.iter_mut().zip(result.quality_metrics.as_array()) {
            ring.push(value);
        }
    }

    pub(crate) fn record_failure(&mut self) {
        self.failures += 1;
    }

    pub(crate) fn record_cache_hit(&mut self) {
        self.cache_hits += 1;
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        let total = self.successes + self.failures;
        let mean = |ring: &RingBuffer<f64>| {
            if ring.is_empty() {
                0.0
            } else {
                ring.iter().sum::<f64>() / ring.len() as f64
            }
        };
        StatsSnapshot {
            total_executions: total,
            successes: self.successes,
            failures: self.failures,
            cache_hits: self.cache_hits,
            fallback_successes: self.fallback_successes,
            success_rate: if total == 0 { 0.0 } else { self.successes as f64 / total as f64 },
            provider_usage: self.provider_usage.clone(),
            model_usage: self.model_usage.clone(),
            avg_latency_ms: self.avg_latency_ms,
            avg_confidence: self.avg_confidence,
            avg_quality: QualityMetrics {
                coherence: mean(&self.quality[0]),
                creativity: mean(&self.quality[1]),
                depth: mean(&self.quality[2]),
                relevance: mean(&self.quality[3]),
                philosophical_depth: mean(&self.quality[4]),
            },
        }
    }
}
