//! Gateway result types

use serde::{Deserialize, Serialize};

/// Heuristic quality of a response; each metric in [0, 1], 3 decimals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub coherence: f64,
    pub creativity: f64,
    pub depth: f64,
    pub relevance: f64,
    pub philosophical_depth: f64,
}

impl QualityMetrics {
    pub fn as_array(&self) -> [f64; 5] {
        [
            self.coherence,
            self.creativity,
            self.depth,
            self.relevance,
            self.philosophical_depth,
        ]
    }

    pub fn mean(&self) -> f64 {
        self.as_array().iter().sum::<f64>() / 5.0
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    pub retry_count: u32,
    pub fallback_used: bool,
    pub cache_hit: bool,
    /// Provider names and retry/fallback markers, in execution order.
    pub execution_path: Vec<String>,
}

/// Outcome of one gateway invocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub provider_used: String,
    pub model_used: String,
    pub processing_time_ms: u64,
    pub confidence_score: f64,
    pub quality_metrics: QualityMetrics,
    pub metadata: ExecutionMetadata,
}

impl ExecutionResult {
    pub fn content(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    /// Shallow copy flagged as served from cache.
    pub fn as_cache_hit(&self) -> Self {
        let mut hit = self.clone();
        hit.metadata.cache_hit = true;
        hit
    }
}

/// Result of a connectivity probe.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderTestReport {
    pub provider: String,
    pub success: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
