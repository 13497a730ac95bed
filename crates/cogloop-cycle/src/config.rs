//! Cycle configuration
//!
//! All tunable parameters in one place. Loaded from TOML at startup,
//! falls back to defaults if no config file exists.

use crate::agents::AgentsConfig;
use crate::memory::MemoryConfig;
use cogloop_dpd::DpdConfig;
use cogloop_gateway::GatewayConfig;
use cogloop_llm::{ProviderConfig, ProviderKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_PROVIDER: &str = "anthropic";
pub const LOCAL_PROVIDER: &str = "ollama";

/// Top-level cycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Cache, history, and backoff tunables.
    pub gateway: GatewayConfig,
    /// Provider registrations by name.
    pub providers: BTreeMap<String, ProviderConfig>,
    /// Baseline roster and contrasting pool.
    pub agents: AgentsConfig,
    /// Stage wiring.
    pub pipeline: PipelineConfig,
    /// Weight engine parameters.
    pub dpd: DpdConfig,
    /// Admission budget.
    pub energy: EnergyConfig,
    /// Cross-cycle memory bounds.
    pub memory: MemoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Provider for agents without their own.
    pub default_provider: String,
    /// Upper bound on concurrent S1 agent calls.
    pub max_concurrency: usize,
    /// Rate thought confidence with a model call before the heuristic.
    pub ai_confidence: bool,
    /// `None` runs the stage on its heuristic only.
    pub reflection_provider: Option<String>,
    pub auditor_provider: Option<String>,
    pub synthesis_provider: Option<String>,
    pub scribe_provider: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyConfig {
    /// Disabled means every admission check passes.
    pub enabled: bool,
    pub capacity: f64,
    pub initial: f64,
    pub regen_per_sec: f64,
    /// Charged once when a cycle is admitted.
    pub cycle_cost: f64,
    pub costs: StageCosts,
}

/// Energy charged before each stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StageCosts {
    pub thought: f64,
    pub reflection: f64,
    pub audit: f64,
    pub synthesis: f64,
    pub documentation: f64,
}

// ============================================================
// Defaults
// ============================================================

impl Default for CycleConfig {
    fn default() -> Self {
        let mut providers = BTreeMap::new();
        providers.insert(
            DEFAULT_PROVIDER.to_string(),
            ProviderConfig::new(ProviderKind::Anthropic, "claude-sonnet-4-20250514").with_fallback(LOCAL_PROVIDER),
        );
        providers.insert(
            LOCAL_PROVIDER.to_string(),
            ProviderConfig::new(ProviderKind::Ollama, "llama3.1").with_retry_attempts(1),
        );
        Self {
            gateway: GatewayConfig::default(),
            providers,
            agents: AgentsConfig::default(),
            pipeline: PipelineConfig::default(),
            dpd: DpdConfig::default(),
            energy: EnergyConfig::default(),
            memory: MemoryConfig::default(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_provider: DEFAULT_PROVIDER.into(),
            max_concurrency: 5,
            ai_confidence: true,
            reflection_provider: Some(DEFAULT_PROVIDER.into()),
            auditor_provider: Some(DEFAULT_PROVIDER.into()),
            synthesis_provider: Some(DEFAULT_PROVIDER.into()),
            scribe_provider: Some(DEFAULT_PROVIDER.into()),
        }
    }
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 100.0,
            initial: 100.0,
            regen_per_sec: 0.5,
            cycle_cost: 5.0,
            costs: StageCosts::default(),
        }
    }
}

impl Default for StageCosts {
    fn default() -> Self {
        Self { thought: 15.0, reflection: 8.0, audit: 6.0, synthesis: 8.0, documentation: 4.0 }
    }
}

// ============================================================
// Loading
// ============================================================

impl CycleConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {} - using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {} - using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Every provider name a stage or agent refers to.
    pub fn referenced_providers(&self) -> Vec<String> {
        let p = &self.pipeline;
        let mut names: Vec<String> = std::iter::once(p.default_provider.clone())
            .chain(p.reflection_provider.iter().cloned())
            .chain(p.auditor_provider.iter().cloned())
            .chain(p.synthesis_provider.iter().cloned())
            .chain(p.scribe_provider.iter().cloned())
            .chain(
                self.agents
                    .baseline
                    .iter()
                    .chain(self.agents.contrasting.iter())
                    .filter_map(|a| a.provider.clone()),
            )
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Point every stage at `provider` and enable all AI paths.
    pub fn route_all_to(&mut self, provider: &str) {
        let p = &mut self.pipeline;
        p.default_provider = provider.to_string();
        p.reflection_provider = Some(provider.to_string());
        p.auditor_provider = Some(provider.to_string());
        p.synthesis_provider = Some(provider.to_string());
        p.scribe_provider = Some(provider.to_string());
        for agent in self.agents.baseline.iter_mut().chain(self.agents.contrasting.iter_mut()) {
            agent.provider = None;
        }
    }
}
