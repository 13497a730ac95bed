//! Pipeline stages. Each stage tries its AI path through the gateway and
//! falls back to a deterministic heuristic; an AI failure never fails the cycle.

pub mod auditor;
pub mod reflection;
pub mod scribe;
pub mod synthesis;
pub mod thought;

use cogloop_core::{AgentId, CyclePhase, ExecutionContext, StageStrategy};
use cogloop_gateway::ExecutionGateway;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::warn;

/// Fixed stage order of a cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Thought,
    Reflection,
    Audit,
    Synthesis,
    Documentation,
    WeightUpdate,
}

impl Stage {
    pub const ORDER: [Stage; 6] = [
        Stage::Thought,
        Stage::Reflection,
        Stage::Audit,
        Stage::Synthesis,
        Stage::Documentation,
        Stage::WeightUpdate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Thought => "thought",
            Stage::Reflection => "reflection",
            Stage::Audit => "audit",
            Stage::Synthesis => "synthesis",
            Stage::Documentation => "documentation",
            Stage::WeightUpdate => "weight_update",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage's record plus which path produced it.
#[derive(Clone, Debug)]
pub struct StageOutcome<T> {
    pub value: T,
    pub strategy: StageStrategy,
    /// Why the heuristic ran; `None` when the AI path succeeded.
    pub fallback_reason: Option<String>,
}

impl<T> StageOutcome<T> {
    pub fn ai(value: T) -> Self {
        Self { value, strategy: StageStrategy::Ai, fallback_reason: None }
    }

    pub fn heuristic(value: T, reason: impl Into<String>) -> Self {
        Self {
            value,
            strategy: StageStrategy::Heuristic,
            fallback_reason: Some(reason.into()),
        }
    }

    /// True when an attempted AI path failed, as opposed to none being configured.
    pub fn degraded(&self) -> bool {
        self.fallback_reason
            .as_deref()
            .is_some_and(|r| r != NO_PROVIDER_REASON)
    }
}

pub(crate) const NO_PROVIDER_REASON: &str = "no provider configured";

/// Per-cycle values every stage needs to build its gateway contexts.
#[derive(Clone, Copy)]
pub struct StageEnv<'a> {
    pub gateway: &'a ExecutionGateway,
    pub clock: u64,
    pub energy_level: f64,
    pub question: &'a str,
}

impl<'a> StageEnv<'a> {
    pub fn context(&self, agent: impl Into<AgentId>, phase: CyclePhase, prior_thoughts: Vec<String>) -> ExecutionContext {
        ExecutionContext::new(agent, phase)
            .with_clock(self.clock)
            .with_energy(self.energy_level)
            .with_prior_thoughts(prior_thoughts)
            .with_question(self.question)
    }

    /// One gateway call; the content of a successful result.
    pub async fn call(
        &self,
        provider: &str,
        prompt: &str,
        system_prompt: &str,
        ctx: &ExecutionContext,
    ) -> cogloop_core::Result<String> {
        let result = self
            .gateway
            .execute_with_context(provider, prompt, system_prompt, ctx)
            .await?;
        Ok(result.content().to_string())
    }
}

/// Run `ai` against `provider` if one is configured, otherwise or on error
/// run `heuristic`.
pub(crate) async fn two_path<T, Fut>(
    stage: Stage,
    provider: Option<&str>,
    ai: impl FnOnce(String) -> Fut,
    heuristic: impl FnOnce() -> T,
) -> StageOutcome<T>
where
    Fut: Future<Output = cogloop_core::Result<T>>,
{
    let Some(provider) = provider else {
        return StageOutcome::heuristic(heuristic(), NO_PROVIDER_REASON);
    };
    match ai(provider.to_string()).await {
        Ok(value) => StageOutcome::ai(value),
        Err(e) => {
            warn!(stage = stage.as_str(), provider, "AI path failed, using heuristic: {}", e);
            StageOutcome::heuristic(heuristic(), e.to_string())
        }
    }
}

/// Contents of `thoughts`, oldest first, as gateway prior-thought context.
pub(crate) fn contents(thoughts: &[cogloop_core::Thought]) -> Vec<String> {
    thoughts.iter().map(|t| t.content.clone()).collect()
}
