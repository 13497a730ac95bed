//! CycleOrchestrator - sequences S1 → S2 → S3 → S5 → S6 → weight update.
//!
//! Owns the gateway, the weight engine, the current weight vector, and the
//! cross-cycle memory. Admission is checked before the cycle and before each
//! stage; optional stages are skipped under energy pressure. A pause request
//! is honoured at the next stage boundary.

use crate::admission::{EnergyBudget, EnergyPool, Unmetered};
use crate::config::CycleConfig;
use crate::error::CycleError;
use crate::memory::CycleMemory;
use crate::prompts::PersonaContext;
use crate::stages::scribe::ScribeInput;
use crate::stages::synthesis::SynthesisInput;
use crate::stages::thought::ThoughtSettings;
use crate::stages::{auditor, reflection, scribe, synthesis, thought, Stage, StageEnv, StageOutcome};
use crate::store::{CycleRecord, CycleStore};
use cogloop_core::{
    AssessmentScores, AuditResult, DocumentationResult, Reflection, StageStrategy, SynthesisResult, Thought, Trigger,
    WeightVector,
};
use cogloop_dpd::{WeightEngine, WeightUpdate};
use cogloop_gateway::ExecutionGateway;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Significant thoughts carried into S1 prompts.
const PERSONA_MEMORY_THOUGHTS: usize = 5;

/// Cloneable pause switch shared with whoever drives the orchestrator.
#[derive(Clone, Default)]
pub struct PauseHandle(Arc<AtomicBool>);

impl PauseHandle {
    pub fn pause(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Completed,
    Skipped,
}

#[derive(Clone, Debug, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub status: StageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StageStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

impl StageReport {
    fn completed<T>(stage: Stage, outcome: &StageOutcome<T>) -> Self {
        Self {
            stage,
            status: StageStatus::Completed,
            strategy: Some(outcome.strategy),
            fallback_reason: outcome.fallback_reason.clone(),
        }
    }

    fn skipped(stage: Stage) -> Self {
        Self { stage, status: StageStatus::Skipped, strategy: None, fallback_reason: None }
    }
}

/// Everything one cycle produced.
#[derive(Clone, Debug, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub trigger: Trigger,
    pub thoughts: Vec<Thought>,
    pub failed_agents: Vec<String>,
    pub reflections: Vec<Reflection>,
    pub audit: Option<AuditResult>,
    pub synthesis: Option<SynthesisResult>,
    pub documentation: Option<DocumentationResult>,
    pub stages: Vec<StageReport>,
    pub scores: Option<AssessmentScores>,
    pub weight_update: Option<WeightUpdate>,
    pub duration_ms: u64,
}

impl CycleReport {
    fn new(cycle: u64, trigger: Trigger) -> Self {
        Self {
            cycle,
            trigger,
            thoughts: Vec::new(),
            failed_agents: Vec::new(),
            reflections: Vec::new(),
            audit: None,
            synthesis: None,
            documentation: None,
            stages: Vec::new(),
            scores: None,
            weight_update: None,
            duration_ms: 0,
        }
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    pub fn skipped_stages(&self) -> Vec<Stage> {
        self.stages
            .iter()
            .filter(|s| s.status == StageStatus::Skipped)
            .map(|s| s.stage)
            .collect()
    }

    /// A stage was skipped, an agent failed, or an AI path fell back.
    pub fn degraded(&self) -> bool {
        !self.failed_agents.is_empty()
            || self.stages.iter().any(|s| {
                s.status == StageStatus::Skipped
                    || (s.strategy == Some(StageStrategy::Heuristic)
                        && s.fallback_reason.as_deref() != Some(crate::stages::NO_PROVIDER_REASON))
            })
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    Completed(Box<CycleReport>),
    /// Not enough energy to start; nothing ran.
    AdmissionDenied { needed: f64, level: f64 },
    /// Stopped at a stage boundary; weights untouched.
    Paused { before: Stage, partial: Box<CycleReport> },
}

impl CycleOutcome {
    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            CycleOutcome::Completed(report) => Some(report),
            CycleOutcome::Paused { partial, .. } => Some(partial),
            CycleOutcome::AdmissionDenied { .. } => None,
        }
    }
}

/// Register every configured provider. Unavailable ones stay registered.
pub fn build_gateway(config: &CycleConfig) -> ExecutionGateway {
    let mut gateway = ExecutionGateway::new(config.gateway.clone());
    for (name, provider) in &config.providers {
        gateway.register_provider(name.as_str(), provider.clone());
    }
    for name in config.referenced_providers() {
        if !config.providers.contains_key(&name) {
            warn!(provider = name.as_str(), "Provider referenced but not configured");
        }
    }
    gateway
}

pub struct CycleOrchestrator {
    config: CycleConfig,
    gateway: Arc<ExecutionGateway>,
    engine: WeightEngine,
    weights: WeightVector,
    memory: CycleMemory,
    energy: Arc<dyn EnergyBudget>,
    store: Option<Arc<dyn CycleStore>>,
    pause: PauseHandle,
    clock: u64,
}

impl CycleOrchestrator {
    pub fn new(config: CycleConfig, gateway: Arc<ExecutionGateway>) -> Self {
        let energy: Arc<dyn EnergyBudget> = if config.energy.enabled {
            Arc::new(EnergyPool::from_config(&config.energy))
        } else {
            Arc::new(Unmetered)
        };
        Self {
            engine: WeightEngine::new(config.dpd.clone()),
            weights: WeightVector::default(),
            memory: CycleMemory::new(&config.memory),
            energy,
            store: None,
            pause: PauseHandle::default(),
            clock: 0,
            gateway,
            config,
        }
    }

    /// Build the gateway from the config's provider table.
    pub fn from_config(config: CycleConfig) -> Self {
        let gateway = Arc::new(build_gateway(&config));
        Self::new(config, gateway)
    }

    pub fn with_energy(mut self, energy: Arc<dyn EnergyBudget>) -> Self {
        self.energy = energy;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn CycleStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Share an existing pause switch.
    pub fn with_pause(mut self, pause: PauseHandle) -> Self {
        self.pause = pause;
        self
    }

    /// Resume from a previously persisted vector.
    pub fn with_weights(mut self, weights: WeightVector) -> Self {
        self.weights = weights;
        self
    }

    pub fn config(&self) -> &CycleConfig {
        &self.config
    }

    pub fn gateway(&self) -> &Arc<ExecutionGateway> {
        &self.gateway
    }

    pub fn weights(&self) -> &WeightVector {
        &self.weights
    }

    pub fn engine(&self) -> &WeightEngine {
        &self.engine
    }

    pub fn memory(&self) -> &CycleMemory {
        &self.memory
    }

    pub fn pause_handle(&self) -> PauseHandle {
        self.pause.clone()
    }

    /// Cycles admitted so far; also the logical clock of the last cycle.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    fn admission_cost(&self) -> f64 {
        self.config.energy.cycle_cost + self.config.energy.costs.thought
    }

    /// Wait for enough energy, then run. A budget that can never cover the
    /// admission cost yields `AdmissionDenied` without waiting.
    pub async fn run_when_admitted(&mut self, trigger: Trigger) -> Result<CycleOutcome, CycleError> {
        if !self.energy.wait_until_available(self.admission_cost()).await {
            let needed = self.admission_cost();
            let level = self.energy.level().await;
            info!(needed, level, "Cycle admission unreachable");
            return Ok(CycleOutcome::AdmissionDenied { needed, level });
        }
        self.run_cycle(trigger).await
    }

    pub async fn run_cycle(&mut self, trigger: Trigger) -> Result<CycleOutcome, CycleError> {
        let started = Instant::now();
        let costs = self.config.energy.costs.clone();
        let needed = self.admission_cost();

        // Cycle and S1 costs are one charge; the clock advances only after it lands.
        if !self.energy.is_sufficient(needed).await || !self.energy.consume(needed).await {
            let level = self.energy.level().await;
            info!(needed, level, "Cycle admission denied");
            return Ok(CycleOutcome::AdmissionDenied { needed, level });
        }

        self.clock += 1;
        let clock = self.clock;
        let mut report = CycleReport::new(clock, trigger.clone());
        self.memory.record_question(&trigger);
        info!(cycle = clock, question = trigger.question.as_str(), category = trigger.category.as_str(), "Cycle started");

        // S1 Individual Thought
        if self.pause.is_paused() {
            return Ok(paused(Stage::Thought, report, started));
        }
        let env = StageEnv {
            gateway: &self.gateway,
            clock,
            energy_level: self.energy.level().await,
            question: &trigger.question,
        };
        let settings = ThoughtSettings {
            default_provider: self.config.pipeline.default_provider.clone(),
            max_concurrency: self.config.pipeline.max_concurrency,
            ai_confidence: self.config.pipeline.ai_confidence,
        };
        let roster = self.config.agents.roster(&trigger);
        let persona = PersonaContext {
            unresolved_questions: self.memory.unresolved_questions(&trigger.question),
            significant_thoughts: self.memory.significant_thoughts(PERSONA_MEMORY_THOUGHTS),
            beliefs: self.memory.beliefs(),
            knowledge: None,
        };
        let s1 = thought::run(env, &settings, &trigger, &roster, &persona).await;
        if s1.thoughts.is_empty() {
            warn!(cycle = clock, failed = s1.failed_agents.len(), "No agent produced a thought");
            return Err(CycleError::NoThoughts {
                question: trigger.question.clone(),
                failed_agents: s1.failed_agents,
            });
        }
        let s1_outcome = if s1.failed_agents.is_empty() {
            StageOutcome::ai(())
        } else {
            StageOutcome::heuristic((), format!("agents without thought: {}", s1.failed_agents.join(", ")))
        };
        report.stages.push(StageReport::completed(Stage::Thought, &s1_outcome));
        for t in &s1.thoughts {
            persist(&self.store, CycleRecord::Thought(t.clone())).await;
        }
        self.memory.record_thoughts(&s1.thoughts);
        report.thoughts = s1.thoughts;
        report.failed_agents = s1.failed_agents;

        // S2 Mutual Reflection
        if self.pause.is_paused() {
            return Ok(paused(Stage::Reflection, report, started));
        }
        if admit(self.energy.as_ref(), Stage::Reflection, costs.reflection).await {
            let env = StageEnv { energy_level: self.energy.level().await, ..env };
            let outcome = reflection::run(
                env,
                self.config.pipeline.reflection_provider.as_deref(),
                &report.thoughts,
                &roster,
            )
            .await;
            report.stages.push(StageReport::completed(Stage::Reflection, &outcome));
            for r in &outcome.value {
                persist(&self.store, CycleRecord::Reflection(r.clone())).await;
            }
            report.reflections = outcome.value;
        } else {
            report.stages.push(StageReport::skipped(Stage::Reflection));
        }

        // S3 Auditor
        if self.pause.is_paused() {
            return Ok(paused(Stage::Audit, report, started));
        }
        if admit(self.energy.as_ref(), Stage::Audit, costs.audit).await {
            let env = StageEnv { energy_level: self.energy.level().await, ..env };
            let outcome = auditor::run(
                env,
                self.config.pipeline.auditor_provider.as_deref(),
                &report.thoughts,
                &report.reflections,
            )
            .await;
            report.stages.push(StageReport::completed(Stage::Audit, &outcome));
            persist(&self.store, CycleRecord::Audit(outcome.value.clone())).await;
            report.audit = Some(outcome.value);
        } else {
            report.stages.push(StageReport::skipped(Stage::Audit));
        }

        // S5 Compiler/Synthesis
        if self.pause.is_paused() {
            return Ok(paused(Stage::Synthesis, report, started));
        }
        if admit(self.energy.as_ref(), Stage::Synthesis, costs.synthesis).await {
            let env = StageEnv { energy_level: self.energy.level().await, ..env };
            let outcome = synthesis::run(
                env,
                self.config.pipeline.synthesis_provider.as_deref(),
                SynthesisInput {
                    trigger: &trigger,
                    thoughts: &report.thoughts,
                    reflections: &report.reflections,
                    audit: report.audit.as_ref(),
                    weights: &self.weights,
                },
            )
            .await;
            report.stages.push(StageReport::completed(Stage::Synthesis, &outcome));
            persist(&self.store, CycleRecord::Synthesis(outcome.value.clone())).await;
            report.synthesis = Some(outcome.value);
        } else {
            report.stages.push(StageReport::skipped(Stage::Synthesis));
        }

        // S6 Scribe; nothing to document without a synthesis
        if self.pause.is_paused() {
            return Ok(paused(Stage::Documentation, report, started));
        }
        let admitted = match report.synthesis {
            Some(_) => admit(self.energy.as_ref(), Stage::Documentation, costs.documentation).await,
            None => false,
        };
        let documented = match &report.synthesis {
            Some(synthesis) if admitted => {
                let env = StageEnv { energy_level: self.energy.level().await, ..env };
                let outcome = scribe::run(
                    env,
                    self.config.pipeline.scribe_provider.as_deref(),
                    ScribeInput {
                        clock,
                        trigger: &trigger,
                        thoughts: &report.thoughts,
                        synthesis,
                        audit: report.audit.as_ref(),
                    },
                )
                .await;
                Some(outcome)
            }
            _ => None,
        };
        match documented {
            Some(outcome) => {
                report.stages.push(StageReport::completed(Stage::Documentation, &outcome));
                persist(&self.store, CycleRecord::Documentation(outcome.value.clone())).await;
                report.documentation = Some(outcome.value);
            }
            None => report.stages.push(StageReport::skipped(Stage::Documentation)),
        }

        // Weight update
        if self.pause.is_paused() {
            return Ok(paused(Stage::WeightUpdate, report, started));
        }
        let scores = assessment_scores(report.audit.as_ref(), report.synthesis.as_ref());
        let update = self.engine.update(&self.weights, &scores);
        if update.collapsed {
            warn!(cycle = clock, "Weight normalization collapsed, default split restored");
        }
        self.weights = update.new_weights.clone();
        persist(&self.store, CycleRecord::Weights(self.weights.clone())).await;

        if let Some(synthesis) = &report.synthesis {
            let approved = report.audit.as_ref().is_some_and(|a| a.approved);
            self.memory.record_synthesis(&trigger, synthesis, approved);
        }

        report.scores = Some(scores);
        report.weight_update = Some(update);
        report.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            cycle = clock,
            thoughts = report.thoughts.len(),
            risk = report.audit.as_ref().map(|a| a.risk_level.as_str()).unwrap_or("skipped"),
            skipped = report.skipped_stages().len(),
            degraded = report.degraded(),
            empathy = self.weights.empathy,
            coherence = self.weights.coherence,
            dissonance = self.weights.dissonance,
            version = self.weights.version,
            "Cycle complete"
        );

        Ok(CycleOutcome::Completed(Box::new(report)))
    }
}

/// Empathy from ethics, coherence from safety, dissonance from disagreement.
/// Without an audit the signal is neutral.
pub fn assessment_scores(audit: Option<&AuditResult>, synthesis: Option<&SynthesisResult>) -> AssessmentScores {
    match audit {
        Some(audit) => {
            let dissonance = synthesis.map_or(0.5, |s| 1.0 - s.consensus_level);
            AssessmentScores::new(audit.ethics_score, audit.safety_score, dissonance)
        }
        None => AssessmentScores::neutral(),
    }
}

async fn admit(energy: &dyn EnergyBudget, stage: Stage, cost: f64) -> bool {
    if energy.consume(cost).await {
        return true;
    }
    info!(stage = stage.as_str(), cost, "Skipping stage under energy pressure");
    false
}

async fn persist(store: &Option<Arc<dyn CycleStore>>, record: CycleRecord) {
    let Some(store) = store else {
        return;
    };
    let kind = record.kind();
    if let Err(e) = store.put(record).await {
        warn!(kind, "Failed to persist record: {}", e);
    }
}

fn paused(before: Stage, mut report: CycleReport, started: Instant) -> CycleOutcome {
    info!(cycle = report.cycle, stage = before.as_str(), "Cycle paused at stage boundary");
    report.duration_ms = started.elapsed().as_millis() as u64;
    CycleOutcome::Paused { before, partial: Box::new(report) }
}
