//! Cogloop Cycle - The five-stage cognitive pipeline
//!
//! One cycle per trigger question:
//! - S1 Individual Thought: every roster agent answers, bounded concurrency
//! - S2 Mutual Reflection: each agent comments on the next agent's thought
//! - S3 Auditor: safety and ethics scores, risk level, approval
//! - S5 Compiler/Synthesis: one unified answer with themes and consensus
//! - S6 Scribe: markdown documentation of the cycle
//! - DPD weight update from the audit and synthesis
//!
//! Every AI-backed stage has a deterministic heuristic path used when no
//! provider is configured or the gateway call fails.

pub mod admission;
pub mod agents;
pub mod config;
pub mod error;
pub mod memory;
pub mod orchestrator;
pub mod parser;
pub mod prompts;
pub mod stages;
pub mod store;

pub use admission::{EnergyBudget, EnergyPool, Unmetered};
pub use agents::{AgentProfile, AgentsConfig};
pub use config::{CycleConfig, EnergyConfig, PipelineConfig, StageCosts};
pub use error::CycleError;
pub use memory::{CycleMemory, MemoryConfig};
pub use orchestrator::{
    assessment_scores, build_gateway, CycleOrchestrator, CycleOutcome, CycleReport, PauseHandle, StageReport,
    StageStatus,
};
pub use stages::{Stage, StageOutcome};
pub use store::{CycleRecord, CycleStore, JsonlStore, MemoryStore};
