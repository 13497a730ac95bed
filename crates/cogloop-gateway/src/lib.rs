//! Cogloop Gateway - Resilient execution over text-generation providers
//!
//! One call to [`ExecutionGateway::execute_with_context`]:
//! - cache lookup keyed on prompt prefix, system prefix, agent, and phase
//! - deterministic context enrichment of both prompts
//! - retry loop with exponential backoff, then fallback escalation
//! - heuristic quality scoring and a blended confidence score
//! - bounded history and running statistics

pub mod cache;
pub mod config;
pub mod enrich;
pub mod gateway;
pub mod quality;
pub mod stats;
pub mod types;

pub use cache::{cache_key, ResponseCache};
pub use config::GatewayConfig;
pub use gateway::{ExecutionGateway, GatewayError, ProviderStatus};
pub use quality::{confidence_score, correlation_score, score_quality};
pub use stats::StatsSnapshot;
pub use types::*;
