//! ExecutionGateway - retry, fallback, cache, and scoring around providers

use crate::cache::{cache_key, ResponseCache};
use crate::config::GatewayConfig;
use crate::enrich::{enrich_prompt, enrich_system_prompt};
use crate::quality::{confidence_score, score_quality};
use crate::stats::{GatewayStats, StatsSnapshot};
use crate::types::{ExecutionMetadata, ExecutionResult, ProviderTestReport, QualityMetrics};
use cogloop_core::ExecutionContext;
use cogloop_llm::{create_provider, ProviderConfig, ProviderResponse, TextProvider};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

const PROBE_PROMPT: &str = "Reply with the single word: OK";
const PROBE_SYSTEM_PROMPT: &str = "You are a connectivity probe. Answer tersely.";

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("provider unavailable: {name} - {reason}")]
    ProviderUnavailable { name: String, reason: String },

    #[error("execution exhausted for {provider}: {message}")]
    ExecutionExhausted { provider: String, message: String },
}

impl From<GatewayError> for cogloop_core::Error {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::UnknownProvider(name) => cogloop_core::Error::UnknownProvider(name),
            GatewayError::ProviderUnavailable { name, reason } => {
                cogloop_core::Error::provider_unavailable(name, reason)
            }
            e @ GatewayError::ExecutionExhausted { .. } => {
                cogloop_core::Error::ExecutionExhausted(e.to_string())
            }
        }
    }
}

/// Whether a registered provider has a usable client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderStatus {
    Ready,
    Unavailable(String),
}

enum ClientState {
    Ready(Arc<dyn TextProvider>),
    Unavailable(String),
}

struct ProviderSlot {
    config: ProviderConfig,
    client: ClientState,
}

pub struct ExecutionGateway {
    config: GatewayConfig,
    providers: HashMap<String, ProviderSlot>,
    cache: Mutex<ResponseCache>,
    stats: Mutex<GatewayStats>,
    history: Mutex<cogloop_core::RingBuffer<ExecutionResult>>,
}

impl ExecutionGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            cache: Mutex::new(ResponseCache::new(config.cache_capacity, config.cache_ttl())),
            stats: Mutex::new(GatewayStats::new(config.quality_window)),
            history: Mutex::new(cogloop_core::RingBuffer::new(config.history_capacity)),
            providers: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Build and store a client for `name`. A build failure is logged and the
    /// provider is kept as unavailable; the registry stays usable.
    pub fn register_provider(&mut self, name: impl Into<String>, config: ProviderConfig) -> ProviderStatus {
        let name = name.into();
        let client = match create_provider(&name, &config) {
            Ok(client) => {
                info!(provider = name.as_str(), kind = config.kind.as_str(), model = config.model.as_str(), "Registered provider");
                ClientState::Ready(client)
            }
            Err(e) => {
                warn!(provider = name.as_str(), "Provider unavailable: {}", e);
                ClientState::Unavailable(e.to_string())
            }
        };
        self.insert_slot(name, config, client)
    }

    /// Register an already-built client (scripted providers, custom adapters).
    pub fn register_client(
        &mut self,
        name: impl Into<String>,
        config: ProviderConfig,
        client: Arc<dyn TextProvider>,
    ) -> ProviderStatus {
        let name = name.into();
        debug!(provider = name.as_str(), client = client.name(), "Registered client");
        self.insert_slot(name, config, ClientState::Ready(client))
    }

    fn insert_slot(&mut self, name: String, config: ProviderConfig, client: ClientState) -> ProviderStatus {
        let status = match &client {
            ClientState::Ready(_) => ProviderStatus::Ready,
            ClientState::Unavailable(reason) => ProviderStatus::Unavailable(reason.clone()),
        };
        if let Some(fallback) = &config.fallback {
            if fallback == &name {
                warn!(provider = name.as_str(), "Provider lists itself as fallback");
            }
        }
        self.providers.insert(name, ProviderSlot { config, client });
        status
    }

    pub fn provider_status(&self, name: &str) -> Option<ProviderStatus> {
        self.providers.get(name).map(|slot| match &slot.client {
            ClientState::Ready(_) => ProviderStatus::Ready,
            ClientState::Unavailable(reason) => ProviderStatus::Unavailable(reason.clone()),
        })
    }

    pub fn has_provider(&self, name: &str) -> bool {
        matches!(self.provider_status(name), Some(ProviderStatus::Ready))
    }

    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn execute_with_context(
        &self,
        provider: &str,
        prompt: &str,
        system_prompt: &str,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionResult, GatewayError> {
        let key = cache_key(prompt, system_prompt, ctx);
        if let Some(hit) = self.cache.lock().await.get(&key) {
            debug!(provider, agent = %ctx.agent_id, phase = %ctx.phase, "Cache hit");
            self.stats.lock().await.record_cache_hit();
            return Ok(hit);
        }

        let slot = self
            .providers
            .get(provider)
            .ok_or_else(|| GatewayError::UnknownProvider(provider.to_string()))?;

        let prompt = enrich_prompt(prompt, ctx);
        let system_prompt = enrich_system_prompt(system_prompt, ctx);
        let started = Instant::now();
        let mut metadata = ExecutionMetadata::default();

        let primary = self.run_with_retries(provider, slot, &prompt, &system_prompt, &mut metadata).await;

        let (response, used_name, used_slot) = match primary {
            Ok(response) => (response, provider, slot),
            Err(primary_error) => {
                let fallback = slot
                    .config
                    .fallback
                    .as_deref()
                    .filter(|f| *f != provider)
                    .and_then(|f| self.providers.get_key_value(f));

                let Some((fallback_name, fallback_slot)) = fallback else {
                    let message = match &slot.config.fallback {
                        Some(f) => format!("{}; fallback {} is not registered", primary_error, f),
                        None => primary_error,
                    };
                    return Err(self.fail(provider, message, metadata, started).await);
                };

                warn!(provider, fallback = fallback_name.as_str(), "Primary exhausted, escalating to fallback");
                metadata.execution_path.push("fallback".to_string());
                metadata.fallback_used = true;

                match self
                    .run_with_retries(fallback_name, fallback_slot, &prompt, &system_prompt, &mut metadata)
                    .await
                {
                    Ok(response) => (response, fallback_name.as_str(), fallback_slot),
                    Err(fallback_error) => {
                        let message = format!("primary: {}; fallback: {}", primary_error, fallback_error);
                        return Err(self.fail(provider, message, metadata, started).await);
                    }
                }
            }
        };

        let content = response.content.clone().unwrap_or_default();
        let quality = score_quality(&content, &ctx.prior_thoughts);
        let confidence = confidence_score(response.confidence(), &quality, content.chars().count());
        let model_used = response
            .metadata
            .as_ref()
            .and_then(|m| m.model.clone())
            .unwrap_or_else(|| used_slot.config.model.clone());

        let result = ExecutionResult {
            success: true,
            content: Some(content),
            error: None,
            provider_used: used_name.to_string(),
            model_used,
            processing_time_ms: started.elapsed().as_millis() as u64,
            confidence_score: confidence,
            quality_metrics: quality,
            metadata,
        };

        debug!(
            provider = result.provider_used.as_str(),
            retries = result.metadata.retry_count,
            fallback = result.metadata.fallback_used,
            confidence = result.confidence_score,
            "Execution succeeded"
        );

        self.cache.lock().await.insert(key, result.clone());
        self.stats.lock().await.record_success(&result);
        self.history.lock().await.push(result.clone());
        Ok(result)
    }

    /// One full retry sequence against a single provider.
    async fn run_with_retries(
        &self,
        name: &str,
        slot: &ProviderSlot,
        prompt: &str,
        system_prompt: &str,
        metadata: &mut ExecutionMetadata,
    ) -> Result<ProviderResponse, String> {
        metadata.execution_path.push(name.to_string());

        let client = match &slot.client {
            ClientState::Ready(client) => client,
            ClientState::Unavailable(reason) => {
                metadata.execution_path.push(format!("{}:unavailable", name));
                return Err(format!("{} unavailable: {}", name, reason));
            }
        };

        let attempts = slot.config.retry_attempts.saturating_add(1);
        let timeout = Duration::from_millis(slot.config.timeout_ms.max(1));
        let mut last_error = String::new();

        for attempt in 0..attempts {
            if attempt > 0 {
                metadata.retry_count += 1;
                metadata.execution_path.push(format!("retry:{}", attempt));
            }

            let response = match tokio::time::timeout(timeout, client.execute(prompt, system_prompt)).await {
                Ok(response) => response,
                Err(_) => ProviderResponse::failure(format!("timed out after {}ms", timeout.as_millis())),
            };

            if response.is_usable() {
                if attempt > 0 {
                    info!(provider = name, attempt, "Provider recovered after retries");
                }
                return Ok(response);
            }

            last_error = response
                .error
                .unwrap_or_else(|| "empty response content".to_string());

            if attempt + 1 < attempts {
                let delay = self.config.backoff(attempt);
                warn!(
                    provider = name,
                    attempt = attempt + 1,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Provider call failed, retrying: {}",
                    last_error
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(format!("{} failed after {} attempts: {}", name, attempts, last_error))
    }

    async fn fail(
        &self,
        provider: &str,
        message: String,
        metadata: ExecutionMetadata,
        started: Instant,
    ) -> GatewayError {
        error!(provider, "Execution exhausted: {}", message);
        let record = ExecutionResult {
            success: false,
            content: None,
            error: Some(message.clone()),
            provider_used: provider.to_string(),
            model_used: self
                .providers
                .get(provider)
                .map(|s| s.config.model.clone())
                .unwrap_or_default(),
            processing_time_ms: started.elapsed().as_millis() as u64,
            confidence_score: 0.0,
            quality_metrics: QualityMetrics::default(),
            metadata,
        };
        self.stats.lock().await.record_failure();
        self.history.lock().await.push(record);
        GatewayError::ExecutionExhausted {
            provider: provider.to_string(),
            message,
        }
    }

    /// One canonical request straight to the provider: no cache, retries, or statistics.
    pub async fn test_provider(&self, name: &str) -> Result<ProviderTestReport, GatewayError> {
        let slot = self
            .providers
            .get(name)
            .ok_or_else(|| GatewayError::UnknownProvider(name.to_string()))?;

        let client = match &slot.client {
            ClientState::Ready(client) => client,
            ClientState::Unavailable(reason) => {
                return Ok(ProviderTestReport {
                    provider: name.to_string(),
                    success: false,
                    latency_ms: 0,
                    error: Some(reason.clone()),
                });
            }
        };

        let started = Instant::now();
        let timeout = Duration::from_millis(slot.config.timeout_ms.max(1));
        let response = match tokio::time::timeout(timeout, client.execute(PROBE_PROMPT, PROBE_SYSTEM_PROMPT)).await {
            Ok(response) => response,
            Err(_) => ProviderResponse::failure(format!("timed out after {}ms", timeout.as_millis())),
        };
        let success = response.is_usable();
        Ok(ProviderTestReport {
            provider: name.to_string(),
            success,
            latency_ms: started.elapsed().as_millis() as u64,
            error: if success {
                None
            } else {
                Some(response.error.unwrap_or_else(|| "empty response content".to_string()))
            },
        })
    }

    pub async fn stats(&self) -> StatsSnapshot {
        self.stats.lock().await.snapshot()
    }

    /// Execution history, oldest first.
    pub async fn history(&self) -> Vec<ExecutionResult> {
        self.history.lock().await.to_vec()
    }

    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
    }
}
