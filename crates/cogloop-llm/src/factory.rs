//! Build a provider client from its registration config

use crate::anthropic::AnthropicProvider;
use crate::openai::{OpenAiCompatProvider, OLLAMA_API_URL, OPENAI_API_URL};
use crate::provider::{LlmError, LlmResult, TextProvider};
use crate::types::{ProviderConfig, ProviderKind};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable consulted when a config carries no key.
pub fn api_key_env(kind: ProviderKind) -> Option<&'static str> {
    match kind {
        ProviderKind::Anthropic => Some("ANTHROPIC_API_KEY"),
        ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
        ProviderKind::Ollama => None,
    }
}

fn resolve_api_key(config: &ProviderConfig) -> Option<String> {
    config
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| api_key_env(config.kind).and_then(|var| std::env::var(var).ok()))
        .filter(|k| !k.trim().is_empty())
}

pub fn create_provider(name: &str, config: &ProviderConfig) -> LlmResult<Arc<dyn TextProvider>> {
    let client = Client::builder()
        .timeout(Duration::from_millis(config.timeout_ms.max(1)))
        .build()?;

    let provider: Arc<dyn TextProvider> = match config.kind {
        ProviderKind::Anthropic => {
            let key = resolve_api_key(config).ok_or_else(|| LlmError::MissingCredentials(name.to_string()))?;
            let mut p = AnthropicProvider::new(name, key, &config.model)
                .with_client(client)
                .with_sampling(config.max_tokens, config.temperature);
            if let Some(url) = &config.endpoint {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
        ProviderKind::OpenAi => {
            let key = resolve_api_key(config);
            let endpoint = config.endpoint.as_deref().unwrap_or(OPENAI_API_URL);
            // The public endpoint refuses anonymous calls; custom ones may not.
            if key.is_none() && config.endpoint.is_none() {
                return Err(LlmError::MissingCredentials(name.to_string()));
            }
            let mut p = OpenAiCompatProvider::new(name, endpoint, &config.model)
                .with_client(client)
                .with_sampling(config.max_tokens, config.temperature);
            if let Some(key) = key {
                p = p.with_api_key(key);
            }
            Arc::new(p)
        }
        ProviderKind::Ollama => {
            let endpoint = config.endpoint.as_deref().unwrap_or(OLLAMA_API_URL);
            Arc::new(
                OpenAiCompatProvider::new(name, endpoint, &config.model)
                    .with_client(client)
                    .with_sampling(config.max_tokens, config.temperature),
            )
        }
    };
    Ok(provider)
}
