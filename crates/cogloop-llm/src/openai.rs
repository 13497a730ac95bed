//! OpenAI-compatible chat completions provider (OpenAI, Ollama, local gateways)

use crate::provider::{LlmError, LlmResult, TextProvider};
use crate::types::{ProviderResponse, ResponseMetadata, Usage};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, error};

pub const OPENAI_API_URL: &str = "https://api.openai.com/v1";
pub const OLLAMA_API_URL: &str = "http://localhost:11434/v1";

pub struct OpenAiCompatProvider {
    name: String,
    client: Client,
    /// Pre-computed `"Bearer <key>"`; local endpoints run without one.
    auth_header: Option<String>,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiCompatProvider {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            client: Client::new(),
            auth_header: None,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            max_tokens: 1024,
            temperature: 0.7,
        }
    }

    pub fn with_api_key(mut self, api_key: impl AsRef<str>) -> Self {
        self.auth_header = Some(format!("Bearer {}", api_key.as_ref()));
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    async fn complete(&self, prompt: &str, system_prompt: &str) -> LlmResult<(String, ResponseMetadata)> {
        let mut messages = Vec::with_capacity(2);
        if !system_prompt.is_empty() {
            messages.push(Message { role: "system", content: system_prompt });
        }
        messages.push(Message { role: "user", content: prompt });

        let body = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!("OpenAI-compatible request: url={} model={}", url, self.model);

        let mut request = self.client.post(&url).json(&body);
        if let Some(auth) = &self.auth_header {
            request = request.header("authorization", auth);
        }
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("{} error {}: {}", self.name, status, error_text);
            return Err(match status.as_u16() {
                401 | 403 => LlmError::AuthFailed(error_text),
                429 => LlmError::RateLimited { retry_after_ms: 60_000 },
                _ => LlmError::RequestFailed(format!("{}: {}", status, error_text)),
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("no choices in response".to_string()))?;

        Ok((
            content,
            ResponseMetadata {
                model: parsed.model.or_else(|| Some(self.model.clone())),
                confidence: None,
                usage: parsed.usage.map(|u| Usage {
                    input_tokens: u.prompt_tokens,
                    output_tokens: u.completion_tokens,
                }),
            },
        ))
    }
}

#[async_trait::async_trait]
impl TextProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn execute(&self, prompt: &str, system_prompt: &str) -> ProviderResponse {
        let started = Instant::now();
        ProviderResponse::from_result(self.complete(prompt, system_prompt).await, started)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
