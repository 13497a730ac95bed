//! ScriptedProvider - deterministic in-process responses
//!
//! Either replays a sequence of replies (then repeats a default), or
//! computes each reply from the prompt pair. Used for offline runs and tests.

use crate::provider::TextProvider;
use crate::types::{ProviderResponse, ResponseMetadata};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Clone, Debug)]
pub enum ScriptedReply {
    Text(String),
    /// Text plus a self-reported confidence.
    Confident(String, f64),
    /// Reports success with blank content.
    Empty,
    Failure(String),
}

impl ScriptedReply {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn failure(s: impl Into<String>) -> Self {
        Self::Failure(s.into())
    }
}

type Responder = Box<dyn Fn(&str, &str) -> ScriptedReply + Send + Sync>;

enum Script {
    Sequence {
        replies: Mutex<VecDeque<ScriptedReply>>,
        default: ScriptedReply,
    },
    Responder(Responder),
}

pub struct ScriptedProvider {
    name: String,
    model: String,
    script: Script,
    delay: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedProvider {
    /// Always return the same reply.
    pub fn constant(name: impl Into<String>, reply: ScriptedReply) -> Self {
        Self::sequence(name, Vec::new(), reply)
    }

    /// Replies consumed in order, then `default` forever.
    pub fn sequence(name: impl Into<String>, replies: Vec<ScriptedReply>, default: ScriptedReply) -> Self {
        Self::with_script(
            name,
            Script::Sequence {
                replies: Mutex::new(replies.into()),
                default,
            },
        )
    }

    pub fn from_fn<F>(name: impl Into<String>, responder: F) -> Self
    where
        F: Fn(&str, &str) -> ScriptedReply + Send + Sync + 'static,
    {
        Self::with_script(name, Script::Responder(Box::new(responder)))
    }

    fn with_script(name: impl Into<String>, script: Script) -> Self {
        Self {
            name: name.into(),
            model: "scripted".to_string(),
            script,
            delay: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Simulated latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every (prompt, system prompt) pair received, in call order.
    pub async fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().await.clone()
    }

    async fn next_reply(&self, prompt: &str, system_prompt: &str) -> ScriptedReply {
        match &self.script {
            Script::Sequence { replies, default } => {
                replies.lock().await.pop_front().unwrap_or_else(|| default.clone())
            }
            Script::Responder(f) => f(prompt, system_prompt),
        }
    }
}

#[async_trait::async_trait]
impl TextProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn execute(&self, prompt: &str, system_prompt: &str) -> ProviderResponse {
        let started = Instant::now();
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .await
            .push((prompt.to_string(), system_prompt.to_string()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let metadata = ResponseMetadata {
            model: Some(self.model.clone()),
            ..Default::default()
        };
        let response = match self.next_reply(prompt, system_prompt).await {
            ScriptedReply::Text(text) => ProviderResponse::ok(text).with_metadata(metadata),
            ScriptedReply::Confident(text, confidence) => ProviderResponse::ok(text).with_metadata(ResponseMetadata {
                confidence: Some(confidence),
                ..metadata
            }),
            ScriptedReply::Empty => ProviderResponse::ok(""),
            ScriptedReply::Failure(e) => ProviderResponse::failure(e),
        };
        response.with_duration(started)
    }
}
