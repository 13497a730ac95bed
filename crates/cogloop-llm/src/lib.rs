//! Cogloop LLM - Text-generation provider adapters

pub mod anthropic;
pub mod factory;
pub mod openai;
pub mod provider;
pub mod scripted;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use factory::create_provider;
pub use openai::OpenAiCompatProvider;
pub use provider::{LlmError, LlmResult, TextProvider};
pub use scripted::{ScriptedProvider, ScriptedReply};
pub use types::*;
