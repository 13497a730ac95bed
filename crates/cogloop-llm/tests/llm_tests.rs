//! Tests for cogloop-llm: response types, provider factory, scripted provider

use cogloop_llm::*;
use std::time::Instant;

// ===========================================================================
// ProviderConfig
// ===========================================================================

#[test]
fn provider_config_default() {
    let cfg = ProviderConfig::default();
    assert_eq!(cfg.kind, ProviderKind::Anthropic);
    assert_eq!(cfg.retry_attempts, 3);
    assert_eq!(cfg.timeout_ms, 60_000);
    assert!(cfg.fallback.is_none());
}

#[test]
fn provider_config_partial_json_uses_defaults() {
    let cfg: ProviderConfig = serde_json::from_str(r#"{"kind":"ollama","model":"llama3"}"#).unwrap();
    assert_eq!(cfg.kind, ProviderKind::Ollama);
    assert_eq!(cfg.model, "llama3");
    assert_eq!(cfg.max_tokens, 1024);
}

#[test]
fn provider_config_builders() {
    let cfg = ProviderConfig::new(ProviderKind::OpenAi, "gpt-4o-mini")
        .with_fallback("local")
        .with_retry_attempts(1);
    assert_eq!(cfg.fallback.as_deref(), Some("local"));
    assert_eq!(cfg.retry_attempts, 1);
    assert_eq!(cfg.kind.as_str(), "openai");
}

// ===========================================================================
// ProviderResponse
// ===========================================================================

#[test]
fn provider_response_usability() {
    assert!(ProviderResponse::ok("text").is_usable());
    assert!(!ProviderResponse::ok("   ").is_usable());
    assert!(!ProviderResponse::failure("boom").is_usable());
    let mut odd = ProviderResponse::ok("text");
    odd.success = false;
    assert!(!odd.is_usable());
}

#[test]
fn provider_response_from_error_result() {
    let started = Instant::now();
    let resp = ProviderResponse::from_result(Err(LlmError::RateLimited { retry_after_ms: 10 }), started);
    assert!(!resp.success);
    assert!(resp.error.unwrap().contains("rate limited"));
    assert!(resp.duration_ms.is_some());
}

#[test]
fn provider_response_skips_empty_fields() {
    let json = serde_json::to_string(&ProviderResponse::ok("hi")).unwrap();
    assert!(!json.contains("error"));
    assert!(!json.contains("metadata"));
}

// ===========================================================================
// Factory
// ===========================================================================

#[test]
fn factory_builds_ollama_without_key() {
    let cfg = ProviderConfig::new(ProviderKind::Ollama, "llama3");
    let provider = create_provider("local", &cfg).unwrap();
    assert_eq!(provider.name(), "local");
    assert_eq!(provider.model(), "llama3");
}

#[test]
fn factory_builds_anthropic_with_explicit_key() {
    let mut cfg = ProviderConfig::new(ProviderKind::Anthropic, "claude-haiku-4-5-20251001");
    cfg.api_key = Some("sk-test".into());
    let provider = create_provider("primary", &cfg).unwrap();
    assert_eq!(provider.name(), "primary");
}

#[test]
fn factory_rejects_anthropic_without_key() {
    if std::env::var("ANTHROPIC_API_KEY").is_ok() {
        return;
    }
    let cfg = ProviderConfig::new(ProviderKind::Anthropic, "claude-haiku-4-5-20251001");
    let err = create_provider("primary", &cfg).err().expect("should fail");
    assert!(matches!(err, LlmError::MissingCredentials(_)));
}

// ===========================================================================
// ScriptedProvider
// ===========================================================================

#[tokio::test]
async fn scripted_sequence_then_default() {
    let p = ScriptedProvider::sequence(
        "mock",
        vec![ScriptedReply::failure("down"), ScriptedReply::text("first")],
        ScriptedReply::text("default"),
    );
    assert!(!p.execute("a", "").await.success);
    assert_eq!(p.execute("b", "").await.content.as_deref(), Some("first"));
    assert_eq!(p.execute("c", "").await.content.as_deref(), Some("default"));
    assert_eq!(p.call_count(), 3);
    let prompts = p.prompts().await;
    assert_eq!(prompts[2].0, "c");
}

#[tokio::test]
async fn scripted_confident_reply_carries_confidence() {
    let p = ScriptedProvider::constant("mock", ScriptedReply::Confident("yes".into(), 0.9));
    let resp = p.execute("q", "s").await;
    assert_eq!(resp.confidence(), Some(0.9));
}

#[tokio::test]
async fn scripted_responder_sees_prompts() {
    let p = ScriptedProvider::from_fn("echo", |prompt, system| ScriptedReply::text(format!("{}|{}", system, prompt)));
    let resp = p.execute("hello", "sys").await;
    assert_eq!(resp.content.as_deref(), Some("sys|hello"));
}

#[tokio::test]
async fn scripted_empty_is_not_usable() {
    let p = ScriptedProvider::constant("mock", ScriptedReply::Empty);
    let resp = p.execute("q", "").await;
    assert!(resp.success);
    assert!(!resp.is_usable());
}
