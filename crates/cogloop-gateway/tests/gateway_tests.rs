//! Tests for cogloop-gateway: retries, fallback, cache, statistics, probes

use cogloop_core::{CyclePhase, ExecutionContext};
use cogloop_gateway::*;
use cogloop_llm::{ProviderConfig, ProviderKind, ScriptedProvider, ScriptedReply, TextProvider};
use std::sync::Arc;
use std::time::Duration;

const REPLY: &str = "Solitude is a trainer because the self must hear its own dissonance. Perhaps that is enough?";

fn fast_config() -> GatewayConfig {
    GatewayConfig {
        backoff_base_ms: 1,
        backoff_cap_ms: 4,
        ..GatewayConfig::default()
    }
}

fn scripted_config() -> ProviderConfig {
    ProviderConfig::new(ProviderKind::Ollama, "scripted")
}

fn ctx(agent: &str) -> ExecutionContext {
    ExecutionContext::new(agent, CyclePhase::Thought)
        .with_clock(1)
        .with_question("Is solitude a form of dissonance?")
}

fn register(
    gw: &mut ExecutionGateway,
    name: &str,
    config: ProviderConfig,
    provider: &Arc<ScriptedProvider>,
) -> ProviderStatus {
    let client: Arc<dyn TextProvider> = provider.clone();
    gw.register_client(name, config, client)
}

// ===========================================================================
// Success path
// ===========================================================================

#[tokio::test]
async fn successful_execution_is_scored() {
    let provider = Arc::new(ScriptedProvider::constant("primary", ScriptedReply::text(REPLY)));
    let mut gw = ExecutionGateway::new(fast_config());
    assert_eq!(register(&mut gw, "primary", scripted_config(), &provider), ProviderStatus::Ready);

    let result = gw
        .execute_with_context("primary", "Think about solitude", "You are a philosopher", &ctx("kant"))
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.content(), REPLY);
    assert_eq!(result.provider_used, "primary");
    assert_eq!(result.model_used, "scripted");
    assert_eq!(result.metadata.retry_count, 0);
    assert!(!result.metadata.fallback_used);
    assert!(!result.metadata.cache_hit);
    assert_eq!(result.metadata.execution_path, vec!["primary".to_string()]);
    assert!(result.confidence_score >= 0.1 && result.confidence_score <= 1.0);
    for metric in result.quality_metrics.as_array() {
        assert!((0.0..=1.0).contains(&metric));
    }
}

#[tokio::test]
async fn prompts_are_enriched_before_dispatch() {
    let provider = Arc::new(ScriptedProvider::constant("primary", ScriptedReply::text(REPLY)));
    let mut gw = ExecutionGateway::new(fast_config());
    register(&mut gw, "primary", scripted_config(), &provider);

    let context = ctx("hume").with_prior_thoughts(vec!["first".into(), "second".into(), "third".into()]);
    gw.execute_with_context("primary", "PROMPT", "SYSTEM", &context)
        .await
        .unwrap();

    let prompts = provider.prompts().await;
    assert_eq!(prompts.len(), 1);
    let (prompt, system) = &prompts[0];
    assert!(prompt.starts_with("[Cycle context]"));
    assert!(prompt.contains("Agent: hume"));
    assert!(prompt.contains("- third"));
    assert!(!prompt.contains("- first"));
    assert!(prompt.ends_with("PROMPT"));
    assert!(system.starts_with("SYSTEM"));
    assert!(system.contains("agent 'hume'"));
}

// ===========================================================================
// Cache
// ===========================================================================

#[tokio::test]
async fn identical_request_is_served_from_cache() {
    let provider = Arc::new(ScriptedProvider::constant("primary", ScriptedReply::text(REPLY)));
    let mut gw = ExecutionGateway::new(fast_config());
    register(&mut gw, "primary", scripted_config(), &provider);

    let first = gw
        .execute_with_context("primary", "q", "s", &ctx("kant"))
        .await
        .unwrap();
    let second = gw
        .execute_with_context("primary", "q", "s", &ctx("kant"))
        .await
        .unwrap();

    assert_eq!(provider.call_count(), 1);
    assert!(!first.metadata.cache_hit);
    assert!(second.metadata.cache_hit);
    assert_eq!(first.content(), second.content());

    let stats = gw.stats().await;
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.successes, 1);
}

#[tokio::test]
async fn different_agent_or_phase_misses_cache() {
    let provider = Arc::new(ScriptedProvider::constant("primary", ScriptedReply::text(REPLY)));
    let mut gw = ExecutionGateway::new(fast_config());
    register(&mut gw, "primary", scripted_config(), &provider);

    gw.execute_with_context("primary", "q", "s", &ctx("kant")).await.unwrap();
    gw.execute_with_context("primary", "q", "s", &ctx("hume")).await.unwrap();
    let audit = ExecutionContext::new("kant", CyclePhase::Audit);
    gw.execute_with_context("primary", "q", "s", &audit).await.unwrap();

    assert_eq!(provider.call_count(), 3);
}

#[tokio::test]
async fn expired_cache_entries_are_not_served() {
    let provider = Arc::new(ScriptedProvider::constant("primary", ScriptedReply::text(REPLY)));
    let mut gw = ExecutionGateway::new(GatewayConfig {
        cache_ttl_secs: 0,
        ..fast_config()
    });
    register(&mut gw, "primary", scripted_config(), &provider);

    gw.execute_with_context("primary", "q", "s", &ctx("kant")).await.unwrap();
    let again = gw.execute_with_context("primary", "q", "s", &ctx("kant")).await.unwrap();

    assert_eq!(provider.call_count(), 2);
    assert!(!again.metadata.cache_hit);
}

#[tokio::test]
async fn clear_cache_forces_provider_call() {
    let provider = Arc::new(ScriptedProvider::constant("primary", ScriptedReply::text(REPLY)));
    let mut gw = ExecutionGateway::new(fast_config());
    register(&mut gw, "primary", scripted_config(), &provider);

    gw.execute_with_context("primary", "q", "s", &ctx("kant")).await.unwrap();
    gw.clear_cache().await;
    gw.execute_with_context("primary", "q", "s", &ctx("kant")).await.unwrap();
    assert_eq!(provider.call_count(), 2);
}

// ===========================================================================
// Retries
// ===========================================================================

#[tokio::test]
async fn always_failing_provider_is_attempted_retry_plus_one_times() {
    let provider = Arc::new(ScriptedProvider::constant("primary", ScriptedReply::failure("503")));
    let mut gw = ExecutionGateway::new(fast_config());
    register(&mut gw, "primary", scripted_config().with_retry_attempts(3), &provider);

    let err = gw
        .execute_with_context("primary", "q", "s", &ctx("kant"))
        .await
        .unwrap_err();

    assert_eq!(provider.call_count(), 4);
    assert!(matches!(err, GatewayError::ExecutionExhausted { .. }));
    assert!(err.to_string().contains("503"));

    let history = gw.history().await;
    assert_eq!(history.len(), 1);
    assert!(!history[0].success);
    assert_eq!(
        history[0].metadata.execution_path,
        vec!["primary", "retry:1", "retry:2", "retry:3"]
    );
    assert_eq!(history[0].metadata.retry_count, 3);

    let stats = gw.stats().await;
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.success_rate, 0.0);
}

#[tokio::test]
async fn transient_failure_recovers_on_retry() {
    let provider = Arc::new(ScriptedProvider::sequence(
        "primary",
        vec![ScriptedReply::failure("timeout"), ScriptedReply::Empty],
        ScriptedReply::text(REPLY),
    ));
    let mut gw = ExecutionGateway::new(fast_config());
    register(&mut gw, "primary", scripted_config(), &provider);

    let result = gw
        .execute_with_context("primary", "q", "s", &ctx("kant"))
        .await
        .unwrap();

    assert_eq!(provider.call_count(), 3);
    assert_eq!(result.metadata.retry_count, 2);
    assert_eq!(result.metadata.execution_path, vec!["primary", "retry:1", "retry:2"]);
    assert!(!result.metadata.fallback_used);
}

#[tokio::test]
async fn slow_provider_hits_per_attempt_timeout() {
    let provider = Arc::new(
        ScriptedProvider::constant("primary", ScriptedReply::text(REPLY)).with_delay(Duration::from_millis(200)),
    );
    let mut config = scripted_config().with_retry_attempts(1);
    config.timeout_ms = 10;
    let mut gw = ExecutionGateway::new(fast_config());
    register(&mut gw, "primary", config, &provider);

    let err = gw
        .execute_with_context("primary", "q", "s", &ctx("kant"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("timed out"));
    assert_eq!(provider.call_count(), 2);
}

// ===========================================================================
// Fallback
// ===========================================================================

#[tokio::test]
async fn fallback_is_used_after_primary_exhaustion() {
    let primary = Arc::new(ScriptedProvider::constant("primary", ScriptedReply::failure("down")));
    let backup = Arc::new(ScriptedProvider::constant("backup", ScriptedReply::text(REPLY)).with_model("backup-model"));
    let mut gw = ExecutionGateway::new(fast_config());
    register(
        &mut gw,
        "primary",
        scripted_config().with_retry_attempts(2).with_fallback("backup"),
        &primary,
    );
    register(&mut gw, "backup", scripted_config(), &backup);

    let result = gw
        .execute_with_context("primary", "q", "s", &ctx("kant"))
        .await
        .unwrap();

    assert_eq!(primary.call_count(), 3);
    assert_eq!(backup.call_count(), 1);
    assert!(result.metadata.fallback_used);
    assert_eq!(result.provider_used, "backup");
    assert_eq!(result.model_used, "backup-model");
    assert_eq!(
        result.metadata.execution_path,
        vec!["primary", "retry:1", "retry:2", "fallback", "backup"]
    );

    let stats = gw.stats().await;
    assert_eq!(stats.fallback_successes, 1);
    assert_eq!(stats.provider_usage.get("backup"), Some(&1));
}

#[tokio::test]
async fn fallback_exhaustion_reports_both_failures() {
    let primary = Arc::new(ScriptedProvider::constant("primary", ScriptedReply::failure("primary-down")));
    let backup = Arc::new(ScriptedProvider::constant("backup", ScriptedReply::failure("backup-down")));
    let mut gw = ExecutionGateway::new(fast_config());
    register(
        &mut gw,
        "primary",
        scripted_config().with_retry_attempts(0).with_fallback("backup"),
        &primary,
    );
    register(&mut gw, "backup", scripted_config().with_retry_attempts(1), &backup);

    let err = gw
        .execute_with_context("primary", "q", "s", &ctx("kant"))
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("primary-down"));
    assert!(message.contains("backup-down"));
    assert_eq!(primary.call_count(), 1);
    assert_eq!(backup.call_count(), 2);
}

#[tokio::test]
async fn unregistered_fallback_is_reported() {
    let primary = Arc::new(ScriptedProvider::constant("primary", ScriptedReply::failure("down")));
    let mut gw = ExecutionGateway::new(fast_config());
    register(
        &mut gw,
        "primary",
        scripted_config().with_retry_attempts(0).with_fallback("ghost"),
        &primary,
    );

    let err = gw
        .execute_with_context("primary", "q", "s", &ctx("kant"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("ghost"));
}

// ===========================================================================
// Registry
// ===========================================================================

#[tokio::test]
async fn unknown_provider_is_rejected() {
    let gw = ExecutionGateway::new(fast_config());
    let err = gw
        .execute_with_context("nobody", "q", "s", &ctx("kant"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::UnknownProvider(ref name) if name == "nobody"));

    let core: cogloop_core::Error = err.into();
    assert!(matches!(core, cogloop_core::Error::UnknownProvider(_)));
}

#[tokio::test]
async fn unavailable_provider_stays_registered_and_fails_over() {
    if std::env::var("ANTHROPIC_API_KEY").is_ok() {
        return;
    }
    let backup = Arc::new(ScriptedProvider::constant("backup", ScriptedReply::text(REPLY)));
    let mut gw = ExecutionGateway::new(fast_config());
    let status = gw.register_provider(
        "claude",
        ProviderConfig::new(ProviderKind::Anthropic, "claude-sonnet-4-20250514").with_fallback("backup"),
    );
    assert!(matches!(status, ProviderStatus::Unavailable(_)));
    register(&mut gw, "backup", scripted_config(), &backup);

    assert!(!gw.has_provider("claude"));
    assert_eq!(gw.provider_names(), vec!["backup".to_string(), "claude".to_string()]);

    let result = gw
        .execute_with_context("claude", "q", "s", &ctx("kant"))
        .await
        .unwrap();
    assert!(result.metadata.fallback_used);
    assert_eq!(result.metadata.execution_path[0], "claude");
    assert_eq!(result.metadata.execution_path[1], "claude:unavailable");
}

#[tokio::test]
async fn ollama_registration_needs_no_credentials() {
    let mut gw = ExecutionGateway::new(fast_config());
    let status = gw.register_provider("local", ProviderConfig::new(ProviderKind::Ollama, "llama3"));
    assert_eq!(status, ProviderStatus::Ready);
    assert_eq!(gw.provider_status("local"), Some(ProviderStatus::Ready));
    assert_eq!(gw.provider_status("missing"), None);
}

// ===========================================================================
// Statistics and history
// ===========================================================================

#[tokio::test]
async fn stats_track_successes_and_failures() {
    let good = Arc::new(ScriptedProvider::constant("good", ScriptedReply::Confident(REPLY.into(), 0.9)));
    let bad = Arc::new(ScriptedProvider::constant("bad", ScriptedReply::failure("nope")));
    let mut gw = ExecutionGateway::new(fast_config());
    register(&mut gw, "good", scripted_config(), &good);
    register(&mut gw, "bad", scripted_config().with_retry_attempts(0), &bad);

    gw.execute_with_context("good", "a", "s", &ctx("kant")).await.unwrap();
    gw.execute_with_context("good", "b", "s", &ctx("kant")).await.unwrap();
    gw.execute_with_context("good", "c", "s", &ctx("kant")).await.unwrap();
    let _ = gw.execute_with_context("bad", "d", "s", &ctx("kant")).await;

    let stats = gw.stats().await;
    assert_eq!(stats.total_executions, 4);
    assert_eq!(stats.successes, 3);
    assert_eq!(stats.failures, 1);
    assert!((stats.success_rate - 0.75).abs() < 1e-9);
    assert_eq!(stats.model_usage.get("scripted"), Some(&3));
    assert!(stats.avg_confidence > 0.5);
    assert!(stats.avg_quality.coherence > 0.0);

    assert_eq!(gw.history().await.len(), 4);
}

#[tokio::test]
async fn history_is_bounded() {
    let provider = Arc::new(ScriptedProvider::constant("primary", ScriptedReply::text(REPLY)));
    let mut gw = ExecutionGateway::new(GatewayConfig {
        history_capacity: 3,
        ..fast_config()
    });
    register(&mut gw, "primary", scripted_config(), &provider);

    for i in 0..5 {
        gw.execute_with_context("primary", &format!("q{}", i), "s", &ctx("kant"))
            .await
            .unwrap();
    }
    assert_eq!(gw.history().await.len(), 3);
}

// ===========================================================================
// Probe
// ===========================================================================

#[tokio::test]
async fn test_provider_bypasses_cache_and_stats() {
    let provider = Arc::new(ScriptedProvider::constant("primary", ScriptedReply::text("OK")));
    let mut gw = ExecutionGateway::new(fast_config());
    register(&mut gw, "primary", scripted_config(), &provider);

    let report = gw.test_provider("primary").await.unwrap();
    assert!(report.success);
    assert!(report.error.is_none());
    let again = gw.test_provider("primary").await.unwrap();
    assert!(again.success);

    assert_eq!(provider.call_count(), 2);
    let stats = gw.stats().await;
    assert_eq!(stats.total_executions, 0);
    assert_eq!(stats.cache_hits, 0);
}

#[tokio::test]
async fn test_provider_reports_failure() {
    let provider = Arc::new(ScriptedProvider::constant("primary", ScriptedReply::failure("refused")));
    let mut gw = ExecutionGateway::new(fast_config());
    register(&mut gw, "primary", scripted_config(), &provider);

    let report = gw.test_provider("primary").await.unwrap();
    assert!(!report.success);
    assert_eq!(report.error.as_deref(), Some("refused"));
    assert_eq!(provider.call_count(), 1);

    assert!(gw.test_provider("nobody").await.is_err());
}
