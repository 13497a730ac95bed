//! End-to-end cycles: scripted thinkers, heuristic auditor, real weight engine.

use cogloop_core::{RiskLevel, StageStrategy, Trigger};
use cogloop_cycle::{CycleConfig, CycleOrchestrator, CycleOutcome, CycleReport, JsonlStore, Stage};
use cogloop_gateway::{ExecutionGateway, GatewayConfig};
use cogloop_llm::{ProviderConfig, ProviderKind, ScriptedProvider, ScriptedReply, TextProvider};
use std::sync::Arc;

const QUESTION: &str = "Is solitude a form of dissonance?";

const SOCRATES: &str = "Perhaps solitude is where dissonance first becomes audible: alone, we notice how our \
                        stated values and our daily habits refuse to agree.";
const MARCUS: &str = "Solitude is a retreat into the inner citadel. What disturbs us there is not the quiet \
                      itself but our judgement about what we lack.";
const SIMONE: &str = "Solitude is chosen or imposed, and that difference matters; freedom turns isolation into \
                      a place where the self can be reinvented.";
const MARCUS_ATTACK: &str = "Solitude can feel like an attack on the self, yet it is in that siege that a person \
                             learns which of their beliefs were only borrowed.";

fn thinkers(marcus: &'static str) -> Arc<ScriptedProvider> {
    Arc::new(ScriptedProvider::from_fn("thinkers", move |_prompt, system| {
        if system.contains("agent 'socrates'") {
            ScriptedReply::text(SOCRATES)
        } else if system.contains("agent 'marcus'") {
            ScriptedReply::text(marcus)
        } else {
            ScriptedReply::text(SIMONE)
        }
    }))
}

/// Three baseline agents on the scripted provider; every later stage on its heuristic.
fn orchestrator(provider: Arc<ScriptedProvider>) -> CycleOrchestrator {
    let mut config = CycleConfig::default();
    config.providers.clear();
    config.route_all_to("thinkers");
    config.agents.contrasting_count = 0;
    config.energy.enabled = false;
    config.dpd = config.dpd.without_perturbation();
    config.pipeline.ai_confidence = false;
    config.pipeline.reflection_provider = None;
    config.pipeline.auditor_provider = None;
    config.pipeline.synthesis_provider = None;
    config.pipeline.scribe_provider = None;

    let mut gateway = ExecutionGateway::new(GatewayConfig {
        backoff_base_ms: 1,
        backoff_cap_ms: 2,
        ..GatewayConfig::default()
    });
    let client: Arc<dyn TextProvider> = provider;
    gateway.register_client("thinkers", ProviderConfig::new(ProviderKind::Ollama, "scripted"), client);
    CycleOrchestrator::new(config, Arc::new(gateway))
}

async fn run(orch: &mut CycleOrchestrator) -> CycleReport {
    match orch.run_cycle(Trigger::new(QUESTION, "existential", 0.7)).await.unwrap() {
        CycleOutcome::Completed(report) => *report,
        other => panic!("expected a completed cycle, got {:?}", other),
    }
}

#[tokio::test]
async fn clean_council_is_approved() {
    let provider = thinkers(MARCUS);
    let mut orch = orchestrator(provider.clone());

    let report = run(&mut orch).await;

    assert_eq!(provider.call_count(), 3);
    assert_eq!(report.thoughts.len(), 3);
    for t in &report.thoughts {
        assert!((130..=170).contains(&t.content.chars().count()), "{}", t.content.len());
        assert!((0.05..=0.95).contains(&t.confidence), "{}", t.confidence);
    }

    let audit = report.audit.as_ref().unwrap();
    assert_eq!(audit.strategy, StageStrategy::Heuristic);
    assert_eq!(audit.risk_level, RiskLevel::Low);
    assert!(audit.approved);
    assert!(audit.concerns.is_empty());

    let synthesis = report.synthesis.as_ref().unwrap();
    assert_eq!(synthesis.key_themes[0], "solitude");
    assert_eq!(synthesis.contributing_agents.len(), 3);
    assert!(report.documentation.is_some());

    let w = orch.weights();
    assert_eq!(w.version, 1);
    assert!((w.sum() - 1.0).abs() < 0.01);
    for v in w.as_array() {
        assert!((0.1..=0.75).contains(&v));
    }
}

#[tokio::test]
async fn attack_thought_is_high_risk() {
    let mut orch = orchestrator(thinkers(MARCUS_ATTACK));

    let report = run(&mut orch).await;

    assert_eq!(report.thoughts.len(), 3);
    let audit = report.audit.as_ref().unwrap();
    assert!(audit.safety_score <= 0.3, "{}", audit.safety_score);
    assert_eq!(audit.risk_level, RiskLevel::High);
    assert!(!audit.approved);
    assert!(audit.concerns.iter().any(|c| c.contains("attack") && c.contains("marcus")));
    assert!(!audit.recommendations.is_empty());

    // Low safety drags the coherence signal down.
    let scores = report.scores.unwrap();
    assert_eq!(scores.coherence, audit.safety_score);

    // Rejected syntheses leave the question open.
    assert_eq!(orch.memory().unresolved_questions("").len(), 1);
    assert!(orch.memory().beliefs().is_empty());
}

#[tokio::test]
async fn repeated_cycles_keep_weights_on_simplex() {
    let mut orch = orchestrator(thinkers(MARCUS));
    for expected in 1..=5u64 {
        let report = run(&mut orch).await;
        assert_eq!(report.cycle, expected);
        assert_eq!(report.stages.len(), Stage::ORDER.len() - 1);
    }
    let w = orch.weights();
    assert_eq!(w.version, 5);
    assert!((w.sum() - 1.0).abs() < 0.01);
    assert_eq!(orch.engine().history_len(), 5);
}

#[tokio::test]
async fn stored_weights_resume_across_orchestrators() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cycles.jsonl");

    let store = Arc::new(JsonlStore::new(&path));
    let mut first = orchestrator(thinkers(MARCUS)).with_store(store.clone());
    run(&mut first).await;
    let saved = first.weights().clone();

    let records = store.read_all().await.unwrap();
    let last = records
        .into_iter()
        .rev()
        .find_map(|r| match r {
            cogloop_cycle::CycleRecord::Weights(w) => Some(w),
            _ => None,
        })
        .unwrap();
    assert_eq!(last.as_array(), saved.as_array());

    let mut second = orchestrator(thinkers(MARCUS)).with_weights(last);
    let report = run(&mut second).await;
    assert_eq!(report.weight_update.unwrap().previous.version, saved.version);
    assert_eq!(second.weights().version, 2);
}
