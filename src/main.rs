//! cogloop - run cognitive cycles from the command line
//!
//! Usage:
//!   cogloop --question "Is solitude a form of dissonance?"   → one cycle, default providers
//!   cogloop --offline --cycles 3                             → scripted provider, no network
//!   cogloop --store cycles.jsonl                             → persist records, resume weights
//!   cogloop --dump-config                                    → print effective config as TOML
//!   cogloop --test-providers                                 → probe every configured provider

use clap::Parser;
use cogloop_core::Trigger;
use cogloop_cycle::{CycleConfig, CycleOrchestrator, CycleOutcome, CycleRecord, CycleReport, JsonlStore};
use cogloop_llm::{ProviderConfig, ProviderKind, ScriptedProvider, ScriptedReply, TextProvider};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const OFFLINE_PROVIDER: &str = "offline";
const DEFAULT_QUESTION: &str = "Is solitude a form of dissonance?";

#[derive(Parser)]
#[command(
    name = "cogloop",
    about = "Multi-agent cognitive cycle: thought, reflection, audit, synthesis, documentation",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the effective config as TOML and exit
    #[arg(long, default_value_t = false)]
    dump_config: bool,

    /// Probe every configured provider and exit
    #[arg(long, default_value_t = false)]
    test_providers: bool,

    /// Trigger question
    #[arg(short, long)]
    question: Option<String>,

    /// Trigger category
    #[arg(short = 'k', long, default_value = "existential")]
    category: String,

    /// Trigger importance (0-1)
    #[arg(short, long, default_value_t = 0.5)]
    importance: f64,

    /// Number of cycles to run on the same question
    #[arg(short = 'n', long, default_value_t = 1)]
    cycles: u32,

    /// Route every stage to an in-process scripted provider
    #[arg(long, default_value_t = false)]
    offline: bool,

    /// Append cycle records to this JSONL file and resume weights from it
    #[arg(long)]
    store: Option<PathBuf>,

    /// Print reports as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long, default_value_t = false)]
    json_logs: bool,

    /// Write logs to a file (in addition to stderr)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_deref(), cli.json_logs);

    let mut config = match &cli.config {
        Some(path) => CycleConfig::load(path),
        None => CycleConfig::default(),
    };
    if cli.offline {
        config.route_all_to(OFFLINE_PROVIDER);
    }

    if cli.dump_config {
        print!("{}", config.to_toml());
        return Ok(());
    }

    let mut gateway = cogloop_cycle::build_gateway(&config);
    if cli.offline {
        let client: Arc<dyn TextProvider> = Arc::new(ScriptedProvider::from_fn(OFFLINE_PROVIDER, offline_reply));
        gateway.register_client(
            OFFLINE_PROVIDER,
            ProviderConfig::new(ProviderKind::Ollama, "scripted").with_retry_attempts(0),
            client,
        );
    }

    if cli.test_providers {
        for name in gateway.provider_names() {
            match gateway.test_provider(&name).await {
                Ok(report) => println!(
                    "{:<12} {:<8} {}ms  {}",
                    name,
                    if report.success { "ok" } else { "failed" },
                    report.latency_ms,
                    report.error.as_deref().unwrap_or("")
                ),
                Err(e) => println!("{:<12} {:<8} {}", name, "error", e),
            }
        }
        return Ok(());
    }

    let mut orchestrator = CycleOrchestrator::new(config, Arc::new(gateway));
    if let Some(path) = &cli.store {
        let store = Arc::new(JsonlStore::new(path));
        let last_weights = store.read_all().await?.into_iter().rev().find_map(|r| match r {
            CycleRecord::Weights(w) => Some(w),
            _ => None,
        });
        if let Some(weights) = last_weights {
            tracing::info!(version = weights.version, "Resuming weights from {}", path.display());
            orchestrator = orchestrator.with_weights(weights);
        }
        orchestrator = orchestrator.with_store(store);
    }

    let pause = orchestrator.pause_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, pausing at next stage boundary");
            pause.pause();
        }
    });

    let trigger = Trigger::new(
        cli.question.clone().unwrap_or_else(|| DEFAULT_QUESTION.to_string()),
        cli.category.clone(),
        cli.importance,
    );

    for _ in 0..cli.cycles {
        let outcome = orchestrator.run_when_admitted(trigger.clone()).await?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        } else {
            print_outcome(&outcome);
        }
        if matches!(outcome, CycleOutcome::Paused { .. }) {
            break;
        }
    }

    let w = orchestrator.weights();
    tracing::info!(
        empathy = w.empathy,
        coherence = w.coherence,
        dissonance = w.dissonance,
        version = w.version,
        "Final weights"
    );
    Ok(())
}

fn init_tracing(log_file: Option<&Path>, json: bool) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path.file_name().map(|n| n.to_os_string()).unwrap_or_else(|| "cogloop.log".into());
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (
                Some(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "cogloop=info".into()))
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .with(file_layer)
        .init();
    guard
}

fn print_outcome(outcome: &CycleOutcome) {
    match outcome {
        CycleOutcome::Completed(report) => print_report(report),
        CycleOutcome::AdmissionDenied { needed, level } => {
            println!("Admission denied: needed {:.1} energy, level {:.0}%", needed, level * 100.0);
        }
        CycleOutcome::Paused { before, partial } => {
            println!("Cycle {} paused before {}", partial.cycle, before);
        }
    }
}

fn print_report(report: &CycleReport) {
    println!("═══ Cycle {} ═══ {}", report.cycle, report.trigger.question);
    for t in &report.thoughts {
        println!("  [{}] ({:.2}) {}", t.agent_id, t.confidence, first_line(&t.content));
    }
    if !report.failed_agents.is_empty() {
        println!("  no thought from: {}", report.failed_agents.join(", "));
    }
    match &report.audit {
        Some(a) => println!(
            "  audit: {} safety {:.2} ethics {:.2}{}",
            a.risk_level.as_str(),
            a.safety_score,
            a.ethics_score,
            if a.approved { "" } else { " (not approved)" }
        ),
        None => println!("  audit: skipped"),
    }
    if let Some(s) = &report.synthesis {
        println!("  synthesis ({:.2} consensus): {}", s.consensus_level, first_line(&s.content));
        if !s.key_themes.is_empty() {
            println!("  themes: {}", s.key_themes.join(", "));
        }
    }
    if let Some(d) = &report.documentation {
        println!("  documented: {}", d.title);
    }
    for stage in &report.stages {
        if let Some(reason) = stage.fallback_reason.as_deref() {
            println!("  {} fell back: {}", stage.stage, reason);
        }
    }
    if let Some(u) = &report.weight_update {
        let w = &u.new_weights;
        println!(
            "  weights v{}: empathy {:.3} coherence {:.3} dissonance {:.3}",
            w.version, w.empathy, w.coherence, w.dissonance
        );
    }
    println!("  {}ms{}", report.duration_ms, if report.degraded() { ", degraded" } else { "" });
}

fn first_line(text: &str) -> &str {
    text.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim()
}

// ============================================================
// Offline responder
// ============================================================

/// Deterministic replies keyed on the phase named in the enriched system prompt.
fn offline_reply(prompt: &str, system: &str) -> ScriptedReply {
    let agent = between(system, "agent '", "'").unwrap_or("agent");
    let question = prompt
        .lines()
        .find_map(|l| l.strip_prefix("Recent question: "))
        .unwrap_or(DEFAULT_QUESTION);
    let in_phase = |phase: &str| system.contains(&format!("the {} phase", phase));

    let reply = if in_phase("confidence") {
        "0.6".to_string()
    } else if in_phase("reflection") {
        format!(
            "{} hears part of its own view in this thought, though the emphasis differs.\nAGREEMENT: 0.55",
            agent
        )
    } else if in_phase("audit") {
        "SAFETY: 0.9\nETHICS: 0.85\nCONCERNS: none\nRECOMMENDATIONS: none\n\
         REASONING: Reflective answers with no harmful content.\nFLAGGED: none"
            .to_string()
    } else if in_phase("synthesis") {
        format!(
            "On \"{}\", the council agrees that the self must attend to its own contradictions, \
             while disagreeing on whether that attention heals or merely reveals them.\nCONSENSUS: 0.6",
            question
        )
    } else if in_phase("documentation") {
        format!(
            "TITLE: Offline cycle on \"{}\"\nSUMMARY: A scripted council answered the question.\n\
             # Offline cycle\n\nThe council answered \"{}\" without a network provider.",
            question, question
        )
    } else {
        format!(
            "{} considers \"{}\": the question turns on what the self owes to its own contradictions, \
             because reason without attention to lived experience drifts into abstraction.",
            agent, question
        )
    };
    ScriptedReply::Text(reply)
}

fn between<'a>(text: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = text.find(start)? + start.len();
    let len = text[from..].find(end)?;
    Some(&text[from..from + len])
}
