//! Hive 命令行入口
//!
//! 读取种子文献，启动自治研究循环，把事件逐行打印到 stdout；
//! 检查点决策与暂停 / 停止命令从 stdin 读取，结束时写出完整运行导出。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use hive::agents::resolve_pipeline;
use hive::config::load_config;
use hive::document::Document;
use hive::engine::{CheckpointResolution, Engine, EngineEvent, EngineState};
use hive::llm::create_llm_from_config;
use hive::observability;
use hive::sources::{SemanticScholarSource, StaticSource};

/// Autonomous multi-agent research loop
#[derive(Parser, Debug)]
#[command(name = "hive", version, about)]
struct Args {
    /// Seed documents: JSON array of {title, abstract, authors, year, fields}
    #[arg(short, long)]
    seeds: PathBuf,

    /// Research guidance passed to every agent
    #[arg(short, long, default_value = "")]
    guidance: String,

    /// Built-in pipeline (replicate | discover) or a TOML file with custom agents
    #[arg(short, long, default_value = "replicate")]
    pipeline: String,

    /// Extra configuration file (overrides config/default.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where to write the run export (default: <export_dir>/run-<id>.json)
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Local catalogue used to enrich discovered titles (JSON array of documents)
    #[arg(long)]
    catalogue: Option<PathBuf>,

    /// Stop after this many iterations
    #[arg(long)]
    max_iterations: Option<u32>,

    /// Resolve every checkpoint with "continue" instead of asking
    #[arg(long)]
    auto_continue: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

const HELP: &str = "commands: p = pause, u = resume, s = stop, c [feedback] = continue, r <guidance> = redirect";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    observability::init(if args.verbose { "debug" } else { "info" });

    let cfg = load_config(args.config.clone()).context("Failed to load configuration")?;
    let seeds = read_documents(&args.seeds)?;
    let pipeline = resolve_pipeline(&args.pipeline)
        .with_context(|| format!("Failed to load pipeline {}", args.pipeline))?;
    let llm = create_llm_from_config(&cfg.llm);

    let mut engine_config = cfg.engine.to_engine_config();
    if let Some(max) = args.max_iterations {
        engine_config.max_iterations = Some(max);
    }

    let (engine, mut events) = Engine::new(engine_config, pipeline, llm);
    let mut engine = engine.with_verification_settings((&cfg.verification).into());
    if cfg.sources.semantic_scholar {
        engine = engine.with_source(Arc::new(SemanticScholarSource::from_config(&cfg.sources)));
    } else if let Some(path) = &args.catalogue {
        engine = engine.with_source(Arc::new(StaticSource::new(read_documents(path)?)));
    }

    let handle = engine
        .start(seeds, args.guidance.clone())
        .context("Failed to start engine")?;
    println!("{}", HELP);

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                print_event(&event);
                match &event {
                    EngineEvent::CheckpointTriggered { .. } if args.auto_continue => {
                        if let Err(e) = engine.resolve_checkpoint(CheckpointResolution::Continue { feedback: None }) {
                            tracing::warn!("{}", e);
                        }
                    }
                    EngineEvent::CheckpointTriggered { .. } => {
                        println!("checkpoint: c [feedback] | r <guidance> | s");
                    }
                    EngineEvent::StatusChange { state: EngineState::Idle | EngineState::Stopped } => break,
                    _ => {}
                }
            }
            line = stdin.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => handle_command(&engine, line.trim()),
                    Ok(None) => stdin_open = false,
                    Err(e) => {
                        tracing::warn!("stdin closed: {}", e);
                        stdin_open = false;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("interrupted, stopping after the current iteration");
                if let Err(e) = engine.stop() {
                    tracing::warn!("{}", e);
                }
            }
        }
    }

    handle.await.context("Engine task failed")?;

    let export = engine.export_full_run();
    let path = match args.export {
        Some(path) => path,
        None => {
            let dir = cfg.app.export_dir.unwrap_or_else(|| PathBuf::from("runs"));
            dir.join(format!("run-{}.json", export.metadata.run_id))
        }
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = export.to_json().context("Failed to serialise export")?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;

    let stats = &export.stats;
    println!(
        "done: {} iterations, {} documents, {} gaps, {} hypotheses, {} breakthroughs -> {}",
        stats.iterations,
        stats.documents_processed,
        stats.total_gaps,
        stats.total_hypotheses,
        stats.breakthroughs.len(),
        path.display()
    );
    Ok(())
}

fn read_documents(path: &Path) -> anyhow::Result<Vec<Document>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid documents in {}", path.display()))
}

fn handle_command(engine: &Engine, line: &str) {
    let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    let feedback = (!rest.is_empty()).then(|| rest.to_string());
    let result = match cmd {
        "" => return,
        "p" => engine.pause(),
        "u" => engine.resume(),
        "s" if engine.state() == EngineState::Checkpoint => {
            engine.resolve_checkpoint(CheckpointResolution::Stop)
        }
        "s" => engine.stop(),
        "c" => engine.resolve_checkpoint(CheckpointResolution::Continue { feedback }),
        "r" => engine.resolve_checkpoint(CheckpointResolution::Redirect {
            feedback: None,
            guidance: rest.to_string(),
        }),
        _ => {
            println!("{}", HELP);
            return;
        }
    };
    if let Err(e) = result {
        println!("! {}", e);
    }
}

fn print_event(event: &EngineEvent) {
    match event {
        EngineEvent::StatusChange { state } => println!("[state] {}", state),
        EngineEvent::IterationStart {
            iteration_id,
            documents,
        } => {
            let titles: Vec<&str> = documents.iter().map(|d| d.title.as_str()).collect();
            println!("[iteration {}] {}", iteration_id, titles.join(" | "));
        }
        EngineEvent::AgentUpdate {
            agent_id,
            status,
            error,
            duration_ms,
            ..
        } => match (error, duration_ms) {
            (Some(error), _) => println!("  {} {:?}: {}", agent_id, status, error),
            (None, Some(ms)) => println!("  {} {:?} ({} ms)", agent_id, status, ms),
            (None, None) => println!("  {} {:?}", agent_id, status),
        },
        EngineEvent::IterationComplete { iteration } => {
            let title = iteration
                .report
                .as_ref()
                .map(|r| r.title.as_str())
                .filter(|t| !t.is_empty())
                .unwrap_or("(no report)");
            println!(
                "[iteration {} done] {} | +{} discovered | {} ms",
                iteration.id, title, iteration.discovered, iteration.duration_ms
            );
        }
        EngineEvent::VerificationComplete {
            iteration_id,
            record,
        } => {
            println!("[verification {}] health {:?}", iteration_id, record.health);
            if let Some(quality) = &record.loop_quality {
                for alert in &quality.alerts {
                    println!("  {:?}: {}", alert.severity, alert.message);
                }
            }
        }
        EngineEvent::QueueChange { queue } => println!("[queue] {} waiting", queue.length),
        EngineEvent::Cooldown { remaining_ms } if *remaining_ms > 0 => {
            println!("[cooldown] {} ms", remaining_ms)
        }
        EngineEvent::Cooldown { .. } => {}
        EngineEvent::CheckpointTriggered { checkpoint } => {
            println!(
                "[checkpoint after iteration {}] {:?}, health {:?}, {} queued",
                checkpoint.iteration_id, checkpoint.reason, checkpoint.health, checkpoint.queue_len
            );
            for finding in &checkpoint.top_findings {
                println!("  * {:?}: {}", finding.kind, finding.title);
            }
        }
        EngineEvent::VerificationStatsUpdate { stats } => {
            if let Some(trust) = stats.average_trust_score {
                println!("[verification stats] mean trust {:.1}", trust);
            }
        }
    }
}
