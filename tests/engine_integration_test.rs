//! 自治循环集成测试（Mock LLM，无需 API）

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;

use hive::agents::replicate;
use hive::document::Document;
use hive::engine::{
    CheckpointAction, CheckpointReason, CheckpointResolution, Engine, EngineConfig, EngineError,
    EngineEvent, EngineState,
};
use hive::llm::{LlmClient, LlmError, MockLlmClient};
use hive::pipeline::AgentStatus;
use hive::sources::StaticSource;
use hive::verification::{HealthStatus, VerificationSettings};

fn report(suggested: &[&str]) -> String {
    json!({
        "title": "Soil microbes and drought",
        "summary": "Microbial diversity buffers drought stress.",
        "keyFindings": ["Diversity correlates with yield"],
        "fields": ["Ecology", "Agronomy"],
        "gaps": [{"title": "No long-term trials", "description": "Only one season", "severity": "high"}],
        "hypotheses": [{"statement": "Inoculation raises drought tolerance", "rationale": "r", "novelty": "significant"}],
        "experiments": [{"title": "Field trial", "method": "randomised plots", "expectedOutcome": "higher yield"}],
        "directions": [{"title": "Root exudates", "description": "d", "potential": "high"}],
        "crossFieldConnections": [{"fields": ["ecology", "agronomy"], "insight": "i", "suggestedReading": suggested}],
        "quickWins": []
    })
    .to_string()
}

fn team(suggested: &[&str]) -> MockLlmClient {
    MockLlmClient::new()
        .respond("You are the Reader", r#"{"claims": ["c1"], "methods": ["m1"]}"#)
        .respond("You are the Methodologist", r#"{"rigor": "moderate"}"#)
        .respond("You are the Critic", r#"{"weaknesses": ["small sample"]}"#)
        .respond("You are the Experimenter", r#"{"experiments": []}"#)
        .respond("You are the Scribe", report(suggested))
        .respond(
            "Hypothesis Verifier",
            r#"{"verdicts": [{"hypothesis": "Inoculation raises drought tolerance", "novelty": "novel", "evidence": "moderate", "feasibility": "high", "confidence": 80}]}"#,
        )
        .respond(
            "Source Verifier",
            r#"{"trustScore": 85, "hallucinationFlags": [], "fieldAlignment": 90, "gapRelevance": 70}"#,
        )
}

fn config() -> EngineConfig {
    EngineConfig {
        batch_size: 1,
        cooldown: Duration::ZERO,
        checkpoint_interval: 0,
        agent_timeout: Some(Duration::from_secs(5)),
        ..EngineConfig::default()
    }
}

fn seeds(n: usize) -> Vec<Document> {
    (1..=n)
        .map(|i| {
            Document::new(format!("Seed {}", i), format!("Abstract of seed {}", i))
                .with_fields(["Ecology"])
        })
        .collect()
}

fn engine(config: EngineConfig, llm: MockLlmClient) -> (Engine, UnboundedReceiver<EngineEvent>) {
    let llm: Arc<dyn LlmClient> = Arc::new(llm);
    Engine::new(config, replicate::pipeline().unwrap(), llm)
}

/// 读取事件直到 pred 命中
async fn wait_for(
    rx: &mut UnboundedReceiver<EngineEvent>,
    pred: impl Fn(&EngineEvent) -> bool,
) -> EngineEvent {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let event = rx.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

async fn wait_for_state(rx: &mut UnboundedReceiver<EngineEvent>, target: EngineState) {
    wait_for(rx, |e| matches!(e, EngineEvent::StatusChange { state } if *state == target)).await;
}

#[tokio::test]
async fn test_replicate_run_to_completion() {
    let (engine, mut rx) = engine(config(), team(&[]));
    let handle = engine.start(seeds(2), "drought resilience").unwrap();
    wait_for_state(&mut rx, EngineState::Idle).await;
    handle.await.unwrap();

    let history = engine.history();
    assert_eq!(history.iter().map(|i| i.id).collect::<Vec<_>>(), vec![1, 2]);
    for iteration in &history {
        assert_eq!(iteration.documents.len(), 1);
        assert_eq!(iteration.agents.len(), 5);
        assert!(iteration.agents.values().all(|a| a.status == AgentStatus::Complete));
        assert_eq!(iteration.guidance, "drought resilience");
        let report = iteration.report.as_ref().unwrap();
        assert_eq!(report.title, "Soil microbes and drought");
        let sources = iteration.verification.sources.as_ref().unwrap();
        assert_eq!(sources.trust_score, 85);
        let hypotheses = iteration.verification.hypotheses.as_ref().unwrap();
        assert_eq!(hypotheses.overall_novelty_score, 100);
    }

    let stats = engine.accumulated_stats();
    assert_eq!(stats.iterations, 2);
    assert_eq!(stats.documents_processed, 2);
    assert_eq!(stats.total_gaps, 2);
    assert_eq!(stats.total_hypotheses, 2);
    assert_eq!(stats.agent_failures, 0);
    assert!(stats.fields.contains("agronomy"));

    let verification = engine.verification_stats();
    assert_eq!(verification.iterations_verified, 2);
    assert_eq!(verification.average_trust_score, Some(85.0));
    assert!(engine.queue().length == 0);
}

#[tokio::test]
async fn test_checkpoint_then_continue() {
    let mut cfg = config();
    cfg.checkpoint_interval = 2;
    let (engine, mut rx) = engine(cfg, team(&[]));
    let handle = engine.start(seeds(3), "").unwrap();

    let event = wait_for(&mut rx, |e| matches!(e, EngineEvent::CheckpointTriggered { .. })).await;
    let EngineEvent::CheckpointTriggered { checkpoint } = event else {
        unreachable!()
    };
    assert_eq!(checkpoint.iteration_id, 2);
    assert_eq!(checkpoint.reason, CheckpointReason::Interval);
    assert_eq!(checkpoint.queue_len, 1);
    assert_eq!(engine.state(), EngineState::Checkpoint);
    assert_eq!(engine.history().len(), 2);
    assert!(engine.pending_checkpoint().is_some());

    engine
        .resolve_checkpoint(CheckpointResolution::Continue {
            feedback: Some("looks good".into()),
        })
        .unwrap();
    wait_for_state(&mut rx, EngineState::Idle).await;
    handle.await.unwrap();

    assert_eq!(engine.history().len(), 3);
    assert!(engine.pending_checkpoint().is_none());
    let export = engine.export_full_run();
    assert_eq!(export.feedback.len(), 1);
    assert_eq!(export.feedback[0].iteration_id, 2);
    assert_eq!(export.feedback[0].action, CheckpointAction::Continue);
    assert_eq!(export.feedback[0].feedback.as_deref(), Some("looks good"));
}

#[tokio::test]
async fn test_checkpoint_resolves_only_once() {
    let mut cfg = config();
    cfg.checkpoint_interval = 2;
    let (engine, mut rx) = engine(cfg, team(&[]));
    let handle = engine.start(seeds(3), "").unwrap();

    wait_for(&mut rx, |e| matches!(e, EngineEvent::CheckpointTriggered { .. })).await;
    engine
        .resolve_checkpoint(CheckpointResolution::Continue { feedback: None })
        .unwrap();
    assert_eq!(
        engine.resolve_checkpoint(CheckpointResolution::Continue {
            feedback: Some("again".into()),
        }),
        Err(EngineError::NoPendingCheckpoint)
    );
    assert_eq!(
        engine.resolve_checkpoint(CheckpointResolution::Redirect {
            feedback: None,
            guidance: "elsewhere".into(),
        }),
        Err(EngineError::NoPendingCheckpoint)
    );
    assert_eq!(engine.export_full_run().feedback.len(), 1);

    wait_for_state(&mut rx, EngineState::Idle).await;
    handle.await.unwrap();
    let export = engine.export_full_run();
    assert_eq!(export.feedback.len(), 1);
    assert_eq!(export.feedback[0].feedback, None);
    assert_eq!(export.guidance_history.len(), 1);
    assert_eq!(engine.history().len(), 3);
}

#[tokio::test]
async fn test_redirect_changes_guidance_of_later_iterations() {
    let mut cfg = config();
    cfg.checkpoint_interval = 1;
    let (engine, mut rx) = engine(cfg, team(&[]));
    let handle = engine.start(seeds(3), "initial").unwrap();

    wait_for(&mut rx, |e| matches!(e, EngineEvent::CheckpointTriggered { .. })).await;
    assert!(matches!(
        engine.resolve_checkpoint(CheckpointResolution::Redirect {
            feedback: None,
            guidance: "  ".into(),
        }),
        Err(EngineError::EmptyGuidance)
    ));
    engine
        .resolve_checkpoint(CheckpointResolution::Redirect {
            feedback: None,
            guidance: "focus on root exudates".into(),
        })
        .unwrap();

    wait_for(&mut rx, |e| matches!(e, EngineEvent::CheckpointTriggered { .. })).await;
    engine.resolve_checkpoint(CheckpointResolution::Stop).unwrap();
    assert_eq!(engine.state(), EngineState::Stopped);
    handle.await.unwrap();

    let history = engine.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].guidance, "initial");
    assert_eq!(history[1].guidance, "focus on root exudates");
    assert_eq!(engine.guidance(), "focus on root exudates");

    let export = engine.export_full_run();
    let guidance: Vec<_> = export
        .guidance_history
        .iter()
        .map(|g| (g.iteration_id, g.guidance.as_str()))
        .collect();
    assert_eq!(guidance, vec![(0, "initial"), (1, "focus on root exudates")]);
    assert_eq!(export.feedback.len(), 2);
    assert_eq!(export.feedback[1].action, CheckpointAction::Stop);
    assert_eq!(engine.queue().length, 0);
}

#[tokio::test]
async fn test_stop_keeps_in_flight_iteration() {
    let llm = team(&[]).with_delay(Duration::from_millis(20));
    let (engine, mut rx) = engine(config(), llm);
    let handle = engine.start(seeds(4), "").unwrap();

    wait_for(&mut rx, |e| matches!(e, EngineEvent::IterationStart { .. })).await;
    engine.stop().unwrap();
    // 队列立即清空，进行中的迭代继续完成
    assert_eq!(engine.queue().length, 0);
    wait_for_state(&mut rx, EngineState::Stopped).await;
    handle.await.unwrap();

    let history = engine.history();
    assert_eq!(history.len(), 1);
    assert!(history[0].report.is_some());
    assert_eq!(engine.accumulated_stats().iterations, 1);
    assert!(matches!(
        engine.stop(),
        Err(EngineError::InvalidState {
            state: EngineState::Stopped,
            ..
        })
    ));

    // 停止后可以重新开始，上一轮结果被清空
    let handle = engine.start(seeds(1), "").unwrap();
    wait_for_state(&mut rx, EngineState::Idle).await;
    handle.await.unwrap();
    assert_eq!(engine.history().len(), 1);
    assert_eq!(engine.history()[0].id, 1);
}

#[tokio::test]
async fn test_pause_and_resume() {
    let llm = team(&[]).with_delay(Duration::from_millis(10));
    let (engine, mut rx) = engine(config(), llm);
    let handle = engine.start(seeds(3), "").unwrap();

    wait_for(&mut rx, |e| matches!(e, EngineEvent::IterationStart { .. })).await;
    engine.pause().unwrap();
    wait_for_state(&mut rx, EngineState::Paused).await;
    let paused_at = engine.history().len();
    assert_eq!(paused_at, 1);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(engine.history().len(), paused_at);

    engine.resume().unwrap();
    wait_for_state(&mut rx, EngineState::Idle).await;
    handle.await.unwrap();
    assert_eq!(engine.history().len(), 3);
}

#[tokio::test]
async fn test_discovered_documents_are_enqueued_once() {
    let catalogue = StaticSource::new(vec![Document::new(
        "New Paper",
        "Full abstract from the catalogue",
    )
    .with_fields(["Microbiology"])]);
    let (engine, mut rx) = engine(config(), team(&["Seed 1", "New Paper"]));
    let engine = engine.with_source(Arc::new(catalogue));
    let handle = engine.start(seeds(1), "").unwrap();
    wait_for_state(&mut rx, EngineState::Idle).await;
    handle.await.unwrap();

    let history = engine.history();
    assert_eq!(history.len(), 2);
    // 已处理的种子不会再次入队
    assert_eq!(history[0].discovered, 1);
    assert_eq!(history[1].discovered, 0);
    assert_eq!(history[1].documents[0].title, "New Paper");
    assert_eq!(history[1].documents[0].body, "Full abstract from the catalogue");
    assert_eq!(engine.accumulated_stats().total_discovered, 1);
}

#[tokio::test]
async fn test_failed_agent_does_not_abort_iteration() {
    let llm = team(&[]).fail("You are the Critic", LlmError::Network("connection reset".into()));
    let (engine, mut rx) = engine(config(), llm);
    let handle = engine.start(seeds(1), "").unwrap();

    let update = wait_for(&mut rx, |e| {
        matches!(e, EngineEvent::AgentUpdate { status: AgentStatus::Error, .. })
    })
    .await;
    let EngineEvent::AgentUpdate { agent_id, error, .. } = update else {
        unreachable!()
    };
    assert_eq!(agent_id, "critic");
    assert!(error.unwrap().contains("connection reset"));

    wait_for_state(&mut rx, EngineState::Idle).await;
    handle.await.unwrap();

    let iteration = &engine.history()[0];
    assert_eq!(iteration.agents["critic"].status, AgentStatus::Error);
    assert_eq!(iteration.agents["experimenter"].status, AgentStatus::Complete);
    assert!(iteration.report.is_some());
    assert_eq!(engine.accumulated_stats().agent_failures, 1);
}

#[tokio::test]
async fn test_critical_health_triggers_checkpoint() {
    let llm = MockLlmClient::new()
        .respond(
            "Source Verifier",
            r#"{"trustScore": 20, "hallucinationFlags": [{"claim": "x", "reason": "not in sources", "severity": "critical"}]}"#,
        )
        .respond("You are the Scribe", report(&[]));
    let (engine, mut rx) = engine(config(), llm);
    let engine = engine.with_verification_settings(VerificationSettings {
        pause_on_critical: true,
        ..VerificationSettings::default()
    });
    let handle = engine.start(seeds(2), "").unwrap();

    let event = wait_for(&mut rx, |e| matches!(e, EngineEvent::CheckpointTriggered { .. })).await;
    let EngineEvent::CheckpointTriggered { checkpoint } = event else {
        unreachable!()
    };
    assert_eq!(checkpoint.iteration_id, 1);
    assert_eq!(checkpoint.reason, CheckpointReason::CriticalHealth);
    assert_eq!(checkpoint.health, HealthStatus::Critical);

    engine.stop().unwrap();
    handle.await.unwrap();
    assert_eq!(engine.state(), EngineState::Stopped);
    assert_eq!(engine.verification_stats().critical, 1);
}

#[tokio::test]
async fn test_invalid_operations() {
    let (engine, mut rx) = engine(config(), team(&[]).with_delay(Duration::from_millis(20)));

    assert!(matches!(
        engine.pause(),
        Err(EngineError::InvalidState { state: EngineState::Idle, .. })
    ));
    assert!(matches!(engine.resume(), Err(EngineError::InvalidState { .. })));
    assert!(matches!(engine.stop(), Err(EngineError::InvalidState { .. })));
    assert!(matches!(
        engine.resolve_checkpoint(CheckpointResolution::Continue { feedback: None }),
        Err(EngineError::NoPendingCheckpoint)
    ));
    assert!(matches!(engine.start(Vec::new(), ""), Err(EngineError::NoSeeds)));

    let handle = engine.start(seeds(2), "").unwrap();
    assert!(matches!(
        engine.start(seeds(1), ""),
        Err(EngineError::InvalidState { operation: "start", .. })
    ));
    assert!(matches!(
        engine.resume(),
        Err(EngineError::InvalidState { state: EngineState::Running, .. })
    ));
    assert!(engine
        .set_verification_settings(VerificationSettings::default())
        .is_err());
    assert!(engine.set_checkpoint_interval(1).is_err());

    wait_for_state(&mut rx, EngineState::Idle).await;
    handle.await.unwrap();
    engine.set_checkpoint_interval(4).unwrap();
    assert_eq!(engine.export_full_run().metadata.checkpoint_interval, 4);
}

#[tokio::test]
async fn test_export_is_repeatable() {
    let (engine, mut rx) = engine(config(), team(&[]));
    let handle = engine.start(seeds(2), "g").unwrap();
    wait_for_state(&mut rx, EngineState::Idle).await;
    handle.await.unwrap();

    let first = engine.export_full_run().to_json().unwrap();
    let second = engine.export_full_run().to_json().unwrap();
    assert_eq!(first, second);

    let value: serde_json::Value = serde_json::from_str(&first).unwrap();
    assert_eq!(value["metadata"]["pipeline"], "replicate");
    assert_eq!(value["metadata"]["reportAgent"], "scribe");
    assert_eq!(value["metadata"]["state"], "idle");
    assert_eq!(value["iterations"].as_array().unwrap().len(), 2);
    assert_eq!(value["stats"]["iterations"], 2);
}

#[tokio::test]
async fn test_max_iterations_limit() {
    let mut cfg = config();
    cfg.max_iterations = Some(2);
    let (engine, mut rx) = engine(cfg, team(&[]));
    let handle = engine.start(seeds(5), "").unwrap();
    wait_for_state(&mut rx, EngineState::Idle).await;
    handle.await.unwrap();
    assert_eq!(engine.history().len(), 2);
    assert_eq!(engine.queue().length, 3);
}
