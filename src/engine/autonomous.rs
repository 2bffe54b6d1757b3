//! 自治研究引擎
//!
//! 状态机：idle → running ⇄ paused，running → checkpoint → running | stopped，任意活跃状态 → stopped。
//! 每次 start 启动一个循环任务，循环：取批 → 流水线 → 发现新文献 → 校验 → 写入历史 → 检查点 / 冷却。
//!
//! 控制操作（pause / resume / stop / resolve_checkpoint）同步修改运行状态并唤醒循环：
//! - pause 在两轮迭代之间生效（冷却中立即生效），不会打断进行中的迭代
//! - stop 不中断进行中的外部调用；该轮迭代完成并写入历史后进入 stopped，队列被丢弃
//! - 每次运行持有自己的 CancellationToken，被停止的旧循环醒来后直接退出，不再修改任何状态

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures_util::future;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::document::{normalize_key, Document};
use crate::engine::discovery::{enrich, DiscoveryStrategy, SuggestedReading};
use crate::engine::queue::{Enqueued, QueueSnapshot, WorkQueue};
use crate::engine::stats::AccumulatedStats;
use crate::engine::types::{
    AgentRecord, Checkpoint, CheckpointReason, CheckpointResolution, EngineConfig, EngineError,
    EngineEvent, EngineState, FeedbackEntry, GuidanceEntry, Iteration, RunExport, RunMetadata,
};
use crate::llm::LlmClient;
use crate::pipeline::{
    AgentStatus, ExecutionMode, Pipeline, PipelineExecutor, PipelineInput, PipelineObserver,
    PipelineResult,
};
use crate::report::ResearchReport;
use crate::sources::DocumentSource;
use crate::verification::{
    HealthStatus, VerificationContext, VerificationPass, VerificationRecord, VerificationSettings,
    VerificationStats,
};

const MAX_BATCH: usize = 5;
const CHECKPOINT_TOP_FINDINGS: usize = 5;

/// 一次运行的全部可变状态（受互斥锁保护，任何 await 期间都不持有锁）
struct RunData {
    state: EngineState,
    run_id: String,
    started_at: Option<i64>,
    queue: WorkQueue,
    processed: HashSet<String>,
    history: Vec<Iteration>,
    stats: AccumulatedStats,
    verification_stats: VerificationStats,
    guidance: String,
    guidance_history: Vec<GuidanceEntry>,
    feedback: Vec<FeedbackEntry>,
    checkpoint: Option<Checkpoint>,
    settings: VerificationSettings,
    checkpoint_interval: u32,
    pause_requested: bool,
    stop_requested: bool,
    in_flight: bool,
    cancel: CancellationToken,
    source: Option<Arc<dyn DocumentSource>>,
    discovery: Arc<dyn DiscoveryStrategy>,
}

impl RunData {
    /// 保留设置与扩展，清空上一次运行的结果
    fn reset(&mut self, config: &EngineConfig) {
        self.run_id = uuid::Uuid::new_v4().to_string();
        self.started_at = Some(chrono::Utc::now().timestamp_millis());
        self.queue = WorkQueue::new(config.max_queue);
        self.processed.clear();
        self.history.clear();
        self.stats = AccumulatedStats::with_limit(config.breakthrough_limit);
        self.verification_stats = VerificationStats::default();
        self.guidance_history.clear();
        self.feedback.clear();
        self.checkpoint = None;
        self.pause_requested = false;
        self.stop_requested = false;
        self.in_flight = false;
    }
}

struct EngineInner {
    config: EngineConfig,
    pipeline: Pipeline,
    executor: PipelineExecutor,
    verifier: VerificationPass,
    data: Mutex<RunData>,
    wake: Notify,
    events: mpsc::UnboundedSender<EngineEvent>,
}

/// 引擎句柄（可廉价克隆，所有克隆共享同一运行状态）
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

/// 一轮迭代开始时从运行状态中取出的快照
struct IterationStep {
    id: u32,
    batch: Vec<Document>,
    guidance: String,
    settings: VerificationSettings,
}

/// 迭代写入历史后的下一步
enum Next {
    Cooldown,
    Gate,
    Done,
}

/// 把流水线进度转成 AgentUpdate 事件
struct EventObserver {
    iteration_id: u32,
    events: mpsc::UnboundedSender<EngineEvent>,
}

impl PipelineObserver for EventObserver {
    fn on_agent_start(&self, agent: &str) {
        let _ = self.events.send(EngineEvent::AgentUpdate {
            iteration_id: self.iteration_id,
            agent_id: agent.to_string(),
            status: AgentStatus::Working,
            output: None,
            error: None,
            duration_ms: None,
        });
    }

    fn on_agent_complete(&self, agent: &str, output: &serde_json::Value, elapsed: Duration) {
        let _ = self.events.send(EngineEvent::AgentUpdate {
            iteration_id: self.iteration_id,
            agent_id: agent.to_string(),
            status: AgentStatus::Complete,
            output: Some(output.clone()),
            error: None,
            duration_ms: Some(elapsed.as_millis() as u64),
        });
    }

    fn on_agent_error(&self, agent: &str, error: &str, elapsed: Duration) {
        let _ = self.events.send(EngineEvent::AgentUpdate {
            iteration_id: self.iteration_id,
            agent_id: agent.to_string(),
            status: AgentStatus::Error,
            output: None,
            error: Some(error.to_string()),
            duration_ms: Some(elapsed.as_millis() as u64),
        });
    }
}

impl Engine {
    /// 创建引擎，返回句柄与事件接收端
    pub fn new(
        config: EngineConfig,
        pipeline: Pipeline,
        llm: Arc<dyn LlmClient>,
    ) -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let executor = PipelineExecutor::new(llm.clone())
            .with_agent_timeout(config.agent_timeout)
            .with_mode(ExecutionMode::from_concurrency(config.max_concurrency));
        let verifier = VerificationPass::new(llm).with_agent_timeout(config.agent_timeout);
        let data = RunData {
            state: EngineState::Idle,
            run_id: String::new(),
            started_at: None,
            queue: WorkQueue::new(config.max_queue),
            processed: HashSet::new(),
            history: Vec::new(),
            stats: AccumulatedStats::with_limit(config.breakthrough_limit),
            verification_stats: VerificationStats::default(),
            guidance: String::new(),
            guidance_history: Vec::new(),
            feedback: Vec::new(),
            checkpoint: None,
            settings: VerificationSettings::default(),
            checkpoint_interval: config.checkpoint_interval,
            pause_requested: false,
            stop_requested: false,
            in_flight: false,
            cancel: CancellationToken::new(),
            source: None,
            discovery: Arc::new(SuggestedReading),
        };
        let engine = Self {
            inner: Arc::new(EngineInner {
                config,
                pipeline,
                executor,
                verifier,
                data: Mutex::new(data),
                wake: Notify::new(),
                events,
            }),
        };
        (engine, rx)
    }

    /// 设置文献源（用于补全发现的文献）
    pub fn with_source(self, source: Arc<dyn DocumentSource>) -> Self {
        self.lock().source = Some(source);
        self
    }

    /// 替换发现策略
    pub fn with_discovery(self, discovery: Arc<dyn DiscoveryStrategy>) -> Self {
        self.lock().discovery = discovery;
        self
    }

    pub fn with_verification_settings(self, settings: VerificationSettings) -> Self {
        self.lock().settings = settings;
        self
    }

    fn lock(&self) -> MutexGuard<'_, RunData> {
        self.inner.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: EngineEvent) {
        let _ = self.inner.events.send(event);
    }

    fn set_state(&self, data: &mut RunData, state: EngineState) {
        if data.state == state {
            return;
        }
        tracing::info!(from = %data.state, to = %state, "Engine state change");
        data.state = state;
        self.emit(EngineEvent::StatusChange { state });
    }

    fn batch_size(&self) -> usize {
        self.inner.config.batch_size.clamp(1, MAX_BATCH)
    }

    // ---- 控制操作 ----

    /// 用种子文献开始一次新的运行（只能在 idle / stopped 时调用）
    pub fn start(
        &self,
        seeds: Vec<Document>,
        guidance: impl Into<String>,
    ) -> Result<JoinHandle<()>, EngineError> {
        let token = {
            let mut data = self.lock();
            if !data.state.accepts_start() || data.in_flight {
                return Err(EngineError::InvalidState {
                    operation: "start",
                    state: data.state,
                });
            }
            if seeds.is_empty() {
                return Err(EngineError::NoSeeds);
            }

            data.reset(&self.inner.config);
            for doc in seeds {
                match data.queue.enqueue(doc) {
                    Enqueued::Added => {}
                    other => tracing::debug!(result = ?other, "Seed not enqueued"),
                }
            }
            if data.queue.is_empty() {
                return Err(EngineError::NoSeeds);
            }

            let guidance = guidance.into();
            data.guidance = guidance.clone();
            data.guidance_history.push(GuidanceEntry {
                iteration_id: 0,
                guidance,
            });

            let token = CancellationToken::new();
            data.cancel = token.clone();
            tracing::info!(
                run_id = %data.run_id,
                pipeline = self.inner.pipeline.name(),
                seeds = data.queue.len(),
                "Engine run started"
            );
            self.set_state(&mut data, EngineState::Running);
            self.emit(EngineEvent::QueueChange {
                queue: data.queue.snapshot(),
            });
            token
        };

        let engine = self.clone();
        Ok(tokio::spawn(async move { engine.run_loop(token).await }))
    }

    /// 请求暂停：在当前迭代结束后生效
    pub fn pause(&self) -> Result<(), EngineError> {
        {
            let mut data = self.lock();
            if data.state != EngineState::Running || data.stop_requested {
                return Err(EngineError::InvalidState {
                    operation: "pause",
                    state: data.state,
                });
            }
            data.pause_requested = true;
        }
        self.inner.wake.notify_waiters();
        Ok(())
    }

    /// 从暂停恢复，或撤销尚未生效的暂停请求
    pub fn resume(&self) -> Result<(), EngineError> {
        {
            let mut data = self.lock();
            let state = data.state;
            match state {
                EngineState::Paused => self.set_state(&mut data, EngineState::Running),
                EngineState::Running if data.pause_requested => data.pause_requested = false,
                state => {
                    return Err(EngineError::InvalidState {
                        operation: "resume",
                        state,
                    })
                }
            }
        }
        self.inner.wake.notify_waiters();
        Ok(())
    }

    /// 停止运行并丢弃队列；进行中的迭代会先完成并写入历史
    pub fn stop(&self) -> Result<(), EngineError> {
        {
            let mut data = self.lock();
            match data.state {
                EngineState::Running | EngineState::Paused | EngineState::Checkpoint => {}
                state => {
                    return Err(EngineError::InvalidState {
                        operation: "stop",
                        state,
                    })
                }
            }
            data.queue.clear();
            data.checkpoint = None;
            data.pause_requested = false;
            if data.in_flight {
                data.stop_requested = true;
                tracing::info!("Stop requested; waiting for the in-flight iteration");
            } else {
                self.set_state(&mut data, EngineState::Stopped);
            }
            data.cancel.cancel();
            self.emit(EngineEvent::QueueChange {
                queue: data.queue.snapshot(),
            });
        }
        self.inner.wake.notify_waiters();
        Ok(())
    }

    /// 处理检查点决策
    pub fn resolve_checkpoint(&self, resolution: CheckpointResolution) -> Result<(), EngineError> {
        {
            let mut data = self.lock();
            if data.state != EngineState::Checkpoint {
                return Err(EngineError::NoPendingCheckpoint);
            }
            if let CheckpointResolution::Redirect { guidance, .. } = &resolution {
                if guidance.trim().is_empty() {
                    return Err(EngineError::EmptyGuidance);
                }
            }
            let Some(checkpoint) = data.checkpoint.take() else {
                return Err(EngineError::NoPendingCheckpoint);
            };
            let action = resolution.action();
            tracing::info!(iteration = checkpoint.iteration_id, action = ?action, "Checkpoint resolved");

            match resolution {
                CheckpointResolution::Continue { feedback } => {
                    data.feedback.push(FeedbackEntry {
                        iteration_id: checkpoint.iteration_id,
                        action,
                        feedback,
                    });
                    self.set_state(&mut data, EngineState::Running);
                }
                CheckpointResolution::Redirect { feedback, guidance } => {
                    data.feedback.push(FeedbackEntry {
                        iteration_id: checkpoint.iteration_id,
                        action,
                        feedback,
                    });
                    data.guidance = guidance.clone();
                    data.guidance_history.push(GuidanceEntry {
                        iteration_id: checkpoint.iteration_id,
                        guidance,
                    });
                    self.set_state(&mut data, EngineState::Running);
                }
                CheckpointResolution::Stop => {
                    data.feedback.push(FeedbackEntry {
                        iteration_id: checkpoint.iteration_id,
                        action,
                        feedback: None,
                    });
                    data.queue.clear();
                    data.cancel.cancel();
                    self.set_state(&mut data, EngineState::Stopped);
                    self.emit(EngineEvent::QueueChange {
                        queue: data.queue.snapshot(),
                    });
                }
            }
        }
        self.inner.wake.notify_waiters();
        Ok(())
    }

    /// 修改校验开关（仅在未运行时）
    pub fn set_verification_settings(&self, settings: VerificationSettings) -> Result<(), EngineError> {
        let mut data = self.lock();
        if !data.state.accepts_start() || data.in_flight {
            return Err(EngineError::InvalidState {
                operation: "change verification settings",
                state: data.state,
            });
        }
        data.settings = settings;
        Ok(())
    }

    /// 修改检查点间隔（0 关闭；仅在未运行时）
    pub fn set_checkpoint_interval(&self, interval: u32) -> Result<(), EngineError> {
        let mut data = self.lock();
        if !data.state.accepts_start() || data.in_flight {
            return Err(EngineError::InvalidState {
                operation: "change checkpoint interval",
                state: data.state,
            });
        }
        data.checkpoint_interval = interval;
        Ok(())
    }

    // ---- 查询 ----

    pub fn state(&self) -> EngineState {
        self.lock().state
    }

    pub fn accumulated_stats(&self) -> AccumulatedStats {
        self.lock().stats.clone()
    }

    pub fn verification_stats(&self) -> VerificationStats {
        self.lock().verification_stats.clone()
    }

    pub fn verification_settings(&self) -> VerificationSettings {
        self.lock().settings
    }

    pub fn history(&self) -> Vec<Iteration> {
        self.lock().history.clone()
    }

    pub fn queue(&self) -> QueueSnapshot {
        self.lock().queue.snapshot()
    }

    pub fn pending_checkpoint(&self) -> Option<Checkpoint> {
        self.lock().checkpoint.clone()
    }

    pub fn guidance(&self) -> String {
        self.lock().guidance.clone()
    }

    /// 完整运行导出（不含任何导出时刻信息，重复调用结果一致）
    pub fn export_full_run(&self) -> RunExport {
        let data = self.lock();
        RunExport {
            metadata: RunMetadata {
                run_id: data.run_id.clone(),
                pipeline: self.inner.pipeline.name().to_string(),
                report_agent: self.inner.pipeline.report_agent().to_string(),
                state: data.state,
                started_at: data.started_at,
                batch_size: self.batch_size(),
                checkpoint_interval: data.checkpoint_interval,
                cooldown_ms: self.inner.config.cooldown.as_millis() as u64,
            },
            iterations: data.history.clone(),
            stats: data.stats.clone(),
            guidance_history: data.guidance_history.clone(),
            verification_settings: data.settings,
            verification_stats: data.verification_stats.clone(),
            feedback: data.feedback.clone(),
        }
    }

    // ---- 循环 ----

    async fn run_loop(self, token: CancellationToken) {
        loop {
            if !self.wait_until_runnable(&token).await {
                break;
            }
            let Some(step) = self.begin_iteration(&token) else {
                break;
            };
            let iteration = self.execute(step).await;
            match self.finish_iteration(iteration) {
                Next::Cooldown => {
                    if !self.cooldown(&token).await {
                        break;
                    }
                }
                Next::Gate => {}
                Next::Done => break,
            }
        }
        tracing::debug!("Engine loop exited");
    }

    /// 等待进入可执行状态；返回 false 表示本次运行已结束
    async fn wait_until_runnable(&self, token: &CancellationToken) -> bool {
        loop {
            let notified = self.inner.wake.notified();
            {
                let mut data = self.lock();
                if token.is_cancelled() {
                    return false;
                }
                let state = data.state;
                match state {
                    EngineState::Running if data.pause_requested => {
                        data.pause_requested = false;
                        self.set_state(&mut data, EngineState::Paused);
                    }
                    EngineState::Running => return true,
                    EngineState::Paused | EngineState::Checkpoint => {}
                    EngineState::Idle | EngineState::Stopped => return false,
                }
            }
            tokio::select! {
                _ = notified => {}
                _ = token.cancelled() => return false,
            }
        }
    }

    fn begin_iteration(&self, token: &CancellationToken) -> Option<IterationStep> {
        let mut data = self.lock();
        if token.is_cancelled() || data.state != EngineState::Running {
            return None;
        }
        if let Some(max) = self.inner.config.max_iterations {
            if data.history.len() as u32 >= max {
                self.set_state(&mut data, EngineState::Idle);
                return None;
            }
        }

        let batch = data.queue.pop_batch(self.batch_size());
        if batch.is_empty() {
            tracing::info!("Work queue exhausted");
            self.set_state(&mut data, EngineState::Idle);
            return None;
        }
        for doc in &batch {
            data.processed.insert(doc.key());
        }
        data.in_flight = true;

        let id = data.history.len() as u32 + 1;
        tracing::info!(
            iteration = id,
            documents = batch.len(),
            queued = data.queue.len(),
            "Iteration started"
        );
        self.emit(EngineEvent::IterationStart {
            iteration_id: id,
            documents: batch.clone(),
        });
        self.emit(EngineEvent::QueueChange {
            queue: data.queue.snapshot(),
        });

        Some(IterationStep {
            id,
            batch,
            guidance: data.guidance.clone(),
            settings: data.settings,
        })
    }

    /// 执行一轮迭代（期间不持有锁）
    async fn execute(&self, step: IterationStep) -> Iteration {
        let started = Instant::now();
        let started_at = chrono::Utc::now().timestamp_millis();
        let observer = EventObserver {
            iteration_id: step.id,
            events: self.inner.events.clone(),
        };
        let input = PipelineInput::new(step.batch, step.guidance);

        let result = self
            .inner
            .executor
            .run(&self.inner.pipeline, &input, &observer)
            .await;
        let report = parse_report(&result);
        let discovered = self.discover(report.as_ref()).await;

        let (history, queue_len, vocabulary) = {
            let data = self.lock();
            (
                data.history.clone(),
                data.queue.len(),
                field_vocabulary(&data.stats.fields, &input.documents),
            )
        };
        let ctx = VerificationContext {
            documents: &input.documents,
            guidance: &input.guidance,
            field_vocabulary: &vocabulary,
            history: &history,
            queue_len,
            batch_size: self.batch_size(),
        };
        let verification = if step.settings.any_enabled() {
            self.inner
                .verifier
                .verify(report.as_ref(), &ctx, &step.settings)
                .await
        } else {
            VerificationRecord::default()
        };
        self.emit(EngineEvent::VerificationComplete {
            iteration_id: step.id,
            record: verification.clone(),
        });

        let agents = result
            .outputs
            .iter()
            .map(|(id, output)| {
                (
                    id.clone(),
                    AgentRecord {
                        status: output.status(),
                        error: output.error().map(str::to_string),
                    },
                )
            })
            .collect();

        Iteration {
            id: step.id,
            documents: input.documents,
            report,
            agents,
            verification,
            duration_ms: started.elapsed().as_millis() as u64,
            discovered,
            guidance: input.guidance,
            started_at,
        }
    }

    /// 提取、补全并入队新文献；返回实际入队数
    async fn discover(&self, report: Option<&ResearchReport>) -> usize {
        let Some(report) = report else {
            return 0;
        };
        let (candidates, source) = {
            let data = self.lock();
            if data.stop_requested {
                return 0;
            }
            let candidates: Vec<_> = data
                .discovery
                .extract(report)
                .into_iter()
                .filter(|stub| {
                    let key = normalize_key(&stub.title);
                    !data.processed.contains(&key) && !data.queue.contains(&key)
                })
                .take(self.inner.config.max_discoveries_per_iteration)
                .collect();
            (candidates, data.source.clone())
        };
        if candidates.is_empty() {
            return 0;
        }

        let documents = future::join_all(
            candidates
                .into_iter()
                .map(|stub| enrich(stub, source.as_deref())),
        )
        .await;

        let mut data = self.lock();
        if data.stop_requested || !matches!(data.state, EngineState::Running) {
            return 0;
        }
        let mut added = 0;
        for doc in documents {
            if data.processed.contains(&doc.key()) {
                continue;
            }
            if data.queue.enqueue(doc) == Enqueued::Added {
                added += 1;
            }
        }
        if added > 0 {
            tracing::info!(added, queued = data.queue.len(), "Discovered documents enqueued");
            self.emit(EngineEvent::QueueChange {
                queue: data.queue.snapshot(),
            });
        }
        added
    }

    /// 写入历史、更新统计，并决定下一步
    fn finish_iteration(&self, iteration: Iteration) -> Next {
        let mut data = self.lock();
        data.in_flight = false;
        data.stats.record(&iteration);
        data.verification_stats.record(&iteration.verification);

        let id = iteration.id;
        let health = iteration.verification.health;
        tracing::info!(
            iteration = id,
            has_report = iteration.report.is_some(),
            health = ?health,
            discovered = iteration.discovered,
            duration_ms = iteration.duration_ms,
            "Iteration complete"
        );
        data.history.push(iteration.clone());
        self.emit(EngineEvent::IterationComplete {
            iteration: Box::new(iteration),
        });
        self.emit(EngineEvent::VerificationStatsUpdate {
            stats: data.verification_stats.clone(),
        });

        if data.stop_requested {
            data.stop_requested = false;
            data.queue.clear();
            self.set_state(&mut data, EngineState::Stopped);
            return Next::Done;
        }
        if let Some(max) = self.inner.config.max_iterations {
            if data.history.len() as u32 >= max {
                tracing::info!(max, "Iteration limit reached");
                self.set_state(&mut data, EngineState::Idle);
                return Next::Done;
            }
        }

        let reason = checkpoint_reason(id, data.checkpoint_interval, &data.settings, health);
        if let Some(reason) = reason {
            let checkpoint = Checkpoint {
                iteration_id: id,
                reason,
                health,
                queue_len: data.queue.len(),
                top_findings: data.stats.top(CHECKPOINT_TOP_FINDINGS).to_vec(),
                stats: data.stats.clone(),
            };
            data.checkpoint = Some(checkpoint.clone());
            data.pause_requested = false;
            self.set_state(&mut data, EngineState::Checkpoint);
            self.emit(EngineEvent::CheckpointTriggered {
                checkpoint: Box::new(checkpoint),
            });
            return Next::Gate;
        }

        if data.queue.is_empty() {
            tracing::info!("Work queue exhausted");
            self.set_state(&mut data, EngineState::Idle);
            return Next::Done;
        }
        Next::Cooldown
    }

    /// 冷却；暂停请求或状态变化会提前结束。返回 false 表示本次运行已结束
    async fn cooldown(&self, token: &CancellationToken) -> bool {
        let total = self.inner.config.cooldown;
        if total.is_zero() {
            return !token.is_cancelled();
        }
        let deadline = tokio::time::Instant::now() + total;
        let tick = if self.inner.config.cooldown_tick.is_zero() {
            total
        } else {
            self.inner.config.cooldown_tick
        };

        loop {
            let notified = self.inner.wake.notified();
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            {
                let data = self.lock();
                if token.is_cancelled() {
                    return false;
                }
                if data.pause_requested || data.state != EngineState::Running {
                    return true;
                }
            }
            self.emit(EngineEvent::Cooldown {
                remaining_ms: remaining.as_millis() as u64,
            });
            if remaining.is_zero() {
                return true;
            }
            tokio::select! {
                _ = tokio::time::sleep(remaining.min(tick)) => {}
                _ = notified => {}
                _ = token.cancelled() => return false,
            }
        }
    }
}

fn parse_report(result: &PipelineResult) -> Option<ResearchReport> {
    let value = result.report.as_ref()?;
    match serde_json::from_value::<ResearchReport>(value.clone()) {
        Ok(report) => Some(report),
        Err(e) => {
            tracing::warn!("Report output does not match the report schema: {}", e);
            None
        }
    }
}

/// 已知领域词表：累积领域 + 本批文献的领域
fn field_vocabulary(known: &BTreeSet<String>, documents: &[Document]) -> BTreeSet<String> {
    let mut vocabulary = known.clone();
    vocabulary.extend(
        documents
            .iter()
            .flat_map(|d| d.fields.iter())
            .map(|f| f.trim().to_lowercase())
            .filter(|f| !f.is_empty()),
    );
    vocabulary
}

/// 健康度为 critical 且开启了 pause_on_critical 时优先；其次是固定间隔
fn checkpoint_reason(
    iteration_id: u32,
    interval: u32,
    settings: &VerificationSettings,
    health: HealthStatus,
) -> Option<CheckpointReason> {
    if settings.pause_on_critical && health == HealthStatus::Critical {
        Some(CheckpointReason::CriticalHealth)
    } else if interval > 0 && iteration_id % interval == 0 {
        Some(CheckpointReason::Interval)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_reason() {
        let settings = VerificationSettings::default();
        assert_eq!(
            checkpoint_reason(3, 3, &settings, HealthStatus::Healthy),
            Some(CheckpointReason::Interval)
        );
        assert_eq!(checkpoint_reason(4, 3, &settings, HealthStatus::Critical), None);
        assert_eq!(checkpoint_reason(3, 0, &settings, HealthStatus::Healthy), None);

        let pausing = VerificationSettings {
            pause_on_critical: true,
            ..settings
        };
        assert_eq!(
            checkpoint_reason(4, 3, &pausing, HealthStatus::Critical),
            Some(CheckpointReason::CriticalHealth)
        );
    }

    #[test]
    fn test_field_vocabulary_merges_documents() {
        let known: BTreeSet<String> = ["biology".to_string()].into_iter().collect();
        let docs = vec![Document::new("x", "").with_fields(["Physics ", ""])];
        let vocabulary = field_vocabulary(&known, &docs);
        assert_eq!(
            vocabulary.into_iter().collect::<Vec<_>>(),
            vec!["biology", "physics"]
        );
    }
}
