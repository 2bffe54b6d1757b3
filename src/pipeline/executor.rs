//! 流水线执行器
//!
//! 按拓扑顺序逐个执行 Agent（默认严格串行），把文献与已声明依赖的输出交给每个 Agent。
//! 单个 Agent 失败（网络、超时、解析）只记录失败标记并通知观察者，随后继续执行后续 Agent。

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{stream, StreamExt};
use serde_json::Value;

use crate::document::Document;
use crate::llm::{GenerateRequest, LlmClient};
use crate::pipeline::builder::Pipeline;
use crate::pipeline::descriptor::{AgentDescriptor, AgentKind, ExternalCall};
use crate::pipeline::types::{AgentContext, AgentId, AgentOutput, AgentStatus};

/// 执行进度回调（全部有默认空实现）
pub trait PipelineObserver: Send + Sync {
    fn on_agent_start(&self, _agent: &str) {}
    fn on_agent_complete(&self, _agent: &str, _output: &Value, _elapsed: Duration) {}
    fn on_agent_error(&self, _agent: &str, _error: &str, _elapsed: Duration) {}
}

/// 不关心进度时使用
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// 调度方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// 严格串行，同一时刻只有一个 Agent 在执行
    Sequential,
    /// 同一依赖层内最多 max_concurrency 个 Agent 并发；整层结束后才写入输出
    Levelled { max_concurrency: usize },
}

impl ExecutionMode {
    pub fn from_concurrency(max_concurrency: usize) -> Self {
        if max_concurrency > 1 {
            ExecutionMode::Levelled { max_concurrency }
        } else {
            ExecutionMode::Sequential
        }
    }
}

/// 一次运行的输入：1–5 篇文献 + 引导文本
#[derive(Debug, Clone, Default)]
pub struct PipelineInput {
    pub documents: Vec<Document>,
    pub guidance: String,
}

impl PipelineInput {
    pub fn new(documents: Vec<Document>, guidance: impl Into<String>) -> Self {
        Self {
            documents,
            guidance: guidance.into(),
        }
    }
}

/// 一次运行的结果
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub outputs: BTreeMap<AgentId, AgentOutput>,
    pub statuses: BTreeMap<AgentId, AgentStatus>,
    /// Agent 的开始顺序
    pub order: Vec<AgentId>,
    /// 报告 Agent 的成功输出
    pub report: Option<Value>,
    pub elapsed: Duration,
}

impl PipelineResult {
    pub fn failed_agents(&self) -> Vec<&str> {
        self.outputs
            .iter()
            .filter(|(_, out)| out.is_failed())
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

/// 流水线执行器：持有 LLM 客户端；运行间不保留任何可变状态
pub struct PipelineExecutor {
    llm: Arc<dyn LlmClient>,
    agent_timeout: Option<Duration>,
    mode: ExecutionMode,
}

impl PipelineExecutor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            agent_timeout: None,
            mode: ExecutionMode::Sequential,
        }
    }

    /// 单个外部调用的超时
    pub fn with_agent_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.agent_timeout = timeout;
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// 执行整条流水线；每个 Agent 恰好执行一次
    pub async fn run(
        &self,
        pipeline: &Pipeline,
        input: &PipelineInput,
        observer: &dyn PipelineObserver,
    ) -> PipelineResult {
        let started = Instant::now();
        let agents = pipeline.agents();
        let mut outputs: BTreeMap<AgentId, AgentOutput> = BTreeMap::new();
        let mut statuses: BTreeMap<AgentId, AgentStatus> = agents
            .iter()
            .map(|a| (a.id.clone(), AgentStatus::Pending))
            .collect();
        let mut order = Vec::with_capacity(agents.len());

        tracing::info!(
            pipeline = pipeline.name(),
            agents = agents.len(),
            documents = input.documents.len(),
            "Pipeline run started"
        );

        match self.mode {
            ExecutionMode::Levelled { max_concurrency } if max_concurrency > 1 => {
                for level in pipeline.graph().levels() {
                    let jobs: Vec<_> = level
                        .iter()
                        .map(|&i| {
                            let agent = &agents[i];
                            statuses.insert(agent.id.clone(), AgentStatus::Working);
                            order.push(agent.id.clone());
                            let ctx = Self::context(agent, input, &outputs);
                            self.run_agent(agent, ctx, observer)
                        })
                        .collect();
                    let results: Vec<AgentOutput> =
                        stream::iter(jobs).buffered(max_concurrency).collect().await;
                    for (&i, output) in level.iter().zip(results) {
                        let id = agents[i].id.clone();
                        statuses.insert(id.clone(), output.status());
                        outputs.insert(id, output);
                    }
                }
            }
            _ => {
                for &i in pipeline.graph().order() {
                    let agent = &agents[i];
                    statuses.insert(agent.id.clone(), AgentStatus::Working);
                    order.push(agent.id.clone());
                    let ctx = Self::context(agent, input, &outputs);
                    let output = self.run_agent(agent, ctx, observer).await;
                    statuses.insert(agent.id.clone(), output.status());
                    outputs.insert(agent.id.clone(), output);
                }
            }
        }

        let report = outputs
            .get(pipeline.report_agent())
            .and_then(AgentOutput::value)
            .cloned();
        let elapsed = started.elapsed();

        let failed = outputs.values().filter(|o| o.is_failed()).count();
        tracing::info!(
            pipeline = pipeline.name(),
            failed,
            has_report = report.is_some(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Pipeline run finished"
        );

        PipelineResult {
            outputs,
            statuses,
            order,
            report,
            elapsed,
        }
    }

    /// 只取已声明依赖的输出
    fn context<'a>(
        agent: &AgentDescriptor,
        input: &'a PipelineInput,
        outputs: &BTreeMap<AgentId, AgentOutput>,
    ) -> AgentContext<'a> {
        let dependencies = agent
            .depends_on
            .iter()
            .filter_map(|dep| outputs.get(dep).map(|out| (dep.clone(), out.clone())))
            .collect();
        AgentContext {
            documents: &input.documents,
            guidance: &input.guidance,
            dependencies,
        }
    }

    async fn run_agent(
        &self,
        agent: &AgentDescriptor,
        ctx: AgentContext<'_>,
        observer: &dyn PipelineObserver,
    ) -> AgentOutput {
        let started = Instant::now();
        observer.on_agent_start(&agent.id);

        let failed_deps = ctx.failed_dependencies();
        if !failed_deps.is_empty() {
            tracing::debug!(
                agent = %agent.id,
                "Running with failed dependencies: {}",
                failed_deps.join(", ")
            );
        }

        let result = match &agent.kind {
            AgentKind::Local(derive) => derive(&ctx),
            AgentKind::External(call) => self.call_external(call, &ctx).await,
        };
        let elapsed = started.elapsed();

        match result {
            Ok(value) => {
                tracing::debug!(agent = %agent.id, elapsed_ms = elapsed.as_millis() as u64, "Agent complete");
                observer.on_agent_complete(&agent.id, &value, elapsed);
                AgentOutput::Complete(value)
            }
            Err(error) => {
                tracing::warn!(agent = %agent.id, "Agent failed: {}", error);
                observer.on_agent_error(&agent.id, &error, elapsed);
                AgentOutput::Failed { error }
            }
        }
    }

    async fn call_external(
        &self,
        call: &ExternalCall,
        ctx: &AgentContext<'_>,
    ) -> Result<Value, String> {
        let request = GenerateRequest::new(call.system_prompt.clone(), (call.prompt)(ctx))
            .with_max_tokens(call.max_tokens)
            .with_temperature(call.temperature)
            .with_provider(call.provider);

        let generation = self.llm.generate(&request);
        let raw = match self.agent_timeout {
            Some(limit) => tokio::time::timeout(limit, generation)
                .await
                .map_err(|_| format!("timed out after {}ms", limit.as_millis()))?,
            None => generation.await,
        }
        .map_err(|e| e.to_string())?;

        (call.parser)(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, MockLlmClient};
    use crate::pipeline::parse::parse_json_object;
    use crate::pipeline::PipelineBuilder;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<(String, &'static str)>>,
    }

    impl RecordingObserver {
        fn events(&self) -> Vec<(String, &'static str)> {
            self.events.lock().unwrap().clone()
        }

        fn position(&self, agent: &str, kind: &str) -> usize {
            self.events()
                .iter()
                .position(|(a, k)| a == agent && *k == kind)
                .unwrap()
        }
    }

    impl PipelineObserver for RecordingObserver {
        fn on_agent_start(&self, agent: &str) {
            self.events.lock().unwrap().push((agent.to_string(), "start"));
        }
        fn on_agent_complete(&self, agent: &str, _output: &Value, _elapsed: Duration) {
            self.events.lock().unwrap().push((agent.to_string(), "end"));
        }
        fn on_agent_error(&self, agent: &str, _error: &str, _elapsed: Duration) {
            self.events.lock().unwrap().push((agent.to_string(), "end"));
        }
    }

    fn external(id: &str, deps: &[&str]) -> AgentDescriptor {
        AgentDescriptor::external(
            id,
            format!("You are the {} agent", id),
            |ctx| format!("{} documents", ctx.documents.len()),
            parse_json_object,
        )
        .depends_on(deps.iter().copied())
    }

    /// 本地 Agent：报告每个依赖是否为失败标记
    fn probe(id: &str, deps: &[&str]) -> AgentDescriptor {
        AgentDescriptor::local(id, |ctx| {
            let seen: serde_json::Map<String, Value> = ctx
                .dependencies
                .iter()
                .map(|(k, v)| (k.clone(), json!(v.is_failed())))
                .collect();
            Ok(json!({ "failed": seen }))
        })
        .depends_on(deps.iter().copied())
    }

    fn input() -> PipelineInput {
        PipelineInput::new(vec![Document::new("Paper", "Body")], "focus on methods")
    }

    #[tokio::test]
    async fn test_dependencies_finish_before_dependents_start() {
        let pipeline = PipelineBuilder::new("dag")
            .agent(external("d", &["b", "c"]))
            .agent(external("b", &["a"]))
            .agent(external("c", &["a"]))
            .agent(external("a", &[]))
            .report_agent("d")
            .build()
            .unwrap();
        let llm = Arc::new(MockLlmClient::new());
        let observer = RecordingObserver::default();

        let result = PipelineExecutor::new(llm)
            .run(&pipeline, &input(), &observer)
            .await;

        for agent in pipeline.agents() {
            for dep in &agent.depends_on {
                assert!(observer.position(dep, "end") < observer.position(&agent.id, "start"));
            }
        }
        assert_eq!(result.order, vec!["a", "b", "c", "d"]);
        assert!(result.statuses.values().all(|s| *s == AgentStatus::Complete));
        assert!(result.report.is_some());
    }

    #[tokio::test]
    async fn test_failed_agent_does_not_skip_dependents() {
        let pipeline = PipelineBuilder::new("failure")
            .agent(external("a", &[]))
            .agent(probe("b", &["a"]))
            .agent(probe("c", &["a"]))
            .build()
            .unwrap();
        let llm = Arc::new(
            MockLlmClient::new().fail("the a agent", LlmError::Network("connection reset".into())),
        );

        let result = PipelineExecutor::new(llm)
            .run(&pipeline, &input(), &NoopObserver)
            .await;

        assert_eq!(result.statuses["a"], AgentStatus::Error);
        assert!(result.outputs["a"].error().unwrap().contains("connection reset"));
        for id in ["b", "c"] {
            assert_eq!(result.statuses[id], AgentStatus::Complete);
            assert_eq!(result.outputs[id].value().unwrap()["failed"]["a"], json!(true));
        }
        assert!(result.statuses.values().all(|s| s.is_terminal()));
        assert_eq!(result.failed_agents(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_parse_failure_becomes_failure_marker() {
        let pipeline = PipelineBuilder::new("parse")
            .agent(external("reader", &[]))
            .agent(external("scribe", &["reader"]))
            .build()
            .unwrap();
        let llm = Arc::new(
            MockLlmClient::new()
                .respond("the reader agent", "{\"claims\": []}")
                .respond("the scribe agent", "I could not produce JSON, sorry"),
        );

        let result = PipelineExecutor::new(llm)
            .run(&pipeline, &input(), &NoopObserver)
            .await;

        assert_eq!(result.statuses["reader"], AgentStatus::Complete);
        assert_eq!(result.statuses["scribe"], AgentStatus::Error);
        assert!(result.report.is_none());
    }

    #[tokio::test]
    async fn test_agent_timeout_is_an_agent_failure() {
        let pipeline = PipelineBuilder::new("slow")
            .agent(external("slow", &[]))
            .agent(probe("after", &["slow"]))
            .build()
            .unwrap();
        let llm = Arc::new(MockLlmClient::new().with_delay(Duration::from_millis(200)));

        let result = PipelineExecutor::new(llm)
            .with_agent_timeout(Some(Duration::from_millis(10)))
            .run(&pipeline, &input(), &NoopObserver)
            .await;

        assert!(result.outputs["slow"].error().unwrap().contains("timed out"));
        assert_eq!(result.statuses["after"], AgentStatus::Complete);
    }

    #[tokio::test]
    async fn test_prompt_receives_only_declared_dependencies() {
        let pipeline = PipelineBuilder::new("deps")
            .agent(external("a", &[]))
            .agent(external("b", &[]))
            .agent(probe("c", &["b"]))
            .build()
            .unwrap();
        let llm = Arc::new(MockLlmClient::new());

        let result = PipelineExecutor::new(llm)
            .run(&pipeline, &input(), &NoopObserver)
            .await;

        let seen = result.outputs["c"].value().unwrap()["failed"].as_object().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert!(seen.contains_key("b"));
    }

    #[tokio::test]
    async fn test_levelled_mode_respects_dependencies() {
        let pipeline = PipelineBuilder::new("levelled")
            .agent(external("a", &[]))
            .agent(external("b", &["a"]))
            .agent(external("c", &["a"]))
            .agent(probe("d", &["b", "c"]))
            .build()
            .unwrap();
        let llm = Arc::new(MockLlmClient::new().with_delay(Duration::from_millis(5)));
        let observer = RecordingObserver::default();

        let result = PipelineExecutor::new(llm)
            .with_mode(ExecutionMode::Levelled { max_concurrency: 4 })
            .run(&pipeline, &input(), &observer)
            .await;

        for agent in pipeline.agents() {
            for dep in &agent.depends_on {
                assert!(observer.position(dep, "end") < observer.position(&agent.id, "start"));
            }
        }
        assert_eq!(result.outputs.len(), 4);
        assert!(result.statuses.values().all(|s| *s == AgentStatus::Complete));
        assert_eq!(
            result.outputs["d"].value().unwrap()["failed"],
            json!({"b": false, "c": false})
        );
    }
}
