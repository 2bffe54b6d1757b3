//! 引擎类型定义
//!
//! 定义引擎状态机、迭代记录、检查点、事件与导出格式

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::document::Document;
use crate::engine::queue::QueueSnapshot;
use crate::engine::stats::{AccumulatedStats, Breakthrough};
use crate::pipeline::{AgentId, AgentStatus};
use crate::report::ResearchReport;
use crate::verification::{HealthStatus, VerificationRecord, VerificationSettings, VerificationStats};

/// 引擎状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    /// 尚未启动
    Idle,
    /// 正在迭代（含冷却）
    Running,
    /// 已暂停，等待 resume
    Paused,
    /// 等待人工决策
    Checkpoint,
    /// 已停止（手动或检查点决定）
    Stopped,
}

impl EngineState {
    /// 只有 idle / stopped 可以开始新的运行
    pub fn accepts_start(&self) -> bool {
        matches!(self, EngineState::Idle | EngineState::Stopped)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Idle => "idle",
            EngineState::Running => "running",
            EngineState::Paused => "paused",
            EngineState::Checkpoint => "checkpoint",
            EngineState::Stopped => "stopped",
        };
        write!(f, "{}", name)
    }
}

/// 引擎运行参数（运行开始前确定）
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 每轮迭代消费的文献数（1–5）
    pub batch_size: usize,
    /// 两轮迭代之间的冷却
    pub cooldown: Duration,
    /// 冷却倒计时事件的间隔
    pub cooldown_tick: Duration,
    /// 每 N 轮触发检查点；0 表示关闭
    pub checkpoint_interval: u32,
    pub max_iterations: Option<u32>,
    pub max_queue: usize,
    pub max_discoveries_per_iteration: usize,
    pub agent_timeout: Option<Duration>,
    /// 同层并发上限；1 表示严格串行
    pub max_concurrency: usize,
    pub breakthrough_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 3,
            cooldown: Duration::from_secs(5),
            cooldown_tick: Duration::from_secs(1),
            checkpoint_interval: 3,
            max_iterations: None,
            max_queue: 50,
            max_discoveries_per_iteration: 5,
            agent_timeout: Some(Duration::from_secs(180)),
            max_concurrency: 1,
            breakthrough_limit: crate::engine::stats::BREAKTHROUGH_LIMIT,
        }
    }
}

/// 单个 Agent 在一轮迭代中的结果摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    pub status: AgentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 一轮迭代：一次流水线运行 + 一次校验；写入历史后不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Iteration {
    pub id: u32,
    pub documents: Vec<Document>,
    /// scribe 失败时为 None
    pub report: Option<ResearchReport>,
    pub agents: BTreeMap<AgentId, AgentRecord>,
    pub verification: VerificationRecord,
    pub duration_ms: u64,
    /// 本轮新入队的文献数
    pub discovered: usize,
    /// 本轮生效的引导文本
    pub guidance: String,
    /// 开始时间（unix 毫秒）
    pub started_at: i64,
}

/// 检查点触发原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointReason {
    Interval,
    CriticalHealth,
}

/// 检查点快照：一次性对象，决策后即丢弃
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub iteration_id: u32,
    pub reason: CheckpointReason,
    pub health: HealthStatus,
    pub queue_len: usize,
    pub top_findings: Vec<Breakthrough>,
    pub stats: AccumulatedStats,
}

/// 检查点决策
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointResolution {
    /// 继续（可附反馈）
    Continue { feedback: Option<String> },
    /// 替换引导文本后继续
    Redirect {
        feedback: Option<String>,
        guidance: String,
    },
    /// 停止运行
    Stop,
}

impl CheckpointResolution {
    pub fn action(&self) -> CheckpointAction {
        match self {
            CheckpointResolution::Continue { .. } => CheckpointAction::Continue,
            CheckpointResolution::Redirect { .. } => CheckpointAction::Redirect,
            CheckpointResolution::Stop => CheckpointAction::Stop,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointAction {
    Continue,
    Redirect,
    Stop,
}

/// 引导文本变更记录；iteration_id 为 0 表示运行开始时的引导
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuidanceEntry {
    pub iteration_id: u32,
    pub guidance: String,
}

/// 检查点反馈记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackEntry {
    pub iteration_id: u32,
    pub action: CheckpointAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

/// 运行元数据
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    pub run_id: String,
    pub pipeline: String,
    pub report_agent: String,
    pub state: EngineState,
    pub started_at: Option<i64>,
    pub batch_size: usize,
    pub checkpoint_interval: u32,
    pub cooldown_ms: u64,
}

/// 完整运行导出：与引擎实时状态无关的自包含快照
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunExport {
    pub metadata: RunMetadata,
    pub iterations: Vec<Iteration>,
    pub stats: AccumulatedStats,
    pub guidance_history: Vec<GuidanceEntry>,
    pub verification_settings: VerificationSettings,
    pub verification_stats: VerificationStats,
    pub feedback: Vec<FeedbackEntry>,
}

impl RunExport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// 引擎向调用方发出的事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// 状态机转移
    StatusChange { state: EngineState },
    /// 一轮迭代开始
    IterationStart {
        iteration_id: u32,
        documents: Vec<Document>,
    },
    /// 一轮迭代已写入历史
    IterationComplete { iteration: Box<Iteration> },
    /// 单个 Agent 进度
    AgentUpdate {
        iteration_id: u32,
        agent_id: AgentId,
        status: AgentStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
    },
    /// 队列变化
    QueueChange { queue: QueueSnapshot },
    /// 冷却剩余时间
    Cooldown { remaining_ms: u64 },
    /// 校验完成
    VerificationComplete {
        iteration_id: u32,
        record: VerificationRecord,
    },
    /// 进入检查点
    CheckpointTriggered { checkpoint: Box<Checkpoint> },
    /// 校验统计更新
    VerificationStatsUpdate { stats: VerificationStats },
}

/// 状态机误用（调用方 bug），同步拒绝
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Cannot {operation} while engine is {state}")]
    InvalidState {
        operation: &'static str,
        state: EngineState,
    },
    #[error("No checkpoint is pending")]
    NoPendingCheckpoint,
    #[error("At least one seed document is required")]
    NoSeeds,
    #[error("Redirect requires non-empty guidance")]
    EmptyGuidance,
}
