//! 流水线类型定义
//!
//! 定义 Agent 状态、输出（含失败标记）、执行上下文与配置错误

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::document::Document;

pub type AgentId = String;

/// 单次运行内的 Agent 状态：pending → working → complete|error，每个 Agent 只转移一次
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// 等待执行
    Pending,
    /// 正在执行
    Working,
    /// 已完成
    Complete,
    /// 失败
    Error,
}

impl AgentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentStatus::Complete | AgentStatus::Error)
    }
}

/// Agent 输出：成功值或失败标记（失败标记不是值，下游应视为缺失上下文）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "output", rename_all = "lowercase")]
pub enum AgentOutput {
    Complete(Value),
    Failed { error: String },
}

impl AgentOutput {
    pub fn value(&self) -> Option<&Value> {
        match self {
            AgentOutput::Complete(v) => Some(v),
            AgentOutput::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            AgentOutput::Complete(_) => None,
            AgentOutput::Failed { error } => Some(error),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, AgentOutput::Failed { .. })
    }

    pub fn status(&self) -> AgentStatus {
        match self {
            AgentOutput::Complete(_) => AgentStatus::Complete,
            AgentOutput::Failed { .. } => AgentStatus::Error,
        }
    }
}

/// 传给提示词构建器 / 本地 Agent 的上下文：文献、引导文本、已声明依赖的输出
#[derive(Debug, Clone)]
pub struct AgentContext<'a> {
    pub documents: &'a [Document],
    pub guidance: &'a str,
    /// 仅包含 depends_on 中声明的 Agent（失败的依赖以失败标记出现）
    pub dependencies: BTreeMap<AgentId, AgentOutput>,
}

impl<'a> AgentContext<'a> {
    /// 依赖的成功输出；失败或缺失时返回 None
    pub fn dependency(&self, id: &str) -> Option<&Value> {
        self.dependencies.get(id).and_then(AgentOutput::value)
    }

    /// 失败的依赖 ID
    pub fn failed_dependencies(&self) -> Vec<&str> {
        self.dependencies
            .iter()
            .filter(|(_, out)| out.is_failed())
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

/// 流水线配置错误（致命，运行前即被拒绝）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Pipeline has no agents")]
    Empty,
    #[error("Duplicate agent id: {0}")]
    DuplicateAgent(AgentId),
    #[error("Agent {agent} depends on unknown agent {dependency}")]
    UnknownDependency { agent: AgentId, dependency: AgentId },
    #[error("Cyclic dependency detected among: {}", .0.join(", "))]
    CyclicDependency(Vec<AgentId>),
    #[error("Report agent {0} is not part of the pipeline")]
    UnknownReportAgent(AgentId),
    #[error("Invalid agent definition: {0}")]
    InvalidDefinition(String),
}
