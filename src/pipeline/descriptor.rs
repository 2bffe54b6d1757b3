//! Agent 描述符
//!
//! 声明式定义一个流水线参与者：ID、依赖集合、以及外部调用（system prompt + 提示词构建器 + 输出解析器）
//! 或纯本地推导函数。描述符本身只有数据与纯函数，不持有任何运行状态。

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::llm::Provider;
use crate::pipeline::types::{AgentContext, AgentId};

/// 提示词构建器：(文献, 依赖输出) -> 用户消息
pub type PromptBuilder = Arc<dyn Fn(&AgentContext<'_>) -> String + Send + Sync>;
/// 输出解析器：原始文本 -> 结构化值或解析错误
pub type OutputParser = Arc<dyn Fn(&str) -> Result<Value, String> + Send + Sync>;
/// 本地 Agent：仅由上下文推导输出，不调用外部服务
pub type LocalFn = Arc<dyn Fn(&AgentContext<'_>) -> Result<Value, String> + Send + Sync>;

/// 一次外部文本生成调用的定义
#[derive(Clone)]
pub struct ExternalCall {
    pub system_prompt: String,
    pub prompt: PromptBuilder,
    pub parser: OutputParser,
    pub max_tokens: u32,
    pub temperature: f32,
    pub provider: Option<Provider>,
}

/// Agent 执行方式
#[derive(Clone)]
pub enum AgentKind {
    External(ExternalCall),
    Local(LocalFn),
}

/// Agent 描述符
#[derive(Clone)]
pub struct AgentDescriptor {
    pub id: AgentId,
    pub depends_on: Vec<AgentId>,
    pub kind: AgentKind,
}

impl AgentDescriptor {
    /// 外部调用 Agent
    pub fn external<P, O>(
        id: impl Into<AgentId>,
        system_prompt: impl Into<String>,
        prompt: P,
        parser: O,
    ) -> Self
    where
        P: Fn(&AgentContext<'_>) -> String + Send + Sync + 'static,
        O: Fn(&str) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            depends_on: Vec::new(),
            kind: AgentKind::External(ExternalCall {
                system_prompt: system_prompt.into(),
                prompt: Arc::new(prompt),
                parser: Arc::new(parser),
                max_tokens: 2048,
                temperature: 0.7,
                provider: None,
            }),
        }
    }

    /// 本地推导 Agent
    pub fn local<F>(id: impl Into<AgentId>, derive: F) -> Self
    where
        F: Fn(&AgentContext<'_>) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            depends_on: Vec::new(),
            kind: AgentKind::Local(Arc::new(derive)),
        }
    }

    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<AgentId>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        if let AgentKind::External(call) = &mut self.kind {
            call.max_tokens = max_tokens;
        }
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        if let AgentKind::External(call) = &mut self.kind {
            call.temperature = temperature;
        }
        self
    }

    pub fn provider(mut self, provider: Option<Provider>) -> Self {
        if let AgentKind::External(call) = &mut self.kind {
            call.provider = provider;
        }
        self
    }

    pub fn is_external_call(&self) -> bool {
        matches!(self.kind, AgentKind::External(_))
    }
}

impl fmt::Debug for AgentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentDescriptor")
            .field("id", &self.id)
            .field("depends_on", &self.depends_on)
            .field("external", &self.is_external_call())
            .finish()
    }
}
