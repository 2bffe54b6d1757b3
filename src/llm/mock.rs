//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按「标记」匹配脚本化回复：system prompt 或最后一条 user 消息中包含标记即命中。
//! 未命中任何规则时回显最后一条 User 消息（JSON 对象），便于本地跑通整条流水线。

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{GenerateRequest, LlmClient, LlmError};

#[derive(Debug, Clone)]
enum MockReply {
    Text(String),
    Fail(LlmError),
}

/// Mock 客户端：脚本化回复 + 调用记录
#[derive(Debug, Default)]
pub struct MockLlmClient {
    rules: Vec<(String, MockReply)>,
    delay: Option<Duration>,
    calls: Mutex<Vec<GenerateRequest>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 命中 marker 时返回 text
    pub fn respond(mut self, marker: impl Into<String>, text: impl Into<String>) -> Self {
        self.rules
            .push((marker.into(), MockReply::Text(text.into())));
        self
    }

    /// 命中 marker 时返回错误
    pub fn fail(mut self, marker: impl Into<String>, error: LlmError) -> Self {
        self.rules.push((marker.into(), MockReply::Fail(error)));
        self
    }

    /// 每次调用前等待（模拟慢速后端）
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// 已收到的请求（按调用顺序）
    pub fn calls(&self) -> Vec<GenerateRequest> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let last_user = request.last_user_message();
        let hit = self.rules.iter().find(|(marker, _)| {
            request.system_prompt.contains(marker.as_str()) || last_user.contains(marker.as_str())
        });

        match hit {
            Some((_, MockReply::Text(text))) => Ok(text.clone()),
            Some((_, MockReply::Fail(err))) => Err(err.clone()),
            None => Ok(serde_json::json!({ "echo": last_user }).to_string()),
        }
    }
}
