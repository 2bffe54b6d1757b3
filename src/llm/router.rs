//! 后端路由器
//!
//! 持有每个已配置后端的客户端；请求带 provider 时路由到对应后端，否则使用默认后端。
//! create_llm_from_config 根据配置与环境变量装配路由器（无可用 Key 时退回 Mock）。

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::LlmSection;
use crate::llm::{
    GenerateRequest, LlmClient, LlmError, MockLlmClient, OpenAiClient, Provider, RetryConfig,
    RetryingLlmClient,
};

/// 按后端路由的 LLM 客户端
pub struct ProviderRouter {
    clients: BTreeMap<Provider, Arc<dyn LlmClient>>,
    default_provider: Provider,
    call_count: AtomicUsize,
}

impl ProviderRouter {
    pub fn new(default_provider: Provider) -> Self {
        Self {
            clients: BTreeMap::new(),
            default_provider,
            call_count: AtomicUsize::new(0),
        }
    }

    /// 注册后端客户端
    pub fn add(mut self, provider: Provider, client: Arc<dyn LlmClient>) -> Self {
        self.clients.insert(provider, client);
        self
    }

    pub fn default_provider(&self) -> Provider {
        self.default_provider
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    fn select(&self, requested: Option<Provider>) -> Result<&Arc<dyn LlmClient>, LlmError> {
        let provider = requested.unwrap_or(self.default_provider);
        self.clients
            .get(&provider)
            .ok_or(LlmError::ProviderUnavailable(provider))
    }
}

#[async_trait]
impl LlmClient for ProviderRouter {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, LlmError> {
        let client = self.select(request.provider)?;
        self.call_count.fetch_add(1, Ordering::Relaxed);
        client.generate(request).await
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        // 聚合所有后端的 token 使用
        self.clients
            .values()
            .map(|client| client.token_usage())
            .fold((0, 0, 0), |acc, (a, b, c)| (acc.0 + a, acc.1 + b, acc.2 + c))
    }
}

/// 根据配置与环境变量装配 LLM（路由器 + 重试）；没有任何 API Key 时使用 Mock
pub fn create_llm_from_config(cfg: &LlmSection) -> Arc<dyn LlmClient> {
    let timeout = Duration::from_secs(cfg.request_timeout_secs.max(1));
    let retry = RetryConfig {
        max_retries: cfg.max_retries,
        ..RetryConfig::default()
    };

    // 显式配置的 Key 环境变量优先，provider 未配置时按 Key 前缀识别
    let explicit_key = cfg
        .api_key_env
        .as_deref()
        .and_then(|name| std::env::var(name).ok());
    let configured = cfg
        .provider
        .as_deref()
        .and_then(|p| match p.parse::<Provider>() {
            Ok(provider) => Some(provider),
            Err(e) => {
                tracing::warn!("{}, falling back to key detection", e);
                None
            }
        });

    let mut keys: BTreeMap<Provider, String> = BTreeMap::new();
    for provider in Provider::ALL {
        if let Ok(key) = std::env::var(provider.api_key_env()) {
            if !key.trim().is_empty() {
                keys.insert(provider, key);
            }
        }
    }
    if let Some(key) = explicit_key {
        let provider = configured.unwrap_or_else(|| Provider::detect(&key));
        keys.insert(provider, key);
    }

    let default_provider = match configured {
        Some(p) if keys.contains_key(&p) => p,
        _ => match keys.keys().next() {
            Some(p) => *p,
            None => {
                tracing::warn!("No API key set for any provider, using Mock LLM");
                return Arc::new(MockLlmClient::new());
            }
        },
    };

    let mut router = ProviderRouter::new(default_provider);
    for (provider, key) in keys {
        let model = if provider == default_provider {
            cfg.model.as_deref()
        } else {
            None
        };
        let mut client = OpenAiClient::for_provider(provider, &key, model);
        if provider == default_provider {
            if let Some(url) = cfg.base_url.as_deref() {
                client = OpenAiClient::new(Some(url), client.model(), Some(&key));
            }
        }
        let client = client.with_request_timeout(timeout);
        tracing::info!("Registered {} LLM ({})", provider, client.model());
        router = router.add(
            provider,
            Arc::new(RetryingLlmClient::new(client, retry.clone())),
        );
    }
    tracing::info!("Default LLM provider: {}", default_provider);
    Arc::new(router)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_routes_by_requested_provider() {
        let router = ProviderRouter::new(Provider::OpenAi)
            .add(
                Provider::OpenAi,
                Arc::new(MockLlmClient::new().respond("ping", "from-openai")),
            )
            .add(
                Provider::Gemini,
                Arc::new(MockLlmClient::new().respond("ping", "from-gemini")),
            );

        let request = GenerateRequest::new("", "ping");
        assert_eq!(router.generate(&request).await.unwrap(), "from-openai");

        let request = request.with_provider(Some(Provider::Gemini));
        assert_eq!(router.generate(&request).await.unwrap(), "from-gemini");
        assert_eq!(router.call_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_provider_is_an_error() {
        let router = ProviderRouter::new(Provider::OpenAi)
            .add(Provider::OpenAi, Arc::new(MockLlmClient::new()));
        let request = GenerateRequest::new("", "ping").with_provider(Some(Provider::Claude));
        assert_eq!(
            router.generate(&request).await,
            Err(LlmError::ProviderUnavailable(Provider::Claude))
        );
    }
}
