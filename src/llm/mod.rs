//! LLM 层：客户端抽象与实现（OpenAI 兼容 / 后端路由 / Mock）

pub mod message;
pub mod mock;
pub mod openai;
pub mod provider;
pub mod router;
pub mod traits;

pub use message::{Message, Role};
pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use provider::Provider;
pub use router::{create_llm_from_config, ProviderRouter};
pub use traits::{GenerateRequest, LlmClient, LlmError, RetryConfig, RetryingLlmClient};
