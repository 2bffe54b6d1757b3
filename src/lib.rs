//! Hive - Rust 多智能体研究循环
//!
//! 模块划分：
//! - **agents**: 内置 Agent 团队（replicate / discover）与 TOML 自定义 Agent
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **document**: 文献与归一化标题键
//! - **engine**: 自治循环状态机、工作队列、累积统计、文献发现
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / 后端路由 / Mock）
//! - **observability**: tracing 初始化
//! - **pipeline**: Agent 描述符、依赖图与执行器
//! - **report**: 研究报告结构
//! - **sources**: 文献源（本地目录 / Semantic Scholar）
//! - **verification**: 假设 / 溯源 / 循环质量校验

pub mod agents;
pub mod config;
pub mod document;
pub mod engine;
pub mod llm;
pub mod observability;
pub mod pipeline;
pub mod report;
pub mod sources;
pub mod verification;

pub use engine::{Engine, EngineConfig, EngineEvent, EngineState};
pub use pipeline::{AgentDescriptor, Pipeline, PipelineBuilder, PipelineExecutor};
