//! 流水线：Agent 描述符、依赖图、构建器与执行器

pub mod builder;
pub mod descriptor;
pub mod executor;
pub mod graph;
pub mod parse;
pub mod types;

pub use builder::{Pipeline, PipelineBuilder};
pub use descriptor::{AgentDescriptor, AgentKind, ExternalCall, LocalFn, OutputParser, PromptBuilder};
pub use executor::{
    ExecutionMode, NoopObserver, PipelineExecutor, PipelineInput, PipelineObserver, PipelineResult,
};
pub use graph::PipelineGraph;
pub use parse::{extract_json, parse_json_object, parse_typed};
pub use types::{AgentContext, AgentId, AgentOutput, AgentStatus, PipelineError};
