//! 内置 Agent 团队与自定义 Agent 加载
//!
//! - **replicate**: 精读、方法评估、批判、复现实验、报告
//! - **discover**: 领域索引、版图、空白、假设、实验、报告
//! - **loader**: 从 TOML 定义自定义流水线

pub mod discover;
pub mod loader;
pub mod prompts;
pub mod replicate;
pub mod scribe;

use std::path::Path;

pub use loader::{load_pipeline, parse_pipeline, AgentDefinition, LoadError};

use crate::pipeline::Pipeline;

pub const BUILTIN_PIPELINES: [&str; 2] = [replicate::NAME, discover::NAME];

/// 按名称取内置流水线
pub fn builtin_pipeline(name: &str) -> Option<Pipeline> {
    let pipeline = match name {
        replicate::NAME => replicate::pipeline(),
        discover::NAME => discover::pipeline(),
        _ => return None,
    };
    match pipeline {
        Ok(p) => Some(p),
        Err(e) => {
            tracing::error!(pipeline = name, "Built-in pipeline is invalid: {}", e);
            None
        }
    }
}

/// 内置名称优先，否则视为 TOML 文件路径
pub fn resolve_pipeline(name_or_path: &str) -> Result<Pipeline, LoadError> {
    if let Some(pipeline) = builtin_pipeline(name_or_path) {
        return Ok(pipeline);
    }
    load_pipeline(Path::new(name_or_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_pipelines_are_valid() {
        for name in BUILTIN_PIPELINES {
            let pipeline = builtin_pipeline(name).unwrap();
            assert_eq!(pipeline.name(), name);
            assert_eq!(pipeline.report_agent(), scribe::ID);
        }
        assert!(builtin_pipeline("unknown").is_none());
    }

    #[test]
    fn test_resolve_missing_file() {
        assert!(matches!(
            resolve_pipeline("/nonexistent/agents.toml"),
            Err(LoadError::Io(_))
        ));
    }
}
