//! 流水线构建器
//!
//! 提供流畅的 API 来构建并校验流水线；校验通过的 Pipeline 才能交给执行器

use crate::pipeline::descriptor::AgentDescriptor;
use crate::pipeline::graph::PipelineGraph;
use crate::pipeline::types::{AgentId, PipelineError};

/// 已校验的流水线：Agent 列表 + 依赖图 + 报告 Agent（汇点，通常是 scribe）
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    agents: Vec<AgentDescriptor>,
    report_agent: AgentId,
    graph: PipelineGraph,
}

impl Pipeline {
    /// 校验 DAG 与报告 Agent 后创建
    pub fn new(
        name: impl Into<String>,
        agents: Vec<AgentDescriptor>,
        report_agent: impl Into<AgentId>,
    ) -> Result<Self, PipelineError> {
        let report_agent = report_agent.into();
        let graph = PipelineGraph::new(&agents)?;
        if !agents.iter().any(|a| a.id == report_agent) {
            return Err(PipelineError::UnknownReportAgent(report_agent));
        }
        Ok(Self {
            name: name.into(),
            agents,
            report_agent,
            graph,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn agents(&self) -> &[AgentDescriptor] {
        &self.agents
    }

    pub fn report_agent(&self) -> &str {
        &self.report_agent
    }

    pub fn graph(&self) -> &PipelineGraph {
        &self.graph
    }

    /// 按拓扑顺序排列的 Agent ID
    pub fn execution_order(&self) -> Vec<&str> {
        self.graph
            .order()
            .iter()
            .map(|&i| self.agents[i].id.as_str())
            .collect()
    }
}

/// 流水线构建器
pub struct PipelineBuilder {
    name: String,
    agents: Vec<AgentDescriptor>,
    report_agent: Option<AgentId>,
}

impl PipelineBuilder {
    /// 创建新的流水线构建器
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agents: Vec::new(),
            report_agent: None,
        }
    }

    /// 添加 Agent（声明顺序即拓扑排序的平局顺序）
    pub fn agent(mut self, agent: AgentDescriptor) -> Self {
        self.agents.push(agent);
        self
    }

    /// 批量添加 Agent
    pub fn agents(mut self, agents: impl IntoIterator<Item = AgentDescriptor>) -> Self {
        self.agents.extend(agents);
        self
    }

    /// 指定报告 Agent
    pub fn report_agent(mut self, id: impl Into<AgentId>) -> Self {
        self.report_agent = Some(id.into());
        self
    }

    /// 构建流水线；未指定报告 Agent 时取最后声明的 Agent
    pub fn build(self) -> Result<Pipeline, PipelineError> {
        let report_agent = match self.report_agent {
            Some(id) => id,
            None => self
                .agents
                .last()
                .map(|a| a.id.clone())
                .ok_or(PipelineError::Empty)?,
        };
        Pipeline::new(self.name, self.agents, report_agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_simple_pipeline() {
        let pipeline = PipelineBuilder::new("Test Pipeline")
            .agent(AgentDescriptor::local("reader", |_| Ok(json!({}))))
            .agent(AgentDescriptor::local("scribe", |_| Ok(json!({}))).depends_on(["reader"]))
            .build()
            .expect("Failed to build pipeline");

        assert_eq!(pipeline.name(), "Test Pipeline");
        assert_eq!(pipeline.agents().len(), 2);
        assert_eq!(pipeline.report_agent(), "scribe");
        assert_eq!(pipeline.execution_order(), vec!["reader", "scribe"]);
    }

    #[test]
    fn test_build_without_agents_fails() {
        let result = PipelineBuilder::new("Test").build();
        assert!(matches!(result, Err(PipelineError::Empty)));
    }

    #[test]
    fn test_unknown_report_agent_fails() {
        let result = PipelineBuilder::new("Test")
            .agent(AgentDescriptor::local("reader", |_| Ok(json!({}))))
            .report_agent("scribe")
            .build();
        assert_eq!(
            result.unwrap_err(),
            PipelineError::UnknownReportAgent("scribe".into())
        );
    }
}
