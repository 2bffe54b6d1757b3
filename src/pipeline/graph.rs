//! 流水线依赖图
//!
//! 使用邻接表和入度表实现 DAG 拓扑排序；同时可就绪的 Agent 按声明顺序打破平局，保证执行顺序确定。

use std::collections::{BTreeSet, HashMap};

use crate::pipeline::descriptor::AgentDescriptor;
use crate::pipeline::types::{AgentId, PipelineError};

/// 流水线依赖图（按声明下标存储）
#[derive(Debug, Clone)]
pub struct PipelineGraph {
    /// 邻接表：Agent 下标 -> 依赖它的 Agent 下标
    pub adjacency: Vec<Vec<usize>>,
    /// 入度表：Agent 下标 -> 依赖数
    pub in_degree: Vec<usize>,
    order: Vec<usize>,
    levels: Vec<Vec<usize>>,
}

impl PipelineGraph {
    /// 构建并校验依赖图：重复 ID、未知依赖、环都会被拒绝
    pub fn new(agents: &[AgentDescriptor]) -> Result<Self, PipelineError> {
        if agents.is_empty() {
            return Err(PipelineError::Empty);
        }

        let mut index: HashMap<&str, usize> = HashMap::new();
        for (i, agent) in agents.iter().enumerate() {
            if index.insert(agent.id.as_str(), i).is_some() {
                return Err(PipelineError::DuplicateAgent(agent.id.clone()));
            }
        }

        let mut adjacency = vec![Vec::new(); agents.len()];
        let mut in_degree = vec![0usize; agents.len()];
        for (i, agent) in agents.iter().enumerate() {
            let mut seen = BTreeSet::new();
            for dep in &agent.depends_on {
                let &d = index
                    .get(dep.as_str())
                    .ok_or_else(|| PipelineError::UnknownDependency {
                        agent: agent.id.clone(),
                        dependency: dep.clone(),
                    })?;
                if seen.insert(d) {
                    adjacency[d].push(i);
                    in_degree[i] += 1;
                }
            }
        }

        let (order, depth) = Self::topological_sort(&adjacency, &in_degree);
        if order.len() != agents.len() {
            let placed: BTreeSet<usize> = order.iter().copied().collect();
            let stuck: Vec<AgentId> = (0..agents.len())
                .filter(|i| !placed.contains(i))
                .map(|i| agents[i].id.clone())
                .collect();
            return Err(PipelineError::CyclicDependency(stuck));
        }

        let max_depth = depth.iter().copied().max().unwrap_or(0);
        let mut levels = vec![Vec::new(); max_depth + 1];
        for &i in &order {
            levels[depth[i]].push(i);
        }

        Ok(Self {
            adjacency,
            in_degree,
            order,
            levels,
        })
    }

    /// Kahn 算法：就绪集合用有序集合，总是先取声明最早的 Agent
    fn topological_sort(adjacency: &[Vec<usize>], in_degree: &[usize]) -> (Vec<usize>, Vec<usize>) {
        let mut remaining = in_degree.to_vec();
        let mut depth = vec![0usize; in_degree.len()];
        let mut ready: BTreeSet<usize> = remaining
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| i)
            .collect();
        let mut order = Vec::with_capacity(in_degree.len());

        while let Some(next) = ready.pop_first() {
            order.push(next);
            for &dependent in &adjacency[next] {
                depth[dependent] = depth[dependent].max(depth[next] + 1);
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        (order, depth)
    }

    /// 拓扑顺序（声明下标）
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// 按依赖深度分层：同一层内的 Agent 互不依赖
    pub fn levels(&self) -> &[Vec<usize>] {
        &self.levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn agent(id: &str, deps: &[&str]) -> AgentDescriptor {
        AgentDescriptor::local(id, |_| Ok(json!({}))).depends_on(deps.iter().copied())
    }

    fn ids(agents: &[AgentDescriptor], order: &[usize]) -> Vec<String> {
        order.iter().map(|&i| agents[i].id.clone()).collect()
    }

    #[test]
    fn test_declaration_order_tie_break() {
        let agents = vec![
            agent("scribe", &["b", "c"]),
            agent("c", &["a"]),
            agent("b", &["a"]),
            agent("a", &[]),
        ];
        let graph = PipelineGraph::new(&agents).unwrap();
        assert_eq!(ids(&agents, graph.order()), vec!["a", "c", "b", "scribe"]);
        assert_eq!(graph.in_degree[0], 2);
    }

    #[test]
    fn test_levels() {
        let agents = vec![
            agent("a", &[]),
            agent("b", &["a"]),
            agent("c", &["a"]),
            agent("d", &["b", "c"]),
            agent("e", &[]),
        ];
        let graph = PipelineGraph::new(&agents).unwrap();
        let levels: Vec<Vec<String>> = graph
            .levels()
            .iter()
            .map(|level| ids(&agents, level))
            .collect();
        assert_eq!(
            levels,
            vec![vec!["a", "e"], vec!["b", "c"], vec!["d"]]
        );
    }

    #[test]
    fn test_cycle_detected() {
        let agents = vec![agent("a", &["c"]), agent("b", &["a"]), agent("c", &["b"]), agent("d", &[])];
        let err = PipelineGraph::new(&agents).unwrap_err();
        assert_eq!(
            err,
            PipelineError::CyclicDependency(vec!["a".into(), "b".into(), "c".into()])
        );
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let agents = vec![agent("a", &["a"])];
        assert!(matches!(
            PipelineGraph::new(&agents),
            Err(PipelineError::CyclicDependency(_))
        ));
    }

    #[test]
    fn test_unknown_dependency() {
        let agents = vec![agent("a", &["ghost"])];
        assert_eq!(
            PipelineGraph::new(&agents).unwrap_err(),
            PipelineError::UnknownDependency {
                agent: "a".into(),
                dependency: "ghost".into()
            }
        );
    }

    #[test]
    fn test_duplicate_agent() {
        let agents = vec![agent("a", &[]), agent("a", &[])];
        assert_eq!(
            PipelineGraph::new(&agents).unwrap_err(),
            PipelineError::DuplicateAgent("a".into())
        );
    }
}
