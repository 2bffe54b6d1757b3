//! 累积统计
//!
//! 每轮迭代写入历史后折叠一次；突破性发现按类别优先级排序、同级保持插入顺序，最多保留 BREAKTHROUGH_LIMIT 条。

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::engine::types::Iteration;
use crate::report::{GapSeverity, NoveltyLevel, Potential};

pub const BREAKTHROUGH_LIMIT: usize = 10;

/// 突破性发现的类别（按优先级从高到低）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakthroughKind {
    NovelHypothesis,
    CriticalGap,
    HighPotentialDirection,
}

impl BreakthroughKind {
    fn rank(&self) -> u8 {
        match self {
            BreakthroughKind::NovelHypothesis => 3,
            BreakthroughKind::CriticalGap => 2,
            BreakthroughKind::HighPotentialDirection => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakthrough {
    pub iteration_id: u32,
    pub kind: BreakthroughKind,
    pub title: String,
    pub detail: String,
}

fn default_limit() -> usize {
    BREAKTHROUGH_LIMIT
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccumulatedStats {
    pub iterations: u32,
    /// 去重后的已处理文献数
    pub documents_processed: usize,
    pub total_gaps: usize,
    pub total_hypotheses: usize,
    pub total_experiments: usize,
    pub total_directions: usize,
    pub total_discovered: usize,
    /// 失败的 Agent 调用总数
    pub agent_failures: usize,
    /// 没有报告的迭代数
    pub empty_reports: u32,
    pub fields: BTreeSet<String>,
    pub breakthroughs: Vec<Breakthrough>,
    #[serde(skip)]
    seen_documents: BTreeSet<String>,
    #[serde(skip, default = "default_limit")]
    limit: usize,
}

impl Default for AccumulatedStats {
    fn default() -> Self {
        Self::with_limit(BREAKTHROUGH_LIMIT)
    }
}

impl AccumulatedStats {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            iterations: 0,
            documents_processed: 0,
            total_gaps: 0,
            total_hypotheses: 0,
            total_experiments: 0,
            total_directions: 0,
            total_discovered: 0,
            agent_failures: 0,
            empty_reports: 0,
            fields: BTreeSet::new(),
            breakthroughs: Vec::new(),
            seen_documents: BTreeSet::new(),
            limit,
        }
    }

    /// 折叠一轮迭代
    pub fn record(&mut self, iteration: &Iteration) {
        self.iterations += 1;
        self.total_discovered += iteration.discovered;
        self.agent_failures += iteration
            .agents
            .values()
            .filter(|a| a.error.is_some())
            .count();

        for doc in &iteration.documents {
            self.seen_documents.insert(doc.key());
            self.fields
                .extend(doc.fields.iter().map(|f| f.trim().to_lowercase()));
        }
        self.documents_processed = self.seen_documents.len();

        let Some(report) = &iteration.report else {
            self.empty_reports += 1;
            return;
        };

        self.total_gaps += report.gaps.len();
        self.total_hypotheses += report.hypotheses.len();
        self.total_experiments += report.experiments.len();
        self.total_directions += report.directions.len();
        self.fields
            .extend(report.fields.iter().map(|f| f.trim().to_lowercase()));
        self.fields.retain(|f| !f.is_empty());

        for h in &report.hypotheses {
            if h.novelty == NoveltyLevel::Breakthrough {
                self.offer(Breakthrough {
                    iteration_id: iteration.id,
                    kind: BreakthroughKind::NovelHypothesis,
                    title: h.statement.clone(),
                    detail: h.rationale.clone(),
                });
            }
        }
        for g in &report.gaps {
            if g.severity == GapSeverity::Critical {
                self.offer(Breakthrough {
                    iteration_id: iteration.id,
                    kind: BreakthroughKind::CriticalGap,
                    title: g.title.clone(),
                    detail: g.description.clone(),
                });
            }
        }
        for d in &report.directions {
            if d.potential == Potential::High {
                self.offer(Breakthrough {
                    iteration_id: iteration.id,
                    kind: BreakthroughKind::HighPotentialDirection,
                    title: d.title.clone(),
                    detail: d.description.clone(),
                });
            }
        }
    }

    /// 插入到第一个优先级更低的条目之前，然后截断
    fn offer(&mut self, item: Breakthrough) {
        let rank = item.kind.rank();
        let pos = self
            .breakthroughs
            .iter()
            .position(|b| b.kind.rank() < rank)
            .unwrap_or(self.breakthroughs.len());
        if pos >= self.limit {
            return;
        }
        self.breakthroughs.insert(pos, item);
        self.breakthroughs.truncate(self.limit);
    }

    /// 按优先级取前 n 条
    pub fn top(&self, n: usize) -> &[Breakthrough] {
        &self.breakthroughs[..n.min(self.breakthroughs.len())]
    }
}
