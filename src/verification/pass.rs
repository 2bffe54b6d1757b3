//! 校验流程
//!
//! 假设检查与溯源检查是两条单 Agent 流水线，经由同一个执行器并发运行；
//! 循环质量在两者完成后本地计算。任何一项检查失败都只记录错误，不影响迭代本身。

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future;
use serde::de::DeserializeOwned;

use crate::document::Document;
use crate::engine::Iteration;
use crate::llm::LlmClient;
use crate::pipeline::{
    AgentDescriptor, AgentOutput, NoopObserver, Pipeline, PipelineExecutor, PipelineInput,
};
use crate::report::ResearchReport;
use crate::verification::hypothesis::hypothesis_agent;
use crate::verification::loop_quality::{self, derive_health, external_alerts, LoopQualityInput};
use crate::verification::source::source_agent;
use crate::verification::types::{
    HealthStatus, HypothesisCheck, NoveltyTrend, QueueHealth, SourceCheck, VerificationRecord,
    VerificationSettings,
};

/// 一次校验的上下文（全部借用自引擎快照）
#[derive(Debug, Clone, Copy)]
pub struct VerificationContext<'a> {
    pub documents: &'a [Document],
    pub guidance: &'a str,
    /// 已知领域词表
    pub field_vocabulary: &'a BTreeSet<String>,
    pub history: &'a [Iteration],
    pub queue_len: usize,
    pub batch_size: usize,
}

pub struct VerificationPass {
    executor: PipelineExecutor,
}

impl VerificationPass {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            executor: PipelineExecutor::new(llm),
        }
    }

    pub fn with_agent_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.executor = self.executor.with_agent_timeout(timeout);
        self
    }

    /// 按开关运行各项检查并汇总健康度
    pub async fn verify(
        &self,
        report: Option<&ResearchReport>,
        ctx: &VerificationContext<'_>,
        settings: &VerificationSettings,
    ) -> VerificationRecord {
        let mut errors = Vec::new();

        let hypothesis_job = async {
            match report {
                Some(r) if settings.hypotheses && !r.hypotheses.is_empty() => {
                    Some(self.check::<HypothesisCheck>(hypothesis_agent(r), ctx).await)
                }
                _ => None,
            }
        };
        let source_job = async {
            match report {
                Some(r) if settings.sources => {
                    Some(self.check::<SourceCheck>(source_agent(r, ctx.field_vocabulary), ctx).await)
                }
                _ => None,
            }
        };
        let (hypotheses, sources) = future::join(hypothesis_job, source_job).await;

        let hypotheses = match hypotheses {
            Some(Ok(mut check)) => {
                check.aggregate_novelty();
                Some(check)
            }
            Some(Err(e)) => {
                errors.push(format!("hypothesis check failed: {}", e));
                None
            }
            None => None,
        };
        let sources = match sources {
            Some(Ok(check)) => Some(check),
            Some(Err(e)) => {
                errors.push(format!("source check failed: {}", e));
                None
            }
            None => None,
        };

        let loop_quality = settings.loop_quality.then(|| {
            loop_quality::assess(&LoopQualityInput {
                report,
                hypotheses: hypotheses.as_ref(),
                sources: sources.as_ref(),
                history: ctx.history,
                documents: ctx.documents,
                queue_len: ctx.queue_len,
                batch_size: ctx.batch_size,
            })
        });

        let health = match &loop_quality {
            Some(quality) => quality.overall_health,
            None if settings.hypotheses || settings.sources => {
                let alerts = external_alerts(report.is_some(), hypotheses.as_ref(), sources.as_ref());
                derive_health(&alerts, NoveltyTrend::Insufficient, QueueHealth::Healthy)
            }
            None => HealthStatus::Healthy,
        };

        for e in &errors {
            tracing::warn!("Verification: {}", e);
        }
        tracing::info!(
            health = ?health,
            hypotheses = hypotheses.is_some(),
            sources = sources.is_some(),
            loop_quality = loop_quality.is_some(),
            "Verification complete"
        );

        VerificationRecord {
            hypotheses,
            sources,
            loop_quality,
            health,
            errors,
        }
    }

    /// 把单个检查 Agent 包装成流水线运行，再把输出还原为强类型
    async fn check<T: DeserializeOwned>(
        &self,
        agent: AgentDescriptor,
        ctx: &VerificationContext<'_>,
    ) -> Result<T, String> {
        let id = agent.id.clone();
        let pipeline = Pipeline::new(id.clone(), vec![agent], id.clone()).map_err(|e| e.to_string())?;
        let input = PipelineInput::new(ctx.documents.to_vec(), ctx.guidance);
        let result = self.executor.run(&pipeline, &input, &NoopObserver).await;

        match result.outputs.get(&id) {
            Some(AgentOutput::Complete(value)) => {
                serde_json::from_value(value.clone()).map_err(|e| e.to_string())
            }
            Some(AgentOutput::Failed { error }) => Err(error.clone()),
            None => Err(format!("{} produced no output", id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, MockLlmClient};
    use crate::report::Hypothesis;

    const HYPOTHESIS_REPLY: &str = r#"{"verdicts": [
        {"hypothesis": "h1", "novelty": "novel", "evidence": "moderate", "feasibility": "feasible", "confidence": 80},
        {"hypothesis": "h2", "novelty": "incremental", "confidence": 60}
    ]}"#;
    const SOURCE_REPLY: &str =
        r#"{"trustScore": 85, "hallucinationFlags": [], "fieldAlignment": 90, "gapRelevance": 70}"#;

    fn report() -> ResearchReport {
        ResearchReport {
            summary: "s".into(),
            hypotheses: vec![
                Hypothesis {
                    statement: "h1".into(),
                    ..Hypothesis::default()
                },
                Hypothesis {
                    statement: "h2".into(),
                    ..Hypothesis::default()
                },
            ],
            ..ResearchReport::default()
        }
    }

    fn context<'a>(docs: &'a [Document], vocab: &'a BTreeSet<String>) -> VerificationContext<'a> {
        VerificationContext {
            documents: docs,
            guidance: "",
            field_vocabulary: vocab,
            history: &[],
            queue_len: 5,
            batch_size: 3,
        }
    }

    #[tokio::test]
    async fn test_all_checks() {
        let llm = MockLlmClient::new()
            .respond("Hypothesis Verifier", HYPOTHESIS_REPLY)
            .respond("Source Verifier", SOURCE_REPLY);
        let pass = VerificationPass::new(Arc::new(llm));
        let docs = vec![Document::new("Paper", "body")];
        let vocab = BTreeSet::new();
        let report = report();

        let record = pass
            .verify(Some(&report), &context(&docs, &vocab), &VerificationSettings::default())
            .await;

        let hypotheses = record.hypotheses.unwrap();
        assert_eq!(hypotheses.verdicts.len(), 2);
        assert_eq!(hypotheses.overall_novelty_score, 75);
        assert_eq!(record.sources.unwrap().trust_score, 85);
        assert!(record.loop_quality.is_some());
        assert_eq!(record.health, HealthStatus::Healthy);
        assert!(record.errors.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_checks_are_omitted() {
        let llm = Arc::new(MockLlmClient::new());
        let pass = VerificationPass::new(llm.clone());
        let docs = vec![Document::new("Paper", "body")];
        let vocab = BTreeSet::new();
        let settings = VerificationSettings {
            hypotheses: false,
            sources: false,
            loop_quality: true,
            pause_on_critical: false,
        };
        let report = report();

        let record = pass.verify(Some(&report), &context(&docs, &vocab), &settings).await;

        assert!(record.hypotheses.is_none());
        assert!(record.sources.is_none());
        assert!(record.loop_quality.is_some());
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_check_is_recorded_not_fatal() {
        let llm = MockLlmClient::new()
            .respond("Hypothesis Verifier", HYPOTHESIS_REPLY)
            .fail("Source Verifier", LlmError::Network("down".into()));
        let pass = VerificationPass::new(Arc::new(llm));
        let docs = vec![Document::new("Paper", "body")];
        let vocab = BTreeSet::new();
        let report = report();

        let record = pass
            .verify(Some(&report), &context(&docs, &vocab), &VerificationSettings::default())
            .await;

        assert!(record.hypotheses.is_some());
        assert!(record.sources.is_none());
        assert_eq!(record.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_no_hypotheses_skips_hypothesis_check() {
        let llm = Arc::new(MockLlmClient::new().respond("Source Verifier", SOURCE_REPLY));
        let pass = VerificationPass::new(llm.clone());
        let docs = vec![Document::new("Paper", "body")];
        let vocab = BTreeSet::new();
        let report = ResearchReport {
            summary: "s".into(),
            ..ResearchReport::default()
        };

        let record = pass
            .verify(Some(&report), &context(&docs, &vocab), &VerificationSettings::default())
            .await;

        assert!(record.hypotheses.is_none());
        assert!(record.sources.is_some());
        assert_eq!(llm.call_count(), 1);
    }
}
