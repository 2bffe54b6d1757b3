//! 循环质量检查（纯本地计算，不调用外部服务）
//!
//! 基于历史迭代评估：新颖度趋势、文献领域多样性、领域覆盖、重复假设与队列健康，
//! 并与另外两项检查的结果一起汇总为告警与整体健康度。

use std::collections::{BTreeSet, HashSet};

use crate::document::{normalize_key, Document};
use crate::engine::Iteration;
use crate::report::ResearchReport;
use crate::verification::types::{
    Alert, AlertKind, AlertSeverity, HealthStatus, HypothesisCheck, LoopQuality, NoveltyTrend,
    QueueHealth, SourceCheck,
};

/// 趋势与多样性的观察窗口（迭代数）
pub const TREND_WINDOW: usize = 5;
const MIN_TREND_SAMPLES: usize = 3;
const BACKLOG_THRESHOLD: usize = 40;
const LOW_TRUST_THRESHOLD: u8 = 40;
const LOW_DIVERSITY_THRESHOLD: u8 = 30;

/// 评估所需的输入（全部借用，评估本身无副作用）
#[derive(Debug, Clone, Copy)]
pub struct LoopQualityInput<'a> {
    pub report: Option<&'a ResearchReport>,
    pub hypotheses: Option<&'a HypothesisCheck>,
    pub sources: Option<&'a SourceCheck>,
    /// 已写入历史的迭代（不含当前轮）
    pub history: &'a [Iteration],
    pub documents: &'a [Document],
    pub queue_len: usize,
    pub batch_size: usize,
}

pub fn assess(input: &LoopQualityInput<'_>) -> LoopQuality {
    let novelty_trend = novelty_trend(input);
    let query_diversity = query_diversity(input);
    let field_coverage = field_coverage(input);
    let duplicate_hypotheses = duplicate_hypotheses(input);
    let queue_health = queue_health(input.queue_len, input.batch_size);

    let mut alerts = external_alerts(input.report.is_some(), input.hypotheses, input.sources);

    if duplicate_hypotheses > 0 {
        let total = input.report.map(|r| r.hypotheses.len()).unwrap_or(0);
        let message = format!(
            "{} of {} hypotheses repeat earlier iterations",
            duplicate_hypotheses, total
        );
        if total >= 2 && duplicate_hypotheses == total {
            alerts.push(Alert::critical(AlertKind::DuplicateHypotheses, message));
        } else {
            alerts.push(Alert::warning(AlertKind::DuplicateHypotheses, message));
        }
    }
    if queue_health == QueueHealth::Starved {
        alerts.push(Alert::warning(
            AlertKind::QueueStarved,
            "Work queue is empty; no new documents were discovered",
        ));
    }
    if query_diversity < LOW_DIVERSITY_THRESHOLD {
        alerts.push(Alert::warning(
            AlertKind::LowDiversity,
            format!("Document selection diversity is low ({}%)", query_diversity),
        ));
    }
    if matches!(
        novelty_trend,
        NoveltyTrend::Declining | NoveltyTrend::SharplyDeclining
    ) {
        alerts.push(Alert::warning(
            AlertKind::NoveltyDecline,
            "Hypothesis novelty is declining across recent iterations",
        ));
    }

    let overall_health = derive_health(&alerts, novelty_trend, queue_health);

    LoopQuality {
        overall_health,
        novelty_trend,
        query_diversity,
        field_coverage,
        duplicate_hypotheses,
        queue_health,
        alerts,
    }
}

/// 来自报告本身与两项 LLM 检查的告警（循环质量关闭时也用于健康度判定）
pub fn external_alerts(
    has_report: bool,
    hypotheses: Option<&HypothesisCheck>,
    sources: Option<&SourceCheck>,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if !has_report {
        alerts.push(Alert::warning(
            AlertKind::EmptyReport,
            "The pipeline produced no report this iteration",
        ));
    }

    if let Some(sources) = sources {
        let critical = sources.critical_flags();
        if critical > 0 {
            alerts.push(Alert::critical(
                AlertKind::Hallucination,
                format!("{} claim(s) contradict or are absent from the sources", critical),
            ));
        } else if !sources.hallucination_flags.is_empty() {
            alerts.push(Alert::warning(
                AlertKind::Hallucination,
                format!(
                    "{} claim(s) could not be traced to the sources",
                    sources.hallucination_flags.len()
                ),
            ));
        }
        if sources.trust_score < LOW_TRUST_THRESHOLD {
            alerts.push(Alert::warning(
                AlertKind::LowTrust,
                format!("Source trust score is {}", sources.trust_score),
            ));
        }
    }

    if let Some(hypotheses) = hypotheses {
        let known = hypotheses
            .verdicts
            .iter()
            .filter(|v| v.novelty.points() == 0)
            .count();
        if !hypotheses.verdicts.is_empty() && known == hypotheses.verdicts.len() {
            alerts.push(Alert::warning(
                AlertKind::NoNovelty,
                "Every hypothesis is already known in the literature",
            ));
        }
    }

    alerts
}

/// critical：任一 critical 告警，或新颖度急剧下降且队列枯竭；
/// warning：任一 warning 告警，或新颖度停滞 / 下降
pub fn derive_health(alerts: &[Alert], trend: NoveltyTrend, queue: QueueHealth) -> HealthStatus {
    let has = |severity: AlertSeverity| alerts.iter().any(|a| a.severity == severity);

    if has(AlertSeverity::Critical)
        || (trend == NoveltyTrend::SharplyDeclining && queue == QueueHealth::Starved)
    {
        HealthStatus::Critical
    } else if has(AlertSeverity::Warning)
        || matches!(trend, NoveltyTrend::Stagnating | NoveltyTrend::Declining)
    {
        HealthStatus::Warning
    } else {
        HealthStatus::Healthy
    }
}

fn novelty_trend(input: &LoopQualityInput<'_>) -> NoveltyTrend {
    let mut scores: Vec<i32> = input
        .history
        .iter()
        .filter_map(|it| it.verification.hypotheses.as_ref())
        .map(|h| i32::from(h.overall_novelty_score))
        .collect();
    if let Some(current) = input.hypotheses {
        scores.push(i32::from(current.overall_novelty_score));
    }
    let window = &scores[scores.len().saturating_sub(TREND_WINDOW)..];
    classify_trend(window)
}

pub fn classify_trend(scores: &[i32]) -> NoveltyTrend {
    if scores.len() < MIN_TREND_SAMPLES {
        return NoveltyTrend::Insufficient;
    }
    let (Some(first), Some(last)) = (scores.first(), scores.last()) else {
        return NoveltyTrend::Insufficient;
    };
    let delta = last - first;
    let spread = scores.iter().max().unwrap_or(last) - scores.iter().min().unwrap_or(last);

    if delta >= 10 {
        NoveltyTrend::Rising
    } else if delta <= -30 {
        NoveltyTrend::SharplyDeclining
    } else if delta <= -10 {
        NoveltyTrend::Declining
    } else if spread < 5 {
        NoveltyTrend::Stagnating
    } else {
        NoveltyTrend::Stable
    }
}

/// 近几轮文献领域标签中不同领域所占比例；没有任何标签时视为 100
fn query_diversity(input: &LoopQualityInput<'_>) -> u8 {
    let recent = input
        .history
        .iter()
        .rev()
        .take(TREND_WINDOW - 1)
        .flat_map(|it| it.documents.iter());
    let mut total = 0usize;
    let mut distinct = HashSet::new();
    for doc in recent.chain(input.documents.iter()) {
        for field in &doc.fields {
            let key = normalize_key(field);
            if key.is_empty() {
                continue;
            }
            total += 1;
            distinct.insert(key);
        }
    }
    if total == 0 {
        return 100;
    }
    ((distinct.len() * 100) / total).min(100) as u8
}

fn field_coverage(input: &LoopQualityInput<'_>) -> usize {
    let mut fields = BTreeSet::new();
    let reports = input
        .history
        .iter()
        .filter_map(|it| it.report.as_ref())
        .chain(input.report);
    for report in reports {
        fields.extend(report.fields.iter().map(|f| normalize_key(f)));
    }
    let documents = input
        .history
        .iter()
        .flat_map(|it| it.documents.iter())
        .chain(input.documents.iter());
    for doc in documents {
        fields.extend(doc.fields.iter().map(|f| normalize_key(f)));
    }
    fields.remove("");
    fields.len()
}

fn duplicate_hypotheses(input: &LoopQualityInput<'_>) -> usize {
    let Some(report) = input.report else {
        return 0;
    };
    let seen: HashSet<String> = input
        .history
        .iter()
        .filter_map(|it| it.report.as_ref())
        .flat_map(|r| r.hypotheses.iter())
        .map(|h| normalize_key(&h.statement))
        .collect();
    report
        .hypotheses
        .iter()
        .map(|h| normalize_key(&h.statement))
        .filter(|key| !key.is_empty() && seen.contains(key))
        .count()
}

pub fn queue_health(queue_len: usize, batch_size: usize) -> QueueHealth {
    if queue_len == 0 {
        QueueHealth::Starved
    } else if queue_len < batch_size {
        QueueHealth::Low
    } else if queue_len > BACKLOG_THRESHOLD {
        QueueHealth::Backlogged
    } else {
        QueueHealth::Healthy
    }
}
