//! 校验类型定义
//!
//! 三类检查的结果（假设 / 溯源 / 循环质量）、健康度、告警与校验统计。
//! LLM 给出的评分字段宽松解析：数字或数字字符串均可，最终钳制到 0–100。

use serde::{Deserialize, Deserializer, Serialize};

/// 每类检查独立开关
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationSettings {
    pub hypotheses: bool,
    pub sources: bool,
    pub loop_quality: bool,
    /// 健康度为 critical 时自动进入检查点
    pub pause_on_critical: bool,
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self {
            hypotheses: true,
            sources: true,
            loop_quality: true,
            pause_on_critical: false,
        }
    }
}

impl VerificationSettings {
    pub fn any_enabled(&self) -> bool {
        self.hypotheses || self.sources || self.loop_quality
    }
}

/// 宽松评分：接受 85 / 85.5 / "85"，钳制到 0–100；其他值（null 等）记为 0
pub(crate) fn lenient_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
        Other(serde::de::IgnoredAny),
    }

    let value = match Raw::deserialize(deserializer)? {
        Raw::Number(n) => n,
        Raw::Text(s) => s.trim().trim_end_matches('%').parse::<f64>().unwrap_or(0.0),
        Raw::Other(_) => 0.0,
    };
    Ok(clamp_score(value))
}

pub fn clamp_score(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}

/// 已有文献中是否已有此想法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum NoveltyVerdict {
    Novel,
    #[default]
    Incremental,
    Known,
}

impl From<String> for NoveltyVerdict {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "novel" | "new" | "original" => NoveltyVerdict::Novel,
            "known" | "existing" | "established" => NoveltyVerdict::Known,
            _ => NoveltyVerdict::Incremental,
        }
    }
}

impl NoveltyVerdict {
    /// 折算为新颖度分数
    pub fn points(&self) -> u32 {
        match self {
            NoveltyVerdict::Novel => 100,
            NoveltyVerdict::Incremental => 50,
            NoveltyVerdict::Known => 0,
        }
    }
}

/// 证据支持程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum EvidenceLevel {
    Strong,
    Moderate,
    #[default]
    Weak,
    Unsupported,
}

impl From<String> for EvidenceLevel {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "strong" => EvidenceLevel::Strong,
            "moderate" | "medium" => EvidenceLevel::Moderate,
            "unsupported" | "none" => EvidenceLevel::Unsupported,
            _ => EvidenceLevel::Weak,
        }
    }
}

/// 可行性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum Feasibility {
    Feasible,
    #[default]
    Challenging,
    Infeasible,
}

impl From<String> for Feasibility {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "feasible" | "high" | "easy" => Feasibility::Feasible,
            "infeasible" | "impossible" | "low" => Feasibility::Infeasible,
            _ => Feasibility::Challenging,
        }
    }
}

/// 单条假设的评估
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HypothesisVerdict {
    pub hypothesis: String,
    pub novelty: NoveltyVerdict,
    pub evidence: EvidenceLevel,
    pub feasibility: Feasibility,
    #[serde(deserialize_with = "lenient_score")]
    pub confidence: u8,
    pub note: String,
}

/// 假设检查结果
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HypothesisCheck {
    pub verdicts: Vec<HypothesisVerdict>,
    /// 0–100，由各条判定汇总
    #[serde(deserialize_with = "lenient_score", alias = "overall_novelty_score")]
    pub overall_novelty_score: u8,
}

impl HypothesisCheck {
    /// 以本地规则汇总新颖度（novel=100, incremental=50, known=0 的均值）
    pub fn aggregate_novelty(&mut self) {
        if self.verdicts.is_empty() {
            self.overall_novelty_score = 0;
            return;
        }
        let total: u32 = self.verdicts.iter().map(|v| v.novelty.points()).sum();
        self.overall_novelty_score = clamp_score(total as f64 / self.verdicts.len() as f64);
    }
}

/// 幻觉标记严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum FlagSeverity {
    #[default]
    Warning,
    Critical,
}

impl From<String> for FlagSeverity {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "critical" | "high" | "severe" => FlagSeverity::Critical,
            _ => FlagSeverity::Warning,
        }
    }
}

/// 报告中与文献不符或无法溯源的陈述
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HallucinationFlag {
    pub claim: String,
    pub reason: String,
    pub severity: FlagSeverity,
}

/// 溯源检查结果
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SourceCheck {
    #[serde(deserialize_with = "lenient_score", alias = "trust_score")]
    pub trust_score: u8,
    #[serde(alias = "hallucination_flags")]
    pub hallucination_flags: Vec<HallucinationFlag>,
    /// 报告领域与已知领域词表的一致程度
    #[serde(deserialize_with = "lenient_score", alias = "field_alignment")]
    pub field_alignment: u8,
    /// 空白是否对应文献真实的局限
    #[serde(deserialize_with = "lenient_score", alias = "gap_relevance")]
    pub gap_relevance: u8,
}

impl SourceCheck {
    pub fn critical_flags(&self) -> usize {
        self.hallucination_flags
            .iter()
            .filter(|f| f.severity == FlagSeverity::Critical)
            .count()
    }
}

/// 健康度（有序：healthy < warning < critical）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Healthy,
    Warning,
    Critical,
}

/// 新颖度趋势（最近若干轮）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoveltyTrend {
    /// 样本不足
    #[default]
    Insufficient,
    Rising,
    Stable,
    Stagnating,
    Declining,
    SharplyDeclining,
}

/// 队列健康度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueHealth {
    Starved,
    Low,
    #[default]
    Healthy,
    Backlogged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    DuplicateHypotheses,
    Hallucination,
    LowTrust,
    NoNovelty,
    EmptyReport,
    QueueStarved,
    LowDiversity,
    NoveltyDecline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
}

impl Alert {
    pub fn warning(kind: AlertKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: AlertSeverity::Warning,
            message: message.into(),
        }
    }

    pub fn critical(kind: AlertKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: AlertSeverity::Critical,
            message: message.into(),
        }
    }
}

/// 循环质量（本地计算）
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopQuality {
    pub overall_health: HealthStatus,
    pub novelty_trend: NoveltyTrend,
    /// 0–100：近几轮文献领域的多样性
    pub query_diversity: u8,
    /// 已覆盖的不同领域数
    pub field_coverage: usize,
    /// 与历史迭代重复的假设数
    pub duplicate_hypotheses: usize,
    pub queue_health: QueueHealth,
    pub alerts: Vec<Alert>,
}

/// 一轮迭代的校验记录；关闭的检查对应字段为 None
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hypotheses: Option<HypothesisCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<SourceCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_quality: Option<LoopQuality>,
    pub health: HealthStatus,
    /// 检查本身失败（LLM 不可用或输出无法解析）时的说明
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// 跨迭代的校验统计
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationStats {
    pub iterations_verified: u32,
    pub healthy: u32,
    pub warning: u32,
    pub critical: u32,
    pub average_trust_score: Option<f64>,
    pub average_novelty_score: Option<f64>,
    pub total_hallucination_flags: usize,
    pub critical_hallucination_flags: usize,
    pub duplicate_hypotheses: usize,
    pub last_health: Option<HealthStatus>,
    #[serde(skip)]
    trust: RunningMean,
    #[serde(skip)]
    novelty: RunningMean,
}

/// 0–100 分数的累计均值（只保存总和与个数）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct RunningMean {
    sum: u64,
    count: u64,
}

impl RunningMean {
    /// 加入一个样本，返回保留一位小数的均值
    fn push(&mut self, score: u8) -> f64 {
        self.sum += u64::from(score);
        self.count += 1;
        (self.sum as f64 / self.count as f64 * 10.0).round() / 10.0
    }
}

impl VerificationStats {
    pub fn record(&mut self, record: &VerificationRecord) {
        self.iterations_verified += 1;
        match record.health {
            HealthStatus::Healthy => self.healthy += 1,
            HealthStatus::Warning => self.warning += 1,
            HealthStatus::Critical => self.critical += 1,
        }
        self.last_health = Some(record.health);

        if let Some(sources) = &record.sources {
            self.average_trust_score = Some(self.trust.push(sources.trust_score));
            self.total_hallucination_flags += sources.hallucination_flags.len();
            self.critical_hallucination_flags += sources.critical_flags();
        }
        if let Some(hypotheses) = &record.hypotheses {
            self.average_novelty_score = Some(self.novelty.push(hypotheses.overall_novelty_score));
        }
        if let Some(quality) = &record.loop_quality {
            self.duplicate_hypotheses += quality.duplicate_hypotheses;
        }
    }
}
