//! 研究报告：scribe Agent 输出的强类型形式
//!
//! 所有段落默认为空；枚举值大小写不敏感，无法识别时退回中性值，避免一个措辞差异让整份报告解析失败。

use serde::{Deserialize, Serialize};

/// 研究空白的严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum GapSeverity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl From<String> for GapSeverity {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "low" | "minor" => GapSeverity::Low,
            "high" | "major" => GapSeverity::High,
            "critical" | "severe" => GapSeverity::Critical,
            _ => GapSeverity::Medium,
        }
    }
}

/// 假设的新颖程度（报告自评）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum NoveltyLevel {
    #[default]
    Incremental,
    Significant,
    Breakthrough,
}

impl From<String> for NoveltyLevel {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "breakthrough" | "transformative" => NoveltyLevel::Breakthrough,
            "significant" | "high" | "novel" => NoveltyLevel::Significant,
            _ => NoveltyLevel::Incremental,
        }
    }
}

/// 研究方向的潜力
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum Potential {
    Low,
    #[default]
    Medium,
    High,
}

impl From<String> for Potential {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "low" => Potential::Low,
            "high" | "very high" => Potential::High,
            _ => Potential::Medium,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Gap {
    pub title: String,
    pub description: String,
    pub severity: GapSeverity,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Hypothesis {
    pub statement: String,
    pub rationale: String,
    pub novelty: NoveltyLevel,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Experiment {
    pub title: String,
    pub hypothesis: Option<String>,
    pub method: String,
    #[serde(alias = "expected_outcome")]
    pub expected_outcome: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Direction {
    pub title: String,
    pub description: String,
    pub potential: Potential,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CrossFieldConnection {
    pub fields: Vec<String>,
    pub insight: String,
    /// 建议阅读的文献标题（发现新文献的线索）
    #[serde(alias = "suggested_reading")]
    pub suggested_reading: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QuickWin {
    pub title: String,
    pub description: String,
    #[serde(alias = "suggested_reading")]
    pub suggested_reading: Vec<String>,
}

/// 一次迭代的对外结果
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResearchReport {
    pub title: String,
    pub summary: String,
    #[serde(alias = "key_findings")]
    pub key_findings: Vec<String>,
    pub fields: Vec<String>,
    pub gaps: Vec<Gap>,
    pub hypotheses: Vec<Hypothesis>,
    pub experiments: Vec<Experiment>,
    pub directions: Vec<Direction>,
    #[serde(alias = "cross_field_connections")]
    pub cross_field_connections: Vec<CrossFieldConnection>,
    #[serde(alias = "quick_wins")]
    pub quick_wins: Vec<QuickWin>,
}

impl ResearchReport {
    /// 报告中需要溯源的陈述：摘要、关键发现、空白与假设
    pub fn claims(&self) -> Vec<String> {
        let mut claims = Vec::new();
        if !self.summary.trim().is_empty() {
            claims.push(self.summary.clone());
        }
        claims.extend(self.key_findings.iter().cloned());
        claims.extend(
            self.gaps
                .iter()
                .map(|g| format!("Gap: {} - {}", g.title, g.description)),
        );
        claims.extend(
            self.hypotheses
                .iter()
                .map(|h| format!("Hypothesis: {}", h.statement)),
        );
        claims
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_enums() {
        let report: ResearchReport = serde_json::from_str(
            r#"{
                "summary": "s",
                "gaps": [{"title": "g", "severity": "CRITICAL"}],
                "hypotheses": [{"statement": "h", "novelty": "Breakthrough"}],
                "directions": [{"title": "d", "potential": "unclear"}]
            }"#,
        )
        .unwrap();
        assert_eq!(report.gaps[0].severity, GapSeverity::Critical);
        assert_eq!(report.hypotheses[0].novelty, NoveltyLevel::Breakthrough);
        assert_eq!(report.directions[0].potential, Potential::Medium);
        assert!(report.experiments.is_empty());
    }

    #[test]
    fn test_serializes_lowercase_camel_case() {
        let report = ResearchReport {
            gaps: vec![Gap {
                title: "g".into(),
                description: String::new(),
                severity: GapSeverity::High,
            }],
            key_findings: vec!["k".into()],
            ..ResearchReport::default()
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["gaps"][0]["severity"], "high");
        assert_eq!(value["keyFindings"][0], "k");
    }

    #[test]
    fn test_claims_include_gaps_and_hypotheses() {
        let report = ResearchReport {
            summary: "Summary".into(),
            gaps: vec![Gap {
                title: "Missing cohort".into(),
                ..Gap::default()
            }],
            hypotheses: vec![Hypothesis {
                statement: "X causes Y".into(),
                ..Hypothesis::default()
            }],
            ..ResearchReport::default()
        };
        let claims = report.claims();
        assert_eq!(claims.len(), 3);
        assert!(claims[2].contains("X causes Y"));
    }
}
