//! 校验：每轮迭代后对报告做三项独立检查
//!
//! - 假设检查（LLM）：新颖度 / 证据 / 可行性
//! - 溯源检查（LLM）：陈述能否在文献中找到依据
//! - 循环质量（本地）：趋势、多样性、重复与队列健康

pub mod hypothesis;
pub mod loop_quality;
pub mod pass;
pub mod source;
pub mod types;

pub use loop_quality::{assess, LoopQualityInput};
pub use pass::{VerificationContext, VerificationPass};
pub use types::{
    Alert, AlertKind, AlertSeverity, EvidenceLevel, Feasibility, FlagSeverity, HallucinationFlag,
    HealthStatus, HypothesisCheck, HypothesisVerdict, LoopQuality, NoveltyTrend, NoveltyVerdict,
    QueueHealth, SourceCheck, VerificationRecord, VerificationSettings, VerificationStats,
};
