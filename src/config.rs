//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HIVE__*` 覆盖（双下划线表示嵌套，如 `HIVE__ENGINE__BATCH_SIZE=2`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::engine::EngineConfig;
use crate::verification::VerificationSettings;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub verification: VerificationSection,
    #[serde(default)]
    pub sources: SourcesSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 导出文件目录，未设置时用 ./runs
    pub export_dir: Option<PathBuf>,
}

/// [llm] 段：后端选择、Key 环境变量、超时与重试
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// claude / openai / openrouter / gemini；未设置时按 API Key 前缀识别
    pub provider: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// 额外读取的 API Key 环境变量名（如 HIVE_API_KEY）
    pub api_key_env: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            base_url: None,
            api_key_env: None,
            max_retries: default_max_retries(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_max_retries() -> u32 {
    2
}

fn default_request_timeout() -> u64 {
    120
}

/// [engine] 段：批大小、冷却、检查点间隔、队列上限
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    /// 每 N 轮迭代触发一次检查点；0 表示关闭
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: u32,
    /// 迭代上限；0 表示不限
    #[serde(default)]
    pub max_iterations: u32,
    #[serde(default = "default_max_queue")]
    pub max_queue: usize,
    #[serde(default = "default_max_discoveries")]
    pub max_discoveries_per_iteration: usize,
    /// 单个 Agent 调用超时（秒）；0 表示不限
    #[serde(default = "default_agent_timeout")]
    pub agent_timeout_secs: u64,
    /// 同一依赖层内的并发上限；1 表示严格串行
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            cooldown_ms: default_cooldown_ms(),
            checkpoint_interval: default_checkpoint_interval(),
            max_iterations: 0,
            max_queue: default_max_queue(),
            max_discoveries_per_iteration: default_max_discoveries(),
            agent_timeout_secs: default_agent_timeout(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_batch_size() -> usize {
    3
}

fn default_cooldown_ms() -> u64 {
    5000
}

fn default_checkpoint_interval() -> u32 {
    3
}

fn default_max_queue() -> usize {
    50
}

fn default_max_discoveries() -> usize {
    5
}

fn default_agent_timeout() -> u64 {
    180
}

fn default_max_concurrency() -> usize {
    1
}

impl EngineSection {
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            batch_size: self.batch_size,
            cooldown: Duration::from_millis(self.cooldown_ms),
            checkpoint_interval: self.checkpoint_interval,
            max_iterations: (self.max_iterations > 0).then_some(self.max_iterations),
            max_queue: self.max_queue,
            max_discoveries_per_iteration: self.max_discoveries_per_iteration,
            agent_timeout: (self.agent_timeout_secs > 0)
                .then(|| Duration::from_secs(self.agent_timeout_secs)),
            max_concurrency: self.max_concurrency.max(1),
            ..EngineConfig::default()
        }
    }
}

/// [verification] 段：三项检查各自独立开关
#[derive(Debug, Clone, Deserialize)]
pub struct VerificationSection {
    #[serde(default = "default_true")]
    pub hypotheses: bool,
    #[serde(default = "default_true")]
    pub sources: bool,
    #[serde(default = "default_true")]
    pub loop_quality: bool,
    #[serde(default)]
    pub pause_on_critical: bool,
}

impl Default for VerificationSection {
    fn default() -> Self {
        Self {
            hypotheses: true,
            sources: true,
            loop_quality: true,
            pause_on_critical: false,
        }
    }
}

fn default_true() -> bool {
    true
}

impl From<&VerificationSection> for VerificationSettings {
    fn from(section: &VerificationSection) -> Self {
        Self {
            hypotheses: section.hypotheses,
            sources: section.sources,
            loop_quality: section.loop_quality,
            pause_on_critical: section.pause_on_critical,
        }
    }
}

/// [sources] 段：发现新文献时用于补全的文献源
#[derive(Debug, Clone, Deserialize)]
pub struct SourcesSection {
    #[serde(default)]
    pub semantic_scholar: bool,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_lookup_limit")]
    pub limit: usize,
    #[serde(default = "default_source_timeout")]
    pub timeout_secs: u64,
}

impl Default for SourcesSection {
    fn default() -> Self {
        Self {
            semantic_scholar: false,
            api_base: default_api_base(),
            limit: default_lookup_limit(),
            timeout_secs: default_source_timeout(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.semanticscholar.org/graph/v1".to_string()
}

fn default_lookup_limit() -> usize {
    3
}

fn default_source_timeout() -> u64 {
    15
}

/// 从 config 目录加载配置，环境变量 HIVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HIVE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HIVE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
