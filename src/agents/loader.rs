//! 自定义 Agent 加载器
//!
//! 从 TOML 文件加载一条完整流水线：
//!
//! ```toml
//! name = "my-pipeline"
//! report_agent = "scribe"   # 省略时取最后一个 Agent
//!
//! [[agent]]
//! id = "summarizer"
//! system_prompt = "You are ..."
//! template = "Guidance: {guidance}\n\n{documents}"
//!
//! [[agent]]
//! id = "scribe"
//! depends_on = ["summarizer"]
//! system_prompt = "You are the Scribe ..."
//! template = "{dep:summarizer}"
//! ```
//!
//! 模板占位符：`{documents}`、`{guidance}`、`{dependencies}`、`{dep:<id>}`（只能引用已声明的依赖）。
//! 报告 Agent 的输出按研究报告结构解析，其余按任意 JSON 对象解析。

use std::path::Path;
use std::sync::{Arc, OnceLock};

use regex::{Captures, Regex};
use serde::Deserialize;
use thiserror::Error;

use crate::agents::prompts::{render_dependencies, render_dependency, render_documents, render_guidance};
use crate::llm::Provider;
use crate::pipeline::{
    parse_json_object, parse_typed, AgentContext, AgentDescriptor, Pipeline, PipelineError,
};
use crate::report::ResearchReport;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read agent file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid agent file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// 单个 Agent 的定义（[[agent]] 表）
#[derive(Debug, Clone, Deserialize)]
pub struct AgentDefinition {
    pub id: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub system_prompt: String,
    pub template: String,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub provider: Option<Provider>,
}

#[derive(Debug, Clone, Deserialize)]
struct PipelineFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    report_agent: Option<String>,
    #[serde(rename = "agent", default)]
    agents: Vec<AgentDefinition>,
}

fn dep_placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{dep:([A-Za-z0-9_\-]+)\}").expect("valid regex"))
}

fn any_placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{(?:documents|guidance|dependencies|dep:([A-Za-z0-9_\-]+))\}").expect("valid regex")
    })
}

/// 渲染模板（单次替换，替换进来的文本不会再被展开）
pub fn render_template(template: &str, ctx: &AgentContext<'_>) -> String {
    any_placeholder()
        .replace_all(template, |caps: &Captures<'_>| {
            if let Some(dep) = caps.get(1) {
                return render_dependency(ctx.dependencies.get(dep.as_str()));
            }
            match &caps[0] {
                "{documents}" => render_documents(ctx.documents, 3000),
                "{guidance}" => render_guidance(ctx.guidance),
                _ => render_dependencies(ctx),
            }
        })
        .into_owned()
}

impl AgentDefinition {
    fn validate(&self) -> Result<(), PipelineError> {
        if self.id.trim().is_empty() {
            return Err(PipelineError::InvalidDefinition("agent id is empty".into()));
        }
        if self.template.trim().is_empty() {
            return Err(PipelineError::InvalidDefinition(format!(
                "agent {} has an empty template",
                self.id
            )));
        }
        for caps in dep_placeholder().captures_iter(&self.template) {
            let referenced = &caps[1];
            if !self.depends_on.iter().any(|d| d == referenced) {
                return Err(PipelineError::InvalidDefinition(format!(
                    "agent {} references {{dep:{}}} without depending on it",
                    self.id, referenced
                )));
            }
        }
        Ok(())
    }

    /// 转为描述符；is_report 决定输出解析方式
    pub fn into_descriptor(self, is_report: bool) -> Result<AgentDescriptor, PipelineError> {
        self.validate()?;
        let template = Arc::new(self.template);
        let prompt = move |ctx: &AgentContext<'_>| render_template(&template, ctx);

        let mut agent = if is_report {
            AgentDescriptor::external(self.id, self.system_prompt, prompt, parse_typed::<ResearchReport>)
        } else {
            AgentDescriptor::external(self.id, self.system_prompt, prompt, parse_json_object)
        };
        agent = agent.depends_on(self.depends_on).provider(self.provider);
        if let Some(max_tokens) = self.max_tokens {
            agent = agent.max_tokens(max_tokens);
        }
        if let Some(temperature) = self.temperature {
            agent = agent.temperature(temperature);
        }
        Ok(agent)
    }
}

/// 从 TOML 文本构建流水线
pub fn parse_pipeline(content: &str, default_name: &str) -> Result<Pipeline, LoadError> {
    let file: PipelineFile = toml::from_str(content)?;
    let report_agent = file
        .report_agent
        .or_else(|| file.agents.last().map(|a| a.id.clone()))
        .ok_or(PipelineError::Empty)?;

    let agents = file
        .agents
        .into_iter()
        .map(|def| {
            let is_report = def.id == report_agent;
            def.into_descriptor(is_report)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let name = file.name.unwrap_or_else(|| default_name.to_string());
    let pipeline = Pipeline::new(name, agents, report_agent)?;
    tracing::info!(
        pipeline = pipeline.name(),
        agents = pipeline.agents().len(),
        "Loaded custom pipeline"
    );
    Ok(pipeline)
}

/// 从文件加载；文件名（不含扩展名）作为默认流水线名
pub fn load_pipeline(path: impl AsRef<Path>) -> Result<Pipeline, LoadError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let default_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("custom");
    parse_pipeline(&content, default_name)
}
