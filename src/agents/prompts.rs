//! 提示词片段：文献、依赖输出与引导文本的渲染

use crate::document::Document;
use crate::pipeline::{AgentContext, AgentOutput};

/// 依赖失败时在提示词中的占位
pub const UNAVAILABLE: &str = "(unavailable)";

/// 渲染文献列表；每篇正文截断到 max_body_chars 个字符
pub fn render_documents(documents: &[Document], max_body_chars: usize) -> String {
    if documents.is_empty() {
        return "(no documents)".to_string();
    }
    documents
        .iter()
        .enumerate()
        .map(|(i, doc)| {
            let mut header = format!("### [{}] {}", i + 1, doc.title.trim());
            if !doc.authors.is_empty() {
                header.push_str(&format!("\nAuthors: {}", doc.authors.join(", ")));
            }
            if let Some(year) = doc.year {
                header.push_str(&format!("\nYear: {}", year));
            }
            if !doc.fields.is_empty() {
                header.push_str(&format!("\nFields: {}", doc.fields.join(", ")));
            }
            format!("{}\n\n{}", header, truncate(doc.body.trim(), max_body_chars))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 渲染单个依赖输出；失败的依赖渲染为占位
pub fn render_dependency(output: Option<&AgentOutput>) -> String {
    match output {
        Some(AgentOutput::Complete(value)) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
        Some(AgentOutput::Failed { .. }) | None => UNAVAILABLE.to_string(),
    }
}

/// 渲染全部已声明依赖
pub fn render_dependencies(ctx: &AgentContext<'_>) -> String {
    if ctx.dependencies.is_empty() {
        return "(none)".to_string();
    }
    ctx.dependencies
        .iter()
        .map(|(id, output)| format!("### {}\n{}", id, render_dependency(Some(output))))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn render_guidance(guidance: &str) -> String {
    let guidance = guidance.trim();
    if guidance.is_empty() {
        "(no specific guidance)".to_string()
    } else {
        guidance.to_string()
    }
}

pub fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        return "(none)".to_string();
    }
    items
        .iter()
        .map(|item| format!("- {}", item.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// 标准用户消息：引导 + 文献 + 依赖 + 任务说明
pub fn standard_prompt(ctx: &AgentContext<'_>, task: &str) -> String {
    format!(
        "## Research guidance\n{}\n\n## Documents\n{}\n\n## Inputs from other agents\n{}\n\n## Task\n{}",
        render_guidance(ctx.guidance),
        render_documents(ctx.documents, 3000),
        render_dependencies(ctx),
        task
    )
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push('…');
    out
}
