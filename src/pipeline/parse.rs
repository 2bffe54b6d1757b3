//! LLM 输出解析
//!
//! 从自由文本中提取 JSON（```json ... ``` 代码块、任意 ``` 代码块或首个 `{` 到末个 `}`）并解析为对象。

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

fn fenced_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").expect("valid regex"))
}

/// 从文本中提取 JSON 片段
pub fn extract_json(output: &str) -> Option<&str> {
    let trimmed = output.trim();

    if let Some(caps) = fenced_block().captures(trimmed) {
        if let Some(body) = caps.get(1) {
            let body = body.as_str().trim();
            if body.starts_with('{') {
                return Some(body);
            }
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}

/// 解析为 JSON 对象；非对象或格式错误时返回错误文本
pub fn parse_json_object(output: &str) -> Result<Value, String> {
    let json_str = extract_json(output).ok_or_else(|| {
        format!("no JSON object in output: {}", preview(output))
    })?;
    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| format!("JSON parse error: {}: {}", e, preview(json_str)))?;
    if !value.is_object() {
        return Err("expected a JSON object".to_string());
    }
    Ok(value)
}

/// 解析为指定结构，再转回 Value（用于校验报告等强类型输出）
pub fn parse_typed<T>(output: &str) -> Result<Value, String>
where
    T: DeserializeOwned + Serialize,
{
    let value = parse_json_object(output)?;
    let typed: T = serde_json::from_value(value).map_err(|e| format!("schema error: {}", e))?;
    serde_json::to_value(typed).map_err(|e| e.to_string())
}

fn preview(text: &str) -> String {
    let mut s: String = text.chars().take(120).collect();
    if text.chars().count() > 120 {
        s.push('…');
    }
    s
}
