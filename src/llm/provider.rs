//! 后端提供方：Claude / OpenAI / OpenRouter / Gemini
//!
//! 四者都提供 OpenAI 兼容端点，统一走 OpenAiClient，仅 base_url、默认模型与 API Key 环境变量不同。
//! 未显式指定时根据 API Key 前缀自动识别。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Claude,
    OpenAi,
    OpenRouter,
    Gemini,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::Claude,
        Provider::OpenAi,
        Provider::OpenRouter,
        Provider::Gemini,
    ];

    /// 根据 API Key 前缀识别后端
    pub fn detect(api_key: &str) -> Provider {
        let key = api_key.trim();
        if key.starts_with("sk-ant-") {
            Provider::Claude
        } else if key.starts_with("sk-or-") {
            Provider::OpenRouter
        } else if key.starts_with("AIza") {
            Provider::Gemini
        } else {
            Provider::OpenAi
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            Provider::Claude => "https://api.anthropic.com/v1",
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::OpenRouter => "https://openrouter.ai/api/v1",
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Claude => "claude-sonnet-4-5",
            Provider::OpenAi => "gpt-4o-mini",
            Provider::OpenRouter => "anthropic/claude-sonnet-4.5",
            Provider::Gemini => "gemini-2.0-flash",
        }
    }

    /// 该后端 API Key 所在的环境变量
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::Claude => "ANTHROPIC_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::OpenRouter => "OPENROUTER_API_KEY",
            Provider::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provider::Claude => "claude",
            Provider::OpenAi => "openai",
            Provider::OpenRouter => "openrouter",
            Provider::Gemini => "gemini",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "claude" | "anthropic" => Ok(Provider::Claude),
            "openai" => Ok(Provider::OpenAi),
            "openrouter" => Ok(Provider::OpenRouter),
            "gemini" | "google" => Ok(Provider::Gemini),
            other => Err(format!("unknown provider: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_from_key_prefix() {
        assert_eq!(Provider::detect("sk-ant-api03-xyz"), Provider::Claude);
        assert_eq!(Provider::detect("sk-or-v1-abc"), Provider::OpenRouter);
        assert_eq!(Provider::detect("AIzaSyD-123"), Provider::Gemini);
        assert_eq!(Provider::detect("sk-proj-123"), Provider::OpenAi);
    }

    #[test]
    fn test_parse_provider_names() {
        assert_eq!("Anthropic".parse::<Provider>(), Ok(Provider::Claude));
        assert_eq!("openrouter".parse::<Provider>(), Ok(Provider::OpenRouter));
        assert!("mystery".parse::<Provider>().is_err());
    }
}
