//! LLM客户端公共类型

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// LLM Provider类型
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    #[serde(rename = "claude")]
    Claude,
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "ollama")]
    Ollama,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Claude,
        ProviderKind::Gemini,
        ProviderKind::OpenAI,
        ProviderKind::Ollama,
    ];

    /// 展示名称
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Claude => "Claude (Anthropic)",
            ProviderKind::Gemini => "Gemini (Google)",
            ProviderKind::OpenAI => "GPT (OpenAI)",
            ProviderKind::Ollama => "Ollama (Local)",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Claude => "claude-sonnet-4-20250514",
            ProviderKind::Gemini => "gemini-2.5-flash",
            ProviderKind::OpenAI => "gpt-4-turbo-preview",
            ProviderKind::Ollama => "llama2",
        }
    }

    /// 默认凭据环境变量，本地服务不需要凭据
    pub fn default_api_key_ref(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Claude => Some("ANTHROPIC_API_KEY"),
            ProviderKind::Gemini => Some("GEMINI_API_KEY"),
            ProviderKind::OpenAI => Some("OPENAI_API_KEY"),
            ProviderKind::Ollama => None,
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Claude => "https://api.anthropic.com",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com",
            ProviderKind::OpenAI => "https://api.openai.com/v1",
            ProviderKind::Ollama => "http://localhost:11434",
        }
    }

    /// 本地模型通常更慢
    pub fn default_timeout_secs(&self) -> u64 {
        match self {
            ProviderKind::Ollama => 120,
            _ => 60,
        }
    }

    pub fn requires_api_key(&self) -> bool {
        self.default_api_key_ref().is_some()
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Claude => write!(f, "claude"),
            ProviderKind::Gemini => write!(f, "gemini"),
            ProviderKind::OpenAI => write!(f, "openai"),
            ProviderKind::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = LlmError;

    /// 精确匹配，不做大小写归一化
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "claude" => Ok(ProviderKind::Claude),
            "gemini" => Ok(ProviderKind::Gemini),
            "openai" => Ok(ProviderKind::OpenAI),
            "ollama" => Ok(ProviderKind::Ollama),
            _ => Err(LlmError::UnknownProvider(s.to_string())),
        }
    }
}

/// LLM调用相关错误
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LlmError {
    #[error("Unknown provider: '{0}' (expected one of: claude, gemini, openai, ollama)")]
    UnknownProvider(String),

    #[error("Provider {provider} is unavailable: {reason}")]
    ProviderUnavailable {
        provider: ProviderKind,
        reason: String,
    },

    #[error("Generation failed ({}): {message}", if *retryable { "retryable" } else { "not retryable" })]
    GenerationFailed { retryable: bool, message: String },
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::GenerationFailed { retryable: true, .. })
    }
}

/// Provider可用性状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    /// 已配置凭据
    Configured,
    /// 本地服务运行中
    Running,
    /// 缺少凭据或服务未运行
    Missing,
}

impl std::fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderStatus::Configured => write!(f, "configured"),
            ProviderStatus::Running => write!(f, "running"),
            ProviderStatus::Missing => write!(f, "missing"),
        }
    }
}

/// 单个Provider的探测结果
#[derive(Debug, Clone, Serialize)]
pub struct ProviderAvailability {
    pub kind: ProviderKind,
    pub status: ProviderStatus,
}

impl ProviderAvailability {
    pub fn is_usable(&self) -> bool {
        self.status != ProviderStatus::Missing
    }
}
