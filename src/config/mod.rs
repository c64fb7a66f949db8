use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use crate::llm::client::ProviderKind;

/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "research-pilot.toml";

/// 应用程序配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Config {
    /// 输出路径
    pub output_path: PathBuf,

    /// LLM模型配置
    pub llm: ProviderConfig,

    /// 网页抓取配置
    pub fetch: FetchConfig,

    /// 调研流程配置
    pub research: ResearchConfig,

    /// 是否启用详细日志
    pub verbose: bool,
}

/// LLM Provider配置，进程启动时读取一次，之后不可变
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider标识 (claude, gemini, openai, ollama)
    pub provider: String,

    /// 模型名称，不填时使用各Provider的默认模型
    pub model: Option<String>,

    /// API KEY所在的环境变量名，不填时使用各Provider的默认变量名
    pub api_key_ref: Option<String>,

    /// 直接配置的API KEY，优先于api_key_ref
    pub api_key: Option<String>,

    /// API基地址，仅对本地服务（ollama）有意义
    pub base_url: Option<String>,

    /// 默认最大tokens
    pub max_tokens: u32,

    /// 默认温度
    pub temperature: f64,

    /// 单次请求超时时间（秒），不填时使用各Provider的默认值
    pub timeout_seconds: Option<u64>,
}

/// 网页抓取配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct FetchConfig {
    /// 单个URL的超时时间（秒）
    pub per_url_timeout_secs: u64,

    /// 单个来源保留的最大字符数
    pub max_content_length: usize,

    /// 最大并发抓取数
    pub max_concurrent_fetches: usize,

    /// 单个响应体的最大下载字节数
    pub max_download_bytes: usize,

    /// 最大重定向次数
    pub max_redirects: usize,

    pub user_agent: String,

    /// 是否使用系统代理（HTTP_PROXY等环境变量）
    pub use_system_proxy: bool,
}

/// 零来源可用时的处理策略
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmptySourcesPolicy {
    /// 终止流程
    #[default]
    Abort,
    /// 在没有任何材料的情况下继续合成
    Proceed,
}

/// 调研流程配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ResearchConfig {
    /// 要求模型推荐的来源数量
    pub max_sources: usize,

    /// 没有任何来源抓取成功时的策略
    pub empty_sources_policy: EmptySourcesPolicy,

    /// 调研框架文档路径
    pub framework_path: Option<PathBuf>,
}

impl Config {
    /// 从文件加载配置
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let mut file =
            File::open(path).context(format!("Failed to open config file: {:?}", path))?;
        let mut content = String::new();
        file.read_to_string(&mut content)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }
}

impl ProviderConfig {
    /// 解析后的Provider类型；标识不在枚举集合内时返回UnknownProvider
    pub fn kind(&self) -> Result<ProviderKind, crate::llm::client::LlmError> {
        self.provider.parse::<ProviderKind>()
    }

    /// 实际使用的模型名称
    pub fn model_for(&self, kind: ProviderKind) -> String {
        match self.model.as_deref() {
            Some(model) if !model.trim().is_empty() => model.to_string(),
            _ => kind.default_model().to_string(),
        }
    }

    /// 凭据所在的环境变量名
    pub fn api_key_ref_for(&self, kind: ProviderKind) -> Option<String> {
        match self.api_key_ref.as_deref() {
            Some(name) if !name.trim().is_empty() => Some(name.to_string()),
            _ => kind.default_api_key_ref().map(str::to_string),
        }
    }

    /// 解析凭据：先取直接配置的api_key，再查环境变量
    pub fn resolve_api_key(&self, kind: ProviderKind) -> Option<String> {
        if let Some(key) = self.api_key.as_deref()
            && !key.trim().is_empty()
        {
            return Some(key.to_string());
        }

        self.api_key_ref_for(kind)
            .and_then(|name| std::env::var(name).ok())
            .filter(|key| !key.trim().is_empty())
    }

    /// 实际使用的API基地址
    pub fn base_url_for(&self, kind: ProviderKind) -> String {
        match self.base_url.as_deref() {
            Some(url) if !url.trim().is_empty() => url.trim_end_matches('/').to_string(),
            _ => kind.default_base_url().to_string(),
        }
    }

    /// 单次请求超时
    pub fn request_timeout_for(&self, kind: ProviderKind) -> Duration {
        let secs = self
            .timeout_seconds
            .unwrap_or_else(|| kind.default_timeout_secs());
        Duration::from_secs(secs.max(1))
    }
}

impl FetchConfig {
    pub fn per_url_timeout(&self) -> Duration {
        Duration::from_secs(self.per_url_timeout_secs.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("./data/outputs"),
            llm: ProviderConfig::default(),
            fetch: FetchConfig::default(),
            research: ResearchConfig::default(),
            verbose: false,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Claude.to_string(),
            model: None,
            api_key_ref: None,
            api_key: None,
            base_url: None,
            max_tokens: 4000,
            temperature: 0.7,
            timeout_seconds: None,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            per_url_timeout_secs: 10,
            max_content_length: 5000,
            max_concurrent_fetches: 4,
            max_download_bytes: 5 * 1024 * 1024, // 5MB
            max_redirects: 5,
            user_agent: String::from("Mozilla/5.0 (compatible; research-pilot)"),
            use_system_proxy: true,
        }
    }
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_sources: 5,
            empty_sources_policy: EmptySourcesPolicy::default(),
            framework_path: None,
        }
    }
}

// Include tests
#[cfg(test)]
mod tests;
