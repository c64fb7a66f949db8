//! LLM客户端 - 提供统一的LLM服务接口

use async_trait::async_trait;

mod factory;
mod providers;
pub mod types;
pub mod utils;

pub use factory::ProviderFactory;
pub use providers::{ProviderClient, RigProviderAdapter};
pub use types::{LlmError, ProviderAvailability, ProviderKind, ProviderStatus};

/// 单次生成调用的可选参数，未设置的项使用Provider配置中的默认值
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOptions {
    /// 最大输出tokens
    pub max_tokens: Option<u32>,
    /// 采样温度，取值范围[0, 1]
    pub temperature: Option<f64>,
    /// 系统提示词
    pub system_prompt: Option<String>,
}

impl GenerationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    /// 与默认值合并，得到最终生效的参数
    pub fn resolve(&self, defaults: &GenerationDefaults) -> ResolvedOptions {
        let temperature = self.temperature.unwrap_or(defaults.temperature);
        let clamped = if temperature.is_nan() {
            defaults.temperature.clamp(0.0, 1.0)
        } else {
            temperature.clamp(0.0, 1.0)
        };
        if clamped != temperature {
            tracing::warn!(requested = temperature, used = clamped, "temperature out of [0, 1], clamped");
        }

        ResolvedOptions {
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens).max(1),
            temperature: clamped,
            system_prompt: self
                .system_prompt
                .clone()
                .filter(|prompt| !prompt.trim().is_empty()),
        }
    }
}

/// Provider级别的生成默认值，构造时确定
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationDefaults {
    pub max_tokens: u32,
    pub temperature: f64,
}

/// 合并默认值后的生成参数
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOptions {
    pub max_tokens: u32,
    pub temperature: f64,
    pub system_prompt: Option<String>,
}

/// 统一的模型适配器接口，所有后端对调用方表现一致。
///
/// 实现不得持有与某次调研相关的可变状态：同一个适配器实例会被多个并发的调研流程共享。
/// 适配器本身不做重试，重试策略由调用方决定。
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// 后端类型
    fn kind(&self) -> ProviderKind;

    /// 使用的模型名称
    fn model(&self) -> &str;

    /// 展示名称，例如 "Claude (Anthropic) / claude-sonnet-4-20250514"
    fn display_name(&self) -> String {
        format!("{} / {}", self.kind().display_name(), self.model())
    }

    /// 根据prompt生成文本
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String, LlmError>;
}
