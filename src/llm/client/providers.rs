//! LLM Provider支持模块

use async_trait::async_trait;
use rig::{
    client::CompletionClient,
    completion::{Prompt, PromptError},
    providers::gemini::completion::gemini_api_types::{AdditionalParameters, GenerationConfig},
};
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::llm::client::utils::classify_prompt_error;
use crate::llm::client::{
    GenerationDefaults, GenerationOptions, LlmError, ProviderAdapter, ProviderKind,
    ResolvedOptions,
};

/// 统一的Provider客户端枚举
#[derive(Clone)]
pub enum ProviderClient {
    Claude(rig::providers::anthropic::Client),
    Gemini(rig::providers::gemini::Client),
    OpenAI(rig::providers::openai::Client),
    Ollama(rig::providers::ollama::Client),
}

impl ProviderClient {
    /// 根据配置创建相应的provider客户端，缺少凭据时立即失败
    pub fn new(kind: ProviderKind, config: &ProviderConfig) -> Result<Self, LlmError> {
        let unavailable = |reason: String| LlmError::ProviderUnavailable {
            provider: kind,
            reason,
        };

        let api_key = if kind.requires_api_key() {
            let key = config.resolve_api_key(kind).ok_or_else(|| {
                unavailable(format!(
                    "missing credential, set {} or llm.api_key",
                    config
                        .api_key_ref_for(kind)
                        .unwrap_or_else(|| "an API key".to_string())
                ))
            })?;
            Some(key)
        } else {
            None
        };
        let api_key = api_key.unwrap_or_default();

        match kind {
            ProviderKind::Claude => {
                let client = rig::providers::anthropic::ClientBuilder::new(&api_key)
                    .build()
                    .map_err(|e| unavailable(e.to_string()))?;
                Ok(ProviderClient::Claude(client))
            }
            ProviderKind::Gemini => {
                let client = rig::providers::gemini::Client::builder(&api_key)
                    .build()
                    .map_err(|e| unavailable(e.to_string()))?;
                Ok(ProviderClient::Gemini(client))
            }
            ProviderKind::OpenAI => {
                let base_url = config.base_url_for(kind);
                let client = rig::providers::openai::Client::builder(&api_key)
                    .base_url(&base_url)
                    .build();
                Ok(ProviderClient::OpenAI(client))
            }
            ProviderKind::Ollama => {
                let base_url = config.base_url_for(kind);
                let client = rig::providers::ollama::Client::builder()
                    .base_url(&base_url)
                    .build();
                Ok(ProviderClient::Ollama(client))
            }
        }
    }
}

/// 按参数配置agent并执行单轮prompt
macro_rules! prompt_agent {
    ($builder:expr, $options:expr, $prompt:expr) => {{
        let mut builder = $builder
            .max_tokens($options.max_tokens.into())
            .temperature($options.temperature);
        if let Some(system_prompt) = $options.system_prompt.as_deref() {
            builder = builder.preamble(system_prompt);
        }
        builder.build().prompt($prompt).await
    }};
}

/// 基于rig客户端的适配器，四种后端共用同一套调用契约
#[derive(Clone)]
pub struct RigProviderAdapter {
    kind: ProviderKind,
    model: String,
    client: ProviderClient,
    defaults: GenerationDefaults,
    request_timeout: Duration,
}

impl RigProviderAdapter {
    pub fn new(kind: ProviderKind, config: &ProviderConfig) -> Result<Self, LlmError> {
        let client = ProviderClient::new(kind, config)?;
        Ok(Self {
            kind,
            model: config.model_for(kind),
            client,
            defaults: GenerationDefaults {
                max_tokens: config.max_tokens,
                temperature: config.temperature,
            },
            request_timeout: config.request_timeout_for(kind),
        })
    }

    pub fn defaults(&self) -> GenerationDefaults {
        self.defaults
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    async fn prompt_backend(
        &self,
        prompt: &str,
        options: &ResolvedOptions,
    ) -> Result<String, PromptError> {
        match &self.client {
            ProviderClient::Claude(client) => {
                prompt_agent!(client.agent(&self.model), options, prompt)
            }
            ProviderClient::OpenAI(client) => {
                prompt_agent!(
                    client
                        .completion_model(&self.model)
                        .completions_api()
                        .into_agent_builder(),
                    options,
                    prompt
                )
            }
            ProviderClient::Gemini(client) => {
                let gen_cfg = GenerationConfig::default();
                let cfg = AdditionalParameters::default().with_config(gen_cfg);
                let mut builder = client.agent(&self.model);
                if let Ok(params) = serde_json::to_value(cfg) {
                    builder = builder.additional_params(params);
                }
                prompt_agent!(builder, options, prompt)
            }
            ProviderClient::Ollama(client) => {
                prompt_agent!(client.agent(&self.model), options, prompt)
            }
        }
    }
}

#[async_trait]
impl ProviderAdapter for RigProviderAdapter {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String, LlmError> {
        let resolved = options.resolve(&self.defaults);
        tracing::debug!(
            provider = %self.kind,
            model = %self.model,
            max_tokens = resolved.max_tokens,
            prompt_chars = prompt.len(),
            "📡 发送生成请求"
        );

        let outcome = tokio::time::timeout(self.request_timeout, async {
            self.prompt_backend(prompt, &resolved).await
        })
        .await;

        match outcome {
            Err(_) => Err(LlmError::GenerationFailed {
                retryable: true,
                message: format!(
                    "{} request timed out after {}s",
                    self.kind,
                    self.request_timeout.as_secs()
                ),
            }),
            Ok(Err(err)) => Err(classify_prompt_error(err)),
            Ok(Ok(text)) if text.trim().is_empty() => Err(LlmError::GenerationFailed {
                retryable: true,
                message: format!("{} returned an empty response", self.kind),
            }),
            Ok(Ok(text)) => {
                tracing::debug!(provider = %self.kind, response_chars = text.len(), "✅ 收到模型响应");
                Ok(text)
            }
        }
    }
}
