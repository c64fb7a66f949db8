//! Provider工厂：根据配置选择并构造适配器

use std::sync::Arc;
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::llm::client::{
    LlmError, ProviderAdapter, ProviderAvailability, ProviderKind, ProviderStatus,
    RigProviderAdapter,
};

/// 本地服务探测超时
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

pub struct ProviderFactory;

impl ProviderFactory {
    /// 构造配置指定的适配器。不做跨Provider的回退。
    pub async fn create(config: ProviderConfig) -> Result<Arc<dyn ProviderAdapter>, LlmError> {
        let kind = config.kind()?;

        if kind == ProviderKind::Ollama {
            let base_url = config.base_url_for(kind);
            probe_local_server(&base_url)
                .await
                .map_err(|reason| LlmError::ProviderUnavailable {
                    provider: kind,
                    reason,
                })?;
        }

        let adapter = RigProviderAdapter::new(kind, &config)?;
        let defaults = adapter.defaults();
        tracing::info!(
            provider = %kind,
            model = %adapter.model(),
            max_tokens = defaults.max_tokens,
            temperature = defaults.temperature,
            timeout_secs = adapter.request_timeout().as_secs(),
            "LLM provider selected"
        );
        Ok(Arc::new(adapter))
    }

    /// 列出所有Provider的可用状态，不构造适配器
    pub async fn survey(config: &ProviderConfig) -> Vec<ProviderAvailability> {
        let configured_kind = config.kind().ok();
        let mut availability = Vec::with_capacity(ProviderKind::ALL.len());

        for kind in ProviderKind::ALL {
            // 只有当前选中的Provider使用配置中的凭据与地址
            let effective = if configured_kind == Some(kind) {
                config.clone()
            } else {
                ProviderConfig {
                    provider: kind.to_string(),
                    ..ProviderConfig::default()
                }
            };

            let status = if kind.requires_api_key() {
                match effective.resolve_api_key(kind) {
                    Some(_) => ProviderStatus::Configured,
                    None => ProviderStatus::Missing,
                }
            } else {
                match probe_local_server(&effective.base_url_for(kind)).await {
                    Ok(()) => ProviderStatus::Running,
                    Err(reason) => {
                        tracing::debug!(provider = %kind, %reason, "local provider probe failed");
                        ProviderStatus::Missing
                    }
                }
            };

            availability.push(ProviderAvailability { kind, status });
        }

        availability
    }
}

/// 请求本地服务的模型列表接口，判断服务是否在运行
async fn probe_local_server(base_url: &str) -> Result<(), String> {
    let client = reqwest::Client::builder()
        .timeout(PROBE_TIMEOUT)
        .no_proxy()
        .build()
        .map_err(|e| format!("failed to build probe client: {}", e))?;

    let endpoint = format!("{}/api/tags", base_url.trim_end_matches('/'));
    let response = client
        .get(&endpoint)
        .send()
        .await
        .map_err(|e| format!("local server not reachable at {}: {}", base_url, e))?;

    if !response.status().is_success() {
        return Err(format!(
            "local server at {} answered {}",
            base_url,
            response.status()
        ));
    }

    Ok(())
}
