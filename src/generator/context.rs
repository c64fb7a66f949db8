use std::sync::Arc;

use anyhow::{Context as _, Result};

use crate::config::Config;
use crate::fetcher::{ContentFetcher, SourceFetcher};
use crate::generator::framework::{FileFrameworkLoader, FrameworkLoader, NoFramework};
use crate::generator::outlet::{DiskOutlet, ResultPersister};
use crate::llm::client::{ProviderAdapter, ProviderFactory};

/// 一次或多次调研共享的只读协作者集合
#[derive(Clone)]
pub struct ResearchContext {
    /// 配置
    pub config: Config,
    /// 模型适配器，所有模型调用共用
    pub provider: Arc<dyn ProviderAdapter>,
    /// 来源内容抓取
    pub fetcher: Arc<dyn SourceFetcher>,
    /// 调研框架加载
    pub framework_loader: Arc<dyn FrameworkLoader>,
    /// 结果持久化
    pub persister: Arc<dyn ResultPersister>,
}

impl ResearchContext {
    pub fn new(
        config: Config,
        provider: Arc<dyn ProviderAdapter>,
        fetcher: Arc<dyn SourceFetcher>,
        framework_loader: Arc<dyn FrameworkLoader>,
        persister: Arc<dyn ResultPersister>,
    ) -> Self {
        Self {
            config,
            provider,
            fetcher,
            framework_loader,
            persister,
        }
    }

    /// 根据配置构造默认的协作者：rig适配器、HTTP抓取、本地框架文件与磁盘输出
    pub async fn from_config(config: Config) -> Result<Self> {
        let provider = ProviderFactory::create(config.llm.clone())
            .await
            .context("Failed to initialize LLM provider")?;
        let fetcher = ContentFetcher::new(&config.fetch)?;

        let framework_loader: Arc<dyn FrameworkLoader> = match &config.research.framework_path {
            Some(path) => Arc::new(FileFrameworkLoader::new(path.clone())),
            None => Arc::new(NoFramework),
        };
        let persister = DiskOutlet::new(config.output_path.clone());

        Ok(Self::new(
            config,
            provider,
            Arc::new(fetcher),
            framework_loader,
            Arc::new(persister),
        ))
    }
}
