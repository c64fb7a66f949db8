use crate::config::{Config, DEFAULT_CONFIG_FILE, EmptySourcesPolicy};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

/// research-pilot - 由Rust与LLM驱动的自动化调研引擎
#[derive(Parser, Debug)]
#[command(name = "research-pilot")]
#[command(
    about = "Automated research engine: asks an LLM to propose web sources for a query, fetches them concurrently, synthesizes findings against an optional framework and saves the report as JSON and Markdown."
)]
#[command(version)]
pub struct Args {
    /// 调研问题，不提供时从标准输入读取
    pub query: Option<String>,

    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 输出路径
    #[arg(short, long)]
    pub output_path: Option<PathBuf>,

    /// 调研框架文档路径
    #[arg(long)]
    pub framework: Option<PathBuf>,

    /// LLM Provider (claude, gemini, openai, ollama)
    #[arg(long, env = "LLM_PROVIDER")]
    pub llm_provider: Option<String>,

    /// 模型名称
    #[arg(long)]
    pub model: Option<String>,

    /// LLM API KEY
    #[arg(long)]
    pub llm_api_key: Option<String>,

    /// 存放API KEY的环境变量名
    #[arg(long)]
    pub llm_api_key_ref: Option<String>,

    /// LLM API基地址（本地服务）
    #[arg(long)]
    pub llm_base_url: Option<String>,

    /// 最大tokens数
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// 温度参数
    #[arg(long)]
    pub temperature: Option<f64>,

    /// 推荐来源数量上限
    #[arg(long)]
    pub max_sources: Option<usize>,

    /// 最大并发抓取数
    #[arg(long)]
    pub max_concurrent_fetches: Option<usize>,

    /// 单个URL的抓取超时（秒）
    #[arg(long)]
    pub fetch_timeout_secs: Option<u64>,

    /// 单个来源保留的最大字符数
    #[arg(long)]
    pub max_content_length: Option<usize>,

    /// 没有任何来源可用时仍然继续合成
    #[arg(long)]
    pub allow_empty_sources: bool,

    /// 列出各Provider的可用状态后退出
    #[arg(long)]
    pub check_providers: bool,

    /// 是否启用详细日志
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// 将CLI参数转换为配置
    pub fn into_config(self) -> Result<Config> {
        let mut config = if let Some(config_path) = &self.config {
            // 如果显式指定了配置文件路径，从该路径加载
            Config::from_file(config_path)
                .with_context(|| format!("无法读取配置文件 {:?}", config_path))?
        } else {
            // 如果没有显式指定配置文件，尝试从默认位置加载
            let default_config_path = std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(DEFAULT_CONFIG_FILE);

            if default_config_path.exists() {
                Config::from_file(&default_config_path)
                    .with_context(|| format!("无法读取默认配置文件 {:?}", default_config_path))?
            } else {
                // 默认配置文件不存在，使用默认值
                Config::default()
            }
        };

        // 覆盖配置文件中的设置
        if let Some(output_path) = self.output_path {
            config.output_path = output_path;
        }
        if let Some(framework) = self.framework {
            config.research.framework_path = Some(framework);
        }

        // 覆盖LLM配置，provider标识在构造适配器时校验
        if let Some(provider) = self.llm_provider {
            config.llm.provider = provider;
        }
        if let Some(model) = self.model {
            config.llm.model = Some(model);
        }
        if let Some(api_key) = self.llm_api_key {
            config.llm.api_key = Some(api_key);
        }
        if let Some(api_key_ref) = self.llm_api_key_ref {
            config.llm.api_key_ref = Some(api_key_ref);
        }
        if let Some(base_url) = self.llm_base_url {
            config.llm.base_url = Some(base_url);
        }
        if let Some(max_tokens) = self.max_tokens {
            config.llm.max_tokens = max_tokens;
        }
        if let Some(temperature) = self.temperature {
            config.llm.temperature = temperature;
        }

        // 抓取与调研配置
        if let Some(max_sources) = self.max_sources {
            config.research.max_sources = max_sources;
        }
        if let Some(max_concurrent_fetches) = self.max_concurrent_fetches {
            config.fetch.max_concurrent_fetches = max_concurrent_fetches;
        }
        if let Some(fetch_timeout_secs) = self.fetch_timeout_secs {
            config.fetch.per_url_timeout_secs = fetch_timeout_secs;
        }
        if let Some(max_content_length) = self.max_content_length {
            config.fetch.max_content_length = max_content_length;
        }
        if self.allow_empty_sources {
            config.research.empty_sources_policy = EmptySourcesPolicy::Proceed;
        }

        // 其他配置
        config.verbose = config.verbose || self.verbose;

        Ok(config)
    }
}
