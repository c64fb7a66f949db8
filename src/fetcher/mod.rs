//! 网页内容抓取：并发获取一组URL并提取可读文本

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::FetchConfig;
use crate::generator::state::{Source, SourceCandidate};
use crate::utils::threads::do_parallel_with_limit;

pub mod extract;

/// 单个URL的抓取结果状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    Success,
    Timeout,
    HttpError,
    /// 内容超过长度上限，已截断但保留
    TooLarge,
    SkippedInvalidUrl,
    Cancelled,
}

impl FetchStatus {
    /// 是否拿到了可用内容
    pub fn is_usable(&self) -> bool {
        matches!(self, FetchStatus::Success | FetchStatus::TooLarge)
    }
}

impl std::fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FetchStatus::Success => "success",
            FetchStatus::Timeout => "timeout",
            FetchStatus::HttpError => "http_error",
            FetchStatus::TooLarge => "too_large",
            FetchStatus::SkippedInvalidUrl => "skipped_invalid_url",
            FetchStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", label)
    }
}

/// 单个URL的抓取结果
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    pub url: String,
    pub content: String,
    pub status: FetchStatus,
    /// 失败原因
    pub error: Option<String>,
}

impl FetchedPage {
    fn failed(url: &str, status: FetchStatus, error: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            content: String::new(),
            status,
            error: Some(error.into()),
        }
    }
}

/// 面向流程编排的抓取接口
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// 为每个候选来源抓取内容，结果与输入一一对应、顺序一致
    async fn fetch_sources(
        &self,
        candidates: &[SourceCandidate],
        cancel: &CancellationToken,
    ) -> Vec<Source>;
}

enum DownloadError {
    Status(reqwest::StatusCode),
    Timeout,
    Transport(String),
}

struct Download {
    body: String,
    is_html: bool,
    /// 响应体超过下载上限，只读取了前面一部分
    capped: bool,
}

/// 基于reqwest的内容抓取器
pub struct ContentFetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl ContentFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects));
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// 并发抓取全部URL。单个URL的失败不会影响其他URL，输出与输入等长且顺序一致。
    pub async fn fetch_all(
        &self,
        urls: &[String],
        per_url_timeout: Duration,
        max_content_length: usize,
        cancel: &CancellationToken,
    ) -> Vec<FetchedPage> {
        let futures = urls
            .iter()
            .map(|url| self.fetch_one(url, per_url_timeout, max_content_length, cancel))
            .collect::<Vec<_>>();

        do_parallel_with_limit(futures, self.config.max_concurrent_fetches).await
    }

    async fn fetch_one(
        &self,
        raw_url: &str,
        per_url_timeout: Duration,
        max_content_length: usize,
        cancel: &CancellationToken,
    ) -> FetchedPage {
        let url = match validate_url(raw_url) {
            Ok(url) => url,
            Err(reason) => {
                tracing::warn!(url = raw_url, %reason, "skipping invalid url");
                return FetchedPage::failed(raw_url, FetchStatus::SkippedInvalidUrl, reason);
            }
        };

        if cancel.is_cancelled() {
            return FetchedPage::failed(raw_url, FetchStatus::Cancelled, "fetch cancelled");
        }

        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                return FetchedPage::failed(raw_url, FetchStatus::Cancelled, "fetch cancelled");
            }
            outcome = tokio::time::timeout(per_url_timeout, self.download(url, per_url_timeout)) => outcome,
        };

        let page = match outcome {
            Err(_) | Ok(Err(DownloadError::Timeout)) => FetchedPage::failed(
                raw_url,
                FetchStatus::Timeout,
                format!("no complete response within {}s", per_url_timeout.as_secs_f32()),
            ),
            Ok(Err(DownloadError::Status(status))) => FetchedPage::failed(
                raw_url,
                FetchStatus::HttpError,
                format!(
                    "HTTP {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                ),
            ),
            Ok(Err(DownloadError::Transport(detail))) => {
                FetchedPage::failed(raw_url, FetchStatus::HttpError, detail)
            }
            Ok(Ok(download)) => {
                let text = if download.is_html {
                    extract::html_to_text(&download.body)
                } else {
                    download.body.trim().to_string()
                };
                let (content, truncated) = extract::truncate_chars(&text, max_content_length);
                let status = if truncated || download.capped {
                    FetchStatus::TooLarge
                } else {
                    FetchStatus::Success
                };
                FetchedPage {
                    url: raw_url.to_string(),
                    content,
                    status,
                    error: None,
                }
            }
        };

        tracing::info!(
            url = raw_url,
            status = %page.status,
            chars = page.content.chars().count(),
            "fetched source"
        );
        page
    }

    async fn download(&self, url: Url, per_url_timeout: Duration) -> Result<Download, DownloadError> {
        let response = self
            .client
            .get(url)
            .timeout(per_url_timeout)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status(status));
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(extract::is_html)
            .unwrap_or(false);

        let limit = self.config.max_download_bytes;
        let mut response = response;
        let mut bytes: Vec<u8> = Vec::new();
        let mut capped = false;
        while let Some(chunk) = response.chunk().await.map_err(map_transport_error)? {
            let remaining = limit.saturating_sub(bytes.len());
            if chunk.len() > remaining {
                bytes.extend_from_slice(&chunk[..remaining]);
                capped = true;
                break;
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(Download {
            body: String::from_utf8_lossy(&bytes).into_owned(),
            is_html,
            capped,
        })
    }
}

fn map_transport_error(err: reqwest::Error) -> DownloadError {
    if err.is_timeout() {
        DownloadError::Timeout
    } else {
        DownloadError::Transport(format!("request failed: {}", err))
    }
}

/// 校验URL：绝对地址、http/https、带主机名
pub fn validate_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw.trim()).map_err(|e| format!("invalid url '{}': {}", raw, e))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}' in '{}'", url.scheme(), raw));
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(format!("url '{}' has no host", raw)),
    }
}

#[async_trait]
impl SourceFetcher for ContentFetcher {
    async fn fetch_sources(
        &self,
        candidates: &[SourceCandidate],
        cancel: &CancellationToken,
    ) -> Vec<Source> {
        let urls = candidates
            .iter()
            .map(|candidate| candidate.url.clone())
            .collect::<Vec<_>>();

        let pages = self
            .fetch_all(
                &urls,
                self.config.per_url_timeout(),
                self.config.max_content_length,
                cancel,
            )
            .await;

        candidates
            .iter()
            .cloned()
            .zip(pages)
            .map(|(candidate, page)| Source::from_page(candidate, page))
            .collect()
    }
}
