#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use research_pilot::config::{Config, FetchConfig};
use research_pilot::fetcher::{FetchStatus, SourceFetcher};
use research_pilot::generator::context::ResearchContext;
use research_pilot::generator::framework::{FrameworkError, FrameworkLoader};
use research_pilot::generator::outlet::DiskOutlet;
use research_pilot::generator::state::{Source, SourceCandidate};
use research_pilot::llm::client::{GenerationOptions, LlmError, ProviderAdapter, ProviderKind};

pub const ARTICLE_HTML: &str = r#"<!DOCTYPE html>
<html><head><title>Solar growth</title><style>p { margin: 0; }</style></head>
<body>
  <nav><a href="/">Home</a> | <a href="/about">About</a></nav>
  <script>window.analytics = "tracking-code";</script>
  <h1>Solar growth in Africa</h1>
  <p>Installed solar capacity in Africa doubled between 2020 and 2023.</p>
</body></html>"#;

pub const SECOND_HTML: &str = r#"<html><body>
  <h2>Wind investment</h2>
  <p>Wind investment in Kenya and South Africa reached record levels.</p>
</body></html>"#;

/// 本地HTTP桩服务
pub struct StubServer {
    base_url: String,
    hits: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl StubServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        let handle = tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let counter = counter.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 8192];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    counter.fetch_add(1, Ordering::SeqCst);

                    let request = String::from_utf8_lossy(&buf[..n]).to_string();
                    let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                    let (status, content_type, body, delay) = route(&path);
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }

                    let response = format!(
                        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        content_type,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self {
            base_url,
            hits,
            handle,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn route(path: &str) -> (&'static str, &'static str, String, Option<Duration>) {
    match path {
        "/article" => ("200 OK", "text/html; charset=utf-8", ARTICLE_HTML.to_string(), None),
        "/second" => ("200 OK", "text/html", SECOND_HTML.to_string(), None),
        "/plain" => ("200 OK", "text/plain", "  Plain text body.  ".to_string(), None),
        "/long" => ("200 OK", "text/plain", "a".repeat(2000), None),
        "/slow" => (
            "200 OK",
            "text/html",
            "<p>too late</p>".to_string(),
            Some(Duration::from_secs(5)),
        ),
        "/api/tags" => ("200 OK", "application/json", r#"{"models": []}"#.to_string(), None),
        _ => ("404 Not Found", "text/plain", "not found".to_string(), None),
    }
}

/// 测试用抓取配置：不走系统代理
pub fn fetch_config(per_url_timeout_secs: u64) -> FetchConfig {
    FetchConfig {
        per_url_timeout_secs,
        max_content_length: 5000,
        use_system_proxy: false,
        ..FetchConfig::default()
    }
}

pub fn proposal_json(urls: &[String]) -> String {
    let results = urls
        .iter()
        .enumerate()
        .map(|(i, url)| {
            serde_json::json!({
                "title": format!("Renewable energy source {}", i + 1),
                "url": url,
                "summary": "Renewable energy trends report",
            })
        })
        .collect::<Vec<_>>();
    format!(
        "```json\n{}\n```",
        serde_json::json!({ "results": results })
    )
}

pub const FINDINGS: &str = "## Key Findings\n- Solar capacity doubled [Source 1](https://example.org).\n\n## Conclusion\nOverall renewable energy keeps growing.";

/// 按提示词类型返回固定结果的模型适配器
pub struct ScriptedProvider {
    proposal: Result<String, LlmError>,
    findings: Result<String, LlmError>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(proposal: Result<String, LlmError>, findings: Result<String, LlmError>) -> Self {
        Self {
            proposal,
            findings,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn proposing(urls: &[String]) -> Self {
        Self::new(Ok(proposal_json(urls)), Ok(FINDINGS.to_string()))
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn synthesis_prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|prompt| is_synthesis(prompt))
            .cloned()
            .collect()
    }

    pub fn proposal_prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|prompt| !is_synthesis(prompt))
            .cloned()
            .collect()
    }
}

fn is_synthesis(prompt: &str) -> bool {
    prompt.contains("SOURCES:")
}

#[async_trait]
impl ProviderAdapter for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Claude
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if is_synthesis(prompt) {
            self.findings.clone()
        } else {
            self.proposal.clone()
        }
    }
}

/// 不访问网络的抓取桩，按URL返回预设状态
#[derive(Default)]
pub struct StaticFetcher {
    statuses: HashMap<String, FetchStatus>,
    calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn with_status(mut self, url: &str, status: FetchStatus) -> Self {
        self.statuses.insert(url.to_string(), status);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceFetcher for StaticFetcher {
    async fn fetch_sources(
        &self,
        candidates: &[SourceCandidate],
        _cancel: &CancellationToken,
    ) -> Vec<Source> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        candidates
            .iter()
            .map(|candidate| {
                let status = self
                    .statuses
                    .get(&candidate.url)
                    .copied()
                    .unwrap_or(FetchStatus::Success);
                let usable = status.is_usable();
                Source {
                    candidate: candidate.clone(),
                    content: if usable {
                        format!("Content of {}", candidate.url)
                    } else {
                        String::new()
                    },
                    fetch_status: status,
                    fetch_error: (!usable).then(|| format!("stubbed {}", status)),
                }
            })
            .collect()
    }
}

pub struct StaticFramework(pub &'static str);

#[async_trait]
impl FrameworkLoader for StaticFramework {
    async fn load(&self) -> Result<String, FrameworkError> {
        Ok(self.0.to_string())
    }
}

pub fn research_context(
    config: Config,
    provider: Arc<dyn ProviderAdapter>,
    fetcher: Arc<dyn SourceFetcher>,
    framework: Arc<dyn FrameworkLoader>,
    output_dir: &Path,
) -> ResearchContext {
    ResearchContext::new(
        config,
        provider,
        fetcher,
        framework,
        Arc::new(DiskOutlet::new(output_dir)),
    )
}
