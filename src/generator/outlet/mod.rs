use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::generator::qa::QaReport;
use crate::generator::state::{ResearchState, Source, SourceCandidate};

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to serialize research result: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PersistError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        PersistError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// 结果持久化接口，返回主结果文件路径
#[async_trait]
pub trait ResultPersister: Send + Sync {
    async fn persist(&self, state: &ResearchState) -> Result<PathBuf, PersistError>;
}

/// 持久化的JSON文档
#[derive(Debug, Serialize)]
pub struct PersistedReport<'a> {
    pub research_query: &'a str,
    pub timestamp: String,
    pub framework_used: bool,
    pub proposed_sources: &'a [SourceCandidate],
    pub sources: &'a [Source],
    pub findings: &'a str,
    pub stage_errors: &'a BTreeMap<String, String>,
    pub qa_validation: &'a QaReport,
}

/// 写入本地磁盘：同一次调研输出一个JSON和一个Markdown文件
pub struct DiskOutlet {
    output_dir: PathBuf,
}

impl DiskOutlet {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 文件名主干，时间戳加随机后缀，保证同一秒内的多次调研不会互相覆盖
    fn file_stem(now: &DateTime<Local>) -> String {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!("research_{}_{}", now.format("%Y%m%d_%H%M%S"), &suffix[..8])
    }

    /// 先写临时文件再重命名；任一步失败时删除已就位与临时的文件
    async fn write_all_or_nothing(&self, files: &[(PathBuf, String)]) -> Result<(), PersistError> {
        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::new();
        let mut placed: Vec<PathBuf> = Vec::new();

        let result: Result<(), PersistError> = async {
            for (target, content) in files {
                let tmp = tmp_path_for(target);
                staged.push((tmp.clone(), target.clone()));
                tokio::fs::write(&tmp, content)
                    .await
                    .map_err(|e| PersistError::io(&tmp, e))?;
            }
            for (tmp, target) in &staged {
                tokio::fs::rename(tmp, target)
                    .await
                    .map_err(|e| PersistError::io(target, e))?;
                placed.push(target.clone());
            }
            Ok(())
        }
        .await;

        if result.is_err() {
            for path in placed.iter().chain(staged.iter().map(|(tmp, _)| tmp)) {
                let _ = tokio::fs::remove_file(path).await;
            }
        }
        result
    }
}

fn tmp_path_for(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.tmp", name))
}

#[async_trait]
impl ResultPersister for DiskOutlet {
    async fn persist(&self, state: &ResearchState) -> Result<PathBuf, PersistError> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| PersistError::io(&self.output_dir, e))?;

        let now = Local::now();
        let qa = QaReport::evaluate(state);
        let stem = Self::file_stem(&now);
        let json_path = self.output_dir.join(format!("{}.json", stem));
        let markdown_path = self.output_dir.join(format!("{}.md", stem));

        let report = PersistedReport {
            research_query: state.query(),
            timestamp: now.to_rfc3339(),
            framework_used: !state.framework_text().is_empty(),
            proposed_sources: state.proposed_sources(),
            sources: state.fetched_sources(),
            findings: state.findings().unwrap_or(""),
            stage_errors: state.stage_errors(),
            qa_validation: &qa,
        };
        let json = serde_json::to_string_pretty(&report)?;
        let markdown = render_markdown(state, &qa, &now);

        self.write_all_or_nothing(&[(json_path.clone(), json), (markdown_path.clone(), markdown)])
            .await?;

        tracing::info!(
            json = %json_path.display(),
            markdown = %markdown_path.display(),
            qa_passed = qa.passed,
            "research result persisted"
        );
        Ok(json_path)
    }
}

/// 渲染便于阅读的Markdown报告
pub fn render_markdown(state: &ResearchState, qa: &QaReport, now: &DateTime<Local>) -> String {
    let mut md = String::new();
    md.push_str("# Research Report\n\n");
    md.push_str(&format!("**Query:** {}\n\n", state.query()));
    md.push_str(&format!("**Date:** {}\n\n", now.format("%Y-%m-%d %H:%M:%S")));
    md.push_str("---\n\n## Findings\n\n");
    md.push_str(state.findings().unwrap_or("No findings"));
    md.push_str("\n\n---\n\n## Sources\n\n");

    for (i, source) in state.fetched_sources().iter().enumerate() {
        let candidate = &source.candidate;
        md.push_str(&format!("### {}. {}\n\n", i + 1, candidate.title));
        md.push_str(&format!("**Link:** [{url}]({url})\n\n", url = candidate.url));
        if !candidate.rationale.is_empty() {
            md.push_str(&format!("**Summary:** {}\n\n", candidate.rationale));
        }
        md.push_str(&format!("**Fetch status:** {}\n\n", source.fetch_status));
    }

    md.push_str("---\n\n## Quality Check\n\n");
    md.push_str(&format!(
        "- Sources accepted: {}/{}\n- Findings quality score: {:.2}\n- Passed: {}\n",
        qa.sources_accepted,
        qa.sources_validated,
        qa.findings.quality_score,
        if qa.passed { "yes" } else { "no" }
    ));
    for issue in &qa.findings.issues {
        md.push_str(&format!("- Issue: {}\n", issue));
    }

    if !state.stage_errors().is_empty() {
        md.push_str("\n## Stage Errors\n\n");
        for (stage, error) in state.stage_errors() {
            md.push_str(&format!("- **{}**: {}\n", stage, error));
        }
    }

    md
}
