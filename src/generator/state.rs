//! 调研状态：贯穿整个流程的唯一记录，每个字段只由一个阶段写入一次

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::fetcher::{FetchStatus, FetchedPage};

/// 流程阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    LoadFramework,
    ProposeSources,
    FetchContent,
    Synthesize,
    Persist,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::LoadFramework => "load_framework",
            PipelineStage::ProposeSources => "propose_sources",
            PipelineStage::FetchContent => "fetch_content",
            PipelineStage::Synthesize => "synthesize",
            PipelineStage::Persist => "persist",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 流程所处的阶段状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelinePhase {
    Initialized,
    FrameworkLoaded,
    SourcesProposed,
    ContentFetched,
    Synthesized,
    Persisted,
    Completed,
    Failed,
}

impl PipelinePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelinePhase::Completed | PipelinePhase::Failed)
    }
}

/// 模型推荐的候选来源
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SourceCandidate {
    /// 来源标题
    pub title: String,
    /// 来源的完整http(s)地址
    pub url: String,
    /// 推荐理由
    #[serde(alias = "summary", default)]
    pub rationale: String,
}

/// 抓取后的来源
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    #[serde(flatten)]
    pub candidate: SourceCandidate,
    pub content: String,
    pub fetch_status: FetchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_error: Option<String>,
}

impl Source {
    pub fn from_page(candidate: SourceCandidate, page: FetchedPage) -> Self {
        Self {
            candidate,
            content: page.content,
            fetch_status: page.status,
            fetch_error: page.error,
        }
    }

    pub fn is_usable(&self) -> bool {
        self.fetch_status.is_usable()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("field '{0}' has already been set")]
    AlreadySet(&'static str),
}

/// 贯穿流程的调研状态
#[derive(Debug, Clone, Serialize)]
pub struct ResearchState {
    query: String,
    framework_text: Option<String>,
    proposed_sources: Option<Vec<SourceCandidate>>,
    fetched_sources: Option<Vec<Source>>,
    findings: Option<String>,
    stage_errors: BTreeMap<String, String>,
    output_path: Option<PathBuf>,
}

fn set_once<T>(slot: &mut Option<T>, value: T, field: &'static str) -> Result<(), StateError> {
    if slot.is_some() {
        return Err(StateError::AlreadySet(field));
    }
    *slot = Some(value);
    Ok(())
}

impl ResearchState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            framework_text: None,
            proposed_sources: None,
            fetched_sources: None,
            findings: None,
            stage_errors: BTreeMap::new(),
            output_path: None,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// 框架文本，未加载时为空字符串
    pub fn framework_text(&self) -> &str {
        self.framework_text.as_deref().unwrap_or("")
    }

    pub fn proposed_sources(&self) -> &[SourceCandidate] {
        self.proposed_sources.as_deref().unwrap_or(&[])
    }

    pub fn fetched_sources(&self) -> &[Source] {
        self.fetched_sources.as_deref().unwrap_or(&[])
    }

    /// 抓取成功（含截断）的来源
    pub fn usable_sources(&self) -> impl Iterator<Item = &Source> {
        self.fetched_sources().iter().filter(|source| source.is_usable())
    }

    pub fn findings(&self) -> Option<&str> {
        self.findings.as_deref()
    }

    pub fn stage_errors(&self) -> &BTreeMap<String, String> {
        &self.stage_errors
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    pub fn set_framework_text(&mut self, text: String) -> Result<(), StateError> {
        set_once(&mut self.framework_text, text, "framework_text")
    }

    pub fn set_proposed_sources(&mut self, sources: Vec<SourceCandidate>) -> Result<(), StateError> {
        set_once(&mut self.proposed_sources, sources, "proposed_sources")
    }

    pub fn set_fetched_sources(&mut self, sources: Vec<Source>) -> Result<(), StateError> {
        set_once(&mut self.fetched_sources, sources, "fetched_sources")
    }

    pub fn set_findings(&mut self, findings: String) -> Result<(), StateError> {
        set_once(&mut self.findings, findings, "findings")
    }

    pub fn set_output_path(&mut self, path: PathBuf) -> Result<(), StateError> {
        set_once(&mut self.output_path, path, "output_path")
    }

    /// 记录阶段错误；同一阶段的多条错误用"; "拼接，已有记录不会被清除
    pub fn record_error(&mut self, stage: PipelineStage, message: impl Into<String>) {
        let message = message.into();
        self.stage_errors
            .entry(stage.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str("; ");
                existing.push_str(&message);
            })
            .or_insert(message);
    }
}
