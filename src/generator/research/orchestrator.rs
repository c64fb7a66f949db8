use std::path::PathBuf;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::EmptySourcesPolicy;
use crate::fetcher::validate_url;
use crate::generator::context::ResearchContext;
use crate::generator::framework::FrameworkError;
use crate::generator::outlet::PersistError;
use crate::generator::research::prompts::{
    build_proposal_prompt, build_synthesis_prompt, parse_candidates,
};
use crate::generator::state::{PipelinePhase, PipelineStage, ResearchState, StateError};
use crate::generator::workflow::TimingScope;
use crate::llm::client::{GenerationOptions, LlmError};

/// 导致一次调研失败的错误
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Generation(#[from] LlmError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("none of the {attempted} proposed sources could be fetched")]
    NoUsableSources { attempted: usize },

    #[error("research run was cancelled")]
    Cancelled,

    #[error(transparent)]
    State(#[from] StateError),
}

/// 成功完成的调研
#[derive(Debug)]
pub struct CompletedRun {
    pub state: ResearchState,
    pub output_path: PathBuf,
    /// 经历过的阶段状态，按时间顺序
    pub phases: Vec<PipelinePhase>,
    pub timing: TimingScope,
}

/// 失败的调研，携带失败阶段、错误以及已完成部分的状态
#[derive(Debug, Error)]
#[error("research failed at stage '{stage}': {error}")]
pub struct FailedRun {
    pub stage: PipelineStage,
    #[source]
    pub error: PipelineError,
    pub state: ResearchState,
    pub phases: Vec<PipelinePhase>,
}

type StageResult<T> = Result<T, (PipelineStage, PipelineError)>;

/// 调研流程编排器：按顺序执行五个阶段，每个实例只处理一个查询
pub struct PipelineOrchestrator {
    context: ResearchContext,
    state: ResearchState,
    phases: Vec<PipelinePhase>,
    cancel: CancellationToken,
    timing: TimingScope,
}

impl PipelineOrchestrator {
    pub fn new(context: ResearchContext, query: impl Into<String>) -> Self {
        Self {
            context,
            state: ResearchState::new(query),
            phases: vec![PipelinePhase::Initialized],
            cancel: CancellationToken::new(),
            timing: TimingScope::new(),
        }
    }

    /// 使用外部的取消令牌
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn phase(&self) -> PipelinePhase {
        self.phases
            .last()
            .copied()
            .unwrap_or(PipelinePhase::Initialized)
    }

    pub fn state(&self) -> &ResearchState {
        &self.state
    }

    /// 执行完整流程，消耗编排器
    pub async fn run(mut self) -> Result<CompletedRun, FailedRun> {
        tracing::info!(query = %self.state.query(), provider = %self.context.provider.display_name(), "research run started");

        match self.execute_stages().await {
            Ok(output_path) => {
                self.advance(PipelinePhase::Completed);
                tracing::info!(
                    output = %output_path.display(),
                    total_secs = self.timing.get_total_duration().as_secs_f64(),
                    "research run completed"
                );
                Ok(CompletedRun {
                    state: self.state,
                    output_path,
                    phases: self.phases,
                    timing: self.timing,
                })
            }
            Err((stage, error)) => {
                self.advance(PipelinePhase::Failed);
                tracing::error!(%stage, %error, "research run failed");
                Err(FailedRun {
                    stage,
                    error,
                    state: self.state,
                    phases: self.phases,
                })
            }
        }
    }

    async fn execute_stages(&mut self) -> StageResult<PathBuf> {
        let stage = PipelineStage::LoadFramework;
        self.begin(stage)?;
        self.load_framework().await.map_err(|e| (stage, e))?;
        self.finish(stage, PipelinePhase::FrameworkLoaded);

        let stage = PipelineStage::ProposeSources;
        self.begin(stage)?;
        self.propose_sources().await.map_err(|e| (stage, e))?;
        self.finish(stage, PipelinePhase::SourcesProposed);

        let stage = PipelineStage::FetchContent;
        self.begin(stage)?;
        self.fetch_content().await.map_err(|e| (stage, e))?;
        self.finish(stage, PipelinePhase::ContentFetched);

        let stage = PipelineStage::Synthesize;
        self.begin(stage)?;
        self.synthesize().await.map_err(|e| (stage, e))?;
        self.finish(stage, PipelinePhase::Synthesized);

        let stage = PipelineStage::Persist;
        self.begin(stage)?;
        let output_path = self.persist().await.map_err(|e| (stage, e))?;
        self.finish(stage, PipelinePhase::Persisted);

        Ok(output_path)
    }

    /// 阶段切换点：检查取消并开始计时
    fn begin(&mut self, stage: PipelineStage) -> StageResult<()> {
        if self.cancel.is_cancelled() {
            tracing::warn!(%stage, "cancellation requested before stage");
            return Err((stage, PipelineError::Cancelled));
        }
        tracing::info!(%stage, "stage started");
        self.timing.start_phase(stage.as_str());
        Ok(())
    }

    fn finish(&mut self, stage: PipelineStage, phase: PipelinePhase) {
        let elapsed = self.timing.end_phase(stage.as_str()).unwrap_or_default();
        tracing::info!(%stage, elapsed_ms = elapsed.as_millis() as u64, "stage finished");
        self.advance(phase);
    }

    fn advance(&mut self, phase: PipelinePhase) {
        if !self.phase().is_terminal() {
            self.phases.push(phase);
        }
    }

    async fn load_framework(&mut self) -> Result<(), PipelineError> {
        let text = match self.context.framework_loader.load().await {
            Ok(text) => text,
            Err(FrameworkError::NotConfigured) => {
                tracing::debug!("no research framework configured");
                String::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "continuing without research framework");
                self.state
                    .record_error(PipelineStage::LoadFramework, e.to_string());
                String::new()
            }
        };
        self.state.set_framework_text(text)?;
        Ok(())
    }

    async fn propose_sources(&mut self) -> Result<(), PipelineError> {
        let max_sources = self.context.config.research.max_sources;
        let (system_prompt, prompt) = build_proposal_prompt(
            self.state.query(),
            self.state.framework_text(),
            max_sources,
        );
        let options = GenerationOptions::new().with_system_prompt(system_prompt);
        let response = self.context.provider.generate(&prompt, &options).await?;

        let parsed = match parse_candidates(&response) {
            Ok(parsed) => parsed,
            Err(reason) => {
                tracing::warn!(%reason, "could not parse proposed sources");
                self.state.record_error(
                    PipelineStage::ProposeSources,
                    format!("unparseable proposal: {}", reason),
                );
                Default::default()
            }
        };
        for issue in parsed.issues {
            self.state.record_error(PipelineStage::ProposeSources, issue);
        }

        let mut candidates = Vec::with_capacity(parsed.candidates.len());
        for candidate in parsed.candidates {
            match validate_url(&candidate.url) {
                Ok(_) => candidates.push(candidate),
                Err(reason) => {
                    tracing::warn!(url = %candidate.url, "dropping proposed source with invalid url");
                    self.state.record_error(PipelineStage::ProposeSources, reason);
                }
            }
        }
        if candidates.len() > max_sources {
            tracing::debug!(proposed = candidates.len(), max_sources, "capping proposed sources");
            candidates.truncate(max_sources);
        }

        tracing::info!(count = candidates.len(), "sources proposed");
        self.state.set_proposed_sources(candidates)?;
        Ok(())
    }

    async fn fetch_content(&mut self) -> Result<(), PipelineError> {
        let candidates = self.state.proposed_sources().to_vec();
        let sources = if candidates.is_empty() {
            Vec::new()
        } else {
            self.context
                .fetcher
                .fetch_sources(&candidates, &self.cancel)
                .await
        };

        for source in sources.iter().filter(|source| !source.is_usable()) {
            let detail = match &source.fetch_error {
                Some(error) => format!("{}: {} ({})", source.candidate.url, source.fetch_status, error),
                None => format!("{}: {}", source.candidate.url, source.fetch_status),
            };
            self.state.record_error(PipelineStage::FetchContent, detail);
        }

        let attempted = sources.len();
        let usable = sources.iter().filter(|source| source.is_usable()).count();
        self.state.set_fetched_sources(sources)?;
        tracing::info!(attempted, usable, "content fetched");

        if self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        if usable == 0 {
            match self.context.config.research.empty_sources_policy {
                EmptySourcesPolicy::Abort => {
                    return Err(PipelineError::NoUsableSources { attempted });
                }
                EmptySourcesPolicy::Proceed => {
                    tracing::warn!(attempted, "no usable sources, synthesizing without material");
                    self.state.record_error(
                        PipelineStage::FetchContent,
                        "no usable sources, proceeding without material",
                    );
                }
            }
        }
        Ok(())
    }

    async fn synthesize(&mut self) -> Result<(), PipelineError> {
        let (system_prompt, prompt) = build_synthesis_prompt(
            self.state.query(),
            self.state.framework_text(),
            self.state.usable_sources(),
        );
        let options = GenerationOptions::new().with_system_prompt(system_prompt);
        let findings = self.context.provider.generate(&prompt, &options).await?;

        tracing::info!(chars = findings.chars().count(), "findings synthesized");
        self.state.set_findings(findings)?;
        Ok(())
    }

    async fn persist(&mut self) -> Result<PathBuf, PipelineError> {
        let output_path = self.context.persister.persist(&self.state).await?;
        self.state.set_output_path(output_path.clone())?;
        Ok(output_path)
    }
}
