use crate::config::Config;
use crate::generator::context::ResearchContext;
use crate::generator::research::{CompletedRun, PipelineOrchestrator};

use anyhow::Result;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// 时间跟踪作用域
#[derive(Debug, Clone)]
pub struct TimingScope {
    start_time: Instant,
    phase_start_times: Vec<(String, Instant)>,
    /// 按结束顺序记录
    phase_durations: Vec<(String, Duration)>,
}

impl Default for TimingScope {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingScope {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            phase_start_times: Vec::new(),
            phase_durations: Vec::new(),
        }
    }

    /// 开始一个新的阶段计时
    pub fn start_phase(&mut self, phase_name: &str) {
        self.phase_start_times.retain(|(name, _)| name != phase_name);
        self.phase_start_times
            .push((phase_name.to_string(), Instant::now()));
    }

    /// 结束一个阶段的计时
    pub fn end_phase(&mut self, phase_name: &str) -> Option<Duration> {
        let index = self
            .phase_start_times
            .iter()
            .position(|(name, _)| name == phase_name)?;
        let (name, start_time) = self.phase_start_times.remove(index);
        let duration = start_time.elapsed();
        self.phase_durations.push((name, duration));
        Some(duration)
    }

    /// 获取总执行时间
    pub fn get_total_duration(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 获取所有阶段的执行时间
    pub fn get_phase_durations(&self) -> &[(String, Duration)] {
        &self.phase_durations
    }

    pub fn get_phase_duration(&self, phase_name: &str) -> Option<Duration> {
        self.phase_durations
            .iter()
            .find(|(name, _)| name == phase_name)
            .map(|(_, duration)| *duration)
    }

    /// 获取格式化的执行时间报告
    pub fn generate_timing_report(&self) -> String {
        let mut report = format!(
            "总执行时间: {:.2}秒\n",
            self.get_total_duration().as_secs_f64()
        );

        if !self.phase_durations.is_empty() {
            report.push_str("\n各阶段执行时间:\n");
            for (phase, duration) in &self.phase_durations {
                report.push_str(&format!("- {}: {:.3}秒\n", phase, duration.as_secs_f64()));
            }
        }

        report
    }
}

/// 按配置构造协作者并执行一次调研
pub async fn launch(config: &Config, query: &str, cancel: CancellationToken) -> Result<CompletedRun> {
    let context = ResearchContext::from_config(config.clone()).await?;
    println!("🤖 使用模型: {}", context.provider.display_name());

    execute(context, query, cancel).await
}

/// 使用给定的协作者执行一次调研
pub async fn execute(
    context: ResearchContext,
    query: &str,
    cancel: CancellationToken,
) -> Result<CompletedRun> {
    println!("🚀 开始调研: {}", query);

    let outcome = PipelineOrchestrator::new(context, query)
        .with_cancellation(cancel)
        .run()
        .await;

    match outcome {
        Ok(completed) => {
            println!(
                "✅ 调研完成，共抓取 {} 个来源，结果已保存: {}",
                completed.state.fetched_sources().len(),
                completed.output_path.display()
            );
            println!("\n{}", completed.timing.generate_timing_report());
            Ok(completed)
        }
        Err(failed) => {
            eprintln!("❌ 调研在阶段 {} 失败: {}", failed.stage, failed.error);
            for (stage, error) in failed.state.stage_errors() {
                eprintln!("   ⚠️ {}: {}", stage, error);
            }
            Err(failed.into())
        }
    }
}

// Include tests
#[cfg(test)]
mod tests;
