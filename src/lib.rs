pub mod cli;
pub mod config;
pub mod fetcher;
pub mod generator;
pub mod llm;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use generator::research::{CompletedRun, FailedRun, PipelineError, PipelineOrchestrator};
pub use generator::workflow::launch;
