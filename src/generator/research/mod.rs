// 单次调研流程
// 1. load_framework    读取调研框架（可选，失败不终止）
// 2. propose_sources   由模型推荐候选来源
// 3. fetch_content     并发抓取来源内容
// 4. synthesize        结合框架与来源内容生成结论
// 5. persist           输出JSON与Markdown结果

pub mod orchestrator;
pub mod prompts;

pub use orchestrator::{CompletedRun, FailedRun, PipelineError, PipelineOrchestrator};
