// src/cli/progress.rs — Terminal progress renderer for pipeline stages

use crate::core::types::PipelineStage;

fn describe(stage: PipelineStage) -> &'static str {
    match stage {
        PipelineStage::RetrieveSchema => "searching schema...",
        PipelineStage::RetrieveMemory => "recalling conversation...",
        PipelineStage::GenerateSql => "writing SQL...",
        PipelineStage::ExecuteSql => "running query...",
        PipelineStage::GenerateInsights => "summarizing results...",
        PipelineStage::RecordMemory => "remembering...",
        PipelineStage::Done => "done",
    }
}

/// One progress line for a stage.
pub fn format_stage(stage: PipelineStage) -> String {
    format!("[{}] {}", stage.as_str().to_lowercase(), describe(stage))
}

/// Build a progress callback that writes formatted output to stderr.
///
/// All progress output goes to stderr so stdout remains clean for results.
/// Returns a closure suitable for `QueryPipeline::with_progress()`.
pub fn terminal_progress() -> impl Fn(PipelineStage) + Send + Sync + 'static {
    move |stage| eprintln!("{}", format_stage(stage))
}
