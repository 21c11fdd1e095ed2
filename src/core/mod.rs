// src/core/mod.rs — Query pipeline

pub mod pipeline;
pub mod prompts;
pub mod types;

pub use pipeline::{PipelineConfig, QueryPipeline};
pub use types::{FailureKind, PipelineStage, QueryRequest, QueryResponse};
