// src/core/pipeline.rs — Query pipeline state machine
//
// RETRIEVE_SCHEMA → RETRIEVE_MEMORY → GENERATE_SQL → EXECUTE_SQL →
// GENERATE_INSIGHTS → RECORD_MEMORY → DONE, never branching back. The two
// retrieval states run concurrently; both finish before generation starts.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::prompts::PromptBuilder;
use super::types::{PipelineStage, QueryRequest, QueryResponse};
use crate::infra::errors::SqlBuddyError;
use crate::memory::manager::MemoryManager;
use crate::memory::types::Interaction;
use crate::provider::Generator;
use crate::retrieval::{format_schema_context, SchemaRetriever};
use crate::sql::{normalize_sql, SqlEngine};

pub struct PipelineConfig {
    pub top_k: usize,
    pub insights_preview_chars: usize,
    pub execution_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            insights_preview_chars: 100,
            execution_timeout: Duration::from_secs(30),
        }
    }
}

pub struct QueryPipeline {
    retriever: SchemaRetriever,
    memory: Arc<MemoryManager>,
    generator: Generator,
    engine: Arc<dyn SqlEngine>,
    prompts: PromptBuilder,
    config: PipelineConfig,
    on_progress: Option<Box<dyn Fn(PipelineStage) + Send + Sync>>,
}

impl QueryPipeline {
    pub fn new(
        retriever: SchemaRetriever,
        memory: Arc<MemoryManager>,
        generator: Generator,
        engine: Arc<dyn SqlEngine>,
        prompts: PromptBuilder,
        config: PipelineConfig,
    ) -> Self {
        Self {
            retriever,
            memory,
            generator,
            engine,
            prompts,
            config,
            on_progress: None,
        }
    }

    /// Callback invoked on every state the request enters.
    pub fn with_progress(mut self, cb: impl Fn(PipelineStage) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(cb));
        self
    }

    fn emit(&self, stage: PipelineStage) {
        if let Some(ref cb) = self.on_progress {
            cb(stage);
        }
    }

    /// Run one request to completion. Every outcome is folded into the
    /// response envelope.
    pub async fn run(&self, request: &QueryRequest) -> QueryResponse {
        let start = Instant::now();
        let QueryRequest {
            question,
            session_id,
            user_id,
        } = request;
        info!(session_id, user_id, question = %question, "Query received");

        // 1 + 2: schema and memory retrieval, no ordering between them.
        self.emit(PipelineStage::RetrieveSchema);
        self.emit(PipelineStage::RetrieveMemory);
        let (chunks, memory) = tokio::join!(
            self.retriever.retrieve(question, self.config.top_k),
            self.memory.combined_context(question, session_id, user_id),
        );
        let schema_context = match chunks {
            Ok(chunks) => format_schema_context(&chunks),
            Err(e) => {
                warn!(error = %e, "Schema retrieval unavailable, continuing without schema");
                String::new()
            }
        };

        // 3: generate + normalize.
        self.emit(PipelineStage::GenerateSql);
        let sql = match self
            .generate(
                "sql",
                self.prompts
                    .sql_prompt(&schema_context, &memory.combined, question),
            )
            .await
        {
            Ok(raw) => normalize_sql(&raw),
            Err(e) => return self.fail(PipelineStage::GenerateSql, None, e),
        };
        info!(stage = %PipelineStage::GenerateSql, sql = %sql, "SQL generated");

        // 4: execute; failures end the request and nothing is remembered.
        self.emit(PipelineStage::ExecuteSql);
        let rows = match tokio::time::timeout(
            self.config.execution_timeout,
            self.engine.execute(&sql),
        )
        .await
        {
            Ok(Ok(rows)) => rows,
            Ok(Err(e)) => return self.fail(PipelineStage::ExecuteSql, Some(sql), e),
            Err(_) => {
                let e = SqlBuddyError::Timeout {
                    operation: "SQL execution".into(),
                    after_ms: self.config.execution_timeout.as_millis() as u64,
                };
                return self.fail(PipelineStage::ExecuteSql, Some(sql), e);
            }
        };
        let columns = rows.columns.clone();
        let results = rows.into_records();
        info!(stage = %PipelineStage::ExecuteSql, rows = results.len(), "SQL executed");

        // 5: insights, attempted even for an empty result set.
        self.emit(PipelineStage::GenerateInsights);
        let insights = self
            .generate(
                "insights",
                self.prompts.insights_prompt(question, &sql, &results),
            )
            .await;

        // 6: remember the exchange, also when insight generation failed.
        self.emit(PipelineStage::RecordMemory);
        let interaction = Interaction::new(
            question.as_str(),
            sql.as_str(),
            results.len(),
            insights.as_deref().unwrap_or(""),
            self.config.insights_preview_chars,
            session_id.as_str(),
            user_id.as_str(),
        );
        let report = self.memory.record_interaction(&interaction).await;
        if report.short_term.is_failed() || report.long_term.is_failed() {
            warn!(session_id, user_id, ?report, "Interaction only partially remembered");
        }

        let response = match insights {
            Ok(insights) => QueryResponse::Success {
                sql,
                results,
                columns,
                insights,
            },
            Err(e) => {
                warn!(stage = %PipelineStage::GenerateInsights, error = %e, "Query failed");
                QueryResponse::failed(PipelineStage::GenerateInsights, Some(sql), &e)
            }
        };

        self.emit(PipelineStage::Done);
        info!(
            session_id,
            success = response.is_success(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Query finished"
        );
        response
    }

    async fn generate(
        &self,
        stage: &str,
        prompt: Result<String, SqlBuddyError>,
    ) -> Result<String, SqlBuddyError> {
        let prompt = prompt?;
        self.generator.generate(&prompt).await.map_err(|e| match e {
            SqlBuddyError::Timeout { .. } => e,
            other => SqlBuddyError::GenerationFailed {
                stage: stage.to_string(),
                message: other.to_string(),
            },
        })
    }

    fn fail(&self, stage: PipelineStage, sql: Option<String>, error: SqlBuddyError) -> QueryResponse {
        warn!(stage = %stage, error = %error, "Query failed");
        let response = QueryResponse::failed(stage, sql, &error);
        self.emit(PipelineStage::Done);
        response
    }
}
