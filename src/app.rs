// src/app.rs — Wiring of concrete components from a Config

use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::core::prompts::PromptBuilder;
use crate::core::{PipelineConfig, QueryPipeline};
use crate::infra::config::{Config, ExtractionMode};
use crate::memory::list_backend::SqliteListBackend;
use crate::memory::long_term::LongTermStore;
use crate::memory::manager::MemoryManager;
use crate::memory::semantic::{Extractor, ModelExtractor, SqliteSemanticMemory, VerbatimExtractor};
use crate::memory::short_term::ShortTermStore;
use crate::memory::{open_database, SharedConnection};
use crate::provider::openai::OpenAIProvider;
use crate::provider::retry::RetryProvider;
use crate::provider::{Generator, ModelProvider, ModelRef};
use crate::retrieval::ingest::{ingest_tables, schema_from_database, split_schema};
use crate::retrieval::{SchemaRetriever, SqliteVectorIndex};
use crate::sql::SqliteEngine;

/// Long-lived handles shared by every request.
pub struct App {
    pub config: Config,
    pub memory: Arc<MemoryManager>,
    pub index: Arc<SqliteVectorIndex>,
    generator: Generator,
}

impl App {
    /// Build the OpenAI-compatible provider from the environment and open
    /// the memory database.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let generator_ref = ModelRef::parse(&config.models.generator)
            .with_context(|| format!("invalid generator model '{}'", config.models.generator))?;
        let embedder_ref = ModelRef::parse(&config.models.embedder)
            .with_context(|| format!("invalid embedder model '{}'", config.models.embedder))?;
        if config.models.base_url.is_none()
            && (generator_ref.provider != "openai" || embedder_ref.provider != "openai")
        {
            anyhow::bail!(
                "provider '{}' needs models.base_url pointing at an OpenAI-compatible endpoint",
                generator_ref.provider
            );
        }

        let api_key = std::env::var(&config.models.api_key_env)
            .with_context(|| format!("{} is not set", config.models.api_key_env))?;
        let openai = match &config.models.base_url {
            Some(url) => OpenAIProvider::with_base_url(api_key, url.clone()),
            None => OpenAIProvider::new(api_key),
        }
        .with_embedding_model(embedder_ref.model.clone())
        .with_request_timeout(config.timeouts.generation());
        let provider: Arc<dyn ModelProvider> = Arc::new(RetryProvider::with_config(
            Arc::new(openai),
            (&config.retry).into(),
        ));

        let db_path = config.memory.db_path();
        let conn = open_database(&db_path)
            .with_context(|| format!("opening memory database {}", db_path.display()))?;
        info!(path = %db_path.display(), "Memory database ready");

        Ok(Self::with_components(config, provider, generator_ref.model, conn))
    }

    /// Wire everything around an existing provider and memory connection.
    pub fn with_components(
        config: Config,
        provider: Arc<dyn ModelProvider>,
        generator_model: impl Into<String>,
        conn: SharedConnection,
    ) -> Self {
        let generator = Generator::new(Arc::clone(&provider), generator_model)
            .with_temperature(config.models.temperature)
            .with_timeout(config.timeouts.generation());

        let extractor: Arc<dyn Extractor> = match config.memory.extraction {
            ExtractionMode::Model => Arc::new(ModelExtractor::new(generator.clone())),
            ExtractionMode::Verbatim => Arc::new(VerbatimExtractor),
        };
        let semantic = SqliteSemanticMemory::new(conn.clone(), Arc::clone(&provider), extractor)
            .with_dedup_threshold(config.memory.dedup_threshold);

        let short_term = ShortTermStore::new(Arc::new(SqliteListBackend::new(conn.clone())))
            .with_limits(
                config.memory.short_term_max_entries,
                config.memory.short_term_ttl(),
            )
            .with_timeout(config.timeouts.memory());
        let long_term = LongTermStore::new(Arc::new(semantic))
            .with_timeout(config.timeouts.memory())
            .with_write_timeout(config.timeouts.long_term_write())
            .with_insight_chars(config.memory.long_term_insights_chars);

        let memory = MemoryManager::new(Arc::new(short_term), Arc::new(long_term))
            .with_write_mode(config.memory.long_term_writes)
            .with_context_sizes(config.memory.k_short, config.memory.k_long);

        let index = SqliteVectorIndex::new(conn, provider, config.retrieval.collection.clone());

        Self {
            config,
            memory: Arc::new(memory),
            index: Arc::new(index),
            generator,
        }
    }

    /// A pipeline over the configured retail database.
    pub fn pipeline(&self) -> anyhow::Result<QueryPipeline> {
        let engine = SqliteEngine::open(&self.config.database.path)?;
        let prompts = PromptBuilder::new(self.config.memory.insight_row_limit)?;
        Ok(QueryPipeline::new(
            SchemaRetriever::new(self.index.clone()).with_timeout(self.config.timeouts.retrieval()),
            Arc::clone(&self.memory),
            self.generator.clone(),
            Arc::new(engine),
            prompts,
            PipelineConfig {
                top_k: self.config.retrieval.top_k,
                insights_preview_chars: self.config.memory.insights_preview_chars,
                execution_timeout: self.config.timeouts.execution(),
            },
        ))
    }

    /// Rebuild the schema index from a schema script, or from the
    /// database catalog when no script is given.
    pub async fn ingest(&self, schema_file: Option<&Path>) -> anyhow::Result<usize> {
        let schema_file = schema_file.or(self.config.database.schema_file.as_deref());
        let tables = match schema_file {
            Some(path) => {
                let text = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("reading schema file {}", path.display()))?;
                split_schema(&text)
            }
            None => schema_from_database(&self.config.database.path)?,
        };
        if tables.is_empty() {
            anyhow::bail!("no CREATE TABLE statements found");
        }
        Ok(ingest_tables(self.index.as_ref(), &tables).await?)
    }
}
