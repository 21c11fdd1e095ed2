// src/retrieval/retriever.rs — Schema retriever

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::index::VectorIndex;
use crate::infra::errors::SqlBuddyError;
use crate::memory::with_timeout;

pub const DEFAULT_RETRIEVAL_TIMEOUT: Duration = Duration::from_secs(10);

/// One retrieved table definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaChunk {
    pub table_name: String,
    pub chunk_text: String,
    pub score: f32,
}

pub struct SchemaRetriever {
    index: Arc<dyn VectorIndex>,
    op_timeout: Duration,
}

impl SchemaRetriever {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self {
            index,
            op_timeout: DEFAULT_RETRIEVAL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    /// Up to `k` table chunks, most similar to `query` first. Any index
    /// failure, including a search that outlives the timeout, is reported as
    /// `RetrievalUnavailable`.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<SchemaChunk>, SqlBuddyError> {
        let hits = with_timeout("schema search", self.op_timeout, self.index.search(query, k))
            .await
            .map_err(|e| SqlBuddyError::RetrievalUnavailable(e.to_string()))?;

        let chunks: Vec<SchemaChunk> = hits
            .into_iter()
            .map(|doc| SchemaChunk {
                table_name: doc
                    .metadata
                    .get("table")
                    .and_then(|t| t.as_str())
                    .unwrap_or("unknown")
                    .to_string(),
                chunk_text: doc.content,
                score: doc.score,
            })
            .collect();

        debug!(
            tables = ?chunks.iter().map(|c| c.table_name.as_str()).collect::<Vec<_>>(),
            "Retrieved schema chunks"
        );
        Ok(chunks)
    }
}

/// Render chunks as the schema section of the SQL prompt. No chunks yields
/// an empty string.
pub fn format_schema_context(chunks: &[SchemaChunk]) -> String {
    chunks
        .iter()
        .map(|c| format!("Table: {}\n{}", c.table_name, c.chunk_text))
        .collect::<Vec<_>>()
        .join("\n\n")
}
