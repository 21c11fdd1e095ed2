// src/retrieval/index.rs — Vector index over schema chunks

use async_trait::async_trait;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::infra::errors::SqlBuddyError;
use crate::memory::embeddings::{decode_embedding, encode_embedding, normalize, top_k_by_similarity};
use crate::memory::{lock, SharedConnection};
use crate::provider::ModelProvider;

/// A document to index: its text plus arbitrary JSON metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub content: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub content: String,
    pub metadata: serde_json::Value,
    pub score: f32,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Replace the whole collection with `documents`.
    async fn replace(&self, documents: Vec<IndexedDocument>) -> Result<usize, SqlBuddyError>;

    /// Up to `k` documents, most similar first.
    async fn search(&self, text: &str, k: usize) -> Result<Vec<ScoredDocument>, SqlBuddyError>;
}

/// Collection of embedded documents stored in the memory database.
pub struct SqliteVectorIndex {
    conn: SharedConnection,
    embedder: Arc<dyn ModelProvider>,
    collection: String,
}

impl SqliteVectorIndex {
    pub fn new(
        conn: SharedConnection,
        embedder: Arc<dyn ModelProvider>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            conn,
            embedder,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, rusqlite::Connection>, SqlBuddyError> {
        lock(&self.conn, "schema index")
    }

    fn load(&self) -> Result<Vec<(IndexedDocument, Vec<f32>)>, SqlBuddyError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT content, metadata, embedding FROM index_documents
             WHERE collection = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![self.collection], |row| {
            let metadata: String = row.get(1)?;
            let blob: Vec<u8> = row.get(2)?;
            Ok((
                IndexedDocument {
                    content: row.get(0)?,
                    metadata: serde_json::from_str(&metadata).unwrap_or_default(),
                },
                decode_embedding(&blob),
            ))
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn replace(&self, documents: Vec<IndexedDocument>) -> Result<usize, SqlBuddyError> {
        // Embed before touching the table so a provider failure keeps the
        // previous index intact.
        let vectors = if documents.is_empty() {
            Vec::new()
        } else {
            let texts: Vec<&str> = documents.iter().map(|d| d.content.as_str()).collect();
            self.embedder.embed(&texts).await?
        };
        if vectors.len() != documents.len() {
            return Err(SqlBuddyError::Provider {
                provider: self.embedder.id().to_string(),
                message: format!(
                    "expected {} embeddings, got {}",
                    documents.len(),
                    vectors.len()
                ),
                retriable: false,
            });
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM index_documents WHERE collection = ?1",
            params![self.collection],
        )?;
        for (doc, mut vector) in documents.iter().zip(vectors) {
            normalize(&mut vector);
            tx.execute(
                "INSERT INTO index_documents (collection, content, metadata, embedding)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    self.collection,
                    doc.content,
                    serde_json::to_string(&doc.metadata)?,
                    encode_embedding(&vector)
                ],
            )?;
        }
        tx.commit()?;

        info!(
            collection = %self.collection,
            removed,
            inserted = documents.len(),
            "Replaced index collection"
        );
        Ok(documents.len())
    }

    async fn search(&self, text: &str, k: usize) -> Result<Vec<ScoredDocument>, SqlBuddyError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let documents = self.load()?;
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let query = self
            .embedder
            .embed(&[text])
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        Ok(top_k_by_similarity(&query, documents, k)
            .into_iter()
            .map(|(doc, score)| ScoredDocument {
                content: doc.content,
                metadata: doc.metadata,
                score,
            })
            .collect())
    }
}
