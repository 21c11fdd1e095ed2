// src/memory/semantic.rs — Long-term semantic memory capability
//
// `add` runs an extraction step over the submitted messages and indexes what
// it keeps; callers must not assume one stored record per call.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::params;
use std::sync::Arc;
use tracing::{debug, info};

use super::embeddings::{decode_embedding, encode_embedding, text_similarity, top_k_by_similarity};
use super::types::{AddAck, MemoryRecord};
use super::{lock, SharedConnection};
use crate::infra::errors::SqlBuddyError;
use crate::provider::{Generator, Message, ModelProvider, Role};

const TIER: &str = "long-term";

#[async_trait]
pub trait SemanticMemory: Send + Sync {
    async fn add(
        &self,
        messages: &[Message],
        owner_id: &str,
        metadata: &serde_json::Value,
    ) -> Result<AddAck, SqlBuddyError>;

    /// Up to `limit` records of `owner_id`, most similar to `query` first.
    async fn search(
        &self,
        query: &str,
        owner_id: &str,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, SqlBuddyError>;

    /// Delete one record. Unknown ids are not an error.
    async fn delete(&self, id: &str) -> Result<(), SqlBuddyError>;

    /// Delete every record of `owner_id`.
    async fn delete_all(&self, owner_id: &str) -> Result<(), SqlBuddyError>;

    /// Every record of `owner_id`, newest first.
    async fn get_all(&self, owner_id: &str) -> Result<Vec<MemoryRecord>, SqlBuddyError>;
}

// ─── Extraction ─────────────────────────────────────────────────────────────

/// Decides which facts of a conversation are worth keeping.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, messages: &[Message]) -> Result<Vec<String>, SqlBuddyError>;
}

/// Keeps the non-system message contents unchanged.
pub struct VerbatimExtractor;

#[async_trait]
impl Extractor for VerbatimExtractor {
    async fn extract(&self, messages: &[Message]) -> Result<Vec<String>, SqlBuddyError> {
        Ok(messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| m.content.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect())
    }
}

const EXTRACTION_PROMPT: &str = "You maintain long-term memory for a SQL assistant.
From the conversation below, extract the durable facts worth remembering about
the user's interests, the data they asked about and what the queries found.
Write one short fact per line. If nothing is worth remembering, answer NONE.

Conversation:
";

/// Lets the generator model pick the facts to keep.
pub struct ModelExtractor {
    generator: Generator,
}

impl ModelExtractor {
    pub fn new(generator: Generator) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Extractor for ModelExtractor {
    async fn extract(&self, messages: &[Message]) -> Result<Vec<String>, SqlBuddyError> {
        let conversation: Vec<String> = messages
            .iter()
            .map(|m| format!("{}: {}", m.role.as_str(), m.content))
            .collect();
        let prompt = format!("{EXTRACTION_PROMPT}{}", conversation.join("\n"));
        let raw = self.generator.generate(&prompt).await?;
        Ok(parse_facts(&raw))
    }
}

/// Split a model answer into facts: one per line, list markers removed,
/// `NONE` meaning nothing.
pub fn parse_facts(raw: &str) -> Vec<String> {
    raw.lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(['-', '*', '•'])
                .trim_start_matches(|c: char| c.is_ascii_digit())
                .trim_start_matches(['.', ')'])
                .trim()
        })
        .filter(|line| !line.is_empty() && !line.eq_ignore_ascii_case("none"))
        .map(str::to_string)
        .collect()
}

// ─── SQLite implementation ──────────────────────────────────────────────────

/// Long-term memories in the memory database, ranked by cosine similarity
/// of provider embeddings.
pub struct SqliteSemanticMemory {
    conn: SharedConnection,
    embedder: Arc<dyn ModelProvider>,
    extractor: Arc<dyn Extractor>,
    dedup_threshold: f32,
}

impl SqliteSemanticMemory {
    pub fn new(
        conn: SharedConnection,
        embedder: Arc<dyn ModelProvider>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        Self {
            conn,
            embedder,
            extractor,
            dedup_threshold: 0.9,
        }
    }

    pub fn with_dedup_threshold(mut self, threshold: f32) -> Self {
        self.dedup_threshold = threshold;
        self
    }

    fn owner_contents(&self, owner_id: &str) -> Result<Vec<String>, SqlBuddyError> {
        let conn = lock(&self.conn, TIER)?;
        let mut stmt = conn.prepare("SELECT content FROM long_term_memories WHERE owner_id = ?1")?;
        let rows = stmt.query_map(params![owner_id], |r| r.get(0))?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    fn owner_embeddings(
        &self,
        owner_id: &str,
    ) -> Result<Vec<(MemoryRecord, Vec<f32>)>, SqlBuddyError> {
        let conn = lock(&self.conn, TIER)?;
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, content, metadata, created_at, embedding
             FROM long_term_memories WHERE owner_id = ?1 AND embedding IS NOT NULL",
        )?;
        let rows = stmt.query_map(params![owner_id], |row| {
            let metadata: String = row.get(3)?;
            let blob: Vec<u8> = row.get(5)?;
            Ok((
                MemoryRecord {
                    id: row.get(0)?,
                    owner_id: row.get(1)?,
                    text: row.get(2)?,
                    metadata: serde_json::from_str(&metadata).unwrap_or_default(),
                    score: None,
                    created_at: row.get(4)?,
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
impl SemanticMemory for SqliteSemanticMemory {
    async fn add(
        &self,
        messages: &[Message],
        owner_id: &str,
        metadata: &serde_json::Value,
    ) -> Result<AddAck, SqlBuddyError> {
        let facts = self.extractor.extract(messages).await?;
        if facts.is_empty() {
            debug!(owner_id, "Extraction kept nothing");
            return Ok(AddAck::default());
        }

        let mut known = self.owner_contents(owner_id)?;
        let mut fresh: Vec<String> = Vec::new();
        let mut skipped = 0;
        for fact in facts {
            if known
                .iter()
                .any(|k| text_similarity(k, &fact) >= self.dedup_threshold)
            {
                skipped += 1;
                continue;
            }
            known.push(fact.clone());
            fresh.push(fact);
        }
        if fresh.is_empty() {
            return Ok(AddAck {
                stored_ids: Vec::new(),
                skipped_duplicates: skipped,
            });
        }

        let refs: Vec<&str> = fresh.iter().map(String::as_str).collect();
        let vectors = self.embedder.embed(&refs).await?;
        if vectors.len() != fresh.len() {
            return Err(SqlBuddyError::Provider {
                provider: self.embedder.id().to_string(),
                message: format!("expected {} embeddings, got {}", fresh.len(), vectors.len()),
                retriable: false,
            });
        }

        let metadata_json = serde_json::to_string(metadata)?;
        let now = Utc::now().to_rfc3339();
        let mut stored_ids = Vec::with_capacity(fresh.len());
        {
            let mut conn = lock(&self.conn, TIER)?;
            let tx = conn.transaction()?;
            for (fact, vector) in fresh.iter().zip(vectors.iter()) {
                let id = uuid::Uuid::new_v4().to_string();
                tx.execute(
                    "INSERT INTO long_term_memories (id, owner_id, content, metadata, embedding, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![id, owner_id, fact, metadata_json, encode_embedding(vector), now],
                )?;
                stored_ids.push(id);
            }
            tx.commit()?;
        }

        info!(owner_id, stored = stored_ids.len(), skipped, "Indexed long-term memories");
        Ok(AddAck {
            stored_ids,
            skipped_duplicates: skipped,
        })
    }

    async fn search(
        &self,
        query: &str,
        owner_id: &str,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, SqlBuddyError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let candidates = self.owner_embeddings(owner_id)?;
        // Cold start: no history, no embedding call.
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = self
            .embedder
            .embed(&[query])
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        Ok(top_k_by_similarity(&query_vec, candidates, limit)
            .into_iter()
            .map(|(mut record, score)| {
                record.score = Some(score);
                record
            })
            .collect())
    }

    async fn delete(&self, id: &str) -> Result<(), SqlBuddyError> {
        let conn = lock(&self.conn, TIER)?;
        conn.execute("DELETE FROM long_term_memories WHERE id = ?1", params![id])?;
        Ok(())
    }

    async fn delete_all(&self, owner_id: &str) -> Result<(), SqlBuddyError> {
        let conn = lock(&self.conn, TIER)?;
        let removed = conn.execute(
            "DELETE FROM long_term_memories WHERE owner_id = ?1",
            params![owner_id],
        )?;
        info!(owner_id, removed, "Deleted long-term memories");
        Ok(())
    }

    async fn get_all(&self, owner_id: &str) -> Result<Vec<MemoryRecord>, SqlBuddyError> {
        let conn = lock(&self.conn, TIER)?;
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, content, metadata, created_at
             FROM long_term_memories WHERE owner_id = ?1
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map(params![owner_id], |row| {
            let metadata: String = row.get(3)?;
            Ok(MemoryRecord {
                id: row.get(0)?,
                owner_id: row.get(1)?,
                text: row.get(2)?,
                metadata: serde_json::from_str(&metadata).unwrap_or_default(),
                score: None,
                created_at: row.get(4)?,
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}
