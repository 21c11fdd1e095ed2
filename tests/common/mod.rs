// tests/common/mod.rs — Shared test doubles

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::Connection;

use sqlbuddy::infra::errors::SqlBuddyError;
use sqlbuddy::memory::list_backend::ListBackend;
use sqlbuddy::memory::semantic::SemanticMemory;
use sqlbuddy::memory::types::{AddAck, MemoryRecord};
use sqlbuddy::provider::*;
use sqlbuddy::retrieval::{IndexedDocument, ScoredDocument, VectorIndex};
use sqlbuddy::sql::SqliteEngine;

pub const EMBEDDING_DIMS: usize = 512;

/// Deterministic bag-of-words embedding: each lowercase alphanumeric token
/// adds 1.0 to a hashed bucket.
pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut v = vec![0.0; EMBEDDING_DIMS];
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let mut hash: u64 = 0xcbf29ce484222325;
        for b in token.to_lowercase().bytes() {
            hash ^= b as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        v[(hash % EMBEDDING_DIMS as u64) as usize] += 1.0;
    }
    v
}

/// A mock provider that answers from scripted rules without any network
/// calls. The first rule whose marker occurs in the prompt wins.
pub struct MockProvider {
    rules: Vec<(String, Result<String, String>)>,
    default_reply: String,
    prompts: Mutex<Vec<String>>,
    embed_calls: AtomicUsize,
    fail_embeddings: bool,
    chat_delay: Option<Duration>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            default_reply: "NONE".into(),
            prompts: Mutex::new(Vec::new()),
            embed_calls: AtomicUsize::new(0),
            fail_embeddings: false,
            chat_delay: None,
        }
    }

    /// Reply with `reply` to prompts containing `marker`.
    pub fn on(mut self, marker: &str, reply: &str) -> Self {
        self.rules.push((marker.into(), Ok(reply.into())));
        self
    }

    /// Fail prompts containing `marker` with a non-retriable provider error.
    pub fn fail_on(mut self, marker: &str, message: &str) -> Self {
        self.rules.push((marker.into(), Err(message.into())));
        self
    }

    /// Sleep on the tokio clock before answering any chat request.
    pub fn with_chat_delay(mut self, delay: Duration) -> Self {
        self.chat_delay = Some(delay);
        self
    }

    pub fn failing_embeddings(mut self) -> Self {
        self.fail_embeddings = true;
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn prompts_containing(&self, marker: &str) -> Vec<String> {
        self.prompts()
            .into_iter()
            .filter(|p| p.contains(marker))
            .collect()
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn id(&self) -> &str {
        "mock"
    }

    fn name(&self) -> &str {
        "Mock Provider"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, SqlBuddyError> {
        let prompt = request
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().unwrap().push(prompt.clone());
        if let Some(delay) = self.chat_delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self
            .rules
            .iter()
            .find(|(marker, _)| prompt.contains(marker.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| Ok(self.default_reply.clone()));

        match reply {
            Ok(content) => Ok(ChatResponse {
                content,
                usage: TokenUsage::default(),
                stop_reason: StopReason::EndTurn,
            }),
            Err(message) => Err(SqlBuddyError::Provider {
                provider: "mock".into(),
                message,
                retriable: false,
            }),
        }
    }

    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, SqlBuddyError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_embeddings {
            return Err(SqlBuddyError::Provider {
                provider: "mock".into(),
                message: "embedding service down".into(),
                retriable: false,
            });
        }
        Ok(texts.iter().map(|t| bag_of_words(t)).collect())
    }
}

fn down(tier: &str) -> SqlBuddyError {
    SqlBuddyError::MemoryUnavailable {
        tier: tier.into(),
        message: "connection refused".into(),
    }
}

/// List backend whose every call fails, like an unreachable server.
pub struct FailingListBackend;

#[async_trait]
impl ListBackend for FailingListBackend {
    async fn push_front_bounded(
        &self,
        _key: &str,
        _value: String,
        _max_len: usize,
        _ttl: Duration,
    ) -> Result<(), SqlBuddyError> {
        Err(down("short-term"))
    }

    async fn range(&self, _key: &str, _start: usize, _count: usize) -> Result<Vec<String>, SqlBuddyError> {
        Err(down("short-term"))
    }

    async fn len(&self, _key: &str) -> Result<usize, SqlBuddyError> {
        Err(down("short-term"))
    }

    async fn ttl(&self, _key: &str) -> Result<Option<Duration>, SqlBuddyError> {
        Err(down("short-term"))
    }

    async fn delete(&self, _key: &str) -> Result<(), SqlBuddyError> {
        Err(down("short-term"))
    }
}

/// List backend that never answers.
pub struct HangingListBackend;

#[async_trait]
impl ListBackend for HangingListBackend {
    async fn push_front_bounded(
        &self,
        _key: &str,
        _value: String,
        _max_len: usize,
        _ttl: Duration,
    ) -> Result<(), SqlBuddyError> {
        std::future::pending().await
    }

    async fn range(&self, _key: &str, _start: usize, _count: usize) -> Result<Vec<String>, SqlBuddyError> {
        std::future::pending().await
    }

    async fn len(&self, _key: &str) -> Result<usize, SqlBuddyError> {
        std::future::pending().await
    }

    async fn ttl(&self, _key: &str) -> Result<Option<Duration>, SqlBuddyError> {
        std::future::pending().await
    }

    async fn delete(&self, _key: &str) -> Result<(), SqlBuddyError> {
        std::future::pending().await
    }
}

/// Vector index that never answers.
pub struct HangingVectorIndex;

#[async_trait]
impl VectorIndex for HangingVectorIndex {
    async fn replace(&self, _documents: Vec<IndexedDocument>) -> Result<usize, SqlBuddyError> {
        std::future::pending().await
    }

    async fn search(&self, _text: &str, _k: usize) -> Result<Vec<ScoredDocument>, SqlBuddyError> {
        std::future::pending().await
    }
}

/// Semantic memory whose every call fails.
pub struct FailingSemanticMemory;

#[async_trait]
impl SemanticMemory for FailingSemanticMemory {
    async fn add(
        &self,
        _messages: &[Message],
        _owner_id: &str,
        _metadata: &serde_json::Value,
    ) -> Result<AddAck, SqlBuddyError> {
        Err(down("long-term"))
    }

    async fn search(&self, _query: &str, _owner_id: &str, _limit: usize) -> Result<Vec<MemoryRecord>, SqlBuddyError> {
        Err(down("long-term"))
    }

    async fn delete(&self, _id: &str) -> Result<(), SqlBuddyError> {
        Err(down("long-term"))
    }

    async fn delete_all(&self, _owner_id: &str) -> Result<(), SqlBuddyError> {
        Err(down("long-term"))
    }

    async fn get_all(&self, _owner_id: &str) -> Result<Vec<MemoryRecord>, SqlBuddyError> {
        Err(down("long-term"))
    }
}

/// In-process semantic memory keeping every submitted message verbatim.
#[derive(Default)]
pub struct RecordingSemanticMemory {
    records: Mutex<HashMap<String, Vec<MemoryRecord>>>,
}

impl RecordingSemanticMemory {
    pub fn texts(&self, owner_id: &str) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .get(owner_id)
            .map(|r| r.iter().map(|m| m.text.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SemanticMemory for RecordingSemanticMemory {
    async fn add(
        &self,
        messages: &[Message],
        owner_id: &str,
        metadata: &serde_json::Value,
    ) -> Result<AddAck, SqlBuddyError> {
        let mut records = self.records.lock().unwrap();
        let list = records.entry(owner_id.to_string()).or_default();
        let mut ack = AddAck::default();
        for m in messages {
            let id = format!("{owner_id}-{}", list.len());
            list.push(MemoryRecord {
                id: id.clone(),
                owner_id: owner_id.into(),
                text: m.content.clone(),
                metadata: metadata.clone(),
                score: None,
                created_at: String::new(),
            });
            ack.stored_ids.push(id);
        }
        Ok(ack)
    }

    async fn search(&self, _query: &str, owner_id: &str, limit: usize) -> Result<Vec<MemoryRecord>, SqlBuddyError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(owner_id)
            .map(|r| r.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn delete(&self, id: &str) -> Result<(), SqlBuddyError> {
        for list in self.records.lock().unwrap().values_mut() {
            list.retain(|r| r.id != id);
        }
        Ok(())
    }

    async fn delete_all(&self, owner_id: &str) -> Result<(), SqlBuddyError> {
        self.records.lock().unwrap().remove(owner_id);
        Ok(())
    }

    async fn get_all(&self, owner_id: &str) -> Result<Vec<MemoryRecord>, SqlBuddyError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(owner_id)
            .cloned()
            .unwrap_or_default())
    }
}

pub const RETAIL_SCHEMA: &str = "
CREATE TABLE customers (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE orders (
    id INTEGER PRIMARY KEY,
    customer_id INTEGER,
    total REAL,
    placed_at TEXT
);

CREATE TABLE products (
    id INTEGER PRIMARY KEY,
    title TEXT,
    price REAL
);
";

/// SQL engine over an in-memory retail database with two customers.
pub fn retail_engine() -> SqliteEngine {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(RETAIL_SCHEMA).unwrap();
    conn.execute_batch(
        "INSERT INTO customers (id, name) VALUES (1, 'Ada Lovelace'), (2, 'Alan Turing');",
    )
    .unwrap();
    SqliteEngine::new(conn)
}

pub fn arc_provider(p: MockProvider) -> (Arc<MockProvider>, Arc<dyn ModelProvider>) {
    let concrete = Arc::new(p);
    let dynamic: Arc<dyn ModelProvider> = concrete.clone();
    (concrete, dynamic)
}
