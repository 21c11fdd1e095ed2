// src/memory/list_backend.rs — Keyed, bounded, expiring lists
//
// The short-term tier's storage capability. `push_front_bounded` is the only
// write and is atomic per key: push, trim and expiry reset happen together,
// so no reader ever sees a list longer than `max_len`.

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{lock, SharedConnection};
use crate::infra::errors::SqlBuddyError;

const TIER: &str = "short-term";

#[async_trait]
pub trait ListBackend: Send + Sync {
    /// Push `value` at the head of `key`, keep the newest `max_len` values,
    /// and set the key to expire `ttl` from now.
    async fn push_front_bounded(
        &self,
        key: &str,
        value: String,
        max_len: usize,
        ttl: Duration,
    ) -> Result<(), SqlBuddyError>;

    /// Up to `count` values starting at `start`, newest first. Missing and
    /// expired keys read as empty.
    async fn range(&self, key: &str, start: usize, count: usize)
        -> Result<Vec<String>, SqlBuddyError>;

    async fn len(&self, key: &str) -> Result<usize, SqlBuddyError>;

    /// Remaining lifetime, `None` when the key is missing or expired.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, SqlBuddyError>;

    /// Remove the key. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), SqlBuddyError>;
}

// ─── In-process backend ─────────────────────────────────────────────────────

struct ListEntry {
    items: VecDeque<String>,
    expires_at: Instant,
}

/// Process-local lists. Expiry uses tokio's clock.
#[derive(Default)]
pub struct InMemoryListBackend {
    lists: Mutex<HashMap<String, ListEntry>>,
}

impl InMemoryListBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Drop `key` if it has expired; return the live entry otherwise.
fn live_entry<'a>(
    lists: &'a mut HashMap<String, ListEntry>,
    key: &str,
    now: Instant,
) -> Option<&'a mut ListEntry> {
    let expired = lists.get(key).is_some_and(|e| e.expires_at <= now);
    if expired {
        lists.remove(key);
        return None;
    }
    lists.get_mut(key)
}

#[async_trait]
impl ListBackend for InMemoryListBackend {
    async fn push_front_bounded(
        &self,
        key: &str,
        value: String,
        max_len: usize,
        ttl: Duration,
    ) -> Result<(), SqlBuddyError> {
        let now = Instant::now();
        let mut lists = self.lists.lock().await;
        if live_entry(&mut lists, key, now).is_none() {
            lists.insert(
                key.to_string(),
                ListEntry {
                    items: VecDeque::new(),
                    expires_at: now,
                },
            );
        }
        if let Some(entry) = lists.get_mut(key) {
            entry.items.push_front(value);
            entry.items.truncate(max_len);
            entry.expires_at = now + ttl;
        }
        Ok(())
    }

    async fn range(
        &self,
        key: &str,
        start: usize,
        count: usize,
    ) -> Result<Vec<String>, SqlBuddyError> {
        let mut lists = self.lists.lock().await;
        Ok(live_entry(&mut lists, key, Instant::now())
            .map(|e| e.items.iter().skip(start).take(count).cloned().collect())
            .unwrap_or_default())
    }

    async fn len(&self, key: &str) -> Result<usize, SqlBuddyError> {
        let mut lists = self.lists.lock().await;
        Ok(live_entry(&mut lists, key, Instant::now())
            .map(|e| e.items.len())
            .unwrap_or(0))
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, SqlBuddyError> {
        let now = Instant::now();
        let mut lists = self.lists.lock().await;
        Ok(live_entry(&mut lists, key, now).map(|e| e.expires_at - now))
    }

    async fn delete(&self, key: &str) -> Result<(), SqlBuddyError> {
        self.lists.lock().await.remove(key);
        Ok(())
    }
}

// ─── SQLite backend ─────────────────────────────────────────────────────────

/// Lists persisted in the memory database. Expiry is wall-clock based.
pub struct SqliteListBackend {
    conn: SharedConnection,
}

impl SqliteListBackend {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// Expiry timestamp of a live key, `None` if missing or expired.
    fn live_expiry(
        conn: &rusqlite::Connection,
        key: &str,
        now_ms: i64,
    ) -> Result<Option<i64>, SqlBuddyError> {
        let expires: Option<i64> = conn
            .query_row(
                "SELECT expires_at_ms FROM short_term_lists WHERE list_key = ?1",
                params![key],
                |r| r.get(0),
            )
            .optional()?;
        Ok(expires.filter(|at| *at > now_ms))
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[async_trait]
impl ListBackend for SqliteListBackend {
    async fn push_front_bounded(
        &self,
        key: &str,
        value: String,
        max_len: usize,
        ttl: Duration,
    ) -> Result<(), SqlBuddyError> {
        let now = now_ms();
        let expires_at = now.saturating_add(ttl.as_millis() as i64);
        let mut conn = lock(&self.conn, TIER)?;
        let tx = conn.transaction()?;

        // An expired list starts over.
        tx.execute(
            "DELETE FROM short_term_items WHERE list_key = ?1 AND EXISTS (
                SELECT 1 FROM short_term_lists WHERE list_key = ?1 AND expires_at_ms <= ?2)",
            params![key, now],
        )?;
        let next_seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM short_term_items WHERE list_key = ?1",
            params![key],
            |r| r.get(0),
        )?;
        tx.execute(
            "INSERT INTO short_term_items (list_key, seq, value) VALUES (?1, ?2, ?3)",
            params![key, next_seq, value],
        )?;
        tx.execute(
            "DELETE FROM short_term_items WHERE list_key = ?1 AND seq NOT IN (
                SELECT seq FROM short_term_items WHERE list_key = ?1
                ORDER BY seq DESC LIMIT ?2)",
            params![key, max_len as i64],
        )?;
        tx.execute(
            "INSERT INTO short_term_lists (list_key, expires_at_ms) VALUES (?1, ?2)
             ON CONFLICT(list_key) DO UPDATE SET expires_at_ms = excluded.expires_at_ms",
            params![key, expires_at],
        )?;
        tx.commit()?;
        Ok(())
    }

    async fn range(
        &self,
        key: &str,
        start: usize,
        count: usize,
    ) -> Result<Vec<String>, SqlBuddyError> {
        let conn = lock(&self.conn, TIER)?;
        if Self::live_expiry(&conn, key, now_ms())?.is_none() {
            return Ok(Vec::new());
        }

        let mut stmt = conn.prepare(
            "SELECT value FROM short_term_items WHERE list_key = ?1
             ORDER BY seq DESC LIMIT ?2 OFFSET ?3",
        )?;
        let rows = stmt.query_map(params![key, count as i64, start as i64], |r| r.get(0))?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    async fn len(&self, key: &str) -> Result<usize, SqlBuddyError> {
        let conn = lock(&self.conn, TIER)?;
        if Self::live_expiry(&conn, key, now_ms())?.is_none() {
            return Ok(0);
        }
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM short_term_items WHERE list_key = ?1",
            params![key],
            |r| r.get(0),
        )?;
        Ok(count as usize)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, SqlBuddyError> {
        let now = now_ms();
        let conn = lock(&self.conn, TIER)?;
        Ok(Self::live_expiry(&conn, key, now)?
            .map(|at| Duration::from_millis((at - now).max(0) as u64)))
    }

    async fn delete(&self, key: &str) -> Result<(), SqlBuddyError> {
        let mut conn = lock(&self.conn, TIER)?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM short_term_items WHERE list_key = ?1",
            params![key],
        )?;
        tx.execute(
            "DELETE FROM short_term_lists WHERE list_key = ?1",
            params![key],
        )?;
        tx.commit()?;
        Ok(())
    }
}
