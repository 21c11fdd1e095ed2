// src/memory/mod.rs — Two-tier conversation memory

pub mod embeddings;
pub mod list_backend;
pub mod long_term;
pub mod manager;
pub mod schema;
pub mod semantic;
pub mod short_term;
pub mod types;

use rusqlite::Connection;
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::infra::errors::SqlBuddyError;

/// SQLite connection shared by the SQLite-backed capabilities
/// (short-term lists, long-term memories, vector index).
pub type SharedConnection = Arc<Mutex<Connection>>;

/// Open (or create) the memory database at the given path and migrate it.
pub fn open_database(path: &Path) -> Result<SharedConnection, SqlBuddyError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| SqlBuddyError::Other(e.into()))?;
        }
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    schema::run_migrations(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// Create an in-memory database (for testing).
pub fn in_memory_database() -> Result<SharedConnection, SqlBuddyError> {
    let conn = Connection::open_in_memory()?;
    schema::run_migrations(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

pub(crate) fn lock<'a>(
    conn: &'a SharedConnection,
    tier: &str,
) -> Result<MutexGuard<'a, Connection>, SqlBuddyError> {
    conn.lock().map_err(|_| SqlBuddyError::MemoryUnavailable {
        tier: tier.to_string(),
        message: "connection lock poisoned".into(),
    })
}

/// Bound a store call; an elapsed deadline becomes `SqlBuddyError::Timeout`.
pub(crate) async fn with_timeout<T, F>(
    operation: &str,
    limit: Duration,
    fut: F,
) -> Result<T, SqlBuddyError>
where
    F: Future<Output = Result<T, SqlBuddyError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(SqlBuddyError::Timeout {
            operation: operation.to_string(),
            after_ms: limit.as_millis() as u64,
        }),
    }
}
