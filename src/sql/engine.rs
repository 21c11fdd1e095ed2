// src/sql/engine.rs — SQL execution capability

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::infra::errors::SqlBuddyError;

/// Rows of one executed statement. `columns` is empty when the statement
/// produced no result set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryRows {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Each row as a column-name → value mapping, column order preserved.
    pub fn into_records(self) -> Vec<Map<String, Value>> {
        let columns = self.columns;
        self.rows
            .into_iter()
            .map(|row| columns.iter().cloned().zip(row).collect())
            .collect()
    }
}

#[async_trait]
pub trait SqlEngine: Send + Sync {
    /// Run one statement. Failures are `SqlSyntax` or `SqlExecution`
    /// carrying the engine's message.
    async fn execute(&self, sql: &str) -> Result<QueryRows, SqlBuddyError>;
}

pub struct SqliteEngine {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteEngine {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn open(path: &Path) -> Result<Self, SqlBuddyError> {
        if !path.exists() {
            return Err(SqlBuddyError::Config(format!(
                "database not found at {}",
                path.display()
            )));
        }
        Ok(Self::new(Connection::open(path)?))
    }
}

#[async_trait]
impl SqlEngine for SqliteEngine {
    async fn execute(&self, sql: &str) -> Result<QueryRows, SqlBuddyError> {
        if sql.trim().is_empty() {
            return Err(SqlBuddyError::SqlSyntax("empty SQL statement".into()));
        }
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();

        let rows = tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| SqlBuddyError::SqlExecution("connection lock poisoned".into()))?;
            run_statement(&conn, &sql).map_err(classify)
        })
        .await
        .map_err(|e| SqlBuddyError::SqlExecution(format!("execution task failed: {e}")))??;

        debug!(columns = rows.columns.len(), rows = rows.len(), "Statement executed");
        Ok(rows)
    }
}

fn run_statement(conn: &Connection, sql: &str) -> rusqlite::Result<QueryRows> {
    let mut stmt = conn.prepare(sql)?;
    let column_count = stmt.column_count();
    if column_count == 0 {
        stmt.execute([])?;
        return Ok(QueryRows::default());
    }
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

    let mut rows = Vec::new();
    let mut cursor = stmt.query([])?;
    while let Some(row) = cursor.next()? {
        let mut values = Vec::with_capacity(column_count);
        for i in 0..column_count {
            values.push(to_json(row.get_ref(i)?));
        }
        rows.push(values);
    }
    Ok(QueryRows { columns, rows })
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(hex::encode(b)),
    }
}

fn classify(e: rusqlite::Error) -> SqlBuddyError {
    let message = e.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("syntax error") || lowered.contains("incomplete input") {
        SqlBuddyError::SqlSyntax(message)
    } else {
        SqlBuddyError::SqlExecution(message)
    }
}
