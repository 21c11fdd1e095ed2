// src/retrieval/ingest.rs — Offline schema ingestion
//
// One chunk per table, verbatim definition text, `table` metadata. Every run
// replaces the whole collection.

use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use tracing::{debug, info};

use super::index::{IndexedDocument, VectorIndex};
use crate::infra::errors::SqlBuddyError;

const CREATE_TABLE: &str = "create table";

/// One table-definition statement.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub table_name: String,
    pub text: String,
}

impl TableDefinition {
    pub fn to_document(&self) -> IndexedDocument {
        IndexedDocument {
            content: self.text.clone(),
            metadata: serde_json::json!({ "table": self.table_name }),
        }
    }
}

/// Split a schema script into table definitions. Matching is
/// case-insensitive; statements other than `CREATE TABLE` are dropped.
pub fn split_schema(schema: &str) -> Vec<TableDefinition> {
    // ASCII lowercasing keeps byte offsets aligned with `schema`.
    let lowered = schema.to_ascii_lowercase();
    let starts: Vec<usize> = lowered.match_indices(CREATE_TABLE).map(|(i, _)| i).collect();

    let mut tables = Vec::new();
    for (n, &start) in starts.iter().enumerate() {
        let end = starts.get(n + 1).copied().unwrap_or(schema.len());
        let segment = &schema[start..end];

        let Some(open) = segment.find('(') else {
            continue;
        };
        let name = clean_table_name(&segment[CREATE_TABLE.len()..open]);
        if name.is_empty() {
            continue;
        }

        let text = match segment[open..].find(';') {
            Some(semi) => &segment[..open + semi + 1],
            None => segment,
        };
        tables.push(TableDefinition {
            table_name: name,
            text: text.trim().to_string(),
        });
    }
    tables
}

fn clean_table_name(raw: &str) -> String {
    let mut name = raw.trim();
    if let Some(prefix) = name.get(..13) {
        if prefix.eq_ignore_ascii_case("if not exists") {
            name = name[13..].trim();
        }
    }
    name.chars()
        .filter(|c| !matches!(c, '"' | '`' | '[' | ']'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Table definitions from a SQLite database catalog, ordered by name.
pub fn schema_from_database(path: &Path) -> Result<Vec<TableDefinition>, SqlBuddyError> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    let mut stmt = conn.prepare(
        "SELECT name, sql FROM sqlite_master
         WHERE type = 'table' AND sql IS NOT NULL AND name NOT LIKE 'sqlite_%'
         ORDER BY name",
    )?;
    let rows = stmt.query_map([], |row| {
        let name: String = row.get(0)?;
        let sql: String = row.get(1)?;
        Ok(TableDefinition {
            table_name: name,
            text: format!("{};", sql.trim().trim_end_matches(';')),
        })
    })?;

    let mut tables = Vec::new();
    for row in rows {
        tables.push(row?);
    }
    Ok(tables)
}

/// Rebuild the index from `tables`, discarding whatever it held before.
pub async fn ingest_tables(
    index: &dyn VectorIndex,
    tables: &[TableDefinition],
) -> Result<usize, SqlBuddyError> {
    for t in tables {
        debug!(table = %t.table_name, "Embedding table definition");
    }
    let documents = tables.iter().map(TableDefinition::to_document).collect();
    let count = index.replace(documents).await?;
    info!(tables = count, "Schema index rebuilt");
    Ok(count)
}
