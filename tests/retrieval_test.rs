// tests/retrieval_test.rs — Integration test: schema ingest + retrieval

mod common;

use std::sync::Arc;

use common::{arc_provider, MockProvider, RETAIL_SCHEMA};
use sqlbuddy::infra::errors::SqlBuddyError;
use sqlbuddy::memory::in_memory_database;
use sqlbuddy::retrieval::ingest::{ingest_tables, split_schema};
use sqlbuddy::retrieval::{
    format_schema_context, IndexedDocument, SchemaRetriever, SqliteVectorIndex, VectorIndex,
};

fn index_count(conn: &sqlbuddy::memory::SharedConnection, collection: &str) -> i64 {
    conn.lock()
        .unwrap()
        .query_row(
            "SELECT COUNT(*) FROM index_documents WHERE collection = ?1",
            [collection],
            |r| r.get(0),
        )
        .unwrap()
}

#[tokio::test]
async fn test_ingest_one_chunk_per_table() {
    let conn = in_memory_database().unwrap();
    let (_mock, provider) = arc_provider(MockProvider::new());
    let index = SqliteVectorIndex::new(conn.clone(), provider, "schema_embeddings");

    let tables = split_schema(RETAIL_SCHEMA);
    assert_eq!(ingest_tables(&index, &tables).await.unwrap(), 3);
    assert_eq!(index_count(&conn, "schema_embeddings"), 3);
}

#[tokio::test]
async fn test_reingest_replaces_index() {
    let conn = in_memory_database().unwrap();
    let (_mock, provider) = arc_provider(MockProvider::new());
    let index = SqliteVectorIndex::new(conn.clone(), provider, "schema_embeddings");

    let tables = split_schema(RETAIL_SCHEMA);
    ingest_tables(&index, &tables).await.unwrap();
    ingest_tables(&index, &tables).await.unwrap();
    assert_eq!(index_count(&conn, "schema_embeddings"), 3);

    ingest_tables(&index, &tables[..1]).await.unwrap();
    assert_eq!(index_count(&conn, "schema_embeddings"), 1);
}

#[tokio::test]
async fn test_collections_are_separate() {
    let conn = in_memory_database().unwrap();
    let (_mock, provider) = arc_provider(MockProvider::new());
    let a = SqliteVectorIndex::new(conn.clone(), provider.clone(), "a");
    let b = SqliteVectorIndex::new(conn.clone(), provider, "b");

    ingest_tables(&a, &split_schema(RETAIL_SCHEMA)).await.unwrap();
    b.replace(Vec::new()).await.unwrap();
    assert_eq!(index_count(&conn, "a"), 3);
    assert_eq!(index_count(&conn, "b"), 0);
}

#[tokio::test]
async fn test_retrieve_ranks_matching_table_first() {
    let conn = in_memory_database().unwrap();
    let (_mock, provider) = arc_provider(MockProvider::new());
    let index = Arc::new(SqliteVectorIndex::new(conn, provider, "schema_embeddings"));
    ingest_tables(index.as_ref(), &split_schema(RETAIL_SCHEMA))
        .await
        .unwrap();

    let retriever = SchemaRetriever::new(index);
    let chunks = retriever.retrieve("Show all customers", 2).await.unwrap();
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].table_name, "customers");
    assert!(chunks[0].chunk_text.starts_with("CREATE TABLE customers"));
    assert!(chunks[0].score >= chunks[1].score);

    let context = format_schema_context(&chunks[..1]);
    assert!(context.starts_with("Table: customers\nCREATE TABLE customers"));
}

#[tokio::test]
async fn test_retrieve_from_empty_index() {
    let (mock, provider) = arc_provider(MockProvider::new());
    let index = Arc::new(SqliteVectorIndex::new(
        in_memory_database().unwrap(),
        provider,
        "schema_embeddings",
    ));
    let chunks = SchemaRetriever::new(index).retrieve("anything", 3).await.unwrap();
    assert!(chunks.is_empty());
    assert_eq!(mock.embed_calls(), 0);
}

#[tokio::test]
async fn test_retrieval_failure_is_unavailable() {
    let conn = in_memory_database().unwrap();
    let (_ok, provider) = arc_provider(MockProvider::new());
    let good = SqliteVectorIndex::new(conn.clone(), provider, "schema_embeddings");
    ingest_tables(&good, &split_schema(RETAIL_SCHEMA)).await.unwrap();

    let (_bad, failing) = arc_provider(MockProvider::new().failing_embeddings());
    let broken = Arc::new(SqliteVectorIndex::new(conn, failing, "schema_embeddings"));
    let err = SchemaRetriever::new(broken)
        .retrieve("Show all customers", 3)
        .await
        .unwrap_err();
    assert!(matches!(err, SqlBuddyError::RetrievalUnavailable(_)), "{err:?}");
}

#[tokio::test]
async fn test_failed_embedding_keeps_previous_index() {
    let conn = in_memory_database().unwrap();
    let (_ok, provider) = arc_provider(MockProvider::new());
    let good = SqliteVectorIndex::new(conn.clone(), provider, "schema_embeddings");
    ingest_tables(&good, &split_schema(RETAIL_SCHEMA)).await.unwrap();

    let (_bad, failing) = arc_provider(MockProvider::new().failing_embeddings());
    let broken = SqliteVectorIndex::new(conn.clone(), failing, "schema_embeddings");
    let docs = vec![IndexedDocument {
        content: "CREATE TABLE x (id);".into(),
        metadata: serde_json::json!({ "table": "x" }),
    }];
    assert!(broken.replace(docs).await.is_err());
    assert_eq!(index_count(&conn, "schema_embeddings"), 3);
}

#[tokio::test]
async fn test_missing_table_metadata_falls_back() {
    let (_mock, provider) = arc_provider(MockProvider::new());
    let index = Arc::new(SqliteVectorIndex::new(
        in_memory_database().unwrap(),
        provider,
        "schema_embeddings",
    ));
    index
        .replace(vec![IndexedDocument {
            content: "CREATE TABLE mystery (id);".into(),
            metadata: serde_json::json!({}),
        }])
        .await
        .unwrap();

    let chunks = SchemaRetriever::new(index).retrieve("mystery", 1).await.unwrap();
    assert_eq!(chunks[0].table_name, "unknown");
}
