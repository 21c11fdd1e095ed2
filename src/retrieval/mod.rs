// src/retrieval/mod.rs — Schema retrieval (index, ingest, retriever)

pub mod index;
pub mod ingest;
pub mod retriever;

pub use index::{IndexedDocument, ScoredDocument, SqliteVectorIndex, VectorIndex};
pub use retriever::{format_schema_context, SchemaChunk, SchemaRetriever};
