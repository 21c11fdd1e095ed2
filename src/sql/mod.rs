// src/sql/mod.rs — SQL execution and generated-SQL cleanup

pub mod engine;
pub mod normalize;

pub use engine::{QueryRows, SqlEngine, SqliteEngine};
pub use normalize::normalize_sql;
