// src/core/types.rs — Pipeline request/response envelopes

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::infra::errors::SqlBuddyError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    pub session_id: String,
    pub user_id: String,
}

impl QueryRequest {
    pub fn new(
        question: impl Into<String>,
        session_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            question: question.into(),
            session_id: session_id.into(),
            user_id: user_id.into(),
        }
    }
}

/// States of one request, in the only order they can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    RetrieveSchema,
    RetrieveMemory,
    GenerateSql,
    ExecuteSql,
    GenerateInsights,
    RecordMemory,
    Done,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 7] = [
        PipelineStage::RetrieveSchema,
        PipelineStage::RetrieveMemory,
        PipelineStage::GenerateSql,
        PipelineStage::ExecuteSql,
        PipelineStage::GenerateInsights,
        PipelineStage::RecordMemory,
        PipelineStage::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::RetrieveSchema => "RETRIEVE_SCHEMA",
            PipelineStage::RetrieveMemory => "RETRIEVE_MEMORY",
            PipelineStage::GenerateSql => "GENERATE_SQL",
            PipelineStage::ExecuteSql => "EXECUTE_SQL",
            PipelineStage::GenerateInsights => "GENERATE_INSIGHTS",
            PipelineStage::RecordMemory => "RECORD_MEMORY",
            PipelineStage::Done => "DONE",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a request terminated early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    GenerationFailed,
    SqlSyntax,
    SqlExecution,
    Timeout,
}

impl FailureKind {
    pub fn of(error: &SqlBuddyError) -> Self {
        match error {
            SqlBuddyError::SqlSyntax(_) => FailureKind::SqlSyntax,
            SqlBuddyError::SqlExecution(_) => FailureKind::SqlExecution,
            SqlBuddyError::Timeout { .. } => FailureKind::Timeout,
            _ => FailureKind::GenerationFailed,
        }
    }
}

/// What the caller always gets back: never a raw backend error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryResponse {
    Success {
        sql: String,
        results: Vec<Map<String, Value>>,
        columns: Vec<String>,
        insights: String,
    },
    Failed {
        stage: PipelineStage,
        kind: FailureKind,
        /// The normalized SQL, when generation got that far.
        #[serde(skip_serializing_if = "Option::is_none")]
        sql: Option<String>,
        error: String,
    },
}

impl QueryResponse {
    pub fn failed(stage: PipelineStage, sql: Option<String>, error: &SqlBuddyError) -> Self {
        QueryResponse::Failed {
            stage,
            kind: FailureKind::of(error),
            sql,
            error: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, QueryResponse::Success { .. })
    }

    pub fn sql(&self) -> Option<&str> {
        match self {
            QueryResponse::Success { sql, .. } => Some(sql),
            QueryResponse::Failed { sql, .. } => sql.as_deref(),
        }
    }
}
