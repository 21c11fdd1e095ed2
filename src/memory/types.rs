// src/memory/types.rs — Interaction records and memory views

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::util::truncate_chars;

/// Placeholder when the session has no recent interactions.
pub const NO_SHORT_TERM: &str = "No recent conversation";
/// Placeholder when the user has no relevant long-term memories.
pub const NO_LONG_TERM: &str = "No relevant past context";
/// Combined context when neither tier contributed anything.
pub const NO_CONTEXT: &str = "No relevant context found.";

pub const SHORT_TERM_HEADER: &str = "RECENT CONVERSATION:";
pub const LONG_TERM_HEADER: &str = "RELEVANT PAST CONTEXT:";

/// One question/SQL/result/insight exchange. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub question: String,
    pub sql: String,
    pub result_count: usize,
    pub result_summary: String,
    pub insights_preview: String,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub user_id: String,
}

impl Interaction {
    /// Build the record for a completed request. `insights` is cut down to
    /// `preview_chars` characters.
    pub fn new(
        question: impl Into<String>,
        sql: impl Into<String>,
        result_count: usize,
        insights: &str,
        preview_chars: usize,
        session_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            question: question.into(),
            sql: sql.into(),
            result_count,
            result_summary: summarize_count(result_count),
            insights_preview: truncate_chars(insights, preview_chars).to_string(),
            timestamp: Utc::now(),
            session_id: session_id.into(),
            user_id: user_id.into(),
        }
    }

    /// Text submitted to the long-term tier for extraction.
    pub fn render_for_long_term(&self, insight_chars: usize) -> String {
        format!(
            "User asked: \"{}\"\n\n\
             Generated SQL query: {}\n\n\
             Query returned {} rows.\n\n\
             Key insights: {}\n\n\
             This interaction happened in session {}.",
            self.question,
            self.sql,
            self.result_count,
            truncate_chars(&self.insights_preview, insight_chars),
            self.session_id
        )
    }

    /// Metadata attached to the long-term submission.
    pub fn long_term_metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "session_id": self.session_id,
            "question": self.question,
            "type": "sql_query",
        })
    }
}

fn summarize_count(count: usize) -> String {
    if count == 1 {
        "1 row returned".into()
    } else {
        format!("{count} rows returned")
    }
}

/// A semantically indexed record owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub owner_id: String,
    pub text: String,
    pub metadata: serde_json::Value,
    /// Similarity to the search query; `None` outside of search results.
    pub score: Option<f32>,
    pub created_at: String,
}

/// Acknowledgement of a long-term submission. The extraction step may keep
/// zero, one or several records per call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddAck {
    pub stored_ids: Vec<String>,
    pub skipped_duplicates: usize,
}

/// Request-scoped merge of both memory tiers. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedContext {
    pub short_term: String,
    pub long_term: String,
    pub combined: String,
}

impl CombinedContext {
    /// Merge rendered tier sections. Empty sections become placeholders and
    /// are left out of `combined`.
    pub fn merge(short_term: String, long_term: String) -> Self {
        let mut parts: Vec<&str> = Vec::with_capacity(2);
        if !short_term.is_empty() {
            parts.push(&short_term);
        }
        if !long_term.is_empty() {
            parts.push(&long_term);
        }
        let combined = if parts.is_empty() {
            NO_CONTEXT.to_string()
        } else {
            parts.join("\n\n")
        };

        Self {
            short_term: if short_term.is_empty() {
                NO_SHORT_TERM.to_string()
            } else {
                short_term
            },
            long_term: if long_term.is_empty() {
                NO_LONG_TERM.to_string()
            } else {
                long_term
            },
            combined,
        }
    }
}

/// Render short-term entries (already chronological) as a prompt section.
pub fn render_short_term(entries: &[Interaction]) -> String {
    if entries.is_empty() {
        return String::new();
    }
    let mut parts = vec![SHORT_TERM_HEADER.to_string()];
    for e in entries {
        parts.push(format!(
            "Q: {}\nSQL: {}\nResults: {}",
            e.question, e.sql, e.result_summary
        ));
    }
    parts.join("\n\n")
}

/// Render long-term records (similarity order) as a prompt section.
pub fn render_long_term(records: &[MemoryRecord]) -> String {
    let lines: Vec<String> = records
        .iter()
        .filter(|r| !r.text.trim().is_empty())
        .map(|r| format!("• {}", r.text.trim()))
        .collect();
    if lines.is_empty() {
        return String::new();
    }
    format!("{}\n{}", LONG_TERM_HEADER, lines.join("\n"))
}

/// Read-only diagnostic over both tiers. A tier that could not be read
/// reports zeros and carries its error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub short_term_count: usize,
    pub short_term_ttl_remaining: u64,
    pub long_term_count: usize,
    /// Background long-term writes not yet joined.
    pub pending_long_term_writes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_term_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_term_error: Option<String>,
}
