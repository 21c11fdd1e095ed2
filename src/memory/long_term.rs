// src/memory/long_term.rs — User-scoped semantic memory

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::semantic::SemanticMemory;
use super::types::{AddAck, Interaction, MemoryRecord};
use super::with_timeout;
use crate::infra::errors::SqlBuddyError;
use crate::provider::Message;

pub const DEFAULT_INSIGHT_CHARS: usize = 300;
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(65);

/// Unbounded, similarity-searchable memory keyed by user. Never scoped by
/// session and never expires on its own.
pub struct LongTermStore {
    backend: Arc<dyn SemanticMemory>,
    op_timeout: Duration,
    /// `remember` runs extraction and embedding inside the backend, so it is
    /// bounded separately from the plain store operations.
    write_timeout: Duration,
    insight_chars: usize,
}

impl LongTermStore {
    pub fn new(backend: Arc<dyn SemanticMemory>) -> Self {
        Self {
            backend,
            op_timeout: Duration::from_secs(5),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            insight_chars: DEFAULT_INSIGHT_CHARS,
        }
    }

    pub fn with_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    pub fn with_insight_chars(mut self, insight_chars: usize) -> Self {
        self.insight_chars = insight_chars;
        self
    }

    /// Submit an interaction for extraction and indexing. `extra_metadata`
    /// fields are merged over the interaction's own metadata.
    pub async fn remember(
        &self,
        user_id: &str,
        interaction: &Interaction,
        extra_metadata: Option<serde_json::Value>,
    ) -> Result<AddAck, SqlBuddyError> {
        let text = interaction.render_for_long_term(self.insight_chars);
        let mut metadata = interaction.long_term_metadata();
        if let (Some(serde_json::Value::Object(extra)), Some(base)) =
            (extra_metadata, metadata.as_object_mut())
        {
            base.extend(extra);
        }

        let messages = [Message::user(text)];
        let ack = with_timeout(
            "long-term remember",
            self.write_timeout,
            self.backend.add(&messages, user_id, &metadata),
        )
        .await
        .map_err(|e| SqlBuddyError::MemoryWriteFailed {
            tier: "long-term".into(),
            message: e.to_string(),
        })?;

        debug!(
            user_id,
            stored = ack.stored_ids.len(),
            skipped = ack.skipped_duplicates,
            "Stored in long-term memory"
        );
        Ok(ack)
    }

    /// Up to `limit` records most similar to `question`. Empty for unknown
    /// users and when the backend is unreachable.
    pub async fn search(&self, question: &str, user_id: &str, limit: usize) -> Vec<MemoryRecord> {
        if limit == 0 {
            return Vec::new();
        }
        match with_timeout(
            "long-term search",
            self.op_timeout,
            self.backend.search(question, user_id, limit),
        )
        .await
        {
            Ok(mut records) => {
                records.truncate(limit);
                records
            }
            Err(e) => {
                warn!(user_id, error = %e, "Long-term memory unavailable, continuing without it");
                Vec::new()
            }
        }
    }

    pub async fn forget(&self, record_id: &str) -> Result<(), SqlBuddyError> {
        with_timeout(
            "long-term forget",
            self.op_timeout,
            self.backend.delete(record_id),
        )
        .await
    }

    pub async fn forget_all(&self, user_id: &str) -> Result<(), SqlBuddyError> {
        with_timeout(
            "long-term forget_all",
            self.op_timeout,
            self.backend.delete_all(user_id),
        )
        .await
    }

    pub async fn all(&self, user_id: &str) -> Result<Vec<MemoryRecord>, SqlBuddyError> {
        with_timeout(
            "long-term list",
            self.op_timeout,
            self.backend.get_all(user_id),
        )
        .await
    }

    pub async fn count(&self, user_id: &str) -> Result<usize, SqlBuddyError> {
        Ok(self.all(user_id).await?.len())
    }
}
