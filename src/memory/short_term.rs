// src/memory/short_term.rs — Session-scoped recency buffer

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::list_backend::ListBackend;
use super::types::Interaction;
use super::with_timeout;
use crate::infra::errors::SqlBuddyError;
use crate::util::truncate_str;

pub const DEFAULT_MAX_ENTRIES: usize = 10;
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Bounded, expiring, newest-first log of interactions per session.
///
/// Reads degrade to an empty log when the backend fails; writes report the
/// failure as a value and leave it to the caller to log it.
pub struct ShortTermStore {
    backend: Arc<dyn ListBackend>,
    max_entries: usize,
    ttl: Duration,
    op_timeout: Duration,
}

impl ShortTermStore {
    pub fn new(backend: Arc<dyn ListBackend>) -> Self {
        Self {
            backend,
            max_entries: DEFAULT_MAX_ENTRIES,
            ttl: DEFAULT_TTL,
            op_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_limits(mut self, max_entries: usize, ttl: Duration) -> Self {
        self.max_entries = max_entries;
        self.ttl = ttl;
        self
    }

    pub fn with_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    fn key(session_id: &str) -> String {
        format!("conversation:{session_id}")
    }

    /// Insert at the head of the session log, trim to the newest
    /// `max_entries`, and restart the session's expiry.
    pub async fn append(
        &self,
        session_id: &str,
        interaction: &Interaction,
    ) -> Result<(), SqlBuddyError> {
        let value = serde_json::to_string(interaction)?;
        with_timeout(
            "short-term append",
            self.op_timeout,
            self.backend.push_front_bounded(
                &Self::key(session_id),
                value,
                self.max_entries,
                self.ttl,
            ),
        )
        .await
        .map_err(|e| SqlBuddyError::MemoryWriteFailed {
            tier: "short-term".into(),
            message: e.to_string(),
        })?;

        debug!(
            session_id,
            question = truncate_str(&interaction.question, 50),
            "Stored in short-term memory"
        );
        Ok(())
    }

    /// Up to `limit` most recent interactions, oldest first. Empty when the
    /// session is unknown, expired, or the backend is unreachable.
    pub async fn recent(&self, session_id: &str, limit: usize) -> Vec<Interaction> {
        if limit == 0 {
            return Vec::new();
        }
        let raw = match with_timeout(
            "short-term read",
            self.op_timeout,
            self.backend.range(&Self::key(session_id), 0, limit),
        )
        .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(session_id, error = %e, "Short-term memory unavailable, continuing without it");
                return Vec::new();
            }
        };

        let mut entries: Vec<Interaction> = raw
            .iter()
            .filter_map(|item| match serde_json::from_str(item) {
                Ok(i) => Some(i),
                Err(e) => {
                    warn!(session_id, error = %e, "Skipping undecodable short-term entry");
                    None
                }
            })
            .collect();
        // Stored newest-first.
        entries.reverse();
        entries
    }

    /// Delete the whole session log. Clearing an unknown session succeeds.
    /// Returns `false` when the backend could not be reached; the failure is
    /// logged, not raised.
    pub async fn clear(&self, session_id: &str) -> bool {
        match with_timeout(
            "short-term clear",
            self.op_timeout,
            self.backend.delete(&Self::key(session_id)),
        )
        .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(session_id, error = %e, "Short-term clear failed");
                false
            }
        }
    }

    pub async fn count(&self, session_id: &str) -> Result<usize, SqlBuddyError> {
        with_timeout(
            "short-term count",
            self.op_timeout,
            self.backend.len(&Self::key(session_id)),
        )
        .await
    }

    /// Seconds until the session log expires; `None` when there is no log.
    pub async fn ttl_remaining(&self, session_id: &str) -> Result<Option<Duration>, SqlBuddyError> {
        with_timeout(
            "short-term ttl",
            self.op_timeout,
            self.backend.ttl(&Self::key(session_id)),
        )
        .await
    }
}
