// src/memory/manager.rs — Single facade over both memory tiers
//
// Reads never fail: each tier degrades to its placeholder. Writes to the two
// tiers are independent and not transactional; failures are logged here and
// reported back as a `WriteReport`, never propagated.

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::long_term::LongTermStore;
use super::short_term::ShortTermStore;
use super::types::{
    render_long_term, render_short_term, CombinedContext, Interaction, MemoryRecord, MemoryStats,
};
use crate::infra::config::LongTermWriteMode;
use crate::infra::errors::SqlBuddyError;

pub const DEFAULT_K_SHORT: usize = 3;
pub const DEFAULT_K_LONG: usize = 2;

/// Outcome of one tier's write.
#[derive(Debug, Clone, PartialEq)]
pub enum TierWrite {
    Written,
    /// Handed to a background task; see `MemoryManager::flush`.
    Scheduled,
    Failed(String),
}

impl TierWrite {
    pub fn is_failed(&self) -> bool {
        matches!(self, TierWrite::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteReport {
    pub short_term: TierWrite,
    pub long_term: TierWrite,
}

pub struct MemoryManager {
    short_term: Arc<ShortTermStore>,
    long_term: Arc<LongTermStore>,
    write_mode: LongTermWriteMode,
    k_short: usize,
    k_long: usize,
    pending: Mutex<JoinSet<()>>,
}

impl MemoryManager {
    pub fn new(short_term: Arc<ShortTermStore>, long_term: Arc<LongTermStore>) -> Self {
        Self {
            short_term,
            long_term,
            write_mode: LongTermWriteMode::Background,
            k_short: DEFAULT_K_SHORT,
            k_long: DEFAULT_K_LONG,
            pending: Mutex::new(JoinSet::new()),
        }
    }

    pub fn with_write_mode(mut self, mode: LongTermWriteMode) -> Self {
        self.write_mode = mode;
        self
    }

    pub fn with_context_sizes(mut self, k_short: usize, k_long: usize) -> Self {
        self.k_short = k_short;
        self.k_long = k_long;
        self
    }

    pub fn short_term(&self) -> &ShortTermStore {
        &self.short_term
    }

    /// Combined context with the configured window sizes.
    pub async fn combined_context(
        &self,
        question: &str,
        session_id: &str,
        user_id: &str,
    ) -> CombinedContext {
        self.combined_context_with(question, session_id, user_id, self.k_short, self.k_long)
            .await
    }

    pub async fn combined_context_with(
        &self,
        question: &str,
        session_id: &str,
        user_id: &str,
        k_short: usize,
        k_long: usize,
    ) -> CombinedContext {
        let (recent, related) = tokio::join!(
            self.short_term.recent(session_id, k_short),
            self.long_term.search(question, user_id, k_long),
        );
        debug!(
            session_id,
            user_id,
            short_term = recent.len(),
            long_term = related.len(),
            "Assembled memory context"
        );
        CombinedContext::merge(render_short_term(&recent), render_long_term(&related))
    }

    /// Write the interaction to both tiers. The short-term append is always
    /// attempted before this returns; the long-term leg may run in the
    /// background depending on the write mode.
    pub async fn record_interaction(&self, interaction: &Interaction) -> WriteReport {
        let short_term = match self
            .short_term
            .append(&interaction.session_id, interaction)
            .await
        {
            Ok(()) => TierWrite::Written,
            Err(e) => {
                warn!(session_id = %interaction.session_id, error = %e, "Short-term write failed");
                TierWrite::Failed(e.to_string())
            }
        };

        let long_term = match self.write_mode {
            LongTermWriteMode::Inline => {
                match self
                    .long_term
                    .remember(&interaction.user_id, interaction, None)
                    .await
                {
                    Ok(_) => TierWrite::Written,
                    Err(e) => {
                        warn!(user_id = %interaction.user_id, error = %e, "Long-term write failed");
                        TierWrite::Failed(e.to_string())
                    }
                }
            }
            LongTermWriteMode::Background => {
                let store = Arc::clone(&self.long_term);
                let interaction = interaction.clone();
                let mut pending = self.pending.lock().await;
                // Drop finished writes so the set only holds in-flight ones.
                while let Some(joined) = pending.try_join_next() {
                    if let Err(e) = joined {
                        warn!(error = %e, "Background memory write aborted");
                    }
                }
                pending.spawn(async move {
                    if let Err(e) = store
                        .remember(&interaction.user_id, &interaction, None)
                        .await
                    {
                        warn!(user_id = %interaction.user_id, error = %e, "Long-term write failed");
                    }
                });
                TierWrite::Scheduled
            }
        };

        WriteReport {
            short_term,
            long_term,
        }
    }

    /// Wait for background long-term writes issued so far.
    pub async fn flush(&self) {
        let mut tasks = std::mem::take(&mut *self.pending.lock().await);
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Background memory write aborted");
            }
        }
    }

    /// Read-only view of both tiers. A failing tier reports zeros plus its
    /// error; the other tier is unaffected.
    pub async fn stats(&self, session_id: &str, user_id: &str) -> MemoryStats {
        let (count, ttl, long_count) = tokio::join!(
            self.short_term.count(session_id),
            self.short_term.ttl_remaining(session_id),
            self.long_term.count(user_id),
        );

        let mut stats = MemoryStats {
            pending_long_term_writes: self.pending.lock().await.len(),
            ..Default::default()
        };
        match count.and_then(|c| ttl.map(|t| (c, t))) {
            Ok((c, t)) => {
                stats.short_term_count = c;
                stats.short_term_ttl_remaining = t.map(|d| d.as_secs()).unwrap_or(0);
            }
            Err(e) => stats.short_term_error = Some(e.to_string()),
        }
        match long_count {
            Ok(c) => stats.long_term_count = c,
            Err(e) => stats.long_term_error = Some(e.to_string()),
        }
        stats
    }

    /// `false` when the short-term backend was unreachable.
    pub async fn clear_session(&self, session_id: &str) -> bool {
        let cleared = self.short_term.clear(session_id).await;
        if cleared {
            info!(session_id, "Cleared short-term memory");
        }
        cleared
    }

    pub async fn forget_user(&self, user_id: &str) -> Result<(), SqlBuddyError> {
        self.flush().await;
        self.long_term.forget_all(user_id).await
    }

    pub async fn forget_record(&self, record_id: &str) -> Result<(), SqlBuddyError> {
        self.long_term.forget(record_id).await
    }

    pub async fn all_memories(&self, user_id: &str) -> Result<Vec<MemoryRecord>, SqlBuddyError> {
        self.long_term.all(user_id).await
    }
}
