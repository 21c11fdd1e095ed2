// tests/manager_test.rs — Integration test: memory manager over both tiers

mod common;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use common::{FailingListBackend, FailingSemanticMemory, RecordingSemanticMemory};
use sqlbuddy::infra::config::LongTermWriteMode;
use sqlbuddy::memory::list_backend::{InMemoryListBackend, ListBackend};
use sqlbuddy::memory::long_term::LongTermStore;
use sqlbuddy::memory::manager::{MemoryManager, TierWrite};
use sqlbuddy::memory::semantic::SemanticMemory;
use sqlbuddy::memory::short_term::ShortTermStore;
use sqlbuddy::memory::types::{
    Interaction, LONG_TERM_HEADER, NO_CONTEXT, NO_LONG_TERM, NO_SHORT_TERM, SHORT_TERM_HEADER,
};

fn manager(
    list: Arc<dyn ListBackend>,
    semantic: Arc<dyn SemanticMemory>,
    mode: LongTermWriteMode,
) -> MemoryManager {
    MemoryManager::new(
        Arc::new(ShortTermStore::new(list)),
        Arc::new(LongTermStore::new(semantic)),
    )
    .with_write_mode(mode)
}

fn healthy(mode: LongTermWriteMode) -> (MemoryManager, Arc<RecordingSemanticMemory>) {
    let semantic = Arc::new(RecordingSemanticMemory::default());
    let m = manager(Arc::new(InMemoryListBackend::new()), semantic.clone(), mode);
    (m, semantic)
}

fn interaction(question: &str) -> Interaction {
    Interaction::new(question, "SELECT * FROM customers;", 2, "Two customers", 100, "s1", "u1")
}

#[tokio::test]
async fn test_empty_tiers_yield_placeholders() {
    let (m, _) = healthy(LongTermWriteMode::Inline);
    let ctx = m.combined_context("Show all customers", "s1", "u1").await;
    assert_eq!(ctx.short_term, NO_SHORT_TERM);
    assert_eq!(ctx.long_term, NO_LONG_TERM);
    assert_eq!(ctx.combined, NO_CONTEXT);
}

#[tokio::test]
async fn test_combined_context_short_then_long() {
    let (m, _) = healthy(LongTermWriteMode::Inline);
    m.record_interaction(&interaction("Show all customers")).await;

    let ctx = m.combined_context("customers again", "s1", "u1").await;
    assert!(ctx.short_term.starts_with(SHORT_TERM_HEADER));
    assert!(ctx.short_term.contains("Q: Show all customers"));
    assert!(ctx.long_term.starts_with(LONG_TERM_HEADER));
    assert!(ctx.long_term.contains("User asked: \"Show all customers\""));
    assert_eq!(ctx.combined, format!("{}\n\n{}", ctx.short_term, ctx.long_term));
}

#[tokio::test]
async fn test_long_term_ignores_session() {
    let (m, _) = healthy(LongTermWriteMode::Inline);
    m.record_interaction(&interaction("Show all customers")).await;

    // New session for the same user: no short-term, long-term still found.
    let ctx = m.combined_context("customers", "other-session", "u1").await;
    assert_eq!(ctx.short_term, NO_SHORT_TERM);
    assert!(ctx.long_term.starts_with(LONG_TERM_HEADER));
    assert_eq!(ctx.combined, ctx.long_term);
}

#[tokio::test]
async fn test_window_sizes() {
    let (m, _) = healthy(LongTermWriteMode::Inline);
    for q in ["q1", "q2", "q3", "q4", "q5"] {
        m.record_interaction(&interaction(q)).await;
    }
    let ctx = m.combined_context_with("q", "s1", "u1", 2, 1).await;
    assert!(!ctx.short_term.contains("Q: q3"));
    assert!(ctx.short_term.contains("Q: q4"));
    assert!(ctx.short_term.contains("Q: q5"));
    assert_eq!(ctx.long_term.matches("• ").count(), 1);

    let default_ctx = m.combined_context("q", "s1", "u1").await;
    assert_eq!(default_ctx.short_term.matches("Q: ").count(), 3);
    assert_eq!(default_ctx.long_term.matches("• ").count(), 2);
}

#[tokio::test]
async fn test_short_term_down_long_term_still_written() {
    let semantic = Arc::new(RecordingSemanticMemory::default());
    let m = manager(
        Arc::new(FailingListBackend),
        semantic.clone(),
        LongTermWriteMode::Inline,
    );

    let report = m.record_interaction(&interaction("Show all customers")).await;
    assert!(report.short_term.is_failed());
    assert_eq!(report.long_term, TierWrite::Written);
    assert_eq!(semantic.texts("u1").len(), 1);

    let ctx = m.combined_context("customers", "s1", "u1").await;
    assert_eq!(ctx.short_term, NO_SHORT_TERM);
    assert!(ctx.long_term.contains("Show all customers"));
}

#[tokio::test]
async fn test_long_term_down_short_term_still_written() {
    let m = manager(
        Arc::new(InMemoryListBackend::new()),
        Arc::new(FailingSemanticMemory),
        LongTermWriteMode::Inline,
    );

    let report = m.record_interaction(&interaction("Show all customers")).await;
    assert_eq!(report.short_term, TierWrite::Written);
    assert!(report.long_term.is_failed());

    let ctx = m.combined_context("customers", "s1", "u1").await;
    assert!(ctx.short_term.contains("Q: Show all customers"));
    assert_eq!(ctx.long_term, NO_LONG_TERM);
}

#[tokio::test]
async fn test_background_write_lands_after_flush() {
    let (m, semantic) = healthy(LongTermWriteMode::Background);
    let report = m.record_interaction(&interaction("Show all customers")).await;
    assert_eq!(report.short_term, TierWrite::Written);
    assert_eq!(report.long_term, TierWrite::Scheduled);

    // The short-term leg is already visible.
    assert_eq!(m.short_term().count("s1").await.unwrap(), 1);

    m.flush().await;
    assert_eq!(semantic.texts("u1").len(), 1);
}

#[tokio::test]
async fn test_finished_background_writes_are_released() {
    let (m, semantic) = healthy(LongTermWriteMode::Background);
    for i in 0..1000 {
        m.record_interaction(&interaction(&format!("question {i}"))).await;
    }
    // Let every queued write run to completion.
    tokio::time::sleep(Duration::from_millis(200)).await;

    m.record_interaction(&interaction("one more")).await;
    let stats = m.stats("s1", "u1").await;
    assert!(
        stats.pending_long_term_writes <= 1,
        "retained {} finished writes",
        stats.pending_long_term_writes
    );

    m.flush().await;
    assert_eq!(semantic.texts("u1").len(), 1001);
    assert_eq!(m.stats("s1", "u1").await.pending_long_term_writes, 0);
}

#[tokio::test]
async fn test_stats_reports_both_tiers() {
    let (m, _) = healthy(LongTermWriteMode::Inline);
    m.record_interaction(&interaction("a")).await;
    m.record_interaction(&interaction("b")).await;

    let stats = m.stats("s1", "u1").await;
    assert_eq!(stats.short_term_count, 2);
    assert!(stats.short_term_ttl_remaining > 3500 && stats.short_term_ttl_remaining <= 3600);
    assert_eq!(stats.long_term_count, 2);
    assert_eq!(stats.short_term_error, None);
    assert_eq!(stats.long_term_error, None);

    // Read-only: a second call sees the same state.
    let again = m.stats("s1", "u1").await;
    assert_eq!(again.short_term_count, 2);
    assert_eq!(again.long_term_count, 2);
}

#[tokio::test]
async fn test_stats_marks_failed_tier_only() {
    let semantic = Arc::new(RecordingSemanticMemory::default());
    let m = manager(
        Arc::new(FailingListBackend),
        semantic,
        LongTermWriteMode::Inline,
    );
    m.record_interaction(&interaction("a")).await;

    let stats = m.stats("s1", "u1").await;
    assert_eq!(stats.short_term_count, 0);
    assert!(stats.short_term_error.is_some());
    assert_eq!(stats.long_term_count, 1);
    assert_eq!(stats.long_term_error, None);
}

#[tokio::test]
async fn test_stats_for_unknown_session() {
    let (m, _) = healthy(LongTermWriteMode::Inline);
    let stats = m.stats("nobody", "nobody").await;
    assert_eq!(stats.short_term_count, 0);
    assert_eq!(stats.short_term_ttl_remaining, 0);
    assert_eq!(stats.long_term_count, 0);
}

#[tokio::test]
async fn test_admin_operations() {
    let (m, _) = healthy(LongTermWriteMode::Inline);
    m.record_interaction(&interaction("a")).await;
    m.record_interaction(&interaction("b")).await;

    assert!(m.clear_session("s1").await);
    assert_eq!(m.short_term().count("s1").await.unwrap(), 0);

    let all = m.all_memories("u1").await.unwrap();
    assert_eq!(all.len(), 2);
    m.forget_record(&all[0].id).await.unwrap();
    assert_eq!(m.all_memories("u1").await.unwrap().len(), 1);

    m.forget_user("u1").await.unwrap();
    assert!(m.all_memories("u1").await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_short_term_expiry_through_manager() {
    let (m, _) = healthy(LongTermWriteMode::Inline);
    m.record_interaction(&interaction("a")).await;
    tokio::time::advance(Duration::from_secs(3601)).await;

    let ctx = m.combined_context("a", "s1", "u1").await;
    assert_eq!(ctx.short_term, NO_SHORT_TERM);
    assert!(ctx.long_term.starts_with(LONG_TERM_HEADER));
}
