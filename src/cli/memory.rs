// src/cli/memory.rs — Memory inspection and administration

use super::MemoryAction;
use crate::app::App;
use crate::util::truncate_chars;

pub async fn run_memory(app: &App, action: MemoryAction) -> anyhow::Result<()> {
    let memory = &app.memory;
    match action {
        MemoryAction::Stats { session, user } => {
            let stats = memory.stats(&session, &user).await;
            println!("Session '{session}':");
            match &stats.short_term_error {
                Some(e) => println!("  Short-term:  unavailable ({e})"),
                None => println!(
                    "  Short-term:  {} entr{}, expires in {}s",
                    stats.short_term_count,
                    if stats.short_term_count == 1 { "y" } else { "ies" },
                    stats.short_term_ttl_remaining
                ),
            }
            println!("User '{user}':");
            match &stats.long_term_error {
                Some(e) => println!("  Long-term:   unavailable ({e})"),
                None => println!("  Long-term:   {} record(s)", stats.long_term_count),
            }
            if stats.pending_long_term_writes > 0 {
                println!("  Pending:     {} background write(s)", stats.pending_long_term_writes);
            }
        }
        MemoryAction::Recent { session, limit } => {
            let entries = memory.short_term().recent(&session, limit).await;
            if entries.is_empty() {
                println!("No recent conversation for session '{session}'.");
            }
            for e in entries {
                println!("{}  Q: {}", e.timestamp.format("%Y-%m-%d %H:%M:%S"), e.question);
                println!("    SQL: {}", e.sql);
                println!("    {}", e.result_summary);
            }
        }
        MemoryAction::List { user } => {
            let records = memory.all_memories(&user).await?;
            if records.is_empty() {
                println!("No long-term memories for '{user}'.");
            }
            for r in records {
                println!("{}  {}  {}", r.id, r.created_at, truncate_chars(&r.text, 80));
            }
        }
        MemoryAction::Clear { session } => {
            if memory.clear_session(&session).await {
                println!("Cleared short-term memory for session '{session}'.");
            } else {
                anyhow::bail!("short-term memory is unavailable; session '{session}' was not cleared");
            }
        }
        MemoryAction::Forget { user, id } => match id {
            Some(id) => {
                memory.forget_record(&id).await?;
                println!("Deleted memory {id}.");
            }
            None => {
                memory.forget_user(&user).await?;
                println!("Deleted all long-term memories for '{user}'.");
            }
        },
    }
    Ok(())
}
