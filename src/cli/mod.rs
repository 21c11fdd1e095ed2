// src/cli/mod.rs — CLI definition (clap derive)

pub mod ask;
pub mod ingest;
pub mod memory;
pub mod progress;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "sqlbuddy",
    about = "Ask questions about a retail database in plain language",
    version
)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Answer a question: generate SQL, run it, summarize the results
    Ask {
        /// The question, in plain language
        #[arg(required = true, trailing_var_arg = true)]
        question: Vec<String>,
        /// Conversation (short-term memory) identifier
        #[arg(long, default_value = "default")]
        session: String,
        /// User (long-term memory) identifier
        #[arg(long, default_value = "default")]
        user: String,
        /// Print the response envelope as JSON
        #[arg(long)]
        json: bool,
        /// Suppress stage progress on stderr
        #[arg(long)]
        quiet: bool,
    },
    /// Rebuild the schema index (replaces the previous one)
    Ingest {
        /// Schema script; defaults to the database catalog
        #[arg(long)]
        schema_file: Option<String>,
    },
    /// Inspect or administer conversation memory
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },
}

#[derive(Subcommand, Clone)]
pub enum MemoryAction {
    /// Entry counts and short-term expiry
    Stats {
        #[arg(long, default_value = "default")]
        session: String,
        #[arg(long, default_value = "default")]
        user: String,
    },
    /// Show a session's short-term log, oldest first
    Recent {
        #[arg(long, default_value = "default")]
        session: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// List a user's long-term memories
    List {
        #[arg(long, default_value = "default")]
        user: String,
    },
    /// Clear a session's short-term memory
    Clear {
        #[arg(long)]
        session: String,
    },
    /// Delete one long-term memory, or all of a user's
    Forget {
        #[arg(long)]
        user: String,
        /// Record id; all of the user's memories when omitted
        #[arg(long)]
        id: Option<String>,
    },
}
