// src/main.rs — sqlbuddy entry point

use clap::Parser;

use sqlbuddy::app::App;
use sqlbuddy::cli::{Cli, Commands};
use sqlbuddy::infra::config::Config;
use sqlbuddy::infra::{logger, paths};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    // Logging respects RUST_LOG
    logger::init_logging(&cli.log_level);

    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Falls back to defaults if no config.toml
    let config = match cli.config {
        Some(ref path) => Config::load_from(std::path::Path::new(path))?,
        None => Config::load()?,
    };
    paths::ensure_dirs().await?;
    let app = App::from_config(config)?;

    match cli.command {
        Commands::Ask {
            question,
            session,
            user,
            json,
            quiet,
        } => {
            let question = question.join(" ");
            sqlbuddy::cli::ask::run_ask(&app, &question, &session, &user, json, quiet).await
        }
        Commands::Ingest { schema_file } => {
            sqlbuddy::cli::ingest::run_ingest(&app, schema_file.as_deref()).await
        }
        Commands::Memory { action } => sqlbuddy::cli::memory::run_memory(&app, action).await,
    }
}
