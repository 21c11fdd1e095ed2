// src/cli/ingest.rs — Schema index rebuild

use std::path::Path;

use crate::app::App;

pub async fn run_ingest(app: &App, schema_file: Option<&str>) -> anyhow::Result<()> {
    let source = schema_file
        .map(|p| p.to_string())
        .or_else(|| {
            app.config
                .database
                .schema_file
                .as_ref()
                .map(|p| p.display().to_string())
        })
        .unwrap_or_else(|| format!("{} (catalog)", app.config.database.path.display()));
    eprintln!("Indexing schema from {source}...");

    let count = app.ingest(schema_file.map(Path::new)).await?;
    println!(
        "Indexed {count} table(s) into collection '{}'",
        app.index.collection()
    );
    Ok(())
}
