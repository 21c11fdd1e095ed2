// src/cli/ask.rs — One question through the query pipeline

use serde_json::{Map, Value};

use super::progress::terminal_progress;
use crate::app::App;
use crate::core::{QueryRequest, QueryResponse};
use crate::util::truncate_chars;

const MAX_CELL_CHARS: usize = 40;
const MAX_PRINTED_ROWS: usize = 50;

pub async fn run_ask(
    app: &App,
    question: &str,
    session: &str,
    user: &str,
    json: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    let mut pipeline = app.pipeline()?;
    if !quiet && !json {
        pipeline = pipeline.with_progress(terminal_progress());
    }

    let response = pipeline
        .run(&QueryRequest::new(question, session, user))
        .await;
    // Background long-term writes must land before the process exits.
    app.memory.flush().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response);
    }

    if response.is_success() {
        Ok(())
    } else {
        std::process::exit(2);
    }
}

fn print_response(response: &QueryResponse) {
    match response {
        QueryResponse::Success {
            sql,
            results,
            columns,
            insights,
        } => {
            println!("SQL:\n  {}\n", sql.replace('\n', "\n  "));
            if columns.is_empty() {
                println!("(statement returned no result set)\n");
            } else {
                println!("{}", render_table(columns, results));
            }
            println!("Insights:\n{insights}");
        }
        QueryResponse::Failed {
            stage, sql, error, ..
        } => {
            if let Some(sql) = sql {
                println!("SQL:\n  {}\n", sql.replace('\n', "\n  "));
            }
            eprintln!("failed at {stage}: {error}");
        }
    }
}

fn cell(value: Option<&Value>) -> String {
    let text = match value {
        None | Some(Value::Null) => "NULL".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    truncate_chars(&text.replace('\n', " "), MAX_CELL_CHARS).to_string()
}

/// Plain-text table: header, separator, rows (capped), row count.
pub fn render_table(columns: &[String], rows: &[Map<String, Value>]) -> String {
    let shown = &rows[..rows.len().min(MAX_PRINTED_ROWS)];
    let cells: Vec<Vec<String>> = shown
        .iter()
        .map(|r| columns.iter().map(|c| cell(r.get(c))).collect())
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(c.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |values: Vec<&str>| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:<width$}", v, width = *w))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![
        line(columns.iter().map(String::as_str).collect()),
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    ];
    for row in &cells {
        out.push(line(row.iter().map(String::as_str).collect()));
    }
    if rows.len() > shown.len() {
        out.push(format!("... {} more", rows.len() - shown.len()));
    }
    out.push(format!(
        "({} row{})",
        rows.len(),
        if rows.len() == 1 { "" } else { "s" }
    ));
    out.join("\n")
}
