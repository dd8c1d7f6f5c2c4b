//! linked-rows CLI - exports a table and its linked tables as JSON.
//!
//! The JSON tree goes to stdout, everything else (logs, errors) to stderr,
//! so `linked-rows ... > export.json` captures clean output.

use clap::Parser;
use linked_rows::{canonicalize_ids, driver, json, ExportError, Exporter};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "linked-rows")]
#[command(about = "Exports a table and its linked tables as JSON. Writes the JSON to stdout \
(other output to stderr), so you can use > myFile.json to get it in a file.")]
#[command(version)]
struct Cli {
    /// Database connection url
    #[arg(short = 'u', long, default_value = "postgres://localhost/demo")]
    url: String,

    /// Table name to export
    #[arg(short = 't', long, default_value = "blogpost")]
    table_name: String,

    /// Primary key value of the root table to export
    #[arg(short = 'p', long, default_value = "2")]
    pk_value: String,

    /// Login name of database
    #[arg(short = 'l', long, default_value = "postgres")]
    login: String,

    /// Password
    #[arg(long, default_value = "admin")]
    password: String,

    /// Stop tables excluded, comma-separated
    #[arg(long, value_delimiter = ',')]
    stop_tables_excluded: Vec<String>,

    /// Stop tables included, comma-separated
    #[arg(long, value_delimiter = ',')]
    stop_tables_included: Vec<String>,

    /// Canonicalize the primary keys of the output
    #[arg(long)]
    canon: bool,

    /// What database driver to use
    #[arg(long = "db", default_value = "postgres")]
    db: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), ExportError> {
    let cli = Cli::parse();
    setup_logging(&cli.verbosity, &cli.log_format);

    info!("Exporting table {}", cli.table_name);
    if !cli.stop_tables_excluded.is_empty() {
        info!("stopTablesExcluded: {:?}", cli.stop_tables_excluded);
    }
    if !cli.stop_tables_included.is_empty() {
        info!("stopTablesIncluded: {:?}", cli.stop_tables_included);
    }

    let cancel = setup_signal_handler();

    let conn = driver::connect(&cli.db, &cli.url, &cli.login, &cli.password).await?;

    let exporter = Exporter::new()
        .with_stop_tables_excluded(&cli.stop_tables_excluded)
        .with_stop_tables_included(&cli.stop_tables_included)
        .with_cancellation(cancel);

    let mut record = exporter
        .export(conn.as_ref(), &cli.table_name, &cli.pk_value)
        .await?;

    if cli.canon {
        canonicalize_ids(conn.as_ref(), &mut record, &exporter.cache()).await?;
    }

    println!("{}", serde_json::to_string_pretty(&json::to_json(&record))?);
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// SIGINT (Ctrl-C) triggers cooperative cancellation: the walker stops at its
/// next suspension point and the process exits with the Cancelled code.
fn setup_signal_handler() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived SIGINT. Cancelling export...");
            token.cancel();
        }
    });
    cancel
}
