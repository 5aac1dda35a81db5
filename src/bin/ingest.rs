use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use ar_engine::store;

/// Ingest an accounts-receivable CSV export into the local database
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// The path to the CSV file to ingest
    csv: std::path::PathBuf,
    /// The path to the SQLite database file
    #[arg(long, default_value = "ar.sqlite")]
    database: std::path::PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(&args.csv)
        .with_context(|| format!("cannot open CSV file {}", args.csv.display()))?;

    let mut conn = rusqlite::Connection::open(&args.database)
        .with_context(|| format!("cannot open database {}", args.database.display()))?;
    store::init_schema(&conn).context("cannot initialize the database schema")?;

    let report = ar_engine::ingest(reader, &mut conn)?;

    info!("Total CSV rows read:       {}", report.rows_seen);
    info!("Unique customers:          {}", report.customers);
    info!("Invoices loaded:           {}", report.rows_loaded);
    info!("Rows with errors:          {}", report.rows_failed);
    info!("Duplicate invoice numbers: {}", report.duplicate_invoices);

    for failure in report.failures.iter().take(5) {
        warn!(
            "row {}: {}: {}",
            failure.row, failure.field, failure.reason,
        );
    }

    Ok(())
}
