use anyhow::Context;
use clap::Parser;
use tracing::info;

use ar_engine::store;

/// Serve the read-only accounts-receivable query API
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// The path to the SQLite database file
    #[arg(long, default_value = "ar.sqlite")]
    database: std::path::PathBuf,
    /// The address to bind the HTTP server to
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let conn = rusqlite::Connection::open(&args.database)
        .with_context(|| format!("cannot open database {}", args.database.display()))?;
    store::init_schema(&conn).context("cannot initialize the database schema")?;

    let router = ar_engine::api::router(conn);
    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("cannot bind {}", args.bind))?;

    info!(bind = %args.bind, "serving accounts-receivable queries");
    axum::serve(listener, router).await?;

    Ok(())
}
