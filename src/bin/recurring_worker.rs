use std::sync::{Arc, Mutex};

use clap::Parser;
use rusqlite::Connection;
use time::OffsetDateTime;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ledgerkeep::{
    initialize_db,
    service::TransactionService,
    stores::sqlite::{SQLiteAccountStore, SQLiteCategoryStore, SQLiteLedgerStore},
};

/// The background worker that materializes due recurring transactions.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// How often to check for due occurrences, in seconds.
    #[arg(long, default_value_t = 3600)]
    poll_interval: u64,
}

#[tokio::main]
async fn main() {
    setup_logging();

    let args = Args::parse();

    let connection = Connection::open(&args.db_path)
        .unwrap_or_else(|_| panic!("Could not open the database at {:?}", args.db_path));
    initialize_db(&connection).expect("Could not initialize the database schema");
    let connection = Arc::new(Mutex::new(connection));

    let mut service = TransactionService::new(
        SQLiteLedgerStore::new(connection.clone()),
        SQLiteAccountStore::new(connection.clone()),
        SQLiteCategoryStore::new(connection),
    );

    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(args.poll_interval));
    tracing::info!(
        "recurring worker started, polling every {} second(s)",
        args.poll_interval
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let today = OffsetDateTime::now_utc().date();

                // Re-running after an error is safe: materialization is
                // idempotent per due date.
                match service.run_due(today) {
                    Ok(created) if created.is_empty() => {
                        tracing::debug!("no occurrences due on {today}");
                    }
                    Ok(created) => {
                        tracing::info!("materialized {} occurrence(s)", created.len());
                    }
                    Err(error) => {
                        tracing::error!("could not process due occurrences: {error}");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
        }
    }
}

fn setup_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().pretty())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
