use std::{
    error::Error,
    path::Path,
    process::exit,
    sync::{Arc, Mutex},
};

use clap::Parser;
use rusqlite::Connection;

use ledgerkeep::stores::sqlite::SQLiteLedgerStore;

/// A utility that checks every account's cached balance against the signed sum
/// of its transactions.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// Overwrite drifted balances with the recomputed values.
    #[arg(long)]
    repair: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let db_path = Path::new(&args.db_path);
    if !db_path.is_file() {
        eprintln!("File does not exist at {db_path:#?}!");
        exit(1);
    }

    let connection = Connection::open(db_path)?;
    let mut store = SQLiteLedgerStore::new(Arc::new(Mutex::new(connection)));

    let drifts = store.reconcile_balances(args.repair)?;

    if drifts.is_empty() {
        println!("All account balances match their transactions.");
        return Ok(());
    }

    for drift in &drifts {
        println!(
            "Account {}: cached balance is {:.2} but transactions sum to {:.2}",
            drift.account_id, drift.cached, drift.computed
        );
    }

    if args.repair {
        println!("Repaired {} account balance(s).", drifts.len());
    } else {
        println!("Run again with --repair to overwrite the cached balances.");
        exit(1);
    }

    Ok(())
}
