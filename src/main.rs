use std::path::PathBuf;

use anyhow::{Context, Result};
use bigdecimal::BigDecimal;
use clap::{Parser, Subcommand};
use tracing::{error, warn};

use expense_sync::config::Config;
use expense_sync::drivers::{SheetsDriver, SqliteDriver};
use expense_sync::report::filter;
use expense_sync::{ExpenseBook, LocalStore, RemoteStore};

type Book = ExpenseBook<LocalStore<SqliteDriver>, RemoteStore<SheetsDriver>>;

#[derive(Parser)]
#[command(
    name = "expense-sync",
    about = "Record expenses locally and in a remote spreadsheet, and keep both in step"
)]
#[command(disable_help_subcommand = true)]
struct Args {
    /// Configuration file (defaults to ./expense-sync.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record an expense (negative = debit)
    Add {
        #[arg(allow_negative_numbers = true)]
        amount: BigDecimal,
        /// Timestamp to record under instead of now (yyyy/MM/dd HH:mm:ss)
        #[arg(long)]
        at: Option<String>,
    },
    /// Print the records inside an optional time window
    List {
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },
    /// Print the most recent record
    Last,
    /// Copy records missing on either side to the other store
    Sync,
    /// Write the records inside an optional time window to <NAME>.xlsx
    Export {
        name: PathBuf,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "expense_sync=info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::find_and_load()?.unwrap_or_default(),
    };
    let book = open_book(&config).await;

    match args.command {
        Commands::Add { amount, at } => {
            let report = match at {
                Some(timestamp) => book.record_at(&timestamp, &amount).await?,
                None => book.record_expense(&amount).await?,
            };
            for notice in &report.notices {
                warn!("{}", notice);
            }
            let balance = report.local_balance.or(report.remote_balance);
            if let Some(balance) = balance {
                println!("{}\t{}\t{}", report.timestamp, amount, balance);
            }
        }
        Commands::List { start, end } => {
            let records = book.read_all().await?;
            for record in filter(&records, start.as_deref(), end.as_deref())? {
                println!("{}\t{}\t{}", record.timestamp, record.amount, record.balance);
            }
        }
        Commands::Last => {
            let record = book.read_last().await?;
            if record.is_zero() {
                println!("no expenses recorded");
            } else {
                println!("{}\t{}\t{}", record.timestamp, record.amount, record.balance);
            }
        }
        Commands::Sync => {
            let result = book.sync().await.context("sync failed")?;
            match result.unavailable {
                Some(side) => println!("{} store unavailable, nothing synced", side),
                None => println!(
                    "copied {} record(s) to local, {} to remote ({} outstanding)",
                    result.repaired_local,
                    result.repaired_remote,
                    result.failed_local + result.failed_remote
                ),
            }
        }
        Commands::Export { name, start, end } => {
            let summary = book
                .export(&name, start.as_deref(), end.as_deref())
                .await?;
            println!(
                "wrote {} row(s) of sheet '{}' to {}",
                summary.rows,
                summary.sheet,
                summary.path.display()
            );
        }
    }

    if let Err(e) = book.local().close().await {
        warn!(error = %e, "could not close local store");
    }
    Ok(())
}

async fn open_book(config: &Config) -> Book {
    let local = match LocalStore::open(SqliteDriver::new(&config.local.database)) {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "local store unavailable");
            LocalStore::new(SqliteDriver::new(&config.local.database))
        }
    };

    let Some(remote) = &config.remote else {
        return ExpenseBook::local_only(local);
    };
    let driver = SheetsDriver::new(&remote.base_url, &remote.spreadsheet_id, &remote.credentials);
    match RemoteStore::connect(driver, remote.options()).await {
        Ok(store) => ExpenseBook::new(local, store),
        Err(e) => {
            warn!(error = %e, "continuing without the remote store");
            ExpenseBook::local_only(local)
        }
    }
}
