//! Two stores drifting apart and being reconciled

use bigdecimal::BigDecimal;
use expense_sync::drivers::SqliteDriver;
use expense_sync::utils::MemorySheet;
use expense_sync::{ExpenseBook, LocalStore, RecordStore, RemoteOptions, RemoteStore};
use std::str::FromStr;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🧾 Expense Sync - Two Store Example\n");

    let sheet = MemorySheet::new();
    let local = LocalStore::open(SqliteDriver::in_memory())?;
    let remote = RemoteStore::connect(sheet.clone(), RemoteOptions::default()).await?;
    let book = ExpenseBook::new(local, remote);

    // 1. Both stores reachable
    println!("💰 Recording expenses...");
    book.record_at("2024/03/01 08:15:00", &BigDecimal::from(2500))
        .await?;
    book.record_at("2024/03/02 12:40:00", &BigDecimal::from_str("-14.90")?)
        .await?;
    println!("  ✓ Recorded salary and lunch\n");

    // 2. The spreadsheet goes away for a while
    println!("📡 Remote store failing...");
    sheet.set_fail_appends(true);
    let report = book
        .record_at("2024/03/03 18:05:00", &BigDecimal::from_str("-62.35")?)
        .await?;
    for notice in &report.notices {
        println!("  ⚠ {}", notice);
    }
    println!();

    // 3. Back online: reconcile
    sheet.set_fail_appends(false);
    let result = book.sync().await?;
    println!(
        "🔄 Sync copied {} record(s) to local and {} to remote\n",
        result.repaired_local, result.repaired_remote
    );

    println!("📊 Local store:");
    for record in book.local().read_all().await? {
        println!(
            "  {}  {:>10}  {:>10}",
            record.timestamp, record.amount, record.balance
        );
    }

    println!("\n📊 Remote store:");
    if let Some(remote) = book.remote() {
        for record in remote.read_all().await? {
            println!(
                "  {}  {:>10}  {:>10}",
                record.timestamp, record.amount, record.balance
            );
        }
    }

    Ok(())
}
