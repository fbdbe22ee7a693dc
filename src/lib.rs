//! # Expense Sync
//!
//! An expense journal with a running balance, kept in two independently
//! writable stores: a local SQLite database and a remote spreadsheet.
//!
//! ## Features
//!
//! - **Running balance**: every store stamps each appended record with its own cumulative balance, in exact decimal arithmetic
//! - **Store abstraction**: the [`RecordStore`] trait with local and remote adapters over narrow driver traits
//! - **Reconciliation**: timestamp-keyed symmetric difference between the stores, replayed through the normal append path
//! - **Graceful degradation**: writes and reads keep working against whichever store is reachable
//! - **Reporting**: time window filtering and spreadsheet export
//!
//! ## Quick Start
//!
//! ```rust
//! use expense_sync::utils::MemoryStore;
//! use expense_sync::ExpenseBook;
//! use bigdecimal::BigDecimal;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let book = ExpenseBook::new(MemoryStore::new("local"), MemoryStore::new("remote"));
//! book.record_at("2024/01/01 09:30:00", &BigDecimal::from(-12)).await.unwrap();
//!
//! // Both stores took the write, so there is nothing to repair.
//! assert!(book.sync().await.unwrap().is_noop());
//! # }
//! ```

pub mod balance;
pub mod book;
pub mod config;
pub mod drivers;
pub mod reconciliation;
pub mod report;
pub mod stores;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use balance::*;
pub use book::*;
pub use config::Config;
pub use reconciliation::*;
pub use stores::*;
pub use traits::*;
pub use types::*;
