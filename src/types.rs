//! Core types and data structures for the expense journal

use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage format of every timestamp, local and remote (`yyyy/MM/dd HH:mm:ss`)
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Parse a stored timestamp string
pub fn parse_timestamp(value: &str) -> ExpenseResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT)
        .map_err(|e| ExpenseError::InvalidTimeFormat(format!("'{}': {}", value, e)))
}

/// Render a point in time in the storage format, truncated to whole seconds
pub fn format_timestamp(time: &NaiveDateTime) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// Current local wall-clock time in the storage format
pub fn now_timestamp() -> String {
    format_timestamp(&chrono::Local::now().naive_local())
}

/// A single expense entry as held by any store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    /// When the expense was recorded, in [`TIMESTAMP_FORMAT`]
    pub timestamp: String,
    /// Signed value of the expense (negative = debit, positive = credit)
    pub amount: BigDecimal,
    /// Running balance of the store this record was appended to
    pub balance: BigDecimal,
}

impl ExpenseRecord {
    /// Create a new record
    pub fn new(timestamp: impl Into<String>, amount: BigDecimal, balance: BigDecimal) -> Self {
        Self {
            timestamp: timestamp.into(),
            amount,
            balance,
        }
    }

    /// The record an empty store reports as its last entry
    pub fn zero() -> Self {
        Self::new(String::new(), BigDecimal::from(0), BigDecimal::from(0))
    }

    /// Whether this is the placeholder returned for an empty store
    pub fn is_zero(&self) -> bool {
        self.timestamp.is_empty()
    }

    /// Parsed form of the timestamp
    pub fn time(&self) -> ExpenseResult<NaiveDateTime> {
        parse_timestamp(&self.timestamp)
    }

    /// Sort key by point in time; unparsable timestamps order last
    pub fn chronological_key(&self) -> (bool, Option<NaiveDateTime>) {
        let time = self.time().ok();
        (time.is_none(), time)
    }
}

/// Order records by point in time rather than by timestamp text
///
/// `2020/1/5` and `2020/01/05` are the same day and sort together. Records
/// with the same time keep their relative order.
pub fn sort_chronologically(records: &mut [ExpenseRecord]) {
    records.sort_by_cached_key(ExpenseRecord::chronological_key);
}

/// A row of the local database: a record plus its store-local surrogate id
///
/// The id orders appends within one database and is never compared across stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredExpense {
    pub id: i64,
    pub record: ExpenseRecord,
}

/// Which of the two stores an outcome refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreSide {
    /// The durable local database
    Local,
    /// The network-backed spreadsheet
    Remote,
}

impl fmt::Display for StoreSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreSide::Local => f.write_str("local"),
            StoreSide::Remote => f.write_str("remote"),
        }
    }
}

/// Outcome of one reconciliation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    /// Records copied from the remote store into the local store
    pub repaired_local: usize,
    /// Records copied from the local store into the remote store
    pub repaired_remote: usize,
    /// Local repairs that failed and remain outstanding
    pub failed_local: usize,
    /// Remote repairs that failed and remain outstanding
    pub failed_remote: usize,
    /// Set when the run was skipped because a store was not reachable
    pub unavailable: Option<StoreSide>,
}

impl SyncResult {
    /// Neutral result for a run skipped because `side` is unreachable
    pub fn skipped(side: StoreSide) -> Self {
        Self {
            unavailable: Some(side),
            ..Self::default()
        }
    }

    /// Total number of records appended by the run
    pub fn total_repaired(&self) -> usize {
        self.repaired_local + self.repaired_remote
    }

    /// Whether both stores already held the same key set
    pub fn is_noop(&self) -> bool {
        self.total_repaired() == 0 && self.failed_local == 0 && self.failed_remote == 0
    }
}

/// Errors that can occur in the expense system
#[derive(Debug, thiserror::Error)]
pub enum ExpenseError {
    #[error("Write failure: {0}")]
    WriteFailure(String),
    #[error("Read failure: {0}")]
    ReadFailure(String),
    #[error("Sync failure: {0}")]
    SyncFailure(String),
    #[error("Invalid time format: {0}")]
    InvalidTimeFormat(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Authorization failure: {0}")]
    AuthFailure(String),
    #[error("Driver error: {0}")]
    Driver(String),
    #[error("Export failure: {0}")]
    Export(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for expense operations
pub type ExpenseResult<T> = Result<T, ExpenseError>;
