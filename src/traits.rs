//! Traits for storage abstraction
//!
//! [`RecordStore`] is the capability set the reconciliation engine and the
//! [`ExpenseBook`](crate::book::ExpenseBook) work against. The two driver
//! traits are the narrow collaborator contracts the concrete adapters sit on.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde_json::Value;

use crate::types::*;

/// A store of expense records with a running balance
///
/// Implementations serialize their own `append` path: the read of the last
/// balance, the balance computation and the write happen under one exclusive
/// section, and reads never observe a half-finished append.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Short name used in log lines
    fn name(&self) -> &str;

    /// Stamp a new trailing balance for `amount` and persist the record.
    /// Returns the balance that was stored.
    async fn append(&self, timestamp: &str, amount: &BigDecimal) -> ExpenseResult<BigDecimal>;

    /// All records, timestamp ascending. Empty for a store never written to.
    async fn read_all(&self) -> ExpenseResult<Vec<ExpenseRecord>>;

    /// The most recently appended record, or [`ExpenseRecord::zero`] when empty
    async fn read_last(&self) -> ExpenseResult<ExpenseRecord>;

    /// Cheap liveness check; never fails
    fn is_available(&self) -> bool;
}

/// Low-level access to the local database
pub trait LocalDriver: Send + Sync {
    /// Open the underlying connection
    fn connect(&self) -> ExpenseResult<()>;

    /// Create the `expenses` table if it does not exist yet
    fn create_schema_if_missing(&self) -> ExpenseResult<()>;

    /// Insert a record, returning its surrogate id
    fn insert(&self, record: &ExpenseRecord) -> ExpenseResult<i64>;

    /// Every row, ordered by timestamp then id
    fn query_all(&self) -> ExpenseResult<Vec<StoredExpense>>;

    /// Highest surrogate id, `None` for an empty table
    fn query_max_id(&self) -> ExpenseResult<Option<i64>>;

    /// Row with the given surrogate id
    fn query_by_id(&self, id: i64) -> ExpenseResult<Option<StoredExpense>>;

    /// Whether the connection is open
    fn is_open(&self) -> bool;

    /// Close the connection; later calls fail until `connect` is called again
    fn close(&self) -> ExpenseResult<()>;
}

/// Low-level access to the remote spreadsheet
///
/// Rows are loosely typed cell arrays; the remote adapter converts them to
/// [`ExpenseRecord`] at its boundary.
#[async_trait]
pub trait RemoteDriver: Send + Sync {
    /// Acquire credentials for later calls
    async fn authorize(&self) -> ExpenseResult<()>;

    /// Whether `authorize` has succeeded
    fn is_authorized(&self) -> bool;

    /// Cell values of `range`, row by row. Empty when the range holds nothing.
    async fn fetch_range(&self, range: &str) -> ExpenseResult<Vec<Vec<Value>>>;

    /// Append one row after the last filled row of `range`
    async fn append_row(&self, range: &str, row: Vec<Value>) -> ExpenseResult<()>;
}
