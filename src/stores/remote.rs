//! Remote store adapter
//!
//! The remote store is the variable-latency side, so every driver call runs
//! under a deadline. An elapsed deadline is reported like any other network
//! error.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde_json::Value;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::balance::balance_after;
use crate::traits::*;
use crate::types::*;

/// Where the three record columns live and how long a call may take
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteOptions {
    /// Range holding every record row, header excluded
    pub read_range: String,
    /// Range new rows are appended after
    pub append_range: String,
    /// Deadline applied to each driver call
    pub timeout: Duration,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self {
            read_range: "A2:C".to_string(),
            append_range: "A2:C2".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// [`RecordStore`] over a [`RemoteDriver`]
pub struct RemoteStore<D: RemoteDriver> {
    driver: D,
    options: RemoteOptions,
    gate: RwLock<()>,
}

impl<D: RemoteDriver> RemoteStore<D> {
    /// Authorize the driver and build the adapter
    ///
    /// This is the only place credentials are acquired; `sync` and the write
    /// path never trigger authorization.
    pub async fn connect(driver: D, options: RemoteOptions) -> ExpenseResult<Self> {
        let store = Self {
            driver,
            options,
            gate: RwLock::new(()),
        };
        store
            .within("authorize", store.driver.authorize())
            .await
            .map_err(|e| match e {
                ExpenseError::AuthFailure(_) => e,
                other => ExpenseError::AuthFailure(other.to_string()),
            })?;
        Ok(store)
    }

    /// Access the driver
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Configured ranges and deadline
    pub fn options(&self) -> &RemoteOptions {
        &self.options
    }

    async fn within<T>(
        &self,
        what: &str,
        call: impl Future<Output = ExpenseResult<T>>,
    ) -> ExpenseResult<T> {
        match tokio::time::timeout(self.options.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ExpenseError::Driver(format!(
                "{} timed out after {:?}",
                what, self.options.timeout
            ))),
        }
    }

    // Rows in sheet order, which is append order. Rows that do not hold a
    // record are skipped so one bad cell cannot lock the store.
    async fn fetch_records(&self) -> ExpenseResult<Vec<ExpenseRecord>> {
        let rows = self
            .within(
                "fetch",
                self.driver.fetch_range(&self.options.read_range),
            )
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            match record_from_row(index, row) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => warn!(row = index, error = %e, "skipping malformed spreadsheet row"),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl<D: RemoteDriver> RecordStore for RemoteStore<D> {
    fn name(&self) -> &str {
        "remote"
    }

    async fn append(&self, timestamp: &str, amount: &BigDecimal) -> ExpenseResult<BigDecimal> {
        let _guard = self.gate.write().await;
        let write_failure = |e: ExpenseError| ExpenseError::WriteFailure(format!("remote: {}", e));

        let records = self.fetch_records().await.map_err(write_failure)?;
        let last = records.last().cloned().unwrap_or_else(ExpenseRecord::zero);
        let balance = balance_after(&last, amount);

        let row = vec![
            Value::String(timestamp.to_string()),
            Value::String(amount.to_string()),
            Value::String(balance.to_string()),
        ];
        self.within(
            "append",
            self.driver.append_row(&self.options.append_range, row),
        )
        .await
        .map_err(write_failure)?;

        debug!(timestamp, %amount, %balance, "wrote expense to remote store");
        Ok(balance)
    }

    async fn read_all(&self) -> ExpenseResult<Vec<ExpenseRecord>> {
        let _guard = self.gate.read().await;
        let mut records = self
            .fetch_records()
            .await
            .map_err(|e| ExpenseError::ReadFailure(format!("remote: {}", e)))?;
        sort_chronologically(&mut records);
        debug!(count = records.len(), "read expenses from remote store");
        Ok(records)
    }

    async fn read_last(&self) -> ExpenseResult<ExpenseRecord> {
        let _guard = self.gate.read().await;
        let records = self
            .fetch_records()
            .await
            .map_err(|e| ExpenseError::ReadFailure(format!("remote: {}", e)))?;
        Ok(records.last().cloned().unwrap_or_else(ExpenseRecord::zero))
    }

    fn is_available(&self) -> bool {
        self.driver.is_authorized()
    }
}

/// Convert one `[timestamp, amount, balance]` row. Blank rows yield `None`.
fn record_from_row(index: usize, row: &[Value]) -> ExpenseResult<Option<ExpenseRecord>> {
    if row.iter().all(|cell| cell_text(cell).is_empty()) {
        warn!(row = index, "skipping blank spreadsheet row");
        return Ok(None);
    }
    if row.len() < 3 {
        return Err(ExpenseError::Driver(format!(
            "row {} has {} cells, expected 3",
            index,
            row.len()
        )));
    }

    Ok(Some(ExpenseRecord::new(
        cell_text(&row[0]),
        cell_decimal(index, &row[1])?,
        cell_decimal(index, &row[2])?,
    )))
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::String(text) => text.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn cell_decimal(index: usize, cell: &Value) -> ExpenseResult<BigDecimal> {
    let text = cell_text(cell);
    BigDecimal::from_str(&text).map_err(|e| {
        ExpenseError::Driver(format!("row {}: '{}' is not a decimal: {}", index, text, e))
    })
}
