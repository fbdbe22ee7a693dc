//! Expense book: the entry point that ties the two stores together
//!
//! Writes go to every reachable store, reads prefer the local store, and
//! `sync` repairs whatever a store missed while it was unreachable.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

use crate::reconciliation::ReconciliationEngine;
use crate::report::{export_xlsx, ExportSummary};
use crate::traits::RecordStore;
use crate::types::*;

/// Outcome of recording one expense
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteReport {
    /// Timestamp the expense was recorded under
    pub timestamp: String,
    /// Balance stamped by the local store, if it accepted the write
    pub local_balance: Option<BigDecimal>,
    /// Balance stamped by the remote store, if it accepted the write
    pub remote_balance: Option<BigDecimal>,
    /// Non-fatal problems the caller should surface
    pub notices: Vec<String>,
}

impl WriteReport {
    /// Whether both stores accepted the write
    pub fn is_complete(&self) -> bool {
        self.local_balance.is_some() && self.remote_balance.is_some()
    }
}

/// Local store plus an optional remote store
///
/// Without a remote store the book runs in single-store mode: writes and
/// reads use the local store and `sync` reports the remote side unavailable.
pub struct ExpenseBook<L: RecordStore, R: RecordStore> {
    local: L,
    remote: Option<R>,
}

impl<L: RecordStore, R: RecordStore> ExpenseBook<L, R> {
    /// Create a book over both stores
    pub fn new(local: L, remote: R) -> Self {
        Self {
            local,
            remote: Some(remote),
        }
    }

    /// Create a book with no remote store
    pub fn local_only(local: L) -> Self {
        Self {
            local,
            remote: None,
        }
    }

    /// The local store
    pub fn local(&self) -> &L {
        &self.local
    }

    /// The remote store, if one is attached
    pub fn remote(&self) -> Option<&R> {
        self.remote.as_ref()
    }

    /// Record an expense stamped with the current time
    pub async fn record_expense(&self, amount: &BigDecimal) -> ExpenseResult<WriteReport> {
        self.record_at(&now_timestamp(), amount).await
    }

    /// Record an expense under `timestamp`
    ///
    /// Every available store appends the expense and stamps its own balance.
    /// A store that is unreachable or fails the write adds a notice to the
    /// report; the call only fails when no store took the write.
    pub async fn record_at(&self, timestamp: &str, amount: &BigDecimal) -> ExpenseResult<WriteReport> {
        parse_timestamp(timestamp)?;

        let mut report = WriteReport {
            timestamp: timestamp.to_string(),
            local_balance: None,
            remote_balance: None,
            notices: Vec::new(),
        };

        report.local_balance = append_to(&self.local, timestamp, amount, &mut report.notices).await;
        match &self.remote {
            Some(remote) => {
                report.remote_balance =
                    append_to(remote, timestamp, amount, &mut report.notices).await;
            }
            None => report.notices.push("no remote store configured".to_string()),
        }

        if report.local_balance.is_none() && report.remote_balance.is_none() {
            return Err(ExpenseError::WriteFailure(report.notices.join("; ")));
        }
        debug!(timestamp, %amount, complete = report.is_complete(), "expense recorded");
        Ok(report)
    }

    /// All records from the local store, or from the remote store when the
    /// local one is unreachable or fails to read
    pub async fn read_all(&self) -> ExpenseResult<Vec<ExpenseRecord>> {
        let local_error = if self.local.is_available() {
            match self.local.read_all().await {
                Ok(records) => return Ok(records),
                Err(e) => {
                    warn!(error = %e, "falling back to remote store for read");
                    e
                }
            }
        } else {
            ExpenseError::Unavailable(self.local.name().to_string())
        };

        match self.available_remote() {
            Some(remote) => remote.read_all().await,
            None => Err(local_error),
        }
    }

    /// Most recent record, with the same fallback as [`read_all`](Self::read_all)
    pub async fn read_last(&self) -> ExpenseResult<ExpenseRecord> {
        let local_error = if self.local.is_available() {
            match self.local.read_last().await {
                Ok(record) => return Ok(record),
                Err(e) => {
                    warn!(error = %e, "falling back to remote store for read");
                    e
                }
            }
        } else {
            ExpenseError::Unavailable(self.local.name().to_string())
        };

        match self.available_remote() {
            Some(remote) => remote.read_last().await,
            None => Err(local_error),
        }
    }

    /// Reconcile the two stores
    pub async fn sync(&self) -> ExpenseResult<SyncResult> {
        match &self.remote {
            Some(remote) => ReconciliationEngine::new(&self.local, remote).sync().await,
            None => Ok(SyncResult::skipped(StoreSide::Remote)),
        }
    }

    /// Export the records inside the window to the workbook `<name>.xlsx`
    pub async fn export(
        &self,
        name: impl AsRef<Path>,
        start: Option<&str>,
        end: Option<&str>,
    ) -> ExpenseResult<ExportSummary> {
        let records = self.read_all().await?;
        export_xlsx(name, &records, start, end)
    }

    fn available_remote(&self) -> Option<&R> {
        self.remote.as_ref().filter(|remote| remote.is_available())
    }
}

async fn append_to<S: RecordStore + ?Sized>(
    store: &S,
    timestamp: &str,
    amount: &BigDecimal,
    notices: &mut Vec<String>,
) -> Option<BigDecimal> {
    if !store.is_available() {
        notices.push(format!("{} store unavailable", store.name()));
        return None;
    }
    match store.append(timestamp, amount).await {
        Ok(balance) => Some(balance),
        Err(e) => {
            warn!(store = store.name(), error = %e, "could not write expense");
            notices.push(e.to_string());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::MemoryStore;
    use std::str::FromStr;

    fn dec(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).unwrap()
    }

    fn book() -> (MemoryStore, MemoryStore, ExpenseBook<MemoryStore, MemoryStore>) {
        let local = MemoryStore::new("local");
        let remote = MemoryStore::new("remote");
        let book = ExpenseBook::new(local.clone(), remote.clone());
        (local, remote, book)
    }

    #[tokio::test]
    async fn test_record_writes_both_stores() {
        let (local, remote, book) = book();
        let report = book
            .record_at("2020/01/01 00:00:00", &dec("4.20"))
            .await
            .unwrap();

        assert!(report.is_complete());
        assert!(report.notices.is_empty());
        assert_eq!(local.records().len(), 1);
        assert_eq!(remote.records().len(), 1);
    }

    #[tokio::test]
    async fn test_record_survives_remote_failure() {
        let (local, remote, book) = book();
        remote.set_fail_all_appends(true);

        let report = book
            .record_at("2020/01/01 00:00:00", &dec("1"))
            .await
            .unwrap();
        assert_eq!(report.local_balance, Some(dec("1")));
        assert_eq!(report.remote_balance, None);
        assert_eq!(report.notices.len(), 1);
        assert_eq!(local.records().len(), 1);
    }

    #[tokio::test]
    async fn test_record_fails_when_no_store_accepts() {
        let (local, remote, book) = book();
        local.set_available(false);
        remote.set_fail_all_appends(true);

        let result = book.record_at("2020/01/01 00:00:00", &dec("1")).await;
        assert!(matches!(result, Err(ExpenseError::WriteFailure(_))));
    }

    #[tokio::test]
    async fn test_record_rejects_bad_timestamp() {
        let (local, _remote, book) = book();
        let result = book.record_at("2020-01-01", &dec("1")).await;
        assert!(matches!(result, Err(ExpenseError::InvalidTimeFormat(_))));
        assert!(local.records().is_empty());
    }

    #[tokio::test]
    async fn test_record_expense_uses_storage_format() {
        let (local, _remote, book) = book();
        let report = book.record_expense(&dec("1")).await.unwrap();
        assert!(parse_timestamp(&report.timestamp).is_ok());
        assert_eq!(local.timestamps(), vec![report.timestamp]);
    }

    #[tokio::test]
    async fn test_reads_fall_back_to_remote() {
        let (local, _remote, book) = book();
        book.record_at("2020/01/01 00:00:00", &dec("1")).await.unwrap();
        local.set_available(false);
        book.record_at("2020/01/01 00:00:01", &dec("2")).await.unwrap();

        assert_eq!(book.read_all().await.unwrap().len(), 2);
        assert_eq!(book.read_last().await.unwrap().balance, dec("3"));

        local.set_available(true);
        local.set_fail_reads(true);
        assert_eq!(book.read_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_local_only_book() {
        let local = MemoryStore::new("local");
        let book: ExpenseBook<MemoryStore, MemoryStore> = ExpenseBook::local_only(local.clone());

        let report = book
            .record_at("2020/01/01 00:00:00", &dec("1"))
            .await
            .unwrap();
        assert_eq!(report.notices, vec!["no remote store configured".to_string()]);
        assert_eq!(
            book.sync().await.unwrap(),
            SyncResult::skipped(StoreSide::Remote)
        );

        local.set_available(false);
        assert!(matches!(
            book.read_all().await,
            Err(ExpenseError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_sync_repairs_missed_write() {
        let (local, remote, book) = book();
        remote.set_available(false);
        book.record_at("2020/01/01 00:00:00", &dec("5")).await.unwrap();
        remote.set_available(true);

        let result = book.sync().await.unwrap();
        assert_eq!(result.repaired_remote, 1);
        assert_eq!(remote.records(), local.records());
    }
}
