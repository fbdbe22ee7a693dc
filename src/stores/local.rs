//! Local store adapter

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use tokio::sync::RwLock;
use tracing::debug;

use crate::balance::balance_after;
use crate::traits::*;
use crate::types::*;

/// [`RecordStore`] over a [`LocalDriver`]
pub struct LocalStore<D: LocalDriver> {
    driver: D,
    gate: RwLock<()>,
}

impl<D: LocalDriver> LocalStore<D> {
    /// Wrap a driver without touching it; `is_available` stays false until
    /// the driver is connected
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            gate: RwLock::new(()),
        }
    }

    /// Connect the driver and create the schema if needed
    pub fn open(driver: D) -> ExpenseResult<Self> {
        driver.connect()?;
        driver.create_schema_if_missing()?;
        Ok(Self::new(driver))
    }

    /// Close the underlying connection
    pub async fn close(&self) -> ExpenseResult<()> {
        let _guard = self.gate.write().await;
        self.driver.close()
    }

    /// Access the driver
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Every row with its surrogate id, in append order
    pub async fn read_all_stored(&self) -> ExpenseResult<Vec<StoredExpense>> {
        let _guard = self.gate.read().await;
        let mut rows = self
            .driver
            .query_all()
            .map_err(|e| ExpenseError::ReadFailure(format!("local: {}", e)))?;
        rows.sort_by_key(|row| row.id);
        Ok(rows)
    }

    // Last by surrogate id, i.e. most recently appended.
    fn last_record(&self) -> ExpenseResult<ExpenseRecord> {
        let Some(max_id) = self.driver.query_max_id()? else {
            return Ok(ExpenseRecord::zero());
        };
        Ok(self
            .driver
            .query_by_id(max_id)?
            .map(|row| row.record)
            .unwrap_or_else(ExpenseRecord::zero))
    }
}

#[async_trait]
impl<D: LocalDriver> RecordStore for LocalStore<D> {
    fn name(&self) -> &str {
        "local"
    }

    async fn append(&self, timestamp: &str, amount: &BigDecimal) -> ExpenseResult<BigDecimal> {
        let _guard = self.gate.write().await;
        let write_failure = |e: ExpenseError| ExpenseError::WriteFailure(format!("local: {}", e));

        let last = self.last_record().map_err(write_failure)?;
        let balance = balance_after(&last, amount);
        let record = ExpenseRecord::new(timestamp, amount.clone(), balance.clone());
        let id = self.driver.insert(&record).map_err(write_failure)?;

        debug!(id, timestamp, %amount, %balance, "wrote expense to local store");
        Ok(balance)
    }

    async fn read_all(&self) -> ExpenseResult<Vec<ExpenseRecord>> {
        let _guard = self.gate.read().await;
        let rows = self
            .driver
            .query_all()
            .map_err(|e| ExpenseError::ReadFailure(format!("local: {}", e)))?;
        debug!(count = rows.len(), "read expenses from local store");
        Ok(rows.into_iter().map(|row| row.record).collect())
    }

    async fn read_last(&self) -> ExpenseResult<ExpenseRecord> {
        let _guard = self.gate.read().await;
        self.last_record()
            .map_err(|e| ExpenseError::ReadFailure(format!("local: {}", e)))
    }

    fn is_available(&self) -> bool {
        self.driver.is_open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::SqliteDriver;
    use std::str::FromStr;
    use std::sync::Arc;

    fn dec(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).unwrap()
    }

    fn open_store() -> LocalStore<SqliteDriver> {
        LocalStore::open(SqliteDriver::in_memory()).unwrap()
    }

    #[tokio::test]
    async fn test_append_stamps_running_balance() {
        let store = open_store();
        assert_eq!(
            store.append("2020/01/01 00:00:00", &dec("10.00")).await.unwrap(),
            dec("10.00")
        );
        assert_eq!(
            store.append("2020/01/01 00:00:01", &dec("-3.50")).await.unwrap(),
            dec("6.50")
        );

        let last = store.read_last().await.unwrap();
        assert_eq!(last.timestamp, "2020/01/01 00:00:01");
        assert_eq!(last.balance, dec("6.50"));
    }

    #[tokio::test]
    async fn test_empty_store_reads() {
        let store = open_store();
        assert!(store.read_all().await.unwrap().is_empty());
        assert!(store.read_last().await.unwrap().is_zero());
    }

    #[tokio::test]
    async fn test_last_is_latest_append_not_latest_timestamp() {
        let store = open_store();
        store.append("2020/01/02 00:00:00", &dec("1")).await.unwrap();
        store.append("2020/01/01 00:00:00", &dec("2")).await.unwrap();

        let last = store.read_last().await.unwrap();
        assert_eq!(last.timestamp, "2020/01/01 00:00:00");
        assert_eq!(last.balance, dec("3"));

        let all = store.read_all().await.unwrap();
        assert_eq!(all[0].timestamp, "2020/01/01 00:00:00");

        let stored = store.read_all_stored().await.unwrap();
        assert_eq!(stored[0].record.timestamp, "2020/01/02 00:00:00");
    }

    #[tokio::test]
    async fn test_closed_store_is_unavailable() {
        let store = open_store();
        assert!(store.is_available());
        store.close().await.unwrap();
        assert!(!store.is_available());
        assert!(matches!(
            store.append("2020/01/01 00:00:00", &dec("1")).await,
            Err(ExpenseError::WriteFailure(_))
        ));
        assert!(matches!(
            store.read_all().await,
            Err(ExpenseError::ReadFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_unopened_store_is_unavailable() {
        let store = LocalStore::new(SqliteDriver::in_memory());
        assert!(!store.is_available());
    }

    #[tokio::test]
    async fn test_concurrent_appends_keep_chain() {
        let store = Arc::new(open_store());
        let mut handles = Vec::new();
        for i in 0..20 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let timestamp = format!("2020/01/01 00:00:{:02}", i);
                store.append(&timestamp, &dec("1.25")).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let records: Vec<ExpenseRecord> = store
            .read_all_stored()
            .await
            .unwrap()
            .into_iter()
            .map(|row| row.record)
            .collect();
        assert_eq!(records.len(), 20);
        assert_eq!(crate::balance::first_chain_break(&records), None);
        assert_eq!(store.read_last().await.unwrap().balance, dec("25.00"));
    }
}
