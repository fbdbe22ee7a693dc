//! In-memory record store for testing

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::balance::balance_after;
use crate::traits::*;
use crate::types::*;

/// In-memory [`RecordStore`] for testing and development
///
/// Records are kept in append order. Clones share state, and the setters
/// inject the read, write and liveness faults the reconciliation engine has
/// to survive.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    name: String,
    records: Arc<RwLock<Vec<ExpenseRecord>>>,
    available: Arc<AtomicBool>,
    fail_reads: Arc<AtomicBool>,
    fail_all_appends: Arc<AtomicBool>,
    failing_timestamps: Arc<RwLock<HashSet<String>>>,
}

impl MemoryStore {
    /// Create an empty, available store
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: Arc::new(RwLock::new(Vec::new())),
            available: Arc::new(AtomicBool::new(true)),
            fail_reads: Arc::new(AtomicBool::new(false)),
            fail_all_appends: Arc::new(AtomicBool::new(false)),
            failing_timestamps: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Create a store pre-filled with `records`, taken verbatim
    pub fn with_records(name: impl Into<String>, records: Vec<ExpenseRecord>) -> Self {
        let store = Self::new(name);
        *store
            .records
            .write()
            .unwrap_or_else(PoisonError::into_inner) = records;
        store
    }

    /// Snapshot of all records in append order
    pub fn records(&self) -> Vec<ExpenseRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Timestamps currently held, in append order
    pub fn timestamps(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .map(|record| record.timestamp)
            .collect()
    }

    /// Toggle the liveness check
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make every read fail
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every append fail
    pub fn set_fail_all_appends(&self, fail: bool) {
        self.fail_all_appends.store(fail, Ordering::SeqCst);
    }

    /// Make appends for one timestamp fail
    pub fn fail_appends_for(&self, timestamp: impl Into<String>) {
        self.failing_timestamps
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(timestamp.into());
    }

    /// Stop failing appends for any particular timestamp
    pub fn clear_append_failures(&self) {
        self.failing_timestamps
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn check_reads(&self) -> ExpenseResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ExpenseError::ReadFailure(format!("{}: read refused", self.name)));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("memory")
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn append(&self, timestamp: &str, amount: &BigDecimal) -> ExpenseResult<BigDecimal> {
        let refused = self.fail_all_appends.load(Ordering::SeqCst)
            || self
                .failing_timestamps
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(timestamp);
        if refused {
            return Err(ExpenseError::WriteFailure(format!(
                "{}: append of {} refused",
                self.name, timestamp
            )));
        }

        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let last = records.last().cloned().unwrap_or_else(ExpenseRecord::zero);
        let balance = balance_after(&last, amount);
        records.push(ExpenseRecord::new(timestamp, amount.clone(), balance.clone()));
        Ok(balance)
    }

    async fn read_all(&self) -> ExpenseResult<Vec<ExpenseRecord>> {
        self.check_reads()?;
        let mut records = self.records();
        sort_chronologically(&mut records);
        Ok(records)
    }

    async fn read_last(&self) -> ExpenseResult<ExpenseRecord> {
        self.check_reads()?;
        Ok(self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
            .unwrap_or_else(ExpenseRecord::zero))
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}
