//! In-memory spreadsheet driver for testing

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::traits::*;
use crate::types::*;

#[derive(Debug, Default)]
struct SheetState {
    rows: Mutex<Vec<Vec<Value>>>,
    authorized: AtomicBool,
    authorize_calls: AtomicUsize,
    fail_authorize: AtomicBool,
    fail_fetches: AtomicBool,
    fail_appends: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

/// [`RemoteDriver`] holding its rows in memory
///
/// Clones share the same sheet, so a test can keep a handle for inspection
/// and fault injection after moving one into a [`RemoteStore`](crate::stores::RemoteStore).
#[derive(Debug, Clone, Default)]
pub struct MemorySheet {
    state: Arc<SheetState>,
}

impl MemorySheet {
    /// Create an empty sheet
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all rows in sheet order
    pub fn rows(&self) -> Vec<Vec<Value>> {
        self.state
            .rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Put a raw row at the bottom of the sheet, bypassing the driver API
    pub fn push_row(&self, row: Vec<Value>) {
        self.state
            .rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(row);
    }

    /// Number of `authorize` calls seen so far
    pub fn authorize_calls(&self) -> usize {
        self.state.authorize_calls.load(Ordering::SeqCst)
    }

    /// Drop the authorization, as if the session had expired
    pub fn revoke(&self) {
        self.state.authorized.store(false, Ordering::SeqCst);
    }

    /// Make `authorize` fail
    pub fn set_fail_authorize(&self, fail: bool) {
        self.state.fail_authorize.store(fail, Ordering::SeqCst);
    }

    /// Make `fetch_range` fail
    pub fn set_fail_fetches(&self, fail: bool) {
        self.state.fail_fetches.store(fail, Ordering::SeqCst);
    }

    /// Make `append_row` fail
    pub fn set_fail_appends(&self, fail: bool) {
        self.state.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Delay every fetch and append by `delay`
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self
            .state
            .delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = delay;
    }

    async fn wait(&self) {
        let delay = *self
            .state
            .delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl RemoteDriver for MemorySheet {
    async fn authorize(&self) -> ExpenseResult<()> {
        self.state.authorize_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_authorize.load(Ordering::SeqCst) {
            return Err(ExpenseError::AuthFailure("authorization refused".to_string()));
        }
        self.state.authorized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_authorized(&self) -> bool {
        self.state.authorized.load(Ordering::SeqCst)
    }

    async fn fetch_range(&self, _range: &str) -> ExpenseResult<Vec<Vec<Value>>> {
        self.wait().await;
        if self.state.fail_fetches.load(Ordering::SeqCst) {
            return Err(ExpenseError::Driver("fetch refused".to_string()));
        }
        Ok(self.rows())
    }

    async fn append_row(&self, _range: &str, row: Vec<Value>) -> ExpenseResult<()> {
        self.wait().await;
        if self.state.fail_appends.load(Ordering::SeqCst) {
            return Err(ExpenseError::Driver("append refused".to_string()));
        }
        self.push_row(row);
        Ok(())
    }
}
