//! Reconciliation between the local and the remote store
//!
//! Both stores are append-only journals keyed by timestamp. A sync reads
//! both in full, computes the keys present on exactly one side and copies
//! those records to the other side through the regular `append` path, so the
//! receiving store stamps the balance from its own chain.
//!
//! Keys present on both sides are never compared. Two stores can hold the
//! same timestamp with different balances and a sync leaves both as they are.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::traits::RecordStore;
use crate::types::*;

/// The records each side is missing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncPlan {
    /// Present locally only; to be appended to the remote store
    pub only_in_local: Vec<ExpenseRecord>,
    /// Present remotely only; to be appended to the local store
    pub only_in_remote: Vec<ExpenseRecord>,
}

impl SyncPlan {
    /// Symmetric difference of two record sets by timestamp
    ///
    /// Both lists come out timestamp ascending, so replayed records extend
    /// the receiving chain in chronological order. A timestamp used twice
    /// within one side keeps only the later record. Records whose timestamp
    /// does not parse take no part in the comparison.
    pub fn between(local: &[ExpenseRecord], remote: &[ExpenseRecord]) -> Self {
        let local = index_by_timestamp(StoreSide::Local, local);
        let remote = index_by_timestamp(StoreSide::Remote, remote);

        let only_in_local = local
            .iter()
            .filter(|(key, _)| !remote.contains_key(key))
            .map(|(_, record)| (*record).clone())
            .collect();
        let only_in_remote = remote
            .iter()
            .filter(|(key, _)| !local.contains_key(key))
            .map(|(_, record)| (*record).clone())
            .collect();

        Self {
            only_in_local,
            only_in_remote,
        }
    }

    /// Whether both sides hold the same key set
    pub fn is_empty(&self) -> bool {
        self.only_in_local.is_empty() && self.only_in_remote.is_empty()
    }
}

fn index_by_timestamp(
    side: StoreSide,
    records: &[ExpenseRecord],
) -> BTreeMap<NaiveDateTime, &ExpenseRecord> {
    let mut index = BTreeMap::new();
    for record in records {
        match record.time() {
            Ok(key) => {
                if index.insert(key, record).is_some() {
                    debug!(%side, timestamp = %record.timestamp, "timestamp reused, later record wins");
                }
            }
            Err(e) => warn!(%side, error = %e, "record left out of reconciliation"),
        }
    }
    index
}

/// Compares two stores and appends to each the records only the other holds
pub struct ReconciliationEngine<'a, L: ?Sized, R: ?Sized> {
    local: &'a L,
    remote: &'a R,
}

impl<'a, L, R> ReconciliationEngine<'a, L, R>
where
    L: RecordStore + ?Sized,
    R: RecordStore + ?Sized,
{
    /// Create an engine over the two stores
    pub fn new(local: &'a L, remote: &'a R) -> Self {
        Self { local, remote }
    }

    /// Read both stores and compute what each is missing, without writing
    pub async fn plan(&self) -> ExpenseResult<SyncPlan> {
        let local = self.local.read_all().await.map_err(|e| {
            ExpenseError::SyncFailure(format!("cannot read {} store: {}", self.local.name(), e))
        })?;
        let remote = self.remote.read_all().await.map_err(|e| {
            ExpenseError::SyncFailure(format!("cannot read {} store: {}", self.remote.name(), e))
        })?;
        Ok(SyncPlan::between(&local, &remote))
    }

    /// Bring both stores to the same key set
    ///
    /// Returns a neutral result flagged with the unreachable side when either
    /// store fails its liveness check. Individual append failures are counted
    /// and skipped; those keys stay outstanding for the next run. Fails with
    /// `SyncFailure` when a store cannot be read or when every attempted
    /// repair failed.
    pub async fn sync(&self) -> ExpenseResult<SyncResult> {
        if !self.local.is_available() {
            info!(store = self.local.name(), "store unavailable, skipping sync");
            return Ok(SyncResult::skipped(StoreSide::Local));
        }
        if !self.remote.is_available() {
            info!(store = self.remote.name(), "store unavailable, skipping sync");
            return Ok(SyncResult::skipped(StoreSide::Remote));
        }

        let plan = self.plan().await?;
        debug!(
            only_in_local = plan.only_in_local.len(),
            only_in_remote = plan.only_in_remote.len(),
            "computed store difference"
        );

        let mut result = SyncResult::default();
        for record in &plan.only_in_local {
            match self.remote.append(&record.timestamp, &record.amount).await {
                Ok(_) => result.repaired_remote += 1,
                Err(e) => {
                    warn!(timestamp = %record.timestamp, error = %e, "could not copy record to {} store", self.remote.name());
                    result.failed_remote += 1;
                }
            }
        }
        for record in &plan.only_in_remote {
            match self.local.append(&record.timestamp, &record.amount).await {
                Ok(_) => result.repaired_local += 1,
                Err(e) => {
                    warn!(timestamp = %record.timestamp, error = %e, "could not copy record to {} store", self.local.name());
                    result.failed_local += 1;
                }
            }
        }

        let failed = result.failed_local + result.failed_remote;
        if failed > 0 && result.total_repaired() == 0 {
            return Err(ExpenseError::SyncFailure(format!(
                "all {} repairs failed",
                failed
            )));
        }

        info!(
            repaired_local = result.repaired_local,
            repaired_remote = result.repaired_remote,
            failed_local = result.failed_local,
            failed_remote = result.failed_remote,
            "sync finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::MemoryStore;
    use bigdecimal::BigDecimal;
    use std::str::FromStr;

    fn dec(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).unwrap()
    }

    fn record(timestamp: &str, amount: &str, balance: &str) -> ExpenseRecord {
        ExpenseRecord::new(timestamp, dec(amount), dec(balance))
    }

    const T1: &str = "2020/01/01 10:00:00";
    const T2: &str = "2020/01/01 11:00:00";
    const T3: &str = "2020/01/01 12:00:00";

    #[test]
    fn test_plan_symmetric_difference() {
        let local = vec![record(T1, "1", "1"), record(T2, "2", "3")];
        let remote = vec![record(T2, "2", "2"), record(T3, "3", "5")];

        let plan = SyncPlan::between(&local, &remote);
        assert_eq!(plan.only_in_local, vec![record(T1, "1", "1")]);
        assert_eq!(plan.only_in_remote, vec![record(T3, "3", "5")]);
    }

    #[test]
    fn test_plan_ignores_values_on_matching_keys() {
        let local = vec![record(T1, "1", "1")];
        let remote = vec![record(T1, "9", "99")];
        assert!(SyncPlan::between(&local, &remote).is_empty());
    }

    #[test]
    fn test_plan_is_chronological() {
        let local = vec![record(T3, "3", "3"), record(T1, "1", "4")];
        let plan = SyncPlan::between(&local, &[]);
        assert_eq!(plan.only_in_local[0].timestamp, T1);
        assert_eq!(plan.only_in_local[1].timestamp, T3);
    }

    #[test]
    fn test_plan_reused_timestamp_keeps_later_record() {
        let local = vec![record(T1, "1", "1"), record(T1, "2", "3")];
        let plan = SyncPlan::between(&local, &[]);
        assert_eq!(plan.only_in_local, vec![record(T1, "2", "3")]);
    }

    #[test]
    fn test_plan_skips_unparsable_timestamps() {
        let local = vec![record("yesterday", "1", "1"), record(T1, "1", "2")];
        let plan = SyncPlan::between(&local, &[]);
        assert_eq!(plan.only_in_local.len(), 1);
    }

    #[tokio::test]
    async fn test_sync_fills_both_sides() {
        let local = MemoryStore::with_records("local", vec![record(T1, "1", "1"), record(T2, "2", "3")]);
        let remote = MemoryStore::with_records("remote", vec![record(T2, "2", "2"), record(T3, "3", "5")]);

        let result = ReconciliationEngine::new(&local, &remote).sync().await.unwrap();
        assert_eq!(result.repaired_local, 1);
        assert_eq!(result.repaired_remote, 1);

        assert_eq!(local.timestamps(), vec![T1, T2, T3]);
        assert_eq!(remote.timestamps(), vec![T2, T3, T1]);

        // Matching keys are untouched on both sides.
        assert_eq!(local.records()[1], record(T2, "2", "3"));
        assert_eq!(remote.records()[0], record(T2, "2", "2"));

        // Replayed records carry the receiving store's own balance.
        assert_eq!(local.records()[2], record(T3, "3", "6"));
        assert_eq!(remote.records()[2], record(T1, "1", "6"));
    }

    #[tokio::test]
    async fn test_sync_into_empty_local() {
        let local = MemoryStore::new("local");
        let remote = MemoryStore::with_records("remote", vec![record(T1, "5.00", "5.00")]);

        let result = ReconciliationEngine::new(&local, &remote).sync().await.unwrap();
        assert_eq!(result.repaired_local, 1);
        assert_eq!(result.repaired_remote, 0);
        assert_eq!(local.records(), vec![record(T1, "5.00", "5.00")]);
    }

    #[tokio::test]
    async fn test_sync_twice_is_noop() {
        let local = MemoryStore::with_records("local", vec![record(T1, "1", "1")]);
        let remote = MemoryStore::with_records("remote", vec![record(T3, "3", "3")]);
        let engine = ReconciliationEngine::new(&local, &remote);

        engine.sync().await.unwrap();
        let second = engine.sync().await.unwrap();
        assert_eq!(second.repaired_local, 0);
        assert_eq!(second.repaired_remote, 0);
        assert!(second.is_noop());
    }

    #[tokio::test]
    async fn test_sync_unavailable_store_is_noop() {
        let local = MemoryStore::with_records("local", vec![record(T1, "1", "1")]);
        let remote = MemoryStore::new("remote");
        remote.set_available(false);
        remote.set_fail_reads(true);

        let result = ReconciliationEngine::new(&local, &remote).sync().await.unwrap();
        assert_eq!(result, SyncResult::skipped(StoreSide::Remote));
        assert!(remote.records().is_empty());
        assert_eq!(local.records().len(), 1);

        local.set_available(false);
        let result = ReconciliationEngine::new(&local, &remote).sync().await.unwrap();
        assert_eq!(result.unavailable, Some(StoreSide::Local));
    }

    #[tokio::test]
    async fn test_sync_partial_failure_retries_outstanding_keys() {
        let local = MemoryStore::with_records("local", vec![record(T1, "1", "1"), record(T2, "2", "3")]);
        let remote = MemoryStore::new("remote");
        remote.fail_appends_for(T1);
        let engine = ReconciliationEngine::new(&local, &remote);

        let first = engine.sync().await.unwrap();
        assert_eq!(first.repaired_remote, 1);
        assert_eq!(first.failed_remote, 1);
        assert_eq!(remote.timestamps(), vec![T2]);

        remote.clear_append_failures();
        let second = engine.sync().await.unwrap();
        assert_eq!(second.repaired_remote, 1);
        assert_eq!(second.failed_remote, 0);
        assert_eq!(remote.timestamps(), vec![T2, T1]);

        assert!(engine.sync().await.unwrap().is_noop());
    }

    #[tokio::test]
    async fn test_sync_total_failure() {
        let local = MemoryStore::with_records("local", vec![record(T1, "1", "1")]);
        let remote = MemoryStore::new("remote");
        remote.set_fail_all_appends(true);

        let result = ReconciliationEngine::new(&local, &remote).sync().await;
        assert!(matches!(result, Err(ExpenseError::SyncFailure(_))));
    }

    #[tokio::test]
    async fn test_sync_read_failure() {
        let local = MemoryStore::new("local");
        let remote = MemoryStore::new("remote");
        local.set_fail_reads(true);

        let result = ReconciliationEngine::new(&local, &remote).sync().await;
        assert!(matches!(result, Err(ExpenseError::SyncFailure(_))));
    }

    #[tokio::test]
    async fn test_sync_works_through_trait_objects() {
        let local = MemoryStore::with_records("local", vec![record(T1, "1", "1")]);
        let remote = MemoryStore::new("remote");
        let local_dyn: &dyn RecordStore = &local;
        let remote_dyn: &dyn RecordStore = &remote;

        let result = ReconciliationEngine::new(local_dyn, remote_dyn).sync().await.unwrap();
        assert_eq!(result.repaired_remote, 1);
    }
}
