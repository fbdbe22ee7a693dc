//! Time window filtering

use chrono::NaiveDateTime;
use tracing::warn;

use crate::types::*;

/// Keep the records strictly between `start` and `end`, preserving order
///
/// Absent or blank bounds impose no constraint on their side. A bound that
/// does not parse fails the call with `InvalidTimeFormat`; a record whose own
/// timestamp does not parse is dropped and the rest are still filtered.
pub fn filter(
    records: &[ExpenseRecord],
    start: Option<&str>,
    end: Option<&str>,
) -> ExpenseResult<Vec<ExpenseRecord>> {
    let start = parse_bound(start)?;
    let end = parse_bound(end)?;

    let mut kept = Vec::new();
    for record in records {
        let time = match record.time() {
            Ok(time) => time,
            Err(e) => {
                warn!(error = %e, "record skipped by report filter");
                continue;
            }
        };
        if start.is_some_and(|start| time <= start) {
            continue;
        }
        if end.is_some_and(|end| time >= end) {
            continue;
        }
        kept.push(record.clone());
    }
    Ok(kept)
}

fn parse_bound(bound: Option<&str>) -> ExpenseResult<Option<NaiveDateTime>> {
    match bound {
        Some(text) if !text.trim().is_empty() => parse_timestamp(text).map(Some),
        _ => Ok(None),
    }
}
