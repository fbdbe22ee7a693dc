//! Spreadsheet export of a filtered record set

use bigdecimal::{BigDecimal, ToPrimitive};
use rust_xlsxwriter::{Workbook, Worksheet};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::report::filter::filter;
use crate::types::*;

/// Name of the worksheet an export is written to
pub const EXPORT_SHEET: &str = "Expenses";

/// What an export wrote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSummary {
    /// File that was written
    pub path: PathBuf,
    /// Worksheet holding the rows
    pub sheet: String,
    /// Number of record rows written
    pub rows: usize,
}

/// Filter `records` to the window and write them to the workbook `<name>.xlsx`
///
/// The workbook has a single [`EXPORT_SHEET`] worksheet with one row per
/// record, `[timestamp, amount, balance]`, and no header row. The timestamp
/// is a text cell; amount and balance are numeric cells.
pub fn export_xlsx(
    name: impl AsRef<Path>,
    records: &[ExpenseRecord],
    start: Option<&str>,
    end: Option<&str>,
) -> ExpenseResult<ExportSummary> {
    let rows = filter(records, start, end)?;

    let mut path = OsString::from(name.as_ref().as_os_str());
    path.push(".xlsx");
    let path = PathBuf::from(path);

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(EXPORT_SHEET)
        .map_err(|e| ExpenseError::Export(e.to_string()))?;
    for (index, record) in rows.iter().enumerate() {
        let row = u32::try_from(index)
            .map_err(|_| ExpenseError::Export(format!("too many rows: {}", rows.len())))?;
        write_record(worksheet, row, record)?;
    }
    workbook
        .save(&path)
        .map_err(|e| ExpenseError::Export(format!("cannot write {}: {}", path.display(), e)))?;

    debug!(path = %path.display(), rows = rows.len(), sheet = EXPORT_SHEET, "export done");
    Ok(ExportSummary {
        path,
        sheet: EXPORT_SHEET.to_string(),
        rows: rows.len(),
    })
}

fn write_record(worksheet: &mut Worksheet, row: u32, record: &ExpenseRecord) -> ExpenseResult<()> {
    worksheet
        .write_string(row, 0, record.timestamp.as_str())
        .map_err(|e| ExpenseError::Export(e.to_string()))?;
    worksheet
        .write_number(row, 1, number(&record.amount)?)
        .map_err(|e| ExpenseError::Export(e.to_string()))?;
    worksheet
        .write_number(row, 2, number(&record.balance)?)
        .map_err(|e| ExpenseError::Export(e.to_string()))?;
    Ok(())
}

fn number(value: &BigDecimal) -> ExpenseResult<f64> {
    value
        .to_f64()
        .ok_or_else(|| ExpenseError::Export(format!("{} does not fit a numeric cell", value)))
}
