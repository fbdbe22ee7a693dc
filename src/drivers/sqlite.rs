//! SQLite driver for the local store

use bigdecimal::BigDecimal;
use rusqlite::types::{Type, Value};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;
use tracing::debug;

use crate::traits::LocalDriver;
use crate::types::*;

/// Path that opens a private in-memory database
pub const IN_MEMORY: &str = ":memory:";

/// [`LocalDriver`] over a single SQLite connection
///
/// Decimals are stored as TEXT so a value reads back with the digits it was
/// written with. Rows written as REAL or INTEGER by older tools still load.
pub struct SqliteDriver {
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
}

impl SqliteDriver {
    /// Driver for the database file at `path` (not opened yet)
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            conn: Mutex::new(None),
        }
    }

    /// Driver for a fresh in-memory database
    pub fn in_memory() -> Self {
        Self::new(IN_MEMORY)
    }

    /// Location of the database
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> ExpenseResult<T> {
        let guard = self
            .conn
            .lock()
            .map_err(|_| ExpenseError::Driver("sqlite connection lock poisoned".to_string()))?;
        let conn = guard
            .as_ref()
            .ok_or_else(|| ExpenseError::Driver("sqlite connection is closed".to_string()))?;
        f(conn).map_err(|e| ExpenseError::Driver(e.to_string()))
    }
}

impl LocalDriver for SqliteDriver {
    fn connect(&self) -> ExpenseResult<()> {
        let conn = Connection::open(&self.path).map_err(|e| {
            ExpenseError::Driver(format!("cannot open {}: {}", self.path.display(), e))
        })?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| ExpenseError::Driver(e.to_string()))?;

        let mut guard = self
            .conn
            .lock()
            .map_err(|_| ExpenseError::Driver("sqlite connection lock poisoned".to_string()))?;
        *guard = Some(conn);

        debug!(path = %self.path.display(), "sqlite connection established");
        Ok(())
    }

    fn create_schema_if_missing(&self) -> ExpenseResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS expenses (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    timeOfExpense TEXT NOT NULL,
                    expense TEXT NOT NULL,
                    balance TEXT NOT NULL
                )",
                [],
            )?;
            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_expenses_time ON expenses(timeOfExpense)",
                [],
            )?;
            Ok(())
        })
    }

    fn insert(&self, record: &ExpenseRecord) -> ExpenseResult<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO expenses (timeOfExpense, expense, balance) VALUES (?1, ?2, ?3)",
                params![
                    record.timestamp,
                    record.amount.to_string(),
                    record.balance.to_string()
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    fn query_all(&self) -> ExpenseResult<Vec<StoredExpense>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, timeOfExpense, expense, balance
                 FROM expenses",
            )?;
            let mut rows = stmt
                .query_map([], stored_expense_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            // Text order misplaces unpadded fields such as 2020/1/5.
            rows.sort_by_cached_key(|row| (row.record.chronological_key(), row.id));
            Ok(rows)
        })
    }

    fn query_max_id(&self) -> ExpenseResult<Option<i64>> {
        self.with_conn(|conn| conn.query_row("SELECT MAX(id) FROM expenses", [], |row| row.get(0)))
    }

    fn query_by_id(&self, id: i64) -> ExpenseResult<Option<StoredExpense>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, timeOfExpense, expense, balance FROM expenses WHERE id = ?1",
                [id],
                stored_expense_from_row,
            )
            .optional()
        })
    }

    fn is_open(&self) -> bool {
        self.conn.lock().map(|guard| guard.is_some()).unwrap_or(false)
    }

    fn close(&self) -> ExpenseResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| ExpenseError::Driver("sqlite connection lock poisoned".to_string()))?
            .take();
        if let Some(conn) = conn {
            conn.close()
                .map_err(|(_, e)| ExpenseError::Driver(e.to_string()))?;
            debug!(path = %self.path.display(), "sqlite connection closed");
        }
        Ok(())
    }
}

fn stored_expense_from_row(row: &Row<'_>) -> rusqlite::Result<StoredExpense> {
    Ok(StoredExpense {
        id: row.get(0)?,
        record: ExpenseRecord::new(
            row.get::<_, String>(1)?,
            decimal_column(row, 2)?,
            decimal_column(row, 3)?,
        ),
    })
}

fn decimal_column(row: &Row<'_>, index: usize) -> rusqlite::Result<BigDecimal> {
    let text = match row.get::<_, Value>(index)? {
        Value::Text(text) => text,
        Value::Real(real) => real.to_string(),
        Value::Integer(int) => int.to_string(),
        Value::Null => {
            return Err(rusqlite::Error::InvalidColumnType(index, "decimal".into(), Type::Null))
        }
        Value::Blob(_) => {
            return Err(rusqlite::Error::InvalidColumnType(index, "decimal".into(), Type::Blob))
        }
    };
    BigDecimal::from_str(text.trim())
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}
