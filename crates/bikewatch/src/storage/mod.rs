//! Storage layer for bikewatch.
//!
//! `SQLite`-backed persistence for bikes, stolen records, theft alerts,
//! alert images, and recovery displays. Table access is split by concern
//! into submodules; each exposes connection-level helpers so multi-table
//! workflows can run them inside a single transaction.

pub(crate) mod alerts;
pub(crate) mod bikes;
pub(crate) mod displays;
pub mod migrations;
pub mod schema;
pub(crate) mod stolen_records;

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, Transaction};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

pub use stolen_records::RecordScope;

/// Storage engine for the registry.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start a transaction. Dropping it without `commit` rolls back.
    pub(crate) fn transaction(&mut self) -> Result<Transaction<'_>> {
        Ok(self.conn.transaction()?)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let count = |sql: &str| -> Result<i64> {
            Ok(self.conn.query_row(sql, [], |row| row.get(0))?)
        };

        let total_bikes = count("SELECT COUNT(*) FROM bikes")?;
        let current_stolen_records =
            count("SELECT COUNT(*) FROM stolen_records WHERE current = 1")?;
        let recovered_records = count("SELECT COUNT(*) FROM stolen_records WHERE current = 0")?;
        let recovery_displays = count("SELECT COUNT(*) FROM recovery_displays")?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_bikes,
            current_stolen_records,
            recovered_records,
            recovery_displays,
            db_size_bytes,
        })
    }
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Registered bikes.
    pub total_bikes: i64,
    /// Stolen records still marked current.
    pub current_stolen_records: i64,
    /// Stolen records that have been recovered.
    pub recovered_records: i64,
    /// Published recovery stories.
    pub recovery_displays: i64,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

/// Stored text form of a timestamp. Fixed precision keeps text order equal
/// to time order.
pub(crate) fn time_to_sql(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp, warning on corrupt values.
pub(crate) fn time_from_sql(column: &str, value: Option<String>) -> Option<DateTime<Utc>> {
    let value = value?;
    match DateTime::parse_from_rfc3339(&value) {
        Ok(time) => Some(time.with_timezone(&Utc)),
        Err(err) => {
            warn!(column, value, error = %err, "Unparseable stored timestamp");
            None
        }
    }
}

/// Convert a `usize` limit for SQL binding.
pub(crate) fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}
