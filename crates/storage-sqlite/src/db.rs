//! SQLite connection handling and schema bootstrap.

use rusqlite::Connection;
use std::path::Path;
use tokio::sync::Mutex;

use ledgerbook_core::errors::{Error, Result};
use ledgerbook_core::store::SYNC_TABLES;

/// Map a driver error to the non-recoverable local storage class.
pub(crate) fn storage_err(err: rusqlite::Error) -> Error {
    Error::local_storage(err.to_string())
}

/// Owns the single SQLite connection.
///
/// All access goes through the async mutex: the sync core is cooperative
/// single-runtime, so the mutex provides the only exclusion needed between
/// suspension points.
#[derive(Debug)]
pub struct Database {
    pub(crate) conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(storage_err)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage_err)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        for table in SYNC_TABLES {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    key TEXT PRIMARY KEY,
                    payload TEXT NOT NULL,
                    synced INTEGER NOT NULL DEFAULT 0,
                    last_updated TEXT NOT NULL
                );",
                table.as_str()
            ))
            .map_err(storage_err)?;
        }
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS limit_settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                locked INTEGER NOT NULL DEFAULT 0,
                daily REAL NOT NULL DEFAULT 0,
                weekly REAL NOT NULL DEFAULT 0,
                monthly REAL NOT NULL DEFAULT 0,
                yearly REAL NOT NULL DEFAULT 0
            );",
        )
        .map_err(storage_err)?;
        Ok(())
    }
}
