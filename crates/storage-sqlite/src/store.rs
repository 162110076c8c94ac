//! SQLite-backed implementation of the local store contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};

use ledgerbook_core::errors::{Error, Result};
use ledgerbook_core::models::LimitSettings;
use ledgerbook_core::store::{LocalStore, StoredRecord, SyncStatus, Table};

use crate::db::{storage_err, Database};

/// Persisted per-record-type cache: one envelope table per logical table
/// (key, JSON payload, synced flag, last-updated timestamp) plus the
/// limit-settings singleton.
#[derive(Debug)]
pub struct SqliteLocalStore {
    db: Database,
}

impl SqliteLocalStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, i64, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn decode_record(
    key: String,
    payload: String,
    synced: i64,
    last_updated: String,
) -> Result<StoredRecord> {
    let payload = serde_json::from_str(&payload)?;
    let last_updated = DateTime::parse_from_rfc3339(&last_updated)
        .map_err(|e| Error::local_storage(format!("corrupt last_updated for '{}': {}", key, e)))?
        .with_timezone(&Utc);
    Ok(StoredRecord {
        key,
        payload,
        status: if synced != 0 {
            SyncStatus::Confirmed
        } else {
            SyncStatus::Local
        },
        last_updated,
    })
}

fn upsert(conn: &Connection, table: Table, record: &StoredRecord) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO {} (key, payload, synced, last_updated)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                 payload = excluded.payload,
                 synced = excluded.synced,
                 last_updated = excluded.last_updated",
            table.as_str()
        ),
        params![
            record.key,
            serde_json::to_string(&record.payload)?,
            record.status.is_synced() as i64,
            record.last_updated.to_rfc3339(),
        ],
    )
    .map_err(storage_err)?;
    Ok(())
}

/// Entries read newest-date-first; YYYY-MM-DD makes the lexicographic
/// payload order chronological. Other tables read in key order.
fn select_all_sql(table: Table) -> String {
    match table {
        Table::Entries => format!(
            "SELECT key, payload, synced, last_updated FROM {}
             ORDER BY json_extract(payload, '$.date') DESC, key",
            table.as_str()
        ),
        _ => format!(
            "SELECT key, payload, synced, last_updated FROM {} ORDER BY key",
            table.as_str()
        ),
    }
}

#[async_trait]
impl LocalStore for SqliteLocalStore {
    async fn put(&self, table: Table, record: StoredRecord) -> Result<()> {
        let conn = self.db.conn.lock().await;
        upsert(&conn, table, &record)
    }

    async fn bulk_put(&self, table: Table, records: Vec<StoredRecord>) -> Result<()> {
        let mut conn = self.db.conn.lock().await;
        let tx = conn.transaction().map_err(storage_err)?;
        for record in &records {
            upsert(&tx, table, record)?;
        }
        tx.commit().map_err(storage_err)?;
        debug!("bulk_put {} records into {}", records.len(), table);
        Ok(())
    }

    async fn get(&self, table: Table, key: &str) -> Result<Option<StoredRecord>> {
        let conn = self.db.conn.lock().await;
        let row = conn
            .query_row(
                &format!(
                    "SELECT key, payload, synced, last_updated FROM {} WHERE key = ?1",
                    table.as_str()
                ),
                params![key],
                row_to_record,
            )
            .optional()
            .map_err(storage_err)?;
        row.map(|(key, payload, synced, last_updated)| {
            decode_record(key, payload, synced, last_updated)
        })
        .transpose()
    }

    async fn get_all(&self, table: Table) -> Result<Vec<StoredRecord>> {
        let conn = self.db.conn.lock().await;
        let mut stmt = conn.prepare(&select_all_sql(table)).map_err(storage_err)?;
        let rows = stmt
            .query_map([], row_to_record)
            .map_err(storage_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(storage_err)?;
        rows.into_iter()
            .map(|(key, payload, synced, last_updated)| {
                decode_record(key, payload, synced, last_updated)
            })
            .collect()
    }

    async fn delete(&self, table: Table, key: &str) -> Result<()> {
        let conn = self.db.conn.lock().await;
        conn.execute(
            &format!("DELETE FROM {} WHERE key = ?1", table.as_str()),
            params![key],
        )
        .map_err(storage_err)?;
        Ok(())
    }

    async fn clear(&self, table: Table) -> Result<()> {
        let conn = self.db.conn.lock().await;
        conn.execute(&format!("DELETE FROM {}", table.as_str()), [])
            .map_err(storage_err)?;
        Ok(())
    }

    async fn find_unsynced(&self, table: Table) -> Result<Vec<StoredRecord>> {
        let conn = self.db.conn.lock().await;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT key, payload, synced, last_updated FROM {}
                 WHERE synced = 0 ORDER BY last_updated, key",
                table.as_str()
            ))
            .map_err(storage_err)?;
        let rows = stmt
            .query_map([], row_to_record)
            .map_err(storage_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(storage_err)?;
        rows.into_iter()
            .map(|(key, payload, synced, last_updated)| {
                decode_record(key, payload, synced, last_updated)
            })
            .collect()
    }

    async fn mark_synced(&self, table: Table, key: &str) -> Result<()> {
        let conn = self.db.conn.lock().await;
        conn.execute(
            &format!("UPDATE {} SET synced = 1 WHERE key = ?1", table.as_str()),
            params![key],
        )
        .map_err(storage_err)?;
        Ok(())
    }

    async fn get_limit_settings(&self) -> Result<LimitSettings> {
        let conn = self.db.conn.lock().await;
        let row = conn
            .query_row(
                "SELECT locked, daily, weekly, monthly, yearly FROM limit_settings WHERE id = 1",
                [],
                |row| {
                    Ok(LimitSettings {
                        locked: row.get::<_, i64>(0)? != 0,
                        daily: row.get(1)?,
                        weekly: row.get(2)?,
                        monthly: row.get(3)?,
                        yearly: row.get(4)?,
                    })
                },
            )
            .optional()
            .map_err(storage_err)?;
        Ok(row.unwrap_or_default())
    }

    async fn put_limit_settings(&self, settings: &LimitSettings) -> Result<()> {
        let conn = self.db.conn.lock().await;
        conn.execute(
            "INSERT INTO limit_settings (id, locked, daily, weekly, monthly, yearly)
             VALUES (1, ?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 locked = excluded.locked,
                 daily = excluded.daily,
                 weekly = excluded.weekly,
                 monthly = excluded.monthly,
                 yearly = excluded.yearly",
            params![
                settings.locked as i64,
                settings.daily,
                settings.weekly,
                settings.monthly,
                settings.yearly,
            ],
        )
        .map_err(storage_err)?;
        Ok(())
    }
}
