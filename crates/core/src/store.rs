//! Local store contract: the client-side persisted cache of entity tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::models::LimitSettings;

/// Canonical list of local tables that participate in sync.
pub const SYNC_TABLES: [Table; 4] = [
    Table::Entries,
    Table::Notes,
    Table::Balances,
    Table::CustomCards,
];

/// Logical tables of the local cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Entries,
    Notes,
    Balances,
    CustomCards,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Entries => "entries",
            Table::Notes => "notes",
            Table::Balances => "balances",
            Table::CustomCards => "custom_cards",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-record sync state: `Local` means not yet confirmed written to the
/// remote authority; `Confirmed` means the server acknowledged this version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Local,
    Confirmed,
}

impl SyncStatus {
    pub fn is_synced(&self) -> bool {
        matches!(self, SyncStatus::Confirmed)
    }
}

/// Store envelope around one record: the wire payload plus the sync
/// bookkeeping fields that never leave the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    /// Primary key: record id for entries/notes/cards, bank name for balances.
    pub key: String,
    pub payload: serde_json::Value,
    pub status: SyncStatus,
    pub last_updated: DateTime<Utc>,
}

impl StoredRecord {
    /// Wrap a typed record for persistence.
    pub fn encode<T: Serialize>(key: impl Into<String>, record: &T, status: SyncStatus) -> Result<Self> {
        Ok(Self {
            key: key.into(),
            payload: serde_json::to_value(record)?,
            status,
            last_updated: Utc::now(),
        })
    }

    /// Decode the payload back into its typed record.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    /// Decode into a typed view that keeps the bookkeeping fields.
    pub fn decode_cached<T: DeserializeOwned>(&self) -> Result<CachedRecord<T>> {
        Ok(CachedRecord {
            key: self.key.clone(),
            record: self.decode()?,
            status: self.status,
            last_updated: self.last_updated,
        })
    }
}

/// Typed read-path view of a cached record.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedRecord<T> {
    /// Store key. For records the server has not yet confirmed this can be
    /// a client-generated placeholder; it is the handle for updates and
    /// deletes either way.
    pub key: String,
    pub record: T,
    pub status: SyncStatus,
    pub last_updated: DateTime<Utc>,
}

/// Client-side persisted cache of entity tables.
///
/// `put`/`bulk_put` upsert by primary key. `get_all` returns entries sorted
/// descending by payload date (YYYY-MM-DD, so lexicographic order is
/// chronological); other tables are ordered by key. Any storage failure is
/// `Error::LocalStorage` and is non-recoverable in place.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn put(&self, table: Table, record: StoredRecord) -> Result<()>;

    async fn bulk_put(&self, table: Table, records: Vec<StoredRecord>) -> Result<()>;

    async fn get(&self, table: Table, key: &str) -> Result<Option<StoredRecord>>;

    async fn get_all(&self, table: Table) -> Result<Vec<StoredRecord>>;

    async fn delete(&self, table: Table, key: &str) -> Result<()>;

    async fn clear(&self, table: Table) -> Result<()>;

    /// Records whose current local version the server has not acknowledged.
    async fn find_unsynced(&self, table: Table) -> Result<Vec<StoredRecord>>;

    async fn mark_synced(&self, table: Table, key: &str) -> Result<()>;

    async fn get_limit_settings(&self) -> Result<LimitSettings>;

    async fn put_limit_settings(&self, settings: &LimitSettings) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Entry, EntryStatus, EntryType};

    #[test]
    fn table_names_match_storage_contract() {
        let actual = SYNC_TABLES
            .iter()
            .map(|table| table.as_str())
            .collect::<Vec<_>>();
        assert_eq!(actual, vec!["entries", "notes", "balances", "custom_cards"]);
    }

    #[test]
    fn envelope_round_trips_typed_record() {
        let entry = Entry {
            id: "a1".to_string(),
            date: "2024-01-05".to_string(),
            description: "Groceries".to_string(),
            amount: 50.0,
            currency: "EUR".to_string(),
            entry_type: EntryType::Expense,
            person: "Ana".to_string(),
            bank: "N26".to_string(),
            category: "Food".to_string(),
            status: EntryStatus::Open,
        };
        let stored =
            StoredRecord::encode(&entry.id, &entry, SyncStatus::Local).expect("encode entry");
        assert_eq!(stored.key, "a1");
        assert!(!stored.status.is_synced());

        let cached = stored.decode_cached::<Entry>().expect("decode entry");
        assert_eq!(cached.key, "a1");
        assert_eq!(cached.record, entry);
        assert_eq!(cached.status, SyncStatus::Local);
    }
}
