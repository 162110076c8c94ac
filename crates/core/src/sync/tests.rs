//! Engine tests over an in-memory store and a recording gateway double.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::errors::{Error, Result};
use crate::models::{
    BankBalance, CustomCard, Entry, EntryStatus, EntryType, LimitSettings, Note,
};
use crate::remote::RemoteGateway;
use crate::store::{LocalStore, StoredRecord, SyncStatus, Table};
use crate::sync::{SyncEngine, SyncTrigger, TableSyncOutcome};
use crate::token::StaticTokenProvider;

// ─────────────────────────────────────────────────────────────────────────
// Doubles
// ─────────────────────────────────────────────────────────────────────────

/// In-memory [`LocalStore`] mirroring the SQLite implementation's contract.
#[derive(Default)]
struct MemoryStore {
    tables: Mutex<HashMap<Table, BTreeMap<String, StoredRecord>>>,
    limits: Mutex<LimitSettings>,
}

impl MemoryStore {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn put(&self, table: Table, record: StoredRecord) -> Result<()> {
        self.tables
            .lock()
            .await
            .entry(table)
            .or_default()
            .insert(record.key.clone(), record);
        Ok(())
    }

    async fn bulk_put(&self, table: Table, records: Vec<StoredRecord>) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let rows = tables.entry(table).or_default();
        for record in records {
            rows.insert(record.key.clone(), record);
        }
        Ok(())
    }

    async fn get(&self, table: Table, key: &str) -> Result<Option<StoredRecord>> {
        Ok(self
            .tables
            .lock()
            .await
            .get(&table)
            .and_then(|rows| rows.get(key).cloned()))
    }

    async fn get_all(&self, table: Table) -> Result<Vec<StoredRecord>> {
        let tables = self.tables.lock().await;
        let mut records: Vec<StoredRecord> = tables
            .get(&table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default();
        if table == Table::Entries {
            records.sort_by(|a, b| {
                let date_a = a.payload["date"].as_str().unwrap_or_default();
                let date_b = b.payload["date"].as_str().unwrap_or_default();
                date_b.cmp(date_a)
            });
        }
        Ok(records)
    }

    async fn delete(&self, table: Table, key: &str) -> Result<()> {
        if let Some(rows) = self.tables.lock().await.get_mut(&table) {
            rows.remove(key);
        }
        Ok(())
    }

    async fn clear(&self, table: Table) -> Result<()> {
        self.tables.lock().await.remove(&table);
        Ok(())
    }

    async fn find_unsynced(&self, table: Table) -> Result<Vec<StoredRecord>> {
        // Creation order, matching the SQLite implementation.
        let tables = self.tables.lock().await;
        let mut records: Vec<StoredRecord> = tables
            .get(&table)
            .map(|rows| {
                rows.values()
                    .filter(|record| record.status == SyncStatus::Local)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        records.sort_by(|a, b| {
            a.last_updated
                .cmp(&b.last_updated)
                .then_with(|| a.key.cmp(&b.key))
        });
        Ok(records)
    }

    async fn mark_synced(&self, table: Table, key: &str) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if let Some(record) = tables.get_mut(&table).and_then(|rows| rows.get_mut(key)) {
            record.status = SyncStatus::Confirmed;
        }
        Ok(())
    }

    async fn get_limit_settings(&self) -> Result<LimitSettings> {
        Ok(self.limits.lock().await.clone())
    }

    async fn put_limit_settings(&self, settings: &LimitSettings) -> Result<()> {
        *self.limits.lock().await = settings.clone();
        Ok(())
    }
}

/// Gateway double that records call order and mimics server-side state.
#[derive(Default)]
struct RecordingGateway {
    calls: StdMutex<Vec<String>>,
    entries: StdMutex<Vec<Entry>>,
    notes: StdMutex<Vec<Note>>,
    balances: StdMutex<HashMap<String, f64>>,
    cards: StdMutex<Vec<CustomCard>>,
    card_seq: AtomicUsize,
    /// entry ids whose create call fails with the mapped HTTP status
    fail_entry_ids: StdMutex<HashMap<String, u16>>,
    /// when set, every call fails with this HTTP status
    fail_all_status: StdMutex<Option<u16>>,
    /// artificial latency per remote call, for interleaving tests
    latency: StdMutex<Option<Duration>>,
}

impl RecordingGateway {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn call_count(&self, name: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(name))
            .count()
    }

    async fn enter(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let status = *self.fail_all_status.lock().unwrap();
        if let Some(status) = status {
            return Err(Error::remote(status, "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteGateway for RecordingGateway {
    async fn list_entries(&self, _token: &str) -> Result<Vec<Entry>> {
        self.enter("list_entries".to_string()).await?;
        Ok(self.entries.lock().unwrap().clone())
    }

    async fn create_entry(&self, _token: &str, entry: &Entry) -> Result<Entry> {
        self.enter(format!("create_entry {}", entry.id)).await?;
        if let Some(status) = self.fail_entry_ids.lock().unwrap().get(&entry.id) {
            return Err(Error::remote(*status, "injected entry failure"));
        }
        self.entries.lock().unwrap().push(entry.clone());
        Ok(entry.clone())
    }

    async fn update_entry(
        &self,
        _token: &str,
        id: &str,
        patch: &serde_json::Value,
    ) -> Result<Entry> {
        self.enter(format!("update_entry {}", id)).await?;
        let updated: Entry = serde_json::from_value(patch.clone())?;
        let mut entries = self.entries.lock().unwrap();
        if let Some(slot) = entries.iter_mut().find(|e| e.id == id) {
            *slot = updated.clone();
        } else {
            entries.push(updated.clone());
        }
        Ok(updated)
    }

    async fn delete_entry(&self, _token: &str, id: &str) -> Result<()> {
        self.enter(format!("delete_entry {}", id)).await?;
        self.entries.lock().unwrap().retain(|e| e.id != id);
        Ok(())
    }

    async fn delete_all_entries(&self, _token: &str) -> Result<()> {
        self.enter("delete_all_entries".to_string()).await?;
        self.entries.lock().unwrap().clear();
        Ok(())
    }

    async fn list_notes(&self, _token: &str) -> Result<Vec<Note>> {
        self.enter("list_notes".to_string()).await?;
        Ok(self.notes.lock().unwrap().clone())
    }

    async fn create_note(&self, _token: &str, note: &Note) -> Result<Note> {
        self.enter(format!("create_note {}", note.id)).await?;
        self.notes.lock().unwrap().push(note.clone());
        Ok(note.clone())
    }

    async fn update_note(&self, _token: &str, id: &str, patch: &serde_json::Value) -> Result<Note> {
        self.enter(format!("update_note {}", id)).await?;
        let updated: Note = serde_json::from_value(patch.clone())?;
        let mut notes = self.notes.lock().unwrap();
        if let Some(slot) = notes.iter_mut().find(|n| n.id == id) {
            *slot = updated.clone();
        } else {
            notes.push(updated.clone());
        }
        Ok(updated)
    }

    async fn delete_note(&self, _token: &str, id: &str) -> Result<()> {
        self.enter(format!("delete_note {}", id)).await?;
        self.notes.lock().unwrap().retain(|n| n.id != id);
        Ok(())
    }

    async fn get_balances(&self, _token: &str) -> Result<HashMap<String, f64>> {
        self.enter("get_balances".to_string()).await?;
        Ok(self.balances.lock().unwrap().clone())
    }

    async fn save_balances(&self, _token: &str, balances: &HashMap<String, f64>) -> Result<()> {
        self.enter("save_balances".to_string()).await?;
        *self.balances.lock().unwrap() = balances.clone();
        Ok(())
    }

    async fn get_custom_cards(&self, _token: &str) -> Result<Vec<CustomCard>> {
        self.enter("get_custom_cards".to_string()).await?;
        Ok(self.cards.lock().unwrap().clone())
    }

    async fn save_custom_cards(
        &self,
        _token: &str,
        cards: &[CustomCard],
    ) -> Result<Vec<CustomCard>> {
        self.enter("save_custom_cards".to_string()).await?;
        // Full replace: the server deletes everything and reinserts,
        // assigning fresh identities.
        let canonical: Vec<CustomCard> = cards
            .iter()
            .map(|card| CustomCard {
                id: Some(format!("srv-{}", self.card_seq.fetch_add(1, Ordering::SeqCst) + 1)),
                ..card.clone()
            })
            .collect();
        *self.cards.lock().unwrap() = canonical.clone();
        Ok(canonical)
    }

    async fn save_limit_lock(&self, _token: &str, locked: bool) -> Result<()> {
        self.enter(format!("save_limit_lock {}", locked)).await?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Fixtures
// ─────────────────────────────────────────────────────────────────────────

fn entry(id: &str, date: &str, amount: f64) -> Entry {
    Entry {
        id: id.to_string(),
        date: date.to_string(),
        description: "test".to_string(),
        amount,
        currency: "EUR".to_string(),
        entry_type: EntryType::Expense,
        person: "Ana".to_string(),
        bank: "N26".to_string(),
        category: "Food".to_string(),
        status: EntryStatus::Open,
    }
}

fn engine_with(
    store: Arc<MemoryStore>,
    gateway: Arc<RecordingGateway>,
    online: bool,
) -> Arc<SyncEngine> {
    Arc::new(SyncEngine::new(
        store,
        gateway,
        Arc::new(StaticTokenProvider("token".to_string())),
        online,
    ))
}

// ─────────────────────────────────────────────────────────────────────────
// Write path
// ─────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn offline_save_is_local_only() {
    let store = MemoryStore::new();
    let gateway = RecordingGateway::new();
    let engine = engine_with(store.clone(), gateway.clone(), false);

    let status = engine
        .save_entry(entry("a1", "2024-01-05", 50.0))
        .await
        .expect("offline save");
    assert_eq!(status, SyncStatus::Local);
    assert!(gateway.calls().is_empty());

    let unsynced = store.find_unsynced(Table::Entries).await.expect("unsynced");
    assert_eq!(unsynced.len(), 1);
    assert_eq!(unsynced[0].key, "a1");
}

#[tokio::test]
async fn online_save_confirms_record() {
    let store = MemoryStore::new();
    let gateway = RecordingGateway::new();
    let engine = engine_with(store.clone(), gateway.clone(), true);

    let status = engine
        .save_entry(entry("a1", "2024-01-05", 50.0))
        .await
        .expect("online save");
    assert_eq!(status, SyncStatus::Confirmed);
    assert_eq!(gateway.calls(), vec!["create_entry a1"]);
    assert!(store
        .find_unsynced(Table::Entries)
        .await
        .expect("unsynced")
        .is_empty());
}

#[tokio::test]
async fn failed_online_save_keeps_record_local_and_surfaces_error() {
    let store = MemoryStore::new();
    let gateway = RecordingGateway::new();
    gateway
        .fail_entry_ids
        .lock()
        .unwrap()
        .insert("a1".to_string(), 500);
    let engine = engine_with(store.clone(), gateway.clone(), true);

    let err = engine
        .save_entry(entry("a1", "2024-01-05", 50.0))
        .await
        .expect_err("remote leg should fail");
    assert_eq!(err.status_code(), Some(500));

    // Cached for a later push despite the surfaced error.
    let unsynced = store.find_unsynced(Table::Entries).await.expect("unsynced");
    assert_eq!(unsynced.len(), 1);
}

#[tokio::test]
async fn invalid_record_is_rejected_before_the_store() {
    let store = MemoryStore::new();
    let gateway = RecordingGateway::new();
    let engine = engine_with(store.clone(), gateway.clone(), true);

    let err = engine
        .save_entry(entry("", "2024-01-05", 50.0))
        .await
        .expect_err("empty id");
    assert!(matches!(err, Error::Validation(_)));
    assert!(store.get_all(Table::Entries).await.expect("rows").is_empty());
    assert!(gateway.calls().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────
// Bulk sync
// ─────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn reconnect_push_marks_offline_creates_clean() {
    // The worked example: create offline, reconnect, push, find_unsynced
    // comes back empty.
    let store = MemoryStore::new();
    let gateway = RecordingGateway::new();
    let engine = engine_with(store.clone(), gateway.clone(), false);

    engine
        .save_entry(entry("a1", "2024-01-05", 50.0))
        .await
        .expect("offline save");

    engine.observe_connectivity(true);
    engine.sync_all(SyncTrigger::Reconnect).await.expect("sync");

    assert_eq!(gateway.call_count("create_entry"), 1);
    assert!(store
        .find_unsynced(Table::Entries)
        .await
        .expect("unsynced")
        .is_empty());
}

#[tokio::test]
async fn push_is_strictly_ordered() {
    // E1 must reach the server before E2: offline status edits replay in
    // the order they were made.
    let store = MemoryStore::new();
    let gateway = RecordingGateway::new();
    let engine = engine_with(store.clone(), gateway.clone(), false);

    engine
        .save_entry(entry("e1", "2024-01-01", 10.0))
        .await
        .expect("save e1");
    engine
        .save_entry(entry("e2", "2024-01-02", 20.0))
        .await
        .expect("save e2");

    engine.observe_connectivity(true);
    engine.push(Table::Entries).await.expect("push");

    let creates: Vec<String> = gateway
        .calls()
        .into_iter()
        .filter(|call| call.starts_with("create_entry"))
        .collect();
    assert_eq!(creates, vec!["create_entry e1", "create_entry e2"]);
}

#[tokio::test]
async fn partial_failure_skips_only_the_failing_record() {
    let store = MemoryStore::new();
    let gateway = RecordingGateway::new();
    gateway
        .fail_entry_ids
        .lock()
        .unwrap()
        .insert("e2".to_string(), 500);
    let engine = engine_with(store.clone(), gateway.clone(), false);

    for (id, date) in [("e1", "2024-01-01"), ("e2", "2024-01-02"), ("e3", "2024-01-03")] {
        engine.save_entry(entry(id, date, 10.0)).await.expect("save");
    }

    engine.observe_connectivity(true);
    let summary = engine.push(Table::Entries).await.expect("push");
    assert_eq!(summary.pushed, 2);
    assert_eq!(summary.skipped, 1);

    let unsynced = store.find_unsynced(Table::Entries).await.expect("unsynced");
    assert_eq!(unsynced.len(), 1);
    assert_eq!(unsynced[0].key, "e2");
}

#[tokio::test]
async fn full_cycle_does_not_lose_unsynced_records() {
    // Push-before-pull: the record created offline survives the full-replace
    // pull because it was pushed first.
    let store = MemoryStore::new();
    let gateway = RecordingGateway::new();
    gateway.entries.lock().unwrap().push(entry("srv1", "2024-01-01", 5.0));
    let engine = engine_with(store.clone(), gateway.clone(), false);

    engine
        .save_entry(entry("a1", "2024-01-05", 50.0))
        .await
        .expect("offline save");

    engine.observe_connectivity(true);
    engine.sync_all(SyncTrigger::Reconnect).await.expect("sync");

    let rows = store.get_all(Table::Entries).await.expect("rows");
    let keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
    assert!(keys.contains(&"a1"));
    assert!(keys.contains(&"srv1"));
    assert!(rows.iter().all(|r| r.status == SyncStatus::Confirmed));
}

#[tokio::test]
async fn pull_is_idempotent() {
    let store = MemoryStore::new();
    let gateway = RecordingGateway::new();
    gateway.entries.lock().unwrap().push(entry("srv1", "2024-01-01", 5.0));
    gateway.entries.lock().unwrap().push(entry("srv2", "2024-01-02", 6.0));
    let engine = engine_with(store.clone(), gateway.clone(), true);

    engine.pull(Table::Entries).await.expect("first pull");
    let first = store.get_all(Table::Entries).await.expect("rows");
    engine.pull(Table::Entries).await.expect("second pull");
    let second = store.get_all(Table::Entries).await.expect("rows");

    let strip = |rows: &[StoredRecord]| {
        rows.iter()
            .map(|r| (r.key.clone(), r.payload.clone(), r.status))
            .collect::<Vec<_>>()
    };
    assert_eq!(strip(&first), strip(&second));
}

#[tokio::test]
async fn pull_orders_entries_newest_first() {
    let store = MemoryStore::new();
    let gateway = RecordingGateway::new();
    gateway.entries.lock().unwrap().push(entry("old", "2023-12-31", 1.0));
    gateway.entries.lock().unwrap().push(entry("new", "2024-01-05", 2.0));
    let engine = engine_with(store.clone(), gateway.clone(), true);

    engine.pull(Table::Entries).await.expect("pull");
    let cached = engine.cached_entries().await.expect("cached");
    assert_eq!(cached[0].record.id, "new");
    assert_eq!(cached[1].record.id, "old");
}

#[tokio::test]
async fn auth_failure_aborts_the_cycle() {
    let store = MemoryStore::new();
    let gateway = RecordingGateway::new();
    *gateway.fail_all_status.lock().unwrap() = Some(401);
    let engine = engine_with(store.clone(), gateway.clone(), false);

    engine
        .save_entry(entry("a1", "2024-01-05", 50.0))
        .await
        .expect("offline save");

    engine.observe_connectivity(true);
    let err = engine
        .sync_all(SyncTrigger::Manual)
        .await
        .expect_err("401 must abort");
    assert_eq!(err.status_code(), Some(401));
    assert_eq!(
        store.find_unsynced(Table::Entries).await.expect("unsynced").len(),
        1
    );
}

#[tokio::test]
async fn concurrent_sync_collapses_into_one_pending_rerun() {
    let store = MemoryStore::new();
    let gateway = RecordingGateway::new();
    *gateway.latency.lock().unwrap() = Some(Duration::from_millis(50));
    let engine = engine_with(store.clone(), gateway.clone(), true);

    let background = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.sync_table(Table::Entries).await })
    };
    // Let the background cycle reach its first remote call.
    tokio::time::sleep(Duration::from_millis(10)).await;

    let outcome = engine.sync_table(Table::Entries).await.expect("collapsed");
    assert_eq!(outcome, TableSyncOutcome::Collapsed);

    background.await.expect("join").expect("background sync");
    // The collapsed request was honored by a second push+pull pass.
    assert_eq!(gateway.call_count("list_entries"), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn collapsed_request_always_gets_a_following_pass() {
    // A request that collapses while a cycle is in flight must be honored
    // by a pass starting after it, even when it lands just as the holder
    // is releasing the gate.
    let store = MemoryStore::new();
    let gateway = RecordingGateway::new();
    *gateway.latency.lock().unwrap() = Some(Duration::from_millis(2));
    let engine = engine_with(store.clone(), gateway.clone(), true);

    for round in 0..20 {
        let before = gateway.call_count("list_entries");
        let first = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.sync_table(Table::Entries).await })
        };
        let second = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.sync_table(Table::Entries).await })
        };
        let outcomes = [
            first.await.expect("join").expect("sync"),
            second.await.expect("join").expect("sync"),
        ];
        let collapsed = outcomes
            .iter()
            .filter(|outcome| **outcome == TableSyncOutcome::Collapsed)
            .count();
        let passes = gateway.call_count("list_entries") - before;
        assert!(
            passes >= 1 + collapsed,
            "round {}: {} passes for {} collapsed requests",
            round,
            passes,
            collapsed
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Balances and cards
// ─────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn balances_push_posts_the_full_map() {
    let store = MemoryStore::new();
    let gateway = RecordingGateway::new();
    let engine = engine_with(store.clone(), gateway.clone(), false);

    engine
        .save_balances(vec![
            BankBalance { bank: "N26".to_string(), value: 100.0 },
            BankBalance { bank: "Caixa".to_string(), value: 55.5 },
        ])
        .await
        .expect("offline balances save");

    engine.observe_connectivity(true);
    let summary = engine.push(Table::Balances).await.expect("push");
    assert_eq!(summary.pushed, 2);
    assert_eq!(gateway.balances.lock().unwrap().get("N26"), Some(&100.0));
    assert!(store
        .find_unsynced(Table::Balances)
        .await
        .expect("unsynced")
        .is_empty());
}

#[tokio::test]
async fn card_push_strips_ids_and_adopts_server_identity() {
    let store = MemoryStore::new();
    let gateway = RecordingGateway::new();
    let engine = engine_with(store.clone(), gateway.clone(), false);

    engine
        .save_custom_card(CustomCard {
            id: None,
            name: "Visa Gold".to_string(),
            limit: 1500.0,
        })
        .await
        .expect("offline card save");

    engine.observe_connectivity(true);
    engine.push(Table::CustomCards).await.expect("push");

    let cards = engine.cached_custom_cards().await.expect("cached");
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].record.id.as_deref(), Some("srv-1"));
    assert_eq!(cards[0].status, SyncStatus::Confirmed);
}

#[tokio::test]
async fn online_delete_of_a_synced_card_reaches_the_server() {
    // The card endpoint has no DELETE: removing a card means re-posting the
    // remaining list, and that must happen even when everything left is
    // already confirmed.
    let store = MemoryStore::new();
    let gateway = RecordingGateway::new();
    let engine = engine_with(store.clone(), gateway.clone(), true);

    let (_, status) = engine
        .save_custom_card(CustomCard {
            id: None,
            name: "Visa Gold".to_string(),
            limit: 1500.0,
        })
        .await
        .expect("online card save");
    assert_eq!(status, SyncStatus::Confirmed);

    let cards = engine.cached_custom_cards().await.expect("cached");
    assert_eq!(cards[0].key, "srv-1");

    engine.delete_custom_card("srv-1").await.expect("delete");
    assert_eq!(gateway.call_count("save_custom_cards"), 2);
    assert!(gateway.cards.lock().unwrap().is_empty());
    assert!(engine.cached_custom_cards().await.expect("cached").is_empty());
}

#[tokio::test]
async fn unsynced_card_is_addressable_by_its_returned_key() {
    // Until the server assigns an id the placeholder key is the only handle
    // on the card; editing through it must not mint a duplicate.
    let store = MemoryStore::new();
    let gateway = RecordingGateway::new();
    let engine = engine_with(store.clone(), gateway.clone(), false);

    let (key, status) = engine
        .save_custom_card(CustomCard {
            id: None,
            name: "Visa Gold".to_string(),
            limit: 1500.0,
        })
        .await
        .expect("offline card save");
    assert_eq!(status, SyncStatus::Local);

    engine
        .update_custom_card(
            &key,
            CustomCard {
                id: None,
                name: "Visa Gold".to_string(),
                limit: 2500.0,
            },
        )
        .await
        .expect("offline card update");

    let cards = engine.cached_custom_cards().await.expect("cached");
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].key, key);
    assert_eq!(cards[0].record.limit, 2500.0);

    engine.delete_custom_card(&key).await.expect("offline delete");
    assert!(engine.cached_custom_cards().await.expect("cached").is_empty());
    assert!(gateway.calls().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────
// Read path and deletes
// ─────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn cached_view_renders_without_connectivity() {
    let store = MemoryStore::new();
    let gateway = RecordingGateway::new();
    let record = StoredRecord::encode("a1", &entry("a1", "2024-01-05", 50.0), SyncStatus::Confirmed)
        .expect("encode");
    store.put(Table::Entries, record).await.expect("seed");
    let engine = engine_with(store.clone(), gateway.clone(), false);

    let cached = engine.cached_entries().await.expect("cached view");
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].record.id, "a1");
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn offline_delete_reappears_after_pull() {
    // Deletes are not queued for offline replay: the record resurfaces on
    // the next pull if the server still has it.
    let store = MemoryStore::new();
    let gateway = RecordingGateway::new();
    gateway.entries.lock().unwrap().push(entry("a1", "2024-01-05", 50.0));
    let engine = engine_with(store.clone(), gateway.clone(), true);
    engine.pull(Table::Entries).await.expect("initial pull");

    engine.observe_connectivity(false);
    engine.delete_entry("a1").await.expect("offline delete");
    assert!(store.get_all(Table::Entries).await.expect("rows").is_empty());

    engine.observe_connectivity(true);
    engine.sync_all(SyncTrigger::Reconnect).await.expect("sync");
    let rows = store.get_all(Table::Entries).await.expect("rows");
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn online_delete_removes_remote_copy() {
    let store = MemoryStore::new();
    let gateway = RecordingGateway::new();
    let engine = engine_with(store.clone(), gateway.clone(), true);

    engine
        .save_entry(entry("a1", "2024-01-05", 50.0))
        .await
        .expect("save");
    engine.delete_entry("a1").await.expect("delete");

    assert!(gateway.entries.lock().unwrap().is_empty());
    engine.sync_all(SyncTrigger::Manual).await.expect("sync");
    assert!(store.get_all(Table::Entries).await.expect("rows").is_empty());
}

#[tokio::test]
async fn delete_all_clears_remote_before_local() {
    let store = MemoryStore::new();
    let gateway = RecordingGateway::new();
    let engine = engine_with(store.clone(), gateway.clone(), true);

    engine
        .save_entry(entry("a1", "2024-01-05", 50.0))
        .await
        .expect("save");
    engine.delete_all_entries().await.expect("delete all");

    assert!(gateway.entries.lock().unwrap().is_empty());
    assert!(store.get_all(Table::Entries).await.expect("rows").is_empty());
}

#[tokio::test]
async fn transport_failure_flips_connectivity_offline() {
    struct UnreachableGateway(RecordingGateway);

    // Only the one call matters; delegate everything else.
    #[async_trait]
    impl RemoteGateway for UnreachableGateway {
        async fn list_entries(&self, token: &str) -> Result<Vec<Entry>> {
            self.0.list_entries(token).await
        }
        async fn create_entry(&self, _token: &str, _entry: &Entry) -> Result<Entry> {
            Err(Error::unreachable("connection refused"))
        }
        async fn update_entry(
            &self,
            token: &str,
            id: &str,
            patch: &serde_json::Value,
        ) -> Result<Entry> {
            self.0.update_entry(token, id, patch).await
        }
        async fn delete_entry(&self, token: &str, id: &str) -> Result<()> {
            self.0.delete_entry(token, id).await
        }
        async fn delete_all_entries(&self, token: &str) -> Result<()> {
            self.0.delete_all_entries(token).await
        }
        async fn list_notes(&self, token: &str) -> Result<Vec<Note>> {
            self.0.list_notes(token).await
        }
        async fn create_note(&self, token: &str, note: &Note) -> Result<Note> {
            self.0.create_note(token, note).await
        }
        async fn update_note(
            &self,
            token: &str,
            id: &str,
            patch: &serde_json::Value,
        ) -> Result<Note> {
            self.0.update_note(token, id, patch).await
        }
        async fn delete_note(&self, token: &str, id: &str) -> Result<()> {
            self.0.delete_note(token, id).await
        }
        async fn get_balances(&self, token: &str) -> Result<HashMap<String, f64>> {
            self.0.get_balances(token).await
        }
        async fn save_balances(
            &self,
            token: &str,
            balances: &HashMap<String, f64>,
        ) -> Result<()> {
            self.0.save_balances(token, balances).await
        }
        async fn get_custom_cards(&self, token: &str) -> Result<Vec<CustomCard>> {
            self.0.get_custom_cards(token).await
        }
        async fn save_custom_cards(
            &self,
            token: &str,
            cards: &[CustomCard],
        ) -> Result<Vec<CustomCard>> {
            self.0.save_custom_cards(token, cards).await
        }
        async fn save_limit_lock(&self, token: &str, locked: bool) -> Result<()> {
            self.0.save_limit_lock(token, locked).await
        }
    }

    let store = MemoryStore::new();
    let gateway = Arc::new(UnreachableGateway(RecordingGateway::default()));
    let engine = Arc::new(SyncEngine::new(
        store.clone(),
        gateway,
        Arc::new(StaticTokenProvider("token".to_string())),
        true,
    ));

    let err = engine
        .save_entry(entry("a1", "2024-01-05", 50.0))
        .await
        .expect_err("unreachable");
    assert!(matches!(err, Error::Unreachable(_)));
    assert!(!engine.is_online());
    // The record is still cached for the reconnect push.
    assert_eq!(
        store.find_unsynced(Table::Entries).await.expect("unsynced").len(),
        1
    );
}
