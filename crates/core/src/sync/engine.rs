//! Sync engine: reconciles the local store with the remote authority.
//!
//! Every write lands in the local store first, marked `Local`. When online,
//! the corresponding remote call follows and the record transitions to
//! `Confirmed` on success; on failure it stays `Local` for a later push.
//! Bulk sync is always push-then-pull per table: the pull is a full replace,
//! so pulling first would silently drop records that were never pushed.

use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use crate::errors::{Error, Result, RetryClass};
use crate::models::{
    balances_from_map, balances_to_map, BankBalance, CustomCard, Entry, LimitSettings, Note,
};
use crate::remote::RemoteGateway;
use crate::store::{CachedRecord, LocalStore, StoredRecord, SyncStatus, Table, SYNC_TABLES};
use crate::token::{require_token, TokenProvider};

use super::connectivity::{ConnectivityEdge, ConnectivityMonitor};
use super::model::{PullOutcome, PushSummary, SyncCycleMetrics, SyncTrigger, TableSyncOutcome};
use super::read_path::PullSequencer;

/// Serializes sync cycles per table. A cycle requested while one is in
/// flight collapses into a single pending re-run instead of interleaving.
#[derive(Debug, Default)]
struct TableGate {
    in_flight: Mutex<()>,
    pending: AtomicBool,
}

/// Orchestrator reconciling the local store and the remote authority.
///
/// Collaborators are injected; the engine holds no global state.
pub struct SyncEngine {
    store: Arc<dyn LocalStore>,
    gateway: Arc<dyn RemoteGateway>,
    tokens: Arc<dyn TokenProvider>,
    connectivity: ConnectivityMonitor,
    gates: HashMap<Table, TableGate>,
    pull_sequencer: PullSequencer,
    refreshed: watch::Sender<u64>,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn LocalStore>,
        gateway: Arc<dyn RemoteGateway>,
        tokens: Arc<dyn TokenProvider>,
        initially_online: bool,
    ) -> Self {
        let (refreshed, _) = watch::channel(0);
        Self {
            store,
            gateway,
            tokens,
            connectivity: ConnectivityMonitor::new(initially_online),
            gates: SYNC_TABLES
                .iter()
                .map(|table| (*table, TableGate::default()))
                .collect(),
            pull_sequencer: PullSequencer::new(),
            refreshed,
        }
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    /// Watch channel for the UI's persistent offline indicator.
    pub fn subscribe_connectivity(&self) -> watch::Receiver<bool> {
        self.connectivity.subscribe()
    }

    /// Bumped after every applied pull so views can re-render.
    pub fn subscribe_refreshed(&self) -> watch::Receiver<u64> {
        self.refreshed.subscribe()
    }

    /// Record a connectivity observation; returns the edge if any.
    ///
    /// The offline edge is advisory. Callers that want the reconnect bulk
    /// sync run in the background should use [`SyncEngine::set_connectivity`].
    pub fn observe_connectivity(&self, online: bool) -> Option<ConnectivityEdge> {
        self.connectivity.observe(online)
    }

    /// Observe connectivity and, on the offline→online edge, schedule one
    /// full sync cycle (push then pull per table) in the background.
    pub fn set_connectivity(self: &Arc<Self>, online: bool) {
        if self.observe_connectivity(online) == Some(ConnectivityEdge::WentOnline) {
            let engine = Arc::clone(self);
            tokio::spawn(async move {
                if let Err(err) = engine.sync_all(SyncTrigger::Reconnect).await {
                    warn!("reconnect sync failed: {}", err);
                }
            });
        }
    }

    fn notify_refreshed(&self) {
        self.refreshed.send_modify(|n| *n += 1);
    }

    /// Treat a transport failure as an offline observation.
    fn note_write_failure(&self, err: &Error) {
        if matches!(err, Error::Unreachable(_)) {
            self.connectivity.observe(false);
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Interactive write path
    // ─────────────────────────────────────────────────────────────────────

    /// Create an entry. The record is always cached as `Local` first; the
    /// returned error (if any) refers to the remote leg only, and the entry
    /// stays cached for a later push.
    pub async fn save_entry(&self, entry: Entry) -> Result<SyncStatus> {
        entry.validate()?;
        let record = StoredRecord::encode(&entry.id, &entry, SyncStatus::Local)?;
        self.store.put(Table::Entries, record).await?;
        if !self.is_online() {
            return Ok(SyncStatus::Local);
        }
        let token = require_token(self.tokens.as_ref())?;
        match self.gateway.create_entry(&token, &entry).await {
            Ok(_) => {
                self.store.mark_synced(Table::Entries, &entry.id).await?;
                Ok(SyncStatus::Confirmed)
            }
            Err(err) => {
                self.note_write_failure(&err);
                Err(err)
            }
        }
    }

    /// Update an entry in place (same id, full record as the patch body).
    pub async fn update_entry(&self, entry: Entry) -> Result<SyncStatus> {
        entry.validate()?;
        let record = StoredRecord::encode(&entry.id, &entry, SyncStatus::Local)?;
        self.store.put(Table::Entries, record).await?;
        if !self.is_online() {
            return Ok(SyncStatus::Local);
        }
        let token = require_token(self.tokens.as_ref())?;
        let patch = serde_json::to_value(&entry)?;
        match self.gateway.update_entry(&token, &entry.id, &patch).await {
            Ok(_) => {
                self.store.mark_synced(Table::Entries, &entry.id).await?;
                Ok(SyncStatus::Confirmed)
            }
            Err(err) => {
                self.note_write_failure(&err);
                Err(err)
            }
        }
    }

    /// Delete an entry locally and, when online, remotely.
    ///
    /// Offline deletes are not queued for replay: if the record still exists
    /// remotely it reappears on the next successful pull.
    pub async fn delete_entry(&self, id: &str) -> Result<()> {
        self.store.delete(Table::Entries, id).await?;
        if !self.is_online() {
            return Ok(());
        }
        let token = require_token(self.tokens.as_ref())?;
        self.gateway
            .delete_entry(&token, id)
            .await
            .inspect_err(|err| self.note_write_failure(err))
    }

    /// Wipe all entries, remote first so a pull cannot resurrect them.
    pub async fn delete_all_entries(&self) -> Result<()> {
        if self.is_online() {
            let token = require_token(self.tokens.as_ref())?;
            self.gateway.delete_all_entries(&token).await?;
        }
        self.store.clear(Table::Entries).await
    }

    pub async fn save_note(&self, note: Note) -> Result<SyncStatus> {
        note.validate()?;
        let record = StoredRecord::encode(&note.id, &note, SyncStatus::Local)?;
        self.store.put(Table::Notes, record).await?;
        if !self.is_online() {
            return Ok(SyncStatus::Local);
        }
        let token = require_token(self.tokens.as_ref())?;
        match self.gateway.create_note(&token, &note).await {
            Ok(_) => {
                self.store.mark_synced(Table::Notes, &note.id).await?;
                Ok(SyncStatus::Confirmed)
            }
            Err(err) => {
                self.note_write_failure(&err);
                Err(err)
            }
        }
    }

    pub async fn update_note(&self, note: Note) -> Result<SyncStatus> {
        note.validate()?;
        let record = StoredRecord::encode(&note.id, &note, SyncStatus::Local)?;
        self.store.put(Table::Notes, record).await?;
        if !self.is_online() {
            return Ok(SyncStatus::Local);
        }
        let token = require_token(self.tokens.as_ref())?;
        let patch = serde_json::to_value(&note)?;
        match self.gateway.update_note(&token, &note.id, &patch).await {
            Ok(_) => {
                self.store.mark_synced(Table::Notes, &note.id).await?;
                Ok(SyncStatus::Confirmed)
            }
            Err(err) => {
                self.note_write_failure(&err);
                Err(err)
            }
        }
    }

    pub async fn delete_note(&self, id: &str) -> Result<()> {
        self.store.delete(Table::Notes, id).await?;
        if !self.is_online() {
            return Ok(());
        }
        let token = require_token(self.tokens.as_ref())?;
        self.gateway
            .delete_note(&token, id)
            .await
            .inspect_err(|err| self.note_write_failure(err))
    }

    /// Replace the balance table wholesale (one row per bank, no merge).
    pub async fn save_balances(&self, balances: Vec<BankBalance>) -> Result<SyncStatus> {
        for balance in &balances {
            balance.validate()?;
        }
        let records = balances
            .iter()
            .map(|balance| StoredRecord::encode(&balance.bank, balance, SyncStatus::Local))
            .collect::<Result<Vec<_>>>()?;
        self.store.clear(Table::Balances).await?;
        self.store.bulk_put(Table::Balances, records).await?;
        if !self.is_online() {
            return Ok(SyncStatus::Local);
        }
        let token = require_token(self.tokens.as_ref())?;
        match self
            .gateway
            .save_balances(&token, &balances_to_map(&balances))
            .await
        {
            Ok(()) => {
                for balance in &balances {
                    self.store.mark_synced(Table::Balances, &balance.bank).await?;
                }
                Ok(SyncStatus::Confirmed)
            }
            Err(err) => {
                self.note_write_failure(&err);
                Err(err)
            }
        }
    }

    /// Create a custom card. While the server has not assigned an id, the
    /// local key is a generated placeholder; the returned key is how callers
    /// address the card for later updates or deletes while it stays `Local`.
    /// Once a sync confirms the card, the server-assigned id becomes its key.
    pub async fn save_custom_card(&self, card: CustomCard) -> Result<(String, SyncStatus)> {
        let key = card
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let status = self.update_custom_card(&key, card).await?;
        Ok((key, status))
    }

    /// Overwrite the card stored at `key` (placeholder or server id).
    pub async fn update_custom_card(&self, key: &str, card: CustomCard) -> Result<SyncStatus> {
        card.validate()?;
        let record = StoredRecord::encode(key, &card, SyncStatus::Local)?;
        self.store.put(Table::CustomCards, record).await?;
        if !self.is_online() {
            return Ok(SyncStatus::Local);
        }
        let token = require_token(self.tokens.as_ref())?;
        match self.push_cards(&token).await {
            Ok(_) => Ok(SyncStatus::Confirmed),
            Err(err) => {
                self.note_write_failure(&err);
                Err(err)
            }
        }
    }

    /// Remove a card locally and, when online, re-post the remaining list.
    ///
    /// The card endpoint is full-replace, so the remote delete is the POST
    /// of whatever remains; it must run even when every remaining card is
    /// already confirmed, or a synced card's deletion would never reach the
    /// server and the card would resurface on the next pull.
    pub async fn delete_custom_card(&self, key: &str) -> Result<()> {
        self.store.delete(Table::CustomCards, key).await?;
        if !self.is_online() {
            return Ok(());
        }
        let token = require_token(self.tokens.as_ref())?;
        self.replace_cards(&token)
            .await
            .inspect_err(|err| self.note_write_failure(err))
    }

    pub async fn limit_settings(&self) -> Result<LimitSettings> {
        self.store.get_limit_settings().await
    }

    /// Toggle the limit lock; persisted locally, posted when online.
    pub async fn set_limit_lock(&self, locked: bool) -> Result<()> {
        let mut settings = self.store.get_limit_settings().await?;
        settings.locked = locked;
        self.store.put_limit_settings(&settings).await?;
        if !self.is_online() {
            return Ok(());
        }
        let token = require_token(self.tokens.as_ref())?;
        self.gateway
            .save_limit_lock(&token, locked)
            .await
            .inspect_err(|err| self.note_write_failure(err))
    }

    pub async fn set_limit_settings(&self, settings: LimitSettings) -> Result<()> {
        self.store.put_limit_settings(&settings).await?;
        if !self.is_online() {
            return Ok(());
        }
        let token = require_token(self.tokens.as_ref())?;
        self.gateway
            .save_limit_lock(&token, settings.locked)
            .await
            .inspect_err(|err| self.note_write_failure(err))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Bulk sync: push
    // ─────────────────────────────────────────────────────────────────────

    /// Push every unsynced record of a table to the remote authority.
    ///
    /// Entries and notes are pushed strictly one at a time, each call
    /// awaited, so offline edits replay in the order they were made. A
    /// record that fails is skipped and left `Local`; the loop continues.
    /// A 401/403 aborts the cycle with nothing further marked synced.
    pub async fn push(&self, table: Table) -> Result<PushSummary> {
        let token = require_token(self.tokens.as_ref())?;
        match table {
            Table::Entries => self.push_entries(&token).await,
            Table::Notes => self.push_notes(&token).await,
            Table::Balances => self.push_balances(&token).await,
            Table::CustomCards => self.push_cards(&token).await,
        }
    }

    async fn push_entries(&self, token: &str) -> Result<PushSummary> {
        let unsynced = self.store.find_unsynced(Table::Entries).await?;
        let mut summary = PushSummary::default();
        for record in unsynced {
            let entry: Entry = match record.decode() {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("skipping undecodable entry '{}': {}", record.key, err);
                    summary.skipped += 1;
                    continue;
                }
            };
            match self.gateway.create_entry(token, &entry).await {
                Ok(_) => {
                    self.store.mark_synced(Table::Entries, &record.key).await?;
                    summary.pushed += 1;
                }
                Err(err) if err.retry_class() == RetryClass::ReauthRequired => return Err(err),
                Err(err) => {
                    warn!("entry '{}' left unsynced: {}", record.key, err);
                    summary.skipped += 1;
                }
            }
        }
        Ok(summary)
    }

    async fn push_notes(&self, token: &str) -> Result<PushSummary> {
        let unsynced = self.store.find_unsynced(Table::Notes).await?;
        let mut summary = PushSummary::default();
        for record in unsynced {
            let note: Note = match record.decode() {
                Ok(note) => note,
                Err(err) => {
                    warn!("skipping undecodable note '{}': {}", record.key, err);
                    summary.skipped += 1;
                    continue;
                }
            };
            match self.gateway.create_note(token, &note).await {
                Ok(_) => {
                    self.store.mark_synced(Table::Notes, &record.key).await?;
                    summary.pushed += 1;
                }
                Err(err) if err.retry_class() == RetryClass::ReauthRequired => return Err(err),
                Err(err) => {
                    warn!("note '{}' left unsynced: {}", record.key, err);
                    summary.skipped += 1;
                }
            }
        }
        Ok(summary)
    }

    /// Balances sync as one full-map POST covering every row.
    async fn push_balances(&self, token: &str) -> Result<PushSummary> {
        let unsynced = self.store.find_unsynced(Table::Balances).await?;
        if unsynced.is_empty() {
            return Ok(PushSummary::default());
        }
        let all = self.store.get_all(Table::Balances).await?;
        let balances = all
            .iter()
            .map(|record| record.decode::<BankBalance>())
            .collect::<Result<Vec<_>>>()?;
        match self
            .gateway
            .save_balances(token, &balances_to_map(&balances))
            .await
        {
            Ok(()) => {
                for record in &unsynced {
                    self.store.mark_synced(Table::Balances, &record.key).await?;
                }
                Ok(PushSummary {
                    pushed: unsynced.len(),
                    skipped: 0,
                })
            }
            Err(err) if err.retry_class() == RetryClass::ReauthRequired => Err(err),
            Err(err) => {
                warn!("balances left unsynced: {}", err);
                Ok(PushSummary {
                    pushed: 0,
                    skipped: unsynced.len(),
                })
            }
        }
    }

    /// Cards sync as one full-replace POST with local ids stripped; the
    /// server assigns identity and the response replaces the local table.
    /// A re-push after a partial failure can therefore duplicate cards
    /// server-side; that matches the endpoint's observed contract.
    async fn push_cards(&self, token: &str) -> Result<PushSummary> {
        let unsynced = self.store.find_unsynced(Table::CustomCards).await?;
        if unsynced.is_empty() {
            return Ok(PushSummary::default());
        }
        match self.replace_cards(token).await {
            Ok(()) => Ok(PushSummary {
                pushed: unsynced.len(),
                skipped: 0,
            }),
            Err(err) if err.retry_class() == RetryClass::ReauthRequired => Err(err),
            Err(err) => {
                warn!("custom cards left unsynced: {}", err);
                Ok(PushSummary {
                    pushed: 0,
                    skipped: unsynced.len(),
                })
            }
        }
    }

    /// Post the current local card list (ids stripped) and adopt the
    /// server's canonical response as the new `Confirmed` table.
    async fn replace_cards(&self, token: &str) -> Result<()> {
        let all = self.store.get_all(Table::CustomCards).await?;
        let cards = all
            .iter()
            .map(|record| record.decode::<CustomCard>().map(|card| card.without_id()))
            .collect::<Result<Vec<_>>>()?;
        let canonical = self.gateway.save_custom_cards(token, &cards).await?;
        let records = canonical
            .into_iter()
            .map(|card| {
                let key = card
                    .id
                    .clone()
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                StoredRecord::encode(&key, &card, SyncStatus::Confirmed)
            })
            .collect::<Result<Vec<_>>>()?;
        self.store.clear(Table::CustomCards).await?;
        self.store.bulk_put(Table::CustomCards, records).await?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Bulk sync: pull
    // ─────────────────────────────────────────────────────────────────────

    /// Replace a table with the remote authority's current list.
    ///
    /// Full replace, not a merge: any `Local` record not pushed beforehand
    /// would be dropped, which is why [`SyncEngine::sync_table`] always
    /// pushes first. Completions are sequenced per table; a pull that loses
    /// the race to a newer one is discarded.
    pub async fn pull(&self, table: Table) -> Result<PullOutcome> {
        let token = require_token(self.tokens.as_ref())?;
        let ticket = self.pull_sequencer.begin(table);
        let records = self.fetch_authoritative(&token, table).await?;
        if !self.pull_sequencer.try_apply(table, ticket) {
            debug!("discarding stale pull for {}", table);
            return Ok(PullOutcome::Stale { table });
        }
        let count = records.len();
        self.store.clear(table).await?;
        self.store.bulk_put(table, records).await?;
        self.notify_refreshed();
        Ok(PullOutcome::Applied { table, count })
    }

    async fn fetch_authoritative(&self, token: &str, table: Table) -> Result<Vec<StoredRecord>> {
        match table {
            Table::Entries => self
                .gateway
                .list_entries(token)
                .await?
                .iter()
                .map(|entry| StoredRecord::encode(&entry.id, entry, SyncStatus::Confirmed))
                .collect(),
            Table::Notes => self
                .gateway
                .list_notes(token)
                .await?
                .iter()
                .map(|note| StoredRecord::encode(&note.id, note, SyncStatus::Confirmed))
                .collect(),
            Table::Balances => balances_from_map(self.gateway.get_balances(token).await?)
                .iter()
                .map(|balance| StoredRecord::encode(&balance.bank, balance, SyncStatus::Confirmed))
                .collect(),
            Table::CustomCards => self
                .gateway
                .get_custom_cards(token)
                .await?
                .into_iter()
                .map(|card| {
                    let key = card
                        .id
                        .clone()
                        .unwrap_or_else(|| Uuid::new_v4().to_string());
                    StoredRecord::encode(&key, &card, SyncStatus::Confirmed)
                })
                .collect(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Cycle orchestration
    // ─────────────────────────────────────────────────────────────────────

    /// One push-then-pull cycle for a table, serialized by the table gate.
    ///
    /// If a cycle is already in flight the request collapses into a single
    /// pending re-run performed by the in-flight holder before it releases
    /// the gate.
    pub async fn sync_table(&self, table: Table) -> Result<TableSyncOutcome> {
        // `gates` is keyed by SYNC_TABLES, which is exhaustive over `Table`,
        // so the lookup cannot miss.
        let gate = self.gates.get(&table).expect("table gate");
        let mut push_total = PushSummary::default();
        let mut pulled_total = 0;
        let mut ran = false;
        loop {
            let guard = match gate.in_flight.try_lock() {
                Ok(guard) => guard,
                Err(_) => {
                    gate.pending.store(true, Ordering::SeqCst);
                    if ran {
                        // A new holder took the gate; it consumes the flag.
                        break;
                    }
                    debug!("sync for {} already in flight; collapsed", table);
                    return Ok(TableSyncOutcome::Collapsed);
                }
            };
            ran = true;
            loop {
                let push = self.push(table).await?;
                push_total.pushed += push.pushed;
                push_total.skipped += push.skipped;
                if let PullOutcome::Applied { count, .. } = self.pull(table).await? {
                    pulled_total = count;
                }
                if !gate.pending.swap(false, Ordering::SeqCst) {
                    break;
                }
                debug!("re-running collapsed sync for {}", table);
            }
            drop(guard);
            // A request collapsed between the final swap above and the guard
            // release has nobody to run it; re-acquire and honor it here.
            if !gate.pending.load(Ordering::SeqCst) {
                break;
            }
        }
        Ok(TableSyncOutcome::Completed {
            push: push_total,
            pulled: pulled_total,
        })
    }

    /// Full sync cycle across every table group.
    ///
    /// Tables are independent: a failing table is logged and skipped, except
    /// for auth errors which abort the whole cycle (re-authentication is
    /// needed and retrying would not help).
    pub async fn sync_all(&self, trigger: SyncTrigger) -> Result<SyncCycleMetrics> {
        let started = std::time::Instant::now();
        let mut metrics = SyncCycleMetrics {
            trigger,
            pushed: 0,
            skipped: 0,
            pulled: 0,
            duration_ms: 0,
            status: "completed".to_string(),
        };
        for table in SYNC_TABLES {
            match self.sync_table(table).await {
                Ok(TableSyncOutcome::Completed { push, pulled }) => {
                    metrics.pushed += push.pushed;
                    metrics.skipped += push.skipped;
                    metrics.pulled += pulled;
                }
                Ok(TableSyncOutcome::Collapsed) => {}
                Err(err) if err.retry_class() == RetryClass::ReauthRequired => {
                    return Err(err);
                }
                Err(err) => {
                    warn!("sync for {} failed: {}", table, err);
                    metrics.status = "partial".to_string();
                }
            }
        }
        metrics.duration_ms = started.elapsed().as_millis() as i64;
        info!(
            "sync cycle ({:?}): pushed {}, skipped {}, pulled {} in {} ms",
            trigger, metrics.pushed, metrics.skipped, metrics.pulled, metrics.duration_ms
        );
        Ok(metrics)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Cache-first read path
    // ─────────────────────────────────────────────────────────────────────

    /// Entries from the cache, newest date first. Never touches the network.
    pub async fn cached_entries(&self) -> Result<Vec<CachedRecord<Entry>>> {
        self.cached(Table::Entries).await
    }

    pub async fn cached_notes(&self) -> Result<Vec<CachedRecord<Note>>> {
        self.cached(Table::Notes).await
    }

    pub async fn cached_balances(&self) -> Result<Vec<CachedRecord<BankBalance>>> {
        self.cached(Table::Balances).await
    }

    pub async fn cached_custom_cards(&self) -> Result<Vec<CachedRecord<CustomCard>>> {
        self.cached(Table::CustomCards).await
    }

    async fn cached<T: serde::de::DeserializeOwned>(
        &self,
        table: Table,
    ) -> Result<Vec<CachedRecord<T>>> {
        self.store
            .get_all(table)
            .await?
            .iter()
            .map(StoredRecord::decode_cached)
            .collect()
    }

    /// Background refresh for a view load: render from cache immediately,
    /// call this, and re-render when the refresh counter bumps. Failures
    /// degrade silently to the cached data.
    pub fn spawn_refresh(self: &Arc<Self>, table: Table) {
        if !self.is_online() {
            return;
        }
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = engine.pull(table).await {
                debug!("background refresh for {} failed: {}", table, err);
            }
        });
    }

    /// Remedy for a local storage failure: drop the whole cache and reload
    /// every table from the remote authority. Unsynced local records are
    /// lost; local persistence failures are non-recoverable in place.
    pub async fn rebuild_cache(&self) -> Result<()> {
        for table in SYNC_TABLES {
            self.store.clear(table).await?;
        }
        for table in SYNC_TABLES {
            self.pull(table).await?;
        }
        Ok(())
    }
}
