//! Remote gateway contract: a thin typed client over the bookkeeping REST API.
//!
//! Implementations perform no retry and no backoff; the sync engine owns the
//! "leave local state unsynced, retry later" policy. Every method takes the
//! caller's bearer token.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::errors::Result;
use crate::models::{CustomCard, Entry, Note};

#[async_trait]
pub trait RemoteGateway: Send + Sync {
    // Entries
    async fn list_entries(&self, token: &str) -> Result<Vec<Entry>>;
    async fn create_entry(&self, token: &str, entry: &Entry) -> Result<Entry>;
    async fn update_entry(&self, token: &str, id: &str, patch: &serde_json::Value)
        -> Result<Entry>;
    async fn delete_entry(&self, token: &str, id: &str) -> Result<()>;
    async fn delete_all_entries(&self, token: &str) -> Result<()>;

    // Notes
    async fn list_notes(&self, token: &str) -> Result<Vec<Note>>;
    async fn create_note(&self, token: &str, note: &Note) -> Result<Note>;
    async fn update_note(&self, token: &str, id: &str, patch: &serde_json::Value) -> Result<Note>;
    async fn delete_note(&self, token: &str, id: &str) -> Result<()>;

    // Bank balances (full-replace map)
    async fn get_balances(&self, token: &str) -> Result<HashMap<String, f64>>;
    async fn save_balances(&self, token: &str, balances: &HashMap<String, f64>) -> Result<()>;

    // Custom cards (full-replace list; server assigns ids)
    async fn get_custom_cards(&self, token: &str) -> Result<Vec<CustomCard>>;
    async fn save_custom_cards(&self, token: &str, cards: &[CustomCard]) -> Result<Vec<CustomCard>>;

    // Limit settings
    async fn save_limit_lock(&self, token: &str, locked: bool) -> Result<()>;
}
