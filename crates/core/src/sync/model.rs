//! Sync cycle models and the retry-classification helper.

use serde::{Deserialize, Serialize};

use crate::errors::RetryClass;
use crate::store::Table;

/// What kicked off a sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    Reconnect,
    Manual,
    ViewLoad,
}

/// Outcome of one push pass over a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSummary {
    /// Records the server acknowledged this pass.
    pub pushed: usize,
    /// Records left unsynced for a later retry.
    pub skipped: usize,
}

/// Lightweight cycle metrics for transient UI notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncCycleMetrics {
    pub trigger: SyncTrigger,
    pub pushed: usize,
    pub skipped: usize,
    pub pulled: usize,
    pub duration_ms: i64,
    pub status: String,
}

/// Outcome of syncing one table (push then pull).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableSyncOutcome {
    /// Push and pull both ran.
    Completed { push: PushSummary, pulled: usize },
    /// Another sync for this table was in flight; this request collapsed
    /// into its pending re-run.
    Collapsed,
}

/// A pull pass that completed but arrived after a newer one is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    Applied { table: Table, count: usize },
    Stale { table: Table },
}

/// Classify HTTP status into retry behavior.
pub fn classify_http_status(status: u16) -> RetryClass {
    match status {
        401 | 403 => RetryClass::ReauthRequired,
        408 | 409 | 423 | 425 | 429 => RetryClass::Retryable,
        500..=599 => RetryClass::Retryable,
        _ => RetryClass::Permanent,
    }
}
