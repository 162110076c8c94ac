//! Offline-first synchronization core for a personal bookkeeping client.
//!
//! The local store is the long-lived cache; the remote authority is the
//! source of truth when reachable. Records are created locally first,
//! marked unsynced, and transition to synced only after the remote gateway
//! acknowledges them.

pub mod errors;
pub mod models;
pub mod remote;
pub mod store;
pub mod sync;
pub mod token;

pub use errors::{Error, Result, RetryClass};
pub use remote::RemoteGateway;
pub use store::{CachedRecord, LocalStore, StoredRecord, SyncStatus, Table, SYNC_TABLES};
pub use sync::SyncEngine;
pub use token::{StaticTokenProvider, TokenProvider};
