//! SQLite persistence for the ledgerbook local cache.

mod db;
mod store;

pub use db::Database;
pub use store::SqliteLocalStore;
