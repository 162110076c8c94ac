//! Sync engine, connectivity monitoring, and the cache-first read path.

mod connectivity;
mod engine;
mod model;
mod read_path;

pub use connectivity::{ConnectivityEdge, ConnectivityMonitor};
pub use engine::SyncEngine;
pub use model::*;
pub use read_path::PullSequencer;

#[cfg(test)]
mod tests;
