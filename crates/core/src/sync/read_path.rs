//! Stale-response guard for the cache-first read path.
//!
//! The optimistic render and the background pull are not mutually exclusive:
//! a second pull can start while the first is in flight. Each pull takes a
//! monotonic ticket per table; a completion whose ticket is older than the
//! last applied one is discarded instead of overwriting fresher data.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::store::{Table, SYNC_TABLES};

#[derive(Debug, Default)]
struct TableSequence {
    issued: AtomicU64,
    applied: AtomicU64,
}

/// Per-table monotonic pull sequencing.
#[derive(Debug)]
pub struct PullSequencer {
    tables: HashMap<Table, TableSequence>,
}

impl PullSequencer {
    pub fn new() -> Self {
        Self {
            tables: SYNC_TABLES
                .iter()
                .map(|table| (*table, TableSequence::default()))
                .collect(),
        }
    }

    /// Take a ticket before starting a pull.
    pub fn begin(&self, table: Table) -> u64 {
        self.sequence(table).issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Returns true when the completed pull may be applied; advances the
    /// applied watermark. An older ticket than the watermark is stale.
    pub fn try_apply(&self, table: Table, ticket: u64) -> bool {
        let applied = &self.sequence(table).applied;
        let mut current = applied.load(Ordering::SeqCst);
        loop {
            if ticket <= current {
                return false;
            }
            match applied.compare_exchange(current, ticket, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    fn sequence(&self, table: Table) -> &TableSequence {
        // SYNC_TABLES is exhaustive over Table, so the lookup cannot miss.
        self.tables.get(&table).expect("table sequence")
    }
}

impl Default for PullSequencer {
    fn default() -> Self {
        Self::new()
    }
}
