//! Financial entry record.

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Direction of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryType {
    Income,
    Expense,
}

/// Settlement status of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryStatus {
    Open,
    Paid,
}

/// A single bookkeeping entry, in its wire shape.
///
/// The id is client-generated at creation time and never reassigned; the
/// server echoes it back on create. Sync bookkeeping (`synced`,
/// `lastUpdated`) lives in the store envelope, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    /// YYYY-MM-DD; lexicographic order equals chronological order.
    pub date: String,
    pub description: String,
    pub amount: f64,
    pub currency: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub person: String,
    pub bank: String,
    pub category: String,
    pub status: EntryStatus,
}

fn is_valid_entry_date(date: &str) -> bool {
    let bytes = date.as_bytes();
    if bytes.len() != 10 {
        return false;
    }
    for (idx, byte) in bytes.iter().enumerate() {
        match idx {
            4 | 7 => {
                if *byte != b'-' {
                    return false;
                }
            }
            _ => {
                if !byte.is_ascii_digit() {
                    return false;
                }
            }
        }
    }
    ("01"..="12").contains(&&date[5..7]) && ("01"..="31").contains(&&date[8..10])
}

impl Entry {
    /// Validate the record before it reaches the local store.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::validation("entry id must not be empty"));
        }
        if !is_valid_entry_date(&self.date) {
            return Err(Error::validation(format!(
                "entry date '{}' is not YYYY-MM-DD",
                self.date
            )));
        }
        if !self.amount.is_finite() {
            return Err(Error::validation("entry amount must be finite"));
        }
        Ok(())
    }
}
