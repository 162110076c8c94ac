//! Note record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// A free-form note, in its wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
    pub done: bool,
    pub created_at: DateTime<Utc>,
}

impl Note {
    /// Validate the record before it reaches the local store.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::validation("note id must not be empty"));
        }
        Ok(())
    }
}
