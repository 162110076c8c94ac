//! Custom credit-card limit record.

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// A user-defined card with a spending limit.
///
/// Identity is server-assigned: the id is absent until the first successful
/// sync, and any local id is stripped before pushing. While the id is
/// absent the local store keys the card by a locally generated placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomCard {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub limit: f64,
}

impl CustomCard {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("card name must not be empty"));
        }
        if !self.limit.is_finite() || self.limit < 0.0 {
            return Err(Error::validation("card limit must be a non-negative number"));
        }
        Ok(())
    }

    /// Copy with the local id stripped, as sent on push.
    pub fn without_id(&self) -> Self {
        Self {
            id: None,
            ..self.clone()
        }
    }
}
