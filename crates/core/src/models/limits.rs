//! Per-user limit settings singleton.

use serde::{Deserialize, Serialize};

/// Spending-limit settings: a lock flag plus four named numeric limits.
/// One row per user, persisted by the store in a dedicated side table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitSettings {
    pub locked: bool,
    pub daily: f64,
    pub weekly: f64,
    pub monthly: f64,
    pub yearly: f64,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            locked: false,
            daily: 0.0,
            weekly: 0.0,
            monthly: 0.0,
            yearly: 0.0,
        }
    }
}
