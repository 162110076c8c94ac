//! Bank balance record.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::{Error, Result};

/// One balance row per bank name. Balances are overwritten wholesale on
/// each save; there is no per-bank merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankBalance {
    pub bank: String,
    pub value: f64,
}

impl BankBalance {
    pub fn validate(&self) -> Result<()> {
        if self.bank.trim().is_empty() {
            return Err(Error::validation("bank name must not be empty"));
        }
        if !self.value.is_finite() {
            return Err(Error::validation("balance value must be finite"));
        }
        Ok(())
    }
}

/// Convert balance rows to the bank→value map used on the wire.
pub fn balances_to_map(balances: &[BankBalance]) -> HashMap<String, f64> {
    balances
        .iter()
        .map(|b| (b.bank.clone(), b.value))
        .collect()
}

/// Convert the wire map back to balance rows.
pub fn balances_from_map(map: HashMap<String, f64>) -> Vec<BankBalance> {
    let mut balances: Vec<BankBalance> = map
        .into_iter()
        .map(|(bank, value)| BankBalance { bank, value })
        .collect();
    balances.sort_by(|a, b| a.bank.cmp(&b.bank));
    balances
}
