//! Transaction history records consumed by the pattern detectors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a history record represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    /// Liquidity pool created; `from` is the pool creator
    PoolCreated,
    /// Token buy by `from`
    Buy,
    /// Token sell by `from`
    Sell,
    /// Token transfer `from` -> `to`
    Transfer,
    /// SOL funding `from` -> `to`
    Funding,
}

/// One parsed on-chain transaction touching the token
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub signature: String,
    pub kind: TxKind,
    pub from: String,
    #[serde(default)]
    pub to: Option<String>,
    /// Value moved, in SOL
    #[serde(default)]
    pub amount_sol: f64,
    pub slot: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default = "default_success")]
    pub success: bool,
}

fn default_success() -> bool {
    true
}

impl Transaction {
    pub fn new(kind: TxKind, from: &str, slot: u64, timestamp: DateTime<Utc>) -> Self {
        Self {
            signature: format!("{:?}-{}-{}", kind, from, slot),
            kind,
            from: from.to_string(),
            to: None,
            amount_sol: 0.0,
            slot,
            timestamp,
            success: true,
        }
    }

    pub fn to(mut self, to: &str) -> Self {
        self.to = Some(to.to_string());
        self
    }

    pub fn amount(mut self, amount_sol: f64) -> Self {
        self.amount_sol = amount_sol;
        self
    }

    pub fn failed(mut self) -> Self {
        self.success = false;
        self
    }

    /// Successful buy
    pub fn is_buy(&self) -> bool {
        self.kind == TxKind::Buy && self.success
    }

    /// Shortened wallet for log lines
    pub fn short_from(&self) -> &str {
        let end = self.from.len().min(8);
        &self.from[..end]
    }
}
