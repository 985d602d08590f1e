//! Sniper detection
//!
//! A sniper is any wallet other than the pool creator whose first
//! successful buy lands within `window_blocks` slots of pool creation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::types::{Transaction, TxKind};
use super::Detection;
use crate::error::Result;

/// Configuration for sniper detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SniperConfig {
    /// Slots after pool creation that count as sniping
    #[serde(default = "default_window_blocks")]
    pub window_blocks: u64,
}

fn default_window_blocks() -> u64 {
    3
}

impl Default for SniperConfig {
    fn default() -> Self {
        Self {
            window_blocks: default_window_blocks(),
        }
    }
}

/// Sniper detector output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SniperFindings {
    pub pool_slot: u64,
    /// Sniper wallets, sorted
    pub wallets: Vec<String>,
}

impl SniperFindings {
    pub fn sniper_count(&self) -> u32 {
        self.wallets.len() as u32
    }
}

#[derive(Debug, Clone, Default)]
pub struct SniperDetector {
    config: SniperConfig,
}

impl SniperDetector {
    pub fn new(config: SniperConfig) -> Self {
        Self { config }
    }

    pub fn detect(&self, history: Option<&[Transaction]>) -> Result<Detection<SniperFindings>> {
        let Some(history) = history else {
            return Ok(Detection::not_evaluated("no transaction history"));
        };

        let Some(pool) = history
            .iter()
            .filter(|tx| tx.kind == TxKind::PoolCreated && tx.success)
            .min_by_key(|tx| tx.slot)
        else {
            return Ok(Detection::not_evaluated("pool creation not found in history"));
        };

        // First successful buy per wallet
        let mut first_buy: BTreeMap<&str, u64> = BTreeMap::new();
        for tx in history.iter().filter(|tx| tx.is_buy()) {
            first_buy
                .entry(tx.from.as_str())
                .and_modify(|slot| *slot = (*slot).min(tx.slot))
                .or_insert(tx.slot);
        }

        let cutoff = pool.slot.saturating_add(self.config.window_blocks);
        let wallets: Vec<String> = first_buy
            .into_iter()
            .filter(|(wallet, slot)| *wallet != pool.from && *slot < cutoff)
            .map(|(wallet, _)| wallet.to_string())
            .collect();

        debug!(
            pool_slot = pool.slot,
            snipers = wallets.len(),
            "Sniper scan complete"
        );

        Ok(Detection::Evaluated(SniperFindings {
            pool_slot: pool.slot,
            wallets,
        }))
    }
}
