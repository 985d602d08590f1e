//! Raw source payloads
//!
//! Collector adapters hand the engine one payload per upstream source.
//! Field names follow the upstream JSON (DexScreener pairs, holder/cluster
//! snapshots, rug-check reports, sell simulations); every field is optional
//! because upstreams omit whatever they failed to compute.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Which upstream a payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Market,
    Holders,
    RugCheck,
    Simulation,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Market,
        SourceKind::Holders,
        SourceKind::RugCheck,
        SourceKind::Simulation,
    ];
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::Market => "market",
            SourceKind::Holders => "holders",
            SourceKind::RugCheck => "rugcheck",
            SourceKind::Simulation => "simulation",
        };
        f.write_str(name)
    }
}

/// A source-tagged raw payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", content = "data", rename_all = "snake_case")]
pub enum SourcePayload {
    Market(MarketPayload),
    Holders(HolderPayload),
    RugCheck(RugCheckPayload),
    Simulation(SimulationPayload),
}

impl SourcePayload {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourcePayload::Market(_) => SourceKind::Market,
            SourcePayload::Holders(_) => SourceKind::Holders,
            SourcePayload::RugCheck(_) => SourceKind::RugCheck,
            SourcePayload::Simulation(_) => SourceKind::Simulation,
        }
    }
}

/// Market and liquidity data (DexScreener pair shape)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketPayload {
    pub name: Option<String>,
    pub symbol: Option<String>,
    /// Pool liquidity in the quote (native) currency
    pub liquidity_native: Option<f64>,
    pub liquidity_usd: Option<f64>,
    pub pair_created_at: Option<DateTime<Utc>>,
    pub volume_h24_usd: Option<f64>,
    pub price_change_h1: Option<f64>,
    pub price_change_h24: Option<f64>,
    pub buys_h24: Option<u32>,
    pub sells_h24: Option<u32>,
    pub market_cap_usd: Option<f64>,
    /// `None` when the upstream didn't report links at all
    pub websites: Option<Vec<String>>,
    pub socials: Option<Vec<String>>,
}

/// Holder distribution and wallet-cluster data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderPayload {
    pub total_holders: Option<u64>,
    /// Percentage of supply held by each of the largest holders, descending
    pub top_holder_pcts: Option<Vec<f64>>,
    pub creator_pct: Option<f64>,
    /// Upstream concentration label ("LOW", "MEDIUM", "HIGH", "CRITICAL")
    pub concentration_risk: Option<String>,
    pub bundle_wallets: Option<u32>,
    pub sniper_wallets: Option<u32>,
}

/// Rug-check style contract report
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RugCheckPayload {
    pub name: Option<String>,
    pub symbol: Option<String>,
    /// Outer `None`: not reported. `Some(None)`: reported as revoked (null).
    #[serde(default, deserialize_with = "reported", skip_serializing_if = "Option::is_none")]
    pub mint_authority: Option<Option<String>>,
    #[serde(default, deserialize_with = "reported", skip_serializing_if = "Option::is_none")]
    pub freeze_authority: Option<Option<String>>,
    pub owner_renounced: Option<bool>,
    pub verified: Option<bool>,
    pub has_blacklist: Option<bool>,
    pub has_whitelist: Option<bool>,
    pub is_proxy: Option<bool>,
    pub is_mintable: Option<bool>,
    pub lp_burned: Option<bool>,
    pub lp_locked: Option<bool>,
    pub wash_trading: Option<bool>,
    pub honeypot: Option<bool>,
}

/// Keeps an explicit JSON `null` distinct from a missing key
fn reported<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Pre-computed buy/sell simulation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationPayload {
    pub buy_amount_sol: Option<f64>,
    pub buy_success: Option<bool>,
    pub sell_success: Option<bool>,
    pub buy_tax_pct: Option<f64>,
    pub sell_tax_pct: Option<f64>,
    pub transfer_tax_pct: Option<f64>,
    pub max_tx_amount: Option<f64>,
    pub max_wallet_amount: Option<f64>,
}

/// A source slot: either the payload arrived or it did not
#[derive(Debug, Clone, Default)]
pub enum Source<T> {
    Present(T),
    #[default]
    Unavailable,
}

impl<T> Source<T> {
    pub fn as_present(&self) -> Option<&T> {
        match self {
            Source::Present(payload) => Some(payload),
            Source::Unavailable => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Source::Present(_))
    }
}

/// One slot per source kind
#[derive(Debug, Clone, Default)]
pub struct SourceSet {
    pub market: Source<MarketPayload>,
    pub holders: Source<HolderPayload>,
    pub rugcheck: Source<RugCheckPayload>,
    pub simulation: Source<SimulationPayload>,
}

impl SourceSet {
    /// Sort payloads into their slots. The first payload of each kind wins.
    pub fn from_payloads(payloads: impl IntoIterator<Item = SourcePayload>) -> Self {
        let mut set = SourceSet::default();

        for payload in payloads {
            let kind = payload.kind();
            if set.has(kind) {
                warn!(source = %kind, "Duplicate source payload ignored");
                continue;
            }
            match payload {
                SourcePayload::Market(p) => set.market = Source::Present(p),
                SourcePayload::Holders(p) => set.holders = Source::Present(p),
                SourcePayload::RugCheck(p) => set.rugcheck = Source::Present(p),
                SourcePayload::Simulation(p) => set.simulation = Source::Present(p),
            }
        }

        set
    }

    /// Check whether a source kind delivered a payload
    pub fn has(&self, kind: SourceKind) -> bool {
        match kind {
            SourceKind::Market => self.market.is_present(),
            SourceKind::Holders => self.holders.is_present(),
            SourceKind::RugCheck => self.rugcheck.is_present(),
            SourceKind::Simulation => self.simulation.is_present(),
        }
    }

    /// Source kinds that did not deliver
    pub fn missing(&self) -> Vec<SourceKind> {
        SourceKind::ALL
            .into_iter()
            .filter(|kind| !self.has(*kind))
            .collect()
    }
}
