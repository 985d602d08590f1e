//! Canonical metrics bundle
//!
//! Every analysis run normalizes whatever sources arrived into one
//! [`MetricsBundle`]. Fields no source could fill hold a neutral default and
//! are absent from the bundle's [`AvailabilityMap`]; consumers read them
//! through the `Option`-returning accessors so absence is never mistaken for
//! a safe value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::report::RiskLevel;
use crate::token::TokenId;

pub mod normalizer;
pub mod sources;

pub use normalizer::{Normalizer, NormalizerConfig};
pub use sources::{SourceKind, SourcePayload, SourceSet};

/// Groups of related metrics, one per report section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricGroup {
    Liquidity,
    Holders,
    Market,
    Trading,
    Contract,
    Simulation,
}

impl fmt::Display for MetricGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricGroup::Liquidity => "liquidity",
            MetricGroup::Holders => "holders",
            MetricGroup::Market => "market",
            MetricGroup::Trading => "trading",
            MetricGroup::Contract => "contract",
            MetricGroup::Simulation => "simulation",
        };
        f.write_str(name)
    }
}

/// Every individually tracked metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricField {
    // Liquidity
    LiquiditySol,
    LiquidityUsd,
    LpBurned,
    LpLocked,
    // Holders
    TotalHolders,
    Top10Pct,
    CreatorPct,
    ConcentrationRisk,
    // Market
    AgeDays,
    PumpAndDump,
    VolumeH24Usd,
    PriceChangeH1,
    PriceChangeH24,
    TxnCountsH24,
    MarketCapUsd,
    LinkCounts,
    // Trading
    BundleBots,
    Snipers,
    WashTrading,
    HoneypotDetected,
    CanSell,
    // Contract
    Renounced,
    Verified,
    HasBlacklist,
    HasWhitelist,
    IsProxy,
    IsMintable,
    // Simulation
    BuyOutcome,
    Taxes,
    TxLimits,
}

impl MetricField {
    pub fn group(&self) -> MetricGroup {
        match self {
            MetricField::LiquiditySol
            | MetricField::LiquidityUsd
            | MetricField::LpBurned
            | MetricField::LpLocked => MetricGroup::Liquidity,

            MetricField::TotalHolders
            | MetricField::Top10Pct
            | MetricField::CreatorPct
            | MetricField::ConcentrationRisk => MetricGroup::Holders,

            MetricField::AgeDays
            | MetricField::PumpAndDump
            | MetricField::VolumeH24Usd
            | MetricField::PriceChangeH1
            | MetricField::PriceChangeH24
            | MetricField::TxnCountsH24
            | MetricField::MarketCapUsd
            | MetricField::LinkCounts => MetricGroup::Market,

            MetricField::BundleBots
            | MetricField::Snipers
            | MetricField::WashTrading
            | MetricField::HoneypotDetected
            | MetricField::CanSell => MetricGroup::Trading,

            MetricField::Renounced
            | MetricField::Verified
            | MetricField::HasBlacklist
            | MetricField::HasWhitelist
            | MetricField::IsProxy
            | MetricField::IsMintable => MetricGroup::Contract,

            MetricField::BuyOutcome | MetricField::Taxes | MetricField::TxLimits => {
                MetricGroup::Simulation
            }
        }
    }
}

/// Which metrics were actually filled from a source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityMap {
    available: BTreeSet<MetricField>,
}

impl AvailabilityMap {
    pub fn mark(&mut self, field: MetricField) {
        self.available.insert(field);
    }

    pub fn is_available(&self, field: MetricField) -> bool {
        self.available.contains(&field)
    }

    /// True when at least one metric of the group is available
    pub fn group_available(&self, group: MetricGroup) -> bool {
        self.available.iter().any(|f| f.group() == group)
    }

    /// Groups with no available metric at all
    pub fn missing_groups(&self) -> Vec<MetricGroup> {
        [
            MetricGroup::Liquidity,
            MetricGroup::Holders,
            MetricGroup::Market,
            MetricGroup::Trading,
            MetricGroup::Contract,
            MetricGroup::Simulation,
        ]
        .into_iter()
        .filter(|g| !self.group_available(*g))
        .collect()
    }

    pub fn len(&self) -> usize {
        self.available.len()
    }

    pub fn is_empty(&self) -> bool {
        self.available.is_empty()
    }
}

/// Token identity as reported by the sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenProfile {
    pub address: TokenId,
    pub symbol: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiquidityMetrics {
    pub total_liquidity_sol: f64,
    pub total_liquidity_usd: f64,
    pub lp_burned: bool,
    pub lp_locked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolderMetrics {
    pub total_holders: u64,
    pub top10_pct: f64,
    pub creator_pct: f64,
    pub concentration_risk: RiskLevel,
}

impl Default for HolderMetrics {
    fn default() -> Self {
        Self {
            total_holders: 0,
            top10_pct: 0.0,
            creator_pct: 0.0,
            concentration_risk: RiskLevel::Medium,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketMetrics {
    pub age_days: f64,
    pub pump_and_dump: bool,
    pub volume_h24_usd: f64,
    pub price_change_h1: f64,
    pub price_change_h24: f64,
    pub buys_h24: u32,
    pub sells_h24: u32,
    pub market_cap_usd: f64,
    pub website_count: u32,
    pub social_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingMetrics {
    pub bundle_bots: u32,
    pub snipers: u32,
    pub wash_trading: bool,
    pub honeypot_detected: bool,
    pub can_sell: bool,
}

impl Default for TradingMetrics {
    fn default() -> Self {
        Self {
            bundle_bots: 0,
            snipers: 0,
            wash_trading: false,
            honeypot_detected: false,
            can_sell: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractMetrics {
    pub renounced: bool,
    pub verified: bool,
    pub has_blacklist: bool,
    pub has_whitelist: bool,
    pub is_proxy: bool,
    pub is_mintable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationMetrics {
    pub buy_amount_sol: f64,
    pub buy_succeeded: bool,
    pub sell_succeeded: bool,
    pub buy_tax_pct: f64,
    pub sell_tax_pct: f64,
    pub transfer_tax_pct: f64,
    /// `None` means no limit
    pub max_tx_amount: Option<f64>,
    /// `None` means no limit
    pub max_wallet_amount: Option<f64>,
}

impl Default for SimulationMetrics {
    fn default() -> Self {
        Self {
            buy_amount_sol: 0.0,
            buy_succeeded: false,
            sell_succeeded: false,
            buy_tax_pct: 0.0,
            sell_tax_pct: 0.0,
            transfer_tax_pct: 0.0,
            max_tx_amount: None,
            max_wallet_amount: None,
        }
    }
}

/// The normalized view of one token, immutable once built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsBundle {
    pub token: TokenProfile,
    pub liquidity: LiquidityMetrics,
    pub holders: HolderMetrics,
    pub market: MarketMetrics,
    pub trading: TradingMetrics,
    pub contract: ContractMetrics,
    pub simulation: SimulationMetrics,
    pub availability: AvailabilityMap,
}

impl MetricsBundle {
    /// An all-defaults bundle with nothing available
    pub fn empty(token: TokenProfile) -> Self {
        Self {
            token,
            liquidity: LiquidityMetrics::default(),
            holders: HolderMetrics::default(),
            market: MarketMetrics::default(),
            trading: TradingMetrics::default(),
            contract: ContractMetrics::default(),
            simulation: SimulationMetrics::default(),
            availability: AvailabilityMap::default(),
        }
    }

    pub fn availability(&self) -> &AvailabilityMap {
        &self.availability
    }
}

/// Generates `Option`-returning accessors gated on availability
macro_rules! observed {
    ($($name:ident: $ty:ty => $field:ident, $group:ident . $member:ident;)*) => {
        impl MetricsBundle {
            $(
                pub fn $name(&self) -> Option<$ty> {
                    self.availability
                        .is_available(MetricField::$field)
                        .then(|| self.$group.$member.clone())
                }
            )*
        }
    };
}

observed! {
    liquidity_sol: f64 => LiquiditySol, liquidity.total_liquidity_sol;
    liquidity_usd: f64 => LiquidityUsd, liquidity.total_liquidity_usd;
    lp_burned: bool => LpBurned, liquidity.lp_burned;
    lp_locked: bool => LpLocked, liquidity.lp_locked;
    total_holders: u64 => TotalHolders, holders.total_holders;
    top10_pct: f64 => Top10Pct, holders.top10_pct;
    creator_pct: f64 => CreatorPct, holders.creator_pct;
    concentration_risk: RiskLevel => ConcentrationRisk, holders.concentration_risk;
    age_days: f64 => AgeDays, market.age_days;
    pump_and_dump: bool => PumpAndDump, market.pump_and_dump;
    volume_h24_usd: f64 => VolumeH24Usd, market.volume_h24_usd;
    price_change_h24: f64 => PriceChangeH24, market.price_change_h24;
    market_cap_usd: f64 => MarketCapUsd, market.market_cap_usd;
    bundle_bots: u32 => BundleBots, trading.bundle_bots;
    snipers: u32 => Snipers, trading.snipers;
    wash_trading: bool => WashTrading, trading.wash_trading;
    honeypot_detected: bool => HoneypotDetected, trading.honeypot_detected;
    can_sell: bool => CanSell, trading.can_sell;
    renounced: bool => Renounced, contract.renounced;
    verified: bool => Verified, contract.verified;
    has_blacklist: bool => HasBlacklist, contract.has_blacklist;
    has_whitelist: bool => HasWhitelist, contract.has_whitelist;
    is_proxy: bool => IsProxy, contract.is_proxy;
    is_mintable: bool => IsMintable, contract.is_mintable;
    max_tx_amount: Option<f64> => TxLimits, simulation.max_tx_amount;
    max_wallet_amount: Option<f64> => TxLimits, simulation.max_wallet_amount;
}

impl MetricsBundle {
    /// 24h (buys, sells)
    pub fn txn_counts_h24(&self) -> Option<(u32, u32)> {
        self.availability
            .is_available(MetricField::TxnCountsH24)
            .then_some((self.market.buys_h24, self.market.sells_h24))
    }

    /// (websites, socials)
    pub fn link_counts(&self) -> Option<(u32, u32)> {
        self.availability
            .is_available(MetricField::LinkCounts)
            .then_some((self.market.website_count, self.market.social_count))
    }

    /// (buy, sell, transfer) tax percentages
    pub fn taxes(&self) -> Option<(f64, f64, f64)> {
        self.availability.is_available(MetricField::Taxes).then_some((
            self.simulation.buy_tax_pct,
            self.simulation.sell_tax_pct,
            self.simulation.transfer_tax_pct,
        ))
    }

    /// (buy amount, buy succeeded, sell succeeded) from the sell simulation
    pub fn simulated_round_trip(&self) -> Option<(f64, bool, bool)> {
        self.availability.is_available(MetricField::BuyOutcome).then_some((
            self.simulation.buy_amount_sol,
            self.simulation.buy_succeeded,
            self.simulation.sell_succeeded,
        ))
    }
}

/// Source payload fixtures shared by the scoring, flag and pipeline tests
#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{Duration, TimeZone, Utc};

    use super::sources::*;
    use super::*;

    pub const TOKEN: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

    pub fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    pub fn clean_sources() -> Vec<SourcePayload> {
        vec![
            SourcePayload::Market(MarketPayload {
                name: Some("Clean Token".to_string()),
                symbol: Some("CLEAN".to_string()),
                liquidity_native: Some(500.0),
                liquidity_usd: Some(50_000.0),
                pair_created_at: Some(now() - Duration::days(60)),
                volume_h24_usd: Some(120_000.0),
                price_change_h1: Some(1.5),
                price_change_h24: Some(8.0),
                buys_h24: Some(900),
                sells_h24: Some(600),
                market_cap_usd: Some(2_000_000.0),
                websites: Some(vec!["https://clean.example".to_string()]),
                socials: Some(vec![
                    "https://x.com/clean".to_string(),
                    "https://t.me/clean".to_string(),
                ]),
            }),
            SourcePayload::Holders(HolderPayload {
                total_holders: Some(4_200),
                top_holder_pcts: Some(vec![3.0, 2.5, 2.0, 1.8, 1.5, 1.2, 1.0, 1.0, 0.9, 0.8, 0.5]),
                creator_pct: Some(1.0),
                concentration_risk: Some("LOW".to_string()),
                bundle_wallets: Some(0),
                sniper_wallets: Some(0),
            }),
            SourcePayload::RugCheck(RugCheckPayload {
                name: None,
                symbol: None,
                mint_authority: Some(None),
                freeze_authority: Some(None),
                owner_renounced: Some(true),
                verified: Some(true),
                has_blacklist: Some(false),
                has_whitelist: Some(false),
                is_proxy: Some(false),
                is_mintable: Some(false),
                lp_burned: Some(true),
                lp_locked: Some(true),
                wash_trading: Some(false),
                honeypot: Some(false),
            }),
            SourcePayload::Simulation(SimulationPayload {
                buy_amount_sol: Some(0.1),
                buy_success: Some(true),
                sell_success: Some(true),
                buy_tax_pct: Some(0.0),
                sell_tax_pct: Some(0.0),
                transfer_tax_pct: Some(0.0),
                max_tx_amount: None,
                max_wallet_amount: None,
            }),
        ]
    }

    /// Same as clean, but LP neither burned nor locked and a flagged concentration label
    pub fn risky_sources() -> Vec<SourcePayload> {
        clean_sources()
            .into_iter()
            .map(|payload| match payload {
                SourcePayload::RugCheck(mut rc) => {
                    rc.lp_burned = Some(false);
                    rc.lp_locked = Some(false);
                    SourcePayload::RugCheck(rc)
                }
                SourcePayload::Holders(mut h) => {
                    h.concentration_risk = Some("CRITICAL".to_string());
                    SourcePayload::Holders(h)
                }
                other => other,
            })
            .collect()
    }

    /// Clean, but wash trading, a honeypot and a failing sell
    pub fn trading_risk_sources() -> Vec<SourcePayload> {
        clean_sources()
            .into_iter()
            .map(|payload| match payload {
                SourcePayload::RugCheck(mut rc) => {
                    rc.wash_trading = Some(true);
                    rc.honeypot = Some(true);
                    SourcePayload::RugCheck(rc)
                }
                SourcePayload::Simulation(mut sim) => {
                    sim.sell_success = Some(false);
                    sim.sell_tax_pct = Some(99.0);
                    SourcePayload::Simulation(sim)
                }
                other => other,
            })
            .collect()
    }

    pub fn bundle(sources: Vec<SourcePayload>) -> MetricsBundle {
        Normalizer::default()
            .normalize_at(TOKEN, sources, now())
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_groups() {
        assert_eq!(MetricField::LpBurned.group(), MetricGroup::Liquidity);
        assert_eq!(MetricField::CanSell.group(), MetricGroup::Trading);
        assert_eq!(MetricField::Taxes.group(), MetricGroup::Simulation);
    }

    #[test]
    fn test_accessors_respect_availability() {
        let mut bundle = fixtures::bundle(vec![]);
        assert_eq!(bundle.liquidity_sol(), None);
        assert_eq!(bundle.can_sell(), None);
        assert_eq!(bundle.availability.missing_groups().len(), 6);

        bundle.liquidity.total_liquidity_sol = 12.0;
        bundle.availability.mark(MetricField::LiquiditySol);
        assert_eq!(bundle.liquidity_sol(), Some(12.0));
        assert!(bundle.availability.group_available(MetricGroup::Liquidity));
    }
}
