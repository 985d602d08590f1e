//! Flag rule tables
//!
//! One variant per rule. `ALL` fixes evaluation order, which is also the
//! order flags appear in a report.

use super::{FlagContext, FlagSection, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedFlagRule {
    HoneypotDetected,
    CannotSell,
    MintAuthorityActive,
    LiquidityNotBurned,
    LiquidityNotLocked,
    LowLiquidity,
    BlacklistFunction,
    WashTrading,
    PumpAndDump,
    BundledWallets,
    TopHolderConcentration,
    HighSellTax,
    UpgradeableProxy,
    OwnershipNotRenounced,
    Snipers,
    CreatorHolding,
    FewHolders,
    NewToken,
    InsufficientData,
    WeakCategory,
    Unverified,
    WhitelistFunction,
    TransactionLimits,
}

impl RedFlagRule {
    pub const ALL: [RedFlagRule; 23] = [
        RedFlagRule::HoneypotDetected,
        RedFlagRule::CannotSell,
        RedFlagRule::MintAuthorityActive,
        RedFlagRule::LiquidityNotBurned,
        RedFlagRule::LiquidityNotLocked,
        RedFlagRule::LowLiquidity,
        RedFlagRule::BlacklistFunction,
        RedFlagRule::WashTrading,
        RedFlagRule::PumpAndDump,
        RedFlagRule::BundledWallets,
        RedFlagRule::TopHolderConcentration,
        RedFlagRule::HighSellTax,
        RedFlagRule::UpgradeableProxy,
        RedFlagRule::OwnershipNotRenounced,
        RedFlagRule::Snipers,
        RedFlagRule::CreatorHolding,
        RedFlagRule::FewHolders,
        RedFlagRule::NewToken,
        RedFlagRule::InsufficientData,
        RedFlagRule::WeakCategory,
        RedFlagRule::Unverified,
        RedFlagRule::WhitelistFunction,
        RedFlagRule::TransactionLimits,
    ];

    pub fn severity(&self) -> Severity {
        match self {
            RedFlagRule::HoneypotDetected
            | RedFlagRule::CannotSell
            | RedFlagRule::MintAuthorityActive => Severity::Critical,

            RedFlagRule::LiquidityNotBurned
            | RedFlagRule::LiquidityNotLocked
            | RedFlagRule::LowLiquidity
            | RedFlagRule::BlacklistFunction
            | RedFlagRule::WashTrading
            | RedFlagRule::PumpAndDump
            | RedFlagRule::BundledWallets
            | RedFlagRule::TopHolderConcentration
            | RedFlagRule::HighSellTax => Severity::High,

            RedFlagRule::UpgradeableProxy
            | RedFlagRule::OwnershipNotRenounced
            | RedFlagRule::Snipers
            | RedFlagRule::CreatorHolding
            | RedFlagRule::FewHolders
            | RedFlagRule::NewToken
            | RedFlagRule::InsufficientData
            | RedFlagRule::WeakCategory => Severity::Medium,

            RedFlagRule::Unverified
            | RedFlagRule::WhitelistFunction
            | RedFlagRule::TransactionLimits => Severity::Low,
        }
    }

    pub fn section(&self) -> FlagSection {
        match self {
            RedFlagRule::LiquidityNotBurned
            | RedFlagRule::LiquidityNotLocked
            | RedFlagRule::LowLiquidity => FlagSection::Liquidity,

            RedFlagRule::BundledWallets
            | RedFlagRule::TopHolderConcentration
            | RedFlagRule::CreatorHolding
            | RedFlagRule::FewHolders => FlagSection::Holders,

            RedFlagRule::PumpAndDump | RedFlagRule::NewToken => FlagSection::Market,

            RedFlagRule::HoneypotDetected
            | RedFlagRule::CannotSell
            | RedFlagRule::WashTrading
            | RedFlagRule::HighSellTax
            | RedFlagRule::Snipers
            | RedFlagRule::TransactionLimits => FlagSection::Trading,

            RedFlagRule::MintAuthorityActive
            | RedFlagRule::BlacklistFunction
            | RedFlagRule::UpgradeableProxy
            | RedFlagRule::OwnershipNotRenounced
            | RedFlagRule::Unverified
            | RedFlagRule::WhitelistFunction => FlagSection::Contract,

            RedFlagRule::InsufficientData | RedFlagRule::WeakCategory => FlagSection::Data,
        }
    }

    /// Message when the rule fires
    pub fn evaluate(&self, ctx: &FlagContext<'_>) -> Option<String> {
        let bundle = ctx.bundle;
        let signals = ctx.signals;
        let t = ctx.thresholds;

        match self {
            RedFlagRule::HoneypotDetected => (signals.honeypot == Some(true))
                .then(|| "Honeypot detected: buys succeed but sells are blocked".to_string()),

            RedFlagRule::CannotSell => {
                (signals.can_sell == Some(false)).then(|| "Can sell: ⛔ NO".to_string())
            }

            RedFlagRule::MintAuthorityActive => (bundle.is_mintable() == Some(true))
                .then(|| "Mint authority active: supply can be inflated".to_string()),

            RedFlagRule::LiquidityNotBurned => {
                (bundle.lp_burned() == Some(false)).then(|| "Liquidity not burned".to_string())
            }

            // Burned LP needs no lock
            RedFlagRule::LiquidityNotLocked => (bundle.lp_locked() == Some(false)
                && bundle.lp_burned() != Some(true))
            .then(|| "Liquidity not locked".to_string()),

            RedFlagRule::LowLiquidity => bundle
                .liquidity_usd()
                .filter(|usd| *usd < t.low_liquidity_usd)
                .map(|usd| format!("Low liquidity: ${:.0}", usd)),

            RedFlagRule::BlacklistFunction => (bundle.has_blacklist() == Some(true))
                .then(|| "Contract can blacklist wallets".to_string()),

            RedFlagRule::WashTrading => (signals.wash_trading == Some(true))
                .then(|| "Wash trading detected".to_string()),

            RedFlagRule::PumpAndDump => (bundle.pump_and_dump() == Some(true))
                .then(|| "Pump-and-dump price pattern".to_string()),

            RedFlagRule::BundledWallets => signals
                .bundle_bots
                .filter(|n| *n > 0)
                .map(|n| format!("{} bundled wallets detected", n)),

            RedFlagRule::TopHolderConcentration => match bundle.top10_pct() {
                Some(top10) => (top10 > t.top10_concentration_pct)
                    .then(|| format!("Top 10 holders own {:.1}%", top10)),
                None => bundle
                    .concentration_risk()
                    .filter(|level| *level >= crate::report::RiskLevel::High)
                    .map(|level| format!("Holder concentration rated {}", level)),
            },

            RedFlagRule::HighSellTax => bundle
                .taxes()
                .map(|(_, sell, _)| sell)
                .filter(|sell| *sell > t.high_sell_tax_pct)
                .map(|sell| format!("High sell tax: {:.1}%", sell)),

            RedFlagRule::UpgradeableProxy => (bundle.is_proxy() == Some(true))
                .then(|| "Upgradeable proxy contract".to_string()),

            RedFlagRule::OwnershipNotRenounced => (bundle.renounced() == Some(false))
                .then(|| "Ownership not renounced".to_string()),

            RedFlagRule::Snipers => signals
                .snipers
                .filter(|n| *n > 0)
                .map(|n| format!("{} sniper wallets bought at launch", n)),

            RedFlagRule::CreatorHolding => bundle
                .creator_pct()
                .filter(|pct| *pct > t.creator_pct)
                .map(|pct| format!("Creator holds {:.1}%", pct)),

            RedFlagRule::FewHolders => bundle
                .total_holders()
                .filter(|n| *n < t.few_holders)
                .map(|n| format!("Only {} holders", n)),

            RedFlagRule::NewToken => bundle
                .age_days()
                .filter(|days| *days < t.new_token_days)
                .map(|days| format!("Token is only {:.1} hours old", days * 24.0)),

            RedFlagRule::InsufficientData => {
                let missing = bundle.availability().missing_groups();
                (!missing.is_empty()).then(|| {
                    let names: Vec<String> = missing.iter().map(|g| g.to_string()).collect();
                    format!("Insufficient data: {} unavailable", names.join(", "))
                })
            }

            RedFlagRule::WeakCategory => {
                let weak: Vec<String> = ctx
                    .scores
                    .iter()
                    .filter(|s| s.percent() < t.weak_category_pct)
                    .map(|s| format!("{} {:.0}%", s.category, s.percent()))
                    .collect();
                (!weak.is_empty()).then(|| format!("Critically weak categories: {}", weak.join(", ")))
            }

            RedFlagRule::Unverified => {
                (bundle.verified() == Some(false)).then(|| "Contract not verified".to_string())
            }

            RedFlagRule::WhitelistFunction => (bundle.has_whitelist() == Some(true))
                .then(|| "Contract restricts trading to a whitelist".to_string()),

            RedFlagRule::TransactionLimits => {
                let tx = bundle.max_tx_amount().flatten();
                let wallet = bundle.max_wallet_amount().flatten();
                match (tx, wallet) {
                    (None, None) => None,
                    (tx, wallet) => Some(format!(
                        "Transaction limits enforced (max tx {}, max wallet {})",
                        tx.map_or("none".to_string(), |v| format!("{:.0}", v)),
                        wallet.map_or("none".to_string(), |v| format!("{:.0}", v)),
                    )),
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GreenFlagRule {
    CanSell,
    LiquidityBurned,
    LiquidityLocked,
    MintRevoked,
    DeepLiquidity,
    OwnershipRenounced,
    Verified,
    LowTaxes,
    HealthyDistribution,
    BroadHolderBase,
    Established,
    NoSnipersOrBundles,
}

impl GreenFlagRule {
    pub const ALL: [GreenFlagRule; 12] = [
        GreenFlagRule::CanSell,
        GreenFlagRule::LiquidityBurned,
        GreenFlagRule::LiquidityLocked,
        GreenFlagRule::MintRevoked,
        GreenFlagRule::DeepLiquidity,
        GreenFlagRule::OwnershipRenounced,
        GreenFlagRule::Verified,
        GreenFlagRule::LowTaxes,
        GreenFlagRule::HealthyDistribution,
        GreenFlagRule::BroadHolderBase,
        GreenFlagRule::Established,
        GreenFlagRule::NoSnipersOrBundles,
    ];

    pub fn severity(&self) -> Severity {
        match self {
            GreenFlagRule::CanSell | GreenFlagRule::LiquidityBurned | GreenFlagRule::MintRevoked => {
                Severity::High
            }
            GreenFlagRule::LiquidityLocked
            | GreenFlagRule::DeepLiquidity
            | GreenFlagRule::OwnershipRenounced
            | GreenFlagRule::HealthyDistribution => Severity::Medium,
            GreenFlagRule::Verified
            | GreenFlagRule::LowTaxes
            | GreenFlagRule::BroadHolderBase
            | GreenFlagRule::Established
            | GreenFlagRule::NoSnipersOrBundles => Severity::Low,
        }
    }

    pub fn section(&self) -> FlagSection {
        match self {
            GreenFlagRule::LiquidityBurned
            | GreenFlagRule::LiquidityLocked
            | GreenFlagRule::DeepLiquidity => FlagSection::Liquidity,
            GreenFlagRule::HealthyDistribution | GreenFlagRule::BroadHolderBase => {
                FlagSection::Holders
            }
            GreenFlagRule::Established => FlagSection::Market,
            GreenFlagRule::CanSell | GreenFlagRule::LowTaxes | GreenFlagRule::NoSnipersOrBundles => {
                FlagSection::Trading
            }
            GreenFlagRule::MintRevoked
            | GreenFlagRule::OwnershipRenounced
            | GreenFlagRule::Verified => FlagSection::Contract,
        }
    }

    pub fn evaluate(&self, ctx: &FlagContext<'_>) -> Option<String> {
        let bundle = ctx.bundle;
        let signals = ctx.signals;
        let t = ctx.thresholds;

        match self {
            GreenFlagRule::CanSell => {
                (signals.can_sell == Some(true)).then(|| "Can sell: ✅ YES".to_string())
            }
            GreenFlagRule::LiquidityBurned => {
                (bundle.lp_burned() == Some(true)).then(|| "Liquidity burned".to_string())
            }
            GreenFlagRule::LiquidityLocked => {
                (bundle.lp_locked() == Some(true)).then(|| "Liquidity locked".to_string())
            }
            GreenFlagRule::MintRevoked => (bundle.is_mintable() == Some(false))
                .then(|| "Mint authority revoked".to_string()),
            GreenFlagRule::DeepLiquidity => bundle
                .liquidity_usd()
                .filter(|usd| *usd >= t.deep_liquidity_usd)
                .map(|usd| format!("Deep liquidity: ${:.0}", usd)),
            GreenFlagRule::OwnershipRenounced => {
                (bundle.renounced() == Some(true)).then(|| "Ownership renounced".to_string())
            }
            GreenFlagRule::Verified => {
                (bundle.verified() == Some(true)).then(|| "Contract verified".to_string())
            }
            GreenFlagRule::LowTaxes => bundle
                .taxes()
                .filter(|(buy, sell, _)| *buy <= t.low_tax_pct && *sell <= t.low_tax_pct)
                .map(|(buy, sell, _)| format!("Low taxes: {:.1}% buy / {:.1}% sell", buy, sell)),
            GreenFlagRule::HealthyDistribution => bundle
                .top10_pct()
                .filter(|pct| *pct <= t.healthy_top10_pct)
                .map(|pct| format!("Healthy distribution: top 10 hold {:.1}%", pct)),
            GreenFlagRule::BroadHolderBase => bundle
                .total_holders()
                .filter(|n| *n >= t.broad_holders)
                .map(|n| format!("{} holders", n)),
            GreenFlagRule::Established => bundle
                .age_days()
                .filter(|days| *days >= t.established_days)
                .map(|days| format!("Trading for {:.0} days", days)),
            GreenFlagRule::NoSnipersOrBundles => (signals.snipers == Some(0)
                && signals.bundle_bots == Some(0))
            .then(|| "No snipers or bundled wallets".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::FlagThresholds;
    use crate::metrics::fixtures;
    use crate::scoring::TradingSignals;

    #[test]
    fn test_rule_tables_have_no_duplicates() {
        for (i, rule) in RedFlagRule::ALL.iter().enumerate() {
            assert!(!RedFlagRule::ALL[i + 1..].contains(rule), "{:?} repeated", rule);
        }
        for (i, rule) in GreenFlagRule::ALL.iter().enumerate() {
            assert!(!GreenFlagRule::ALL[i + 1..].contains(rule), "{:?} repeated", rule);
        }
    }

    #[test]
    fn test_red_table_ordered_by_severity() {
        let severities: Vec<Severity> = RedFlagRule::ALL.iter().map(|r| r.severity()).collect();
        let mut sorted = severities.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(severities, sorted);
    }

    #[test]
    fn test_rule_fires_independently() {
        let bundle = fixtures::bundle(fixtures::risky_sources());
        let thresholds = FlagThresholds::default();
        let ctx = FlagContext {
            bundle: &bundle,
            signals: TradingSignals::default(),
            scores: &[],
            thresholds: &thresholds,
        };

        assert!(RedFlagRule::LiquidityNotBurned.evaluate(&ctx).is_some());
        assert!(RedFlagRule::LiquidityNotLocked.evaluate(&ctx).is_some());
        assert!(RedFlagRule::HoneypotDetected.evaluate(&ctx).is_none());
        assert!(GreenFlagRule::CanSell.evaluate(&ctx).is_none());
    }

    #[test]
    fn test_burned_liquidity_needs_no_lock() {
        let mut bundle = fixtures::bundle(fixtures::clean_sources());
        bundle.liquidity.lp_locked = false;
        let thresholds = FlagThresholds::default();
        let ctx = FlagContext {
            bundle: &bundle,
            signals: TradingSignals::default(),
            scores: &[],
            thresholds: &thresholds,
        };
        assert!(RedFlagRule::LiquidityNotLocked.evaluate(&ctx).is_none());
    }
}
