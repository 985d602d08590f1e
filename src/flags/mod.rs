//! Red and green flag generation
//!
//! Flags come from a fixed rule table (see [`rules`]). Every rule is
//! evaluated against the same inputs and every matching rule fires, in
//! table order. Severity belongs to the rule, not to the score.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::metrics::MetricsBundle;
use crate::scoring::{CategoryScore, TradingSignals};

pub mod rules;

pub use rules::{GreenFlagRule, RedFlagRule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Critical => "🔴",
            Severity::High => "🟠",
            Severity::Medium => "🟡",
            Severity::Low => "🔵",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        };
        f.write_str(name)
    }
}

/// Report section a flag belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlagSection {
    Liquidity,
    Holders,
    Market,
    Trading,
    Contract,
    Data,
}

impl FlagSection {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagSection::Liquidity => "Liquidity",
            FlagSection::Holders => "Holders",
            FlagSection::Market => "Market",
            FlagSection::Trading => "Trading",
            FlagSection::Contract => "Contract",
            FlagSection::Data => "Data",
        }
    }
}

impl fmt::Display for FlagSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    pub severity: Severity,
    pub category: String,
    pub message: String,
}

/// Thresholds for the value-based rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagThresholds {
    /// Red below this USD liquidity
    #[serde(default = "default_low_liquidity_usd")]
    pub low_liquidity_usd: f64,

    /// Green at or above this USD liquidity
    #[serde(default = "default_deep_liquidity_usd")]
    pub deep_liquidity_usd: f64,

    #[serde(default = "default_high_sell_tax_pct")]
    pub high_sell_tax_pct: f64,

    #[serde(default = "default_low_tax_pct")]
    pub low_tax_pct: f64,

    /// Red above this top-10 share
    #[serde(default = "default_top10_concentration_pct")]
    pub top10_concentration_pct: f64,

    /// Green at or below this top-10 share
    #[serde(default = "default_healthy_top10_pct")]
    pub healthy_top10_pct: f64,

    #[serde(default = "default_creator_pct")]
    pub creator_pct: f64,

    #[serde(default = "default_few_holders")]
    pub few_holders: u64,

    #[serde(default = "default_broad_holders")]
    pub broad_holders: u64,

    #[serde(default = "default_new_token_days")]
    pub new_token_days: f64,

    #[serde(default = "default_established_days")]
    pub established_days: f64,

    /// Red when a category falls below this share of its budget
    #[serde(default = "default_weak_category_pct")]
    pub weak_category_pct: f64,
}

fn default_low_liquidity_usd() -> f64 {
    10_000.0
}
fn default_deep_liquidity_usd() -> f64 {
    50_000.0
}
fn default_high_sell_tax_pct() -> f64 {
    10.0
}
fn default_low_tax_pct() -> f64 {
    5.0
}
fn default_top10_concentration_pct() -> f64 {
    50.0
}
fn default_healthy_top10_pct() -> f64 {
    30.0
}
fn default_creator_pct() -> f64 {
    10.0
}
fn default_few_holders() -> u64 {
    100
}
fn default_broad_holders() -> u64 {
    1_000
}
fn default_new_token_days() -> f64 {
    1.0
}
fn default_established_days() -> f64 {
    30.0
}
fn default_weak_category_pct() -> f64 {
    25.0
}

impl Default for FlagThresholds {
    fn default() -> Self {
        Self {
            low_liquidity_usd: default_low_liquidity_usd(),
            deep_liquidity_usd: default_deep_liquidity_usd(),
            high_sell_tax_pct: default_high_sell_tax_pct(),
            low_tax_pct: default_low_tax_pct(),
            top10_concentration_pct: default_top10_concentration_pct(),
            healthy_top10_pct: default_healthy_top10_pct(),
            creator_pct: default_creator_pct(),
            few_holders: default_few_holders(),
            broad_holders: default_broad_holders(),
            new_token_days: default_new_token_days(),
            established_days: default_established_days(),
            weak_category_pct: default_weak_category_pct(),
        }
    }
}

/// Inputs every rule may read
pub struct FlagContext<'a> {
    pub bundle: &'a MetricsBundle,
    pub signals: TradingSignals,
    pub scores: &'a [CategoryScore],
    pub thresholds: &'a FlagThresholds,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagSet {
    pub red: Vec<Flag>,
    pub green: Vec<Flag>,
}

impl FlagSet {
    /// Section of the most severe red flag; ties go to the earlier rule
    pub fn dominant_red_category(&self) -> Option<&str> {
        let mut dominant: Option<&Flag> = None;
        for flag in &self.red {
            if dominant.map_or(true, |d| flag.severity > d.severity) {
                dominant = Some(flag);
            }
        }
        dominant.map(|f| f.category.as_str())
    }

    pub fn has_critical(&self) -> bool {
        self.red.iter().any(|f| f.severity == Severity::Critical)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FlagGenerator {
    thresholds: FlagThresholds,
}

impl FlagGenerator {
    pub fn new(thresholds: FlagThresholds) -> Self {
        Self { thresholds }
    }

    pub fn generate(
        &self,
        bundle: &MetricsBundle,
        signals: TradingSignals,
        scores: &[CategoryScore],
    ) -> FlagSet {
        let ctx = FlagContext {
            bundle,
            signals,
            scores,
            thresholds: &self.thresholds,
        };

        let red: Vec<Flag> = RedFlagRule::ALL
            .iter()
            .filter_map(|rule| {
                rule.evaluate(&ctx).map(|message| Flag {
                    severity: rule.severity(),
                    category: rule.section().to_string(),
                    message,
                })
            })
            .collect();

        let green: Vec<Flag> = GreenFlagRule::ALL
            .iter()
            .filter_map(|rule| {
                rule.evaluate(&ctx).map(|message| Flag {
                    severity: rule.severity(),
                    category: rule.section().to_string(),
                    message,
                })
            })
            .collect();

        debug!(
            token = %bundle.token.address.short(),
            red = red.len(),
            green = green.len(),
            "Flags generated"
        );

        FlagSet { red, green }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::Detectors;
    use crate::metrics::fixtures;
    use crate::report::WeightsConfig;
    use crate::scoring::{ReportKind, Scorer};

    fn flags_for(bundle: &MetricsBundle) -> FlagSet {
        let detectors = Detectors::default().run(bundle, None);
        let signals = TradingSignals::resolve(bundle, &detectors);
        let scores = Scorer::default().score(
            ReportKind::Security,
            bundle,
            signals,
            &WeightsConfig::default(),
        );
        FlagGenerator::default().generate(bundle, signals, &scores)
    }

    fn messages(flags: &[Flag]) -> Vec<&str> {
        flags.iter().map(|f| f.message.as_str()).collect()
    }

    #[test]
    fn test_clean_token_has_no_liquidity_red_flags() {
        let flags = flags_for(&fixtures::bundle(fixtures::clean_sources()));

        assert!(flags.red.is_empty(), "unexpected red flags: {:?}", messages(&flags.red));
        assert!(messages(&flags.green).contains(&"Can sell: ✅ YES"));
        assert!(messages(&flags.green).contains(&"Liquidity burned"));
        assert_eq!(flags.dominant_red_category(), None);
    }

    #[test]
    fn test_risky_token_flags_burn_and_lock() {
        let flags = flags_for(&fixtures::bundle(fixtures::risky_sources()));
        let red = messages(&flags.red);

        assert!(red.contains(&"Liquidity not burned"));
        assert!(red.contains(&"Liquidity not locked"));
        assert_eq!(flags.dominant_red_category(), Some("Liquidity"));
    }

    #[test]
    fn test_trading_risk_flags() {
        let flags = flags_for(&fixtures::bundle(fixtures::trading_risk_sources()));

        let honeypot = flags
            .red
            .iter()
            .find(|f| f.message.starts_with("Honeypot detected"))
            .expect("honeypot flag");
        assert_eq!(honeypot.severity, Severity::Critical);
        assert!(flags.red.iter().any(|f| f.message == "Can sell: ⛔ NO"));
        assert!(flags.has_critical());
        assert_eq!(flags.dominant_red_category(), Some("Trading"));
    }

    #[test]
    fn test_generation_is_idempotent() {
        let bundle = fixtures::bundle(fixtures::trading_risk_sources());
        let first = flags_for(&bundle);
        let second = flags_for(&bundle);
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_data_flagged() {
        let flags = flags_for(&fixtures::bundle(vec![]));
        assert!(flags
            .red
            .iter()
            .any(|f| f.category == "Data" && f.message.starts_with("Insufficient data")));
        assert!(flags.green.is_empty());
    }

    #[test]
    fn test_severity_order() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }
}
