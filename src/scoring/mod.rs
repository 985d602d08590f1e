//! Category scorers
//!
//! Each category starts at its full point budget and loses points rule by
//! rule. Every deduction is recorded as a [`Finding`] so the score can be
//! audited. Scorers are pure: they read the bundle and resolved detector
//! signals, never another category's output.
//!
//! Two report kinds share this machinery:
//! - [`ReportKind::Composite`]: Security, Fundamentals, Technical Analysis,
//!   Sentiment and Innovation, 100 points each
//! - [`ReportKind::Security`]: Liquidity, Holders, Market, Trading and
//!   Contract sections with budgets proportional to their weights

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::detectors::DetectorResults;
use crate::error::{Error, Result};
use crate::metrics::MetricsBundle;
use crate::report::WeightsConfig;

pub mod composite;
pub mod security_report;
pub mod tiers;

pub use tiers::{Direction, Tier, TierTable};

/// Which family of categories a report is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    #[default]
    Composite,
    Security,
}

impl ReportKind {
    pub fn categories(&self) -> &'static [Category] {
        match self {
            ReportKind::Composite => &Category::COMPOSITE,
            ReportKind::Security => &Category::SECURITY,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Composite => "composite",
            ReportKind::Security => "security",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "composite" => Ok(ReportKind::Composite),
            "security" => Ok(ReportKind::Security),
            other => Err(Error::Config(format!("unknown report kind: {}", other))),
        }
    }
}

/// Scored category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    // Composite report
    Security,
    Fundamentals,
    TechnicalAnalysis,
    Sentiment,
    Innovation,
    // Security report sections
    Liquidity,
    Holders,
    Market,
    Trading,
    Contract,
}

impl Category {
    pub const COMPOSITE: [Category; 5] = [
        Category::Security,
        Category::Fundamentals,
        Category::TechnicalAnalysis,
        Category::Sentiment,
        Category::Innovation,
    ];

    pub const SECURITY: [Category; 5] = [
        Category::Liquidity,
        Category::Holders,
        Category::Market,
        Category::Trading,
        Category::Contract,
    ];

    /// Point budget
    pub fn max_score(&self) -> u32 {
        match self {
            Category::Security
            | Category::Fundamentals
            | Category::TechnicalAnalysis
            | Category::Sentiment
            | Category::Innovation => 100,
            Category::Liquidity => 25,
            Category::Holders => 25,
            Category::Market => 15,
            Category::Trading => 20,
            Category::Contract => 15,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Category::Security => "Security",
            Category::Fundamentals => "Fundamentals",
            Category::TechnicalAnalysis => "Technical Analysis",
            Category::Sentiment => "Sentiment",
            Category::Innovation => "Innovation",
            Category::Liquidity => "Liquidity",
            Category::Holders => "Holders",
            Category::Market => "Market",
            Category::Trading => "Trading",
            Category::Contract => "Contract",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One scoring observation and the points it cost
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub message: String,
    pub deduction: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScore {
    pub category: Category,
    pub score: u32,
    pub max_score: u32,
    pub weight: f64,
    pub findings: Vec<Finding>,
}

impl CategoryScore {
    /// Score as a fraction of the budget
    pub fn ratio(&self) -> f64 {
        if self.max_score == 0 {
            return 0.0;
        }
        f64::from(self.score) / f64::from(self.max_score)
    }

    pub fn percent(&self) -> f64 {
        self.ratio() * 100.0
    }

    pub fn has_insufficient_data(&self) -> bool {
        self.findings
            .iter()
            .any(|f| f.message.starts_with(INSUFFICIENT_DATA))
    }
}

const INSUFFICIENT_DATA: &str = "Insufficient data";

/// Running tally for one category
#[derive(Debug)]
pub struct ScoreSheet {
    category: Category,
    deducted: u32,
    findings: Vec<Finding>,
}

impl ScoreSheet {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            deducted: 0,
            findings: Vec::new(),
        }
    }

    pub fn remaining(&self) -> u32 {
        self.category.max_score() - self.deducted
    }

    /// Record a finding; the deduction is capped at what is left
    pub fn deduct(&mut self, points: u32, message: impl Into<String>) {
        let points = points.min(self.remaining());
        self.deducted += points;
        self.findings.push(Finding {
            message: message.into(),
            deduction: points,
        });
    }

    /// Zero-point observation
    pub fn note(&mut self, message: impl Into<String>) {
        self.deduct(0, message);
    }

    /// Unavailable input: forfeit half the rule budget, rounded up
    pub fn insufficient(&mut self, budget: u32, what: &str) {
        self.deduct(
            budget.div_ceil(2),
            format!("{}: {} unavailable", INSUFFICIENT_DATA, what),
        );
    }

    /// Apply a tier table, or mark the input unavailable
    pub fn tiered(
        &mut self,
        value: Option<f64>,
        table: &TierTable,
        budget: u32,
        what: &str,
        describe: impl FnOnce(f64) -> String,
    ) {
        match value {
            Some(value) => self.deduct(table.deduction(value, budget), describe(value)),
            None => self.insufficient(budget, what),
        }
    }

    /// Boolean risk condition: `Some(true)` costs the whole budget
    pub fn risk(&mut self, present: Option<bool>, budget: u32, what: &str, bad: &str, good: &str) {
        match present {
            Some(true) => self.deduct(budget, bad),
            Some(false) => self.note(good),
            None => self.insufficient(budget, what),
        }
    }

    /// Forfeit everything left
    pub fn zero_out(&mut self, message: impl Into<String>) {
        let remaining = self.remaining();
        self.deduct(remaining, message);
    }

    pub fn finish(self, weight: f64) -> CategoryScore {
        let max_score = self.category.max_score();
        CategoryScore {
            category: self.category,
            score: max_score - self.deducted,
            max_score,
            weight,
            findings: self.findings,
        }
    }
}

/// Trading signals after merging detector output with source-reported values
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TradingSignals {
    pub bundle_bots: Option<u32>,
    pub snipers: Option<u32>,
    pub wash_trading: Option<bool>,
    pub honeypot: Option<bool>,
    pub can_sell: Option<bool>,
}

impl TradingSignals {
    /// Detector output wins; sources fill the gaps; `None` means neither ran.
    /// Honeypot and sellability are the exception: bad news from either side
    /// sticks, so a clean detector pass can't mask a source-reported trap.
    pub fn resolve(bundle: &MetricsBundle, detectors: &DetectorResults) -> Self {
        let honeypot = detectors.honeypot.evaluated();
        Self {
            bundle_bots: detectors
                .bundles
                .evaluated()
                .map(|f| f.bundled_wallets)
                .or_else(|| bundle.bundle_bots()),
            snipers: detectors
                .snipers
                .evaluated()
                .map(|f| f.sniper_count())
                .or_else(|| bundle.snipers()),
            wash_trading: detectors
                .wash_trading
                .evaluated()
                .map(|f| f.wash_trading)
                .or_else(|| bundle.wash_trading()),
            honeypot: either_true(honeypot.map(|f| f.honeypot), bundle.honeypot_detected()),
            can_sell: both_true(honeypot.and_then(|f| f.can_sell), bundle.can_sell()),
        }
    }
}

fn either_true(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a || b),
        (a, b) => a.or(b),
    }
}

fn both_true(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a && b),
        (a, b) => a.or(b),
    }
}

/// Tier tables used by the scorers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_liquidity_sol")]
    pub liquidity_sol: TierTable,
    #[serde(default = "default_liquidity_usd")]
    pub liquidity_usd: TierTable,
    #[serde(default = "default_holder_count")]
    pub holder_count: TierTable,
    #[serde(default = "default_top10_pct")]
    pub top10_pct: TierTable,
    #[serde(default = "default_creator_pct")]
    pub creator_pct: TierTable,
    #[serde(default = "default_age_days")]
    pub age_days: TierTable,
    #[serde(default = "default_volume_h24_usd")]
    pub volume_h24_usd: TierTable,
    #[serde(default = "default_sell_tax_pct")]
    pub sell_tax_pct: TierTable,
    #[serde(default = "default_sniper_count")]
    pub sniper_count: TierTable,
    #[serde(default = "default_bundle_wallets")]
    pub bundle_wallets: TierTable,
    /// Share of 24h transactions that were buys
    #[serde(default = "default_buy_ratio")]
    pub buy_ratio: TierTable,
    /// Absolute 24h price change
    #[serde(default = "default_price_swing_pct")]
    pub price_swing_pct: TierTable,
    /// 24h volume divided by USD liquidity
    #[serde(default = "default_volume_liquidity_ratio")]
    pub volume_liquidity_ratio: TierTable,
    #[serde(default = "default_social_count")]
    pub social_count: TierTable,
}

fn default_liquidity_sol() -> TierTable {
    TierTable::higher_is_better(&[(500.0, 0.0), (100.0, 0.2), (50.0, 0.4), (10.0, 0.7)], 1.0)
}
fn default_liquidity_usd() -> TierTable {
    TierTable::higher_is_better(
        &[(50_000.0, 0.0), (10_000.0, 0.2), (5_000.0, 0.4), (1_000.0, 0.7)],
        1.0,
    )
}
fn default_holder_count() -> TierTable {
    TierTable::higher_is_better(&[(1_000.0, 0.0), (500.0, 0.2), (100.0, 0.5), (50.0, 0.8)], 1.0)
}
fn default_top10_pct() -> TierTable {
    TierTable::lower_is_better(&[(20.0, 0.0), (30.0, 0.2), (50.0, 0.5), (70.0, 0.8)], 1.0)
}
fn default_creator_pct() -> TierTable {
    TierTable::lower_is_better(&[(5.0, 0.0), (10.0, 0.3), (20.0, 0.6)], 1.0)
}
fn default_age_days() -> TierTable {
    TierTable::higher_is_better(&[(30.0, 0.0), (7.0, 0.2), (1.0, 0.6)], 1.0)
}
fn default_volume_h24_usd() -> TierTable {
    TierTable::higher_is_better(&[(100_000.0, 0.0), (10_000.0, 0.3), (1_000.0, 0.6)], 1.0)
}
fn default_sell_tax_pct() -> TierTable {
    TierTable::lower_is_better(&[(5.0, 0.0), (10.0, 0.3), (25.0, 0.7)], 1.0)
}
fn default_sniper_count() -> TierTable {
    TierTable::lower_is_better(&[(0.0, 0.0), (3.0, 0.5), (10.0, 0.8)], 1.0)
}
fn default_bundle_wallets() -> TierTable {
    TierTable::lower_is_better(&[(0.0, 0.0), (5.0, 0.6)], 1.0)
}
fn default_buy_ratio() -> TierTable {
    TierTable::higher_is_better(&[(0.5, 0.0), (0.4, 0.3), (0.3, 0.6)], 1.0)
}
fn default_price_swing_pct() -> TierTable {
    TierTable::lower_is_better(&[(20.0, 0.0), (50.0, 0.3), (100.0, 0.6)], 1.0)
}
fn default_volume_liquidity_ratio() -> TierTable {
    TierTable::lower_is_better(&[(5.0, 0.0), (10.0, 0.3), (25.0, 0.7)], 1.0)
}
fn default_social_count() -> TierTable {
    TierTable::higher_is_better(&[(3.0, 0.0), (2.0, 0.25), (1.0, 0.5)], 1.0)
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            liquidity_sol: default_liquidity_sol(),
            liquidity_usd: default_liquidity_usd(),
            holder_count: default_holder_count(),
            top10_pct: default_top10_pct(),
            creator_pct: default_creator_pct(),
            age_days: default_age_days(),
            volume_h24_usd: default_volume_h24_usd(),
            sell_tax_pct: default_sell_tax_pct(),
            sniper_count: default_sniper_count(),
            bundle_wallets: default_bundle_wallets(),
            buy_ratio: default_buy_ratio(),
            price_swing_pct: default_price_swing_pct(),
            volume_liquidity_ratio: default_volume_liquidity_ratio(),
            social_count: default_social_count(),
        }
    }
}

impl ScoringConfig {
    pub fn tables(&self) -> [(&'static str, &TierTable); 14] {
        [
            ("liquidity_sol", &self.liquidity_sol),
            ("liquidity_usd", &self.liquidity_usd),
            ("holder_count", &self.holder_count),
            ("top10_pct", &self.top10_pct),
            ("creator_pct", &self.creator_pct),
            ("age_days", &self.age_days),
            ("volume_h24_usd", &self.volume_h24_usd),
            ("sell_tax_pct", &self.sell_tax_pct),
            ("sniper_count", &self.sniper_count),
            ("bundle_wallets", &self.bundle_wallets),
            ("buy_ratio", &self.buy_ratio),
            ("price_swing_pct", &self.price_swing_pct),
            ("volume_liquidity_ratio", &self.volume_liquidity_ratio),
            ("social_count", &self.social_count),
        ]
    }

    pub fn validate(&self) -> Result<()> {
        for (name, table) in self.tables() {
            table.validate(name)?;
        }
        Ok(())
    }
}

/// Everything a category scorer may read
pub struct ScoringInput<'a> {
    pub bundle: &'a MetricsBundle,
    pub signals: TradingSignals,
    pub tables: &'a ScoringConfig,
}

/// Runs the scorers for one report kind
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    config: ScoringConfig,
}

impl Scorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score every category of `kind`, in declaration order
    pub fn score(
        &self,
        kind: ReportKind,
        bundle: &MetricsBundle,
        signals: TradingSignals,
        weights: &WeightsConfig,
    ) -> Vec<CategoryScore> {
        let input = ScoringInput {
            bundle,
            signals,
            tables: &self.config,
        };

        kind.categories()
            .iter()
            .map(|&category| {
                let sheet = score_category(category, &input);
                sheet.finish(weights.weight(category))
            })
            .collect()
    }
}

fn score_category(category: Category, input: &ScoringInput<'_>) -> ScoreSheet {
    match category {
        Category::Security => composite::security(input),
        Category::Fundamentals => composite::fundamentals(input),
        Category::TechnicalAnalysis => composite::technical(input),
        Category::Sentiment => composite::sentiment(input),
        Category::Innovation => composite::innovation(input),
        Category::Liquidity => security_report::liquidity(input),
        Category::Holders => security_report::holders(input),
        Category::Market => security_report::market(input),
        Category::Trading => security_report::trading(input),
        Category::Contract => security_report::contract(input),
    }
}
