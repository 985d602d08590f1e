//! Composite aggregation, risk classification and the final report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::flags::{Flag, FlagSet};
use crate::metrics::TokenProfile;
use crate::scoring::{Category, CategoryScore, ReportKind};

/// Risk band, also used for upstream holder-concentration labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Parse an upstream label such as `"LOW"` or `"critical"`
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "LOW" => Some(RiskLevel::Low),
            "MEDIUM" => Some(RiskLevel::Medium),
            "HIGH" => Some(RiskLevel::High),
            "CRITICAL" => Some(RiskLevel::Critical),
            _ => None,
        }
    }

    /// Bands are inclusive on their lower edge
    pub fn from_score(score: u8) -> Self {
        match score {
            80..=u8::MAX => RiskLevel::Low,
            60..=79 => RiskLevel::Medium,
            40..=59 => RiskLevel::High,
            _ => RiskLevel::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the reader should do, one per risk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Proceed,
    Caution,
    Avoid,
    DoNotBuy,
}

impl Recommendation {
    pub fn for_level(level: RiskLevel) -> Self {
        match level {
            RiskLevel::Low => Recommendation::Proceed,
            RiskLevel::Medium => Recommendation::Caution,
            RiskLevel::High => Recommendation::Avoid,
            RiskLevel::Critical => Recommendation::DoNotBuy,
        }
    }

    /// Human-readable advice, naming the dominant red-flag category if any
    pub fn describe(&self, dominant: Option<&str>) -> String {
        match (self, dominant) {
            (Recommendation::Proceed, None) => {
                "Low risk. No red flags found; standard due diligence applies.".to_string()
            }
            (Recommendation::Proceed, Some(category)) => format!(
                "Low risk overall. Review the minor {} findings before trading.",
                category.to_lowercase()
            ),
            (Recommendation::Caution, None) => {
                "Moderate risk. Trade with caution and keep position sizes small.".to_string()
            }
            (Recommendation::Caution, Some(category)) => format!(
                "Moderate risk. Trade with caution; {} concerns need review.",
                category.to_lowercase()
            ),
            (Recommendation::Avoid, None) => {
                "High risk. Avoid unless you accept likely loss.".to_string()
            }
            (Recommendation::Avoid, Some(category)) => format!(
                "High risk. Avoid: significant {} issues found.",
                category.to_lowercase()
            ),
            (Recommendation::DoNotBuy, None) => {
                "Critical risk. Do not buy this token.".to_string()
            }
            (Recommendation::DoNotBuy, Some(category)) => format!(
                "Critical risk. Do not buy: {} red flags indicate a likely scam.",
                category.to_lowercase()
            ),
        }
    }
}

/// Category weights per report kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightsConfig {
    #[serde(default)]
    pub composite: CompositeWeights,
    #[serde(default)]
    pub security: SecurityWeights,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeWeights {
    pub security: f64,
    pub fundamentals: f64,
    pub technical_analysis: f64,
    pub sentiment: f64,
    pub innovation: f64,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            security: 0.30,
            fundamentals: 0.25,
            technical_analysis: 0.20,
            sentiment: 0.15,
            innovation: 0.10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityWeights {
    pub liquidity: f64,
    pub holders: f64,
    pub market: f64,
    pub trading: f64,
    pub contract: f64,
}

impl Default for SecurityWeights {
    fn default() -> Self {
        Self {
            liquidity: 0.25,
            holders: 0.25,
            market: 0.15,
            trading: 0.20,
            contract: 0.15,
        }
    }
}

const WEIGHT_TOLERANCE: f64 = 1e-9;

impl WeightsConfig {
    pub fn weight(&self, category: Category) -> f64 {
        match category {
            Category::Security => self.composite.security,
            Category::Fundamentals => self.composite.fundamentals,
            Category::TechnicalAnalysis => self.composite.technical_analysis,
            Category::Sentiment => self.composite.sentiment,
            Category::Innovation => self.composite.innovation,
            Category::Liquidity => self.security.liquidity,
            Category::Holders => self.security.holders,
            Category::Market => self.security.market,
            Category::Trading => self.security.trading,
            Category::Contract => self.security.contract,
        }
    }

    pub fn total(&self, kind: ReportKind) -> f64 {
        kind.categories().iter().map(|c| self.weight(*c)).sum()
    }

    /// Each kind's weights lie in `0..=1` and sum to 1.0
    pub fn validate(&self) -> Result<()> {
        for kind in [ReportKind::Composite, ReportKind::Security] {
            for category in kind.categories() {
                let weight = self.weight(*category);
                if !(0.0..=1.0).contains(&weight) {
                    return Err(Error::Config(format!(
                        "{} weight {} outside 0..=1",
                        category, weight
                    )));
                }
            }
            let total = self.total(kind);
            if (total - 1.0).abs() > WEIGHT_TOLERANCE {
                return Err(Error::Config(format!(
                    "{} weights sum to {}, expected 1.0",
                    kind, total
                )));
            }
        }
        Ok(())
    }
}

/// The terminal artifact of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub kind: ReportKind,
    pub token_address: String,
    pub token_symbol: String,
    pub token_name: String,
    pub composite_score: u8,
    pub risk_level: RiskLevel,
    pub recommendation: String,
    pub categories: BTreeMap<Category, CategoryScore>,
    pub red_flags: Vec<Flag>,
    pub green_flags: Vec<Flag>,
    pub analyzed_at: DateTime<Utc>,
    pub analysis_time_ms: u64,
}

impl Report {
    pub fn category(&self, category: Category) -> Option<&CategoryScore> {
        self.categories.get(&category)
    }

    /// Flags whose section matches `section`, red first
    pub fn flags_for_section<'a>(&'a self, section: &'a str) -> impl Iterator<Item = &'a Flag> + 'a {
        self.red_flags
            .iter()
            .chain(self.green_flags.iter())
            .filter(move |f| f.category == section)
    }
}

/// Folds category scores and flags into a [`Report`]
#[derive(Debug, Clone, Default)]
pub struct Aggregator;

impl Aggregator {
    pub fn new() -> Self {
        Self
    }

    /// Weighted composite score in `0..=100`
    pub fn composite_score(&self, kind: ReportKind, scores: &[CategoryScore]) -> Result<u8> {
        let expected = kind.categories();
        if scores.len() != expected.len()
            || !expected
                .iter()
                .all(|category| scores.iter().any(|s| s.category == *category))
        {
            return Err(violation(format!(
                "{} report needs categories {:?}",
                kind, expected
            )));
        }

        let mut total_weight = 0.0;
        let mut composite = 0.0;
        for score in scores {
            if score.max_score == 0 || score.score > score.max_score {
                return Err(violation(format!(
                    "{} scored {} of {}",
                    score.category, score.score, score.max_score
                )));
            }
            if !(0.0..=1.0).contains(&score.weight) {
                return Err(violation(format!(
                    "{} has weight {}",
                    score.category, score.weight
                )));
            }
            total_weight += score.weight;
            composite += score.ratio() * score.weight * 100.0;
        }

        if (total_weight - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(violation(format!(
                "category weights sum to {}, expected 1.0",
                total_weight
            )));
        }

        let rounded = composite.round();
        if !(0.0..=100.0).contains(&rounded) {
            return Err(violation(format!("composite score {} out of range", rounded)));
        }
        Ok(rounded as u8)
    }

    pub fn aggregate(
        &self,
        kind: ReportKind,
        token: &TokenProfile,
        scores: Vec<CategoryScore>,
        flags: FlagSet,
        analyzed_at: DateTime<Utc>,
        analysis_time_ms: u64,
    ) -> Result<Report> {
        let composite_score = self.composite_score(kind, &scores)?;
        let risk_level = RiskLevel::from_score(composite_score);
        let recommendation =
            Recommendation::for_level(risk_level).describe(flags.dominant_red_category());

        info!(
            token = %token.address,
            kind = %kind,
            score = composite_score,
            risk = %risk_level,
            red_flags = flags.red.len(),
            "Report aggregated"
        );

        Ok(Report {
            kind,
            token_address: token.address.to_string(),
            token_symbol: token.symbol.clone(),
            token_name: token.name.clone(),
            composite_score,
            risk_level,
            recommendation,
            categories: scores.into_iter().map(|s| (s.category, s)).collect(),
            red_flags: flags.red,
            green_flags: flags.green,
            analyzed_at,
            analysis_time_ms,
        })
    }
}

fn violation(message: String) -> Error {
    error!(reason = %message, "Aggregation invariant violated");
    Error::AggregationInvariantViolation(message)
}
