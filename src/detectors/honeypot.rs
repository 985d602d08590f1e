//! Honeypot detection
//!
//! Consumes the pre-computed sell simulation (round trip plus taxes) and, when
//! present, the trade history:
//! - a non-trivial buy that succeeds while the matching sell fails
//! - an effective sell tax above the hard ceiling
//! - repeated failed sells with no successful sell after buys went through

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::types::{Transaction, TxKind};
use super::{validate_history, Detection};
use crate::error::Result;
use crate::metrics::MetricsBundle;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoneypotConfig {
    /// Sell tax above this is treated as a honeypot
    #[serde(default = "default_sell_tax_ceiling_pct")]
    pub sell_tax_ceiling_pct: f64,

    /// Simulated buys smaller than this don't count
    #[serde(default = "default_min_buy_sol")]
    pub min_buy_sol: f64,

    /// Failed sells in history needed to call it blocked
    #[serde(default = "default_min_failed_sells")]
    pub min_failed_sells: u32,
}

fn default_sell_tax_ceiling_pct() -> f64 {
    95.0
}
fn default_min_buy_sol() -> f64 {
    0.01
}
fn default_min_failed_sells() -> u32 {
    3
}

impl Default for HoneypotConfig {
    fn default() -> Self {
        Self {
            sell_tax_ceiling_pct: default_sell_tax_ceiling_pct(),
            min_buy_sol: default_min_buy_sol(),
            min_failed_sells: default_min_failed_sells(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HoneypotFindings {
    pub honeypot: bool,
    /// None when neither the simulation nor history says anything about selling
    pub can_sell: Option<bool>,
    pub buy_tax_pct: Option<f64>,
    pub sell_tax_pct: Option<f64>,
    pub transfer_tax_pct: Option<f64>,
    pub failed_sells: u32,
    pub successful_sells: u32,
    /// Why the token was marked a honeypot, empty when it wasn't
    pub reasons: Vec<String>,
}

/// Buy/sell outcome counts from history
#[derive(Debug, Default)]
struct TradeCounts {
    buys: u32,
    failed_sells: u32,
    successful_sells: u32,
}

impl TradeCounts {
    fn from_history(history: &[Transaction]) -> Self {
        let mut counts = Self::default();
        for tx in history {
            match (tx.kind, tx.success) {
                (TxKind::Buy, true) => counts.buys += 1,
                (TxKind::Sell, true) => counts.successful_sells += 1,
                (TxKind::Sell, false) => counts.failed_sells += 1,
                _ => {}
            }
        }
        counts
    }

    fn is_empty(&self) -> bool {
        self.buys == 0 && self.failed_sells == 0 && self.successful_sells == 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct HoneypotDetector {
    config: HoneypotConfig,
}

impl HoneypotDetector {
    pub fn new(config: HoneypotConfig) -> Self {
        Self { config }
    }

    pub fn detect(
        &self,
        bundle: &MetricsBundle,
        history: Option<&[Transaction]>,
    ) -> Result<Detection<HoneypotFindings>> {
        let counts = match history {
            Some(history) => {
                validate_history(
                    "honeypot",
                    history
                        .iter()
                        .filter(|tx| matches!(tx.kind, TxKind::Buy | TxKind::Sell)),
                )?;
                TradeCounts::from_history(history)
            }
            None => TradeCounts::default(),
        };

        let round_trip = bundle.simulated_round_trip();
        let taxes = bundle.taxes();

        if round_trip.is_none() && taxes.is_none() && counts.is_empty() {
            return Ok(Detection::not_evaluated("no sell simulation or trade history"));
        }

        let mut reasons = Vec::new();
        let mut can_sell = None;

        if let Some((amount, buy_ok, sell_ok)) = round_trip {
            can_sell = Some(sell_ok);
            if buy_ok && !sell_ok && amount >= self.config.min_buy_sol {
                reasons.push(format!("simulated sell of {:.4} SOL buy failed", amount));
            }
        }

        if let Some((_, sell_tax, _)) = taxes {
            if sell_tax > self.config.sell_tax_ceiling_pct {
                reasons.push(format!(
                    "sell tax {:.1}% exceeds {:.0}% ceiling",
                    sell_tax, self.config.sell_tax_ceiling_pct
                ));
            }
        }

        if counts.buys > 0
            && counts.successful_sells == 0
            && counts.failed_sells >= self.config.min_failed_sells
        {
            can_sell = Some(false);
            reasons.push(format!(
                "{} failed sells and no successful sell",
                counts.failed_sells
            ));
        } else if counts.successful_sells > 0 && can_sell.is_none() {
            can_sell = Some(true);
        }

        let honeypot = !reasons.is_empty();
        if honeypot {
            warn!(
                token = %bundle.token.address.short(),
                reasons = ?reasons,
                "Honeypot detected"
            );
        } else {
            debug!(token = %bundle.token.address.short(), "Honeypot check passed");
        }

        Ok(Detection::Evaluated(HoneypotFindings {
            honeypot,
            can_sell,
            buy_tax_pct: taxes.map(|t| t.0),
            sell_tax_pct: taxes.map(|t| t.1),
            transfer_tax_pct: taxes.map(|t| t.2),
            failed_sells: counts.failed_sells,
            successful_sells: counts.successful_sells,
            reasons,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::fixtures;
    use chrono::Utc;

    fn findings(bundle: &MetricsBundle, history: Option<&[Transaction]>) -> HoneypotFindings {
        HoneypotDetector::default()
            .detect(bundle, history)
            .unwrap()
            .evaluated()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_clean_simulation() {
        let bundle = fixtures::bundle(fixtures::clean_sources());
        let found = findings(&bundle, None);
        assert!(!found.honeypot);
        assert_eq!(found.can_sell, Some(true));
        assert_eq!(found.sell_tax_pct, Some(0.0));
        assert!(found.reasons.is_empty());
    }

    #[test]
    fn test_failed_sell_and_confiscatory_tax() {
        let bundle = fixtures::bundle(fixtures::trading_risk_sources());
        let found = findings(&bundle, None);
        assert!(found.honeypot);
        assert_eq!(found.can_sell, Some(false));
        assert_eq!(found.reasons.len(), 2);
    }

    #[test]
    fn test_history_with_blocked_sells() {
        let bundle = fixtures::bundle(vec![]);
        let now = Utc::now();
        let history = vec![
            Transaction::new(TxKind::Buy, "w1", 1, now).amount(1.0),
            Transaction::new(TxKind::Sell, "w1", 2, now).failed(),
            Transaction::new(TxKind::Sell, "w2", 3, now).failed(),
            Transaction::new(TxKind::Sell, "w3", 4, now).failed(),
        ];

        let found = findings(&bundle, Some(&history));
        assert!(found.honeypot);
        assert_eq!(found.can_sell, Some(false));
        assert_eq!(found.failed_sells, 3);
        assert_eq!(found.sell_tax_pct, None);
    }

    #[test]
    fn test_one_good_sell_clears_history() {
        let bundle = fixtures::bundle(vec![]);
        let now = Utc::now();
        let history = vec![
            Transaction::new(TxKind::Buy, "w1", 1, now).amount(1.0),
            Transaction::new(TxKind::Sell, "w1", 2, now).failed(),
            Transaction::new(TxKind::Sell, "w2", 3, now).failed(),
            Transaction::new(TxKind::Sell, "w3", 4, now).failed(),
            Transaction::new(TxKind::Sell, "w4", 5, now).amount(0.5),
        ];

        let found = findings(&bundle, Some(&history));
        assert!(!found.honeypot);
        assert_eq!(found.can_sell, Some(true));
    }

    #[test]
    fn test_buys_alone_say_nothing_about_selling() {
        let bundle = fixtures::bundle(vec![]);
        let history = vec![Transaction::new(TxKind::Buy, "w1", 1, Utc::now()).amount(1.0)];

        let found = findings(&bundle, Some(&history));
        assert!(!found.honeypot);
        assert_eq!(found.can_sell, None);
    }

    #[test]
    fn test_taxes_alone_leave_sellability_open() {
        let sim = crate::metrics::sources::SimulationPayload {
            sell_tax_pct: Some(5.0),
            ..Default::default()
        };
        let bundle = fixtures::bundle(vec![crate::metrics::SourcePayload::Simulation(sim)]);

        let found = findings(&bundle, None);
        assert_eq!(found.can_sell, None);
        assert_eq!(found.sell_tax_pct, Some(5.0));
    }

    #[test]
    fn test_nothing_to_go_on() {
        let bundle = fixtures::bundle(vec![]);
        let detection = HoneypotDetector::default().detect(&bundle, Some(&[])).unwrap();
        assert!(!detection.is_evaluated());
    }
}
