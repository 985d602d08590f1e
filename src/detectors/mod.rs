//! Pattern detectors
//!
//! Four independent, stateless detectors run over the normalized bundle and
//! the optional transaction history:
//! - bundled wallets (common funding + same-slot buys)
//! - snipers (first buy within a few blocks of pool creation)
//! - wash trading (circular transfers against pool liquidity)
//! - honeypot (sell simulation / failed sells / confiscatory sell tax)
//!
//! A detector whose input is missing reports [`Detection::NotEvaluated`],
//! never a clean result. A detector that fails is downgraded the same way and
//! the rest of the run continues.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::metrics::MetricsBundle;

pub mod bundled;
pub mod honeypot;
pub mod sniper;
pub mod types;
pub mod wash_trading;

pub use bundled::{BundleCluster, BundleConfig, BundleDetector, BundleFindings};
pub use honeypot::{HoneypotConfig, HoneypotDetector, HoneypotFindings};
pub use sniper::{SniperConfig, SniperDetector, SniperFindings};
pub use types::{Transaction, TxKind};
pub use wash_trading::{WashTradingConfig, WashTradingDetector, WashTradingFindings};

/// Outcome of one detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Detection<T> {
    Evaluated(T),
    NotEvaluated { reason: String },
}

impl<T> Detection<T> {
    pub fn not_evaluated(reason: impl Into<String>) -> Self {
        Detection::NotEvaluated {
            reason: reason.into(),
        }
    }

    pub fn evaluated(&self) -> Option<&T> {
        match self {
            Detection::Evaluated(findings) => Some(findings),
            Detection::NotEvaluated { .. } => None,
        }
    }

    pub fn is_evaluated(&self) -> bool {
        matches!(self, Detection::Evaluated(_))
    }
}

/// Detector tuning
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectorConfig {
    #[serde(default)]
    pub bundle: BundleConfig,
    #[serde(default)]
    pub sniper: SniperConfig,
    #[serde(default)]
    pub wash_trading: WashTradingConfig,
    #[serde(default)]
    pub honeypot: HoneypotConfig,
}

/// Combined output of all detectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorResults {
    pub bundles: Detection<BundleFindings>,
    pub snipers: Detection<SniperFindings>,
    pub wash_trading: Detection<WashTradingFindings>,
    pub honeypot: Detection<HoneypotFindings>,
}

impl DetectorResults {
    /// Every detector skipped
    pub fn not_evaluated(reason: &str) -> Self {
        Self {
            bundles: Detection::not_evaluated(reason),
            snipers: Detection::not_evaluated(reason),
            wash_trading: Detection::not_evaluated(reason),
            honeypot: Detection::not_evaluated(reason),
        }
    }

    pub fn evaluated_count(&self) -> usize {
        [
            self.bundles.is_evaluated(),
            self.snipers.is_evaluated(),
            self.wash_trading.is_evaluated(),
            self.honeypot.is_evaluated(),
        ]
        .into_iter()
        .filter(|e| *e)
        .count()
    }
}

/// Runs all detectors over one bundle
#[derive(Debug, Clone, Default)]
pub struct Detectors {
    bundle: BundleDetector,
    sniper: SniperDetector,
    wash_trading: WashTradingDetector,
    honeypot: HoneypotDetector,
}

impl Detectors {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            bundle: BundleDetector::new(config.bundle),
            sniper: SniperDetector::new(config.sniper),
            wash_trading: WashTradingDetector::new(config.wash_trading),
            honeypot: HoneypotDetector::new(config.honeypot),
        }
    }

    /// Run every detector. Individual failures become `NotEvaluated`.
    pub fn run(&self, bundle: &MetricsBundle, history: Option<&[Transaction]>) -> DetectorResults {
        let results = DetectorResults {
            bundles: absorb("bundle", self.bundle.detect(history)),
            snipers: absorb("sniper", self.sniper.detect(history)),
            wash_trading: absorb("wash_trading", self.wash_trading.detect(bundle, history)),
            honeypot: absorb("honeypot", self.honeypot.detect(bundle, history)),
        };

        debug!(
            token = %bundle.token.address.short(),
            evaluated = results.evaluated_count(),
            "Detectors finished"
        );

        results
    }
}

fn absorb<T>(detector: &str, outcome: Result<Detection<T>>) -> Detection<T> {
    match outcome {
        Ok(detection) => detection,
        Err(e) => {
            warn!(detector = detector, error = %e, "Detector failed, marking not evaluated");
            Detection::not_evaluated(format!("detector failed: {}", e))
        }
    }
}

/// Reject history records no detector can reason about
pub(crate) fn validate_history<'a>(
    detector: &str,
    records: impl IntoIterator<Item = &'a Transaction>,
) -> Result<()> {
    for tx in records {
        if !tx.amount_sol.is_finite() || tx.amount_sol < 0.0 {
            return Err(crate::error::Error::detector(
                detector,
                format!("transaction {} has invalid amount {}", tx.signature, tx.amount_sol),
            ));
        }
    }
    Ok(())
}
