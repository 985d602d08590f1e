//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::detectors::DetectorConfig;
use crate::flags::FlagThresholds;
use crate::metrics::NormalizerConfig;
use crate::report::WeightsConfig;
use crate::scoring::{ReportKind, ScoringConfig};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    #[serde(default)]
    pub detectors: DetectorConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub flags: FlagThresholds,
    #[serde(default)]
    pub weights: WeightsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Run-level settings
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub report_kind: ReportKind,

    /// Default caller deadline for source collection (ms)
    #[serde(default = "default_collection_deadline_ms")]
    pub collection_deadline_ms: u64,

    /// Timeout for a single collector (ms)
    #[serde(default = "default_source_timeout_ms")]
    pub source_timeout_ms: u64,
}

fn default_collection_deadline_ms() -> u64 {
    5_000
}

fn default_source_timeout_ms() -> u64 {
    3_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            report_kind: ReportKind::default(),
            collection_deadline_ms: default_collection_deadline_ms(),
            source_timeout_ms: default_source_timeout_ms(),
        }
    }
}

impl EngineConfig {
    pub fn collection_deadline(&self) -> Duration {
        Duration::from_millis(self.collection_deadline_ms)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.source_timeout_ms)
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("engine.report_kind", ReportKind::default().as_str())?
            .set_default(
                "engine.collection_deadline_ms",
                default_collection_deadline_ms() as i64,
            )?
            .set_default("engine.source_timeout_ms", default_source_timeout_ms() as i64)?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix RISK_)
            .add_source(
                config::Environment::with_prefix("RISK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.engine.collection_deadline_ms == 0 {
            anyhow::bail!("collection_deadline_ms must be positive");
        }
        if self.engine.source_timeout_ms == 0 {
            anyhow::bail!("source_timeout_ms must be positive");
        }

        let n = &self.normalizer;
        if !(n.concentration_medium_pct < n.concentration_high_pct
            && n.concentration_high_pct < n.concentration_critical_pct)
        {
            anyhow::bail!("concentration bands must be strictly increasing (medium < high < critical)");
        }
        if n.pump_threshold_pct <= 0.0 || n.dump_threshold_pct >= 0.0 {
            anyhow::bail!("pump_threshold_pct must be positive and dump_threshold_pct negative");
        }

        let d = &self.detectors;
        if d.bundle.min_cluster_size < 2 {
            anyhow::bail!("bundle.min_cluster_size must be at least 2");
        }
        if !(0.0..1.0).contains(&d.bundle.amount_variance) {
            anyhow::bail!("bundle.amount_variance must be in [0, 1)");
        }
        if d.sniper.window_blocks == 0 {
            anyhow::bail!("sniper.window_blocks must be positive");
        }
        if d.wash_trading.lookback_hours == 0 {
            anyhow::bail!("wash_trading.lookback_hours must be positive");
        }
        if d.wash_trading.max_cycle_len < 2 {
            anyhow::bail!("wash_trading.max_cycle_len must be at least 2");
        }
        if d.wash_trading.volume_liquidity_ratio <= 0.0 {
            anyhow::bail!("wash_trading.volume_liquidity_ratio must be positive");
        }
        if d.honeypot.sell_tax_ceiling_pct <= 0.0 || d.honeypot.sell_tax_ceiling_pct > 100.0 {
            anyhow::bail!("honeypot.sell_tax_ceiling_pct must be between 0 and 100");
        }
        if d.honeypot.min_buy_sol < 0.0 {
            anyhow::bail!("honeypot.min_buy_sol cannot be negative");
        }
        if d.honeypot.min_failed_sells == 0 {
            anyhow::bail!("honeypot.min_failed_sells must be at least 1");
        }

        self.scoring.validate().context("Invalid scoring table")?;
        self.weights.validate().context("Invalid category weights")?;

        let f = &self.flags;
        if f.low_liquidity_usd > f.deep_liquidity_usd {
            anyhow::bail!("flags.low_liquidity_usd cannot exceed flags.deep_liquidity_usd");
        }
        if f.healthy_top10_pct > f.top10_concentration_pct {
            anyhow::bail!("flags.healthy_top10_pct cannot exceed flags.top10_concentration_pct");
        }
        if f.few_holders > f.broad_holders {
            anyhow::bail!("flags.few_holders cannot exceed flags.broad_holders");
        }
        if f.new_token_days > f.established_days {
            anyhow::bail!("flags.new_token_days cannot exceed flags.established_days");
        }
        if !(0.0..=100.0).contains(&f.weak_category_pct) {
            anyhow::bail!("flags.weak_category_pct must be between 0 and 100");
        }

        if self.cache.max_entries == 0 {
            anyhow::bail!("cache.max_entries must be positive");
        }

        Ok(())
    }

    /// Human-readable view for the CLI
    pub fn summary(&self) -> String {
        let w = &self.weights;
        format!(
            r#"Configuration:
  Engine:
    report_kind: {}
    collection_deadline: {}ms
    source_timeout: {}ms
  Detectors:
    bundle: min_cluster_size={} amount_variance={}
    sniper: window_blocks={}
    wash_trading: lookback={}h max_cycle_len={} volume/liquidity={}
    honeypot: sell_tax_ceiling={}% min_buy={} SOL min_failed_sells={}
  Weights:
    composite: security={} fundamentals={} technical={} sentiment={} innovation={}
    security: liquidity={} holders={} market={} trading={} contract={}
  Flags:
    low_liquidity: ${}
    high_sell_tax: {}%
    top10_concentration: {}%
  Cache:
    ttl: {}s
    max_entries: {}"#,
            self.engine.report_kind,
            self.engine.collection_deadline_ms,
            self.engine.source_timeout_ms,
            self.detectors.bundle.min_cluster_size,
            self.detectors.bundle.amount_variance,
            self.detectors.sniper.window_blocks,
            self.detectors.wash_trading.lookback_hours,
            self.detectors.wash_trading.max_cycle_len,
            self.detectors.wash_trading.volume_liquidity_ratio,
            self.detectors.honeypot.sell_tax_ceiling_pct,
            self.detectors.honeypot.min_buy_sol,
            self.detectors.honeypot.min_failed_sells,
            w.composite.security,
            w.composite.fundamentals,
            w.composite.technical_analysis,
            w.composite.sentiment,
            w.composite.innovation,
            w.security.liquidity,
            w.security.holders,
            w.security.market,
            w.security.trading,
            w.security.contract,
            self.flags.low_liquidity_usd,
            self.flags.high_sell_tax_pct,
            self.flags.top10_concentration_pct,
            self.cache.ttl_secs,
            self.cache.max_entries,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    // Loading reads the process environment; keep env-mutating tests apart
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn env_guard() -> std::sync::MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.engine.report_kind, ReportKind::Composite);
        assert_eq!(config.engine.collection_deadline_ms, 5_000);
        assert_eq!(config.cache.ttl_secs, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[engine]
report_kind = "security"
source_timeout_ms = 1500

[detectors.sniper]
window_blocks = 5

[weights.security]
liquidity = 0.30
holders = 0.20
"#
        )
        .unwrap();

        let _guard = env_guard();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.engine.report_kind, ReportKind::Security);
        assert_eq!(config.engine.source_timeout_ms, 1_500);
        assert_eq!(config.engine.collection_deadline_ms, 5_000);
        assert_eq!(config.detectors.sniper.window_blocks, 5);
        assert_eq!(config.weights.security.liquidity, 0.30);
        // Untouched sections keep their defaults
        assert_eq!(config.detectors.bundle.min_cluster_size, 3);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let _guard = env_guard();
        let config = Config::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.detectors.honeypot.sell_tax_ceiling_pct, 95.0);
    }

    #[test]
    fn test_env_override() {
        let _guard = env_guard();
        std::env::set_var("RISK_CACHE__MAX_ENTRIES", "42");
        std::env::set_var("RISK_ENGINE__REPORT_KIND", "security");
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.toml"));
        std::env::remove_var("RISK_CACHE__MAX_ENTRIES");
        std::env::remove_var("RISK_ENGINE__REPORT_KIND");

        let config = config.unwrap();
        assert_eq!(config.cache.max_entries, 42);
        assert_eq!(config.engine.report_kind, ReportKind::Security);
    }

    #[test]
    fn test_rejects_bad_weights() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[weights.composite]\nsecurity = 0.9").unwrap();

        let _guard = env_guard();
        let err = Config::load(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("weights"));
    }

    #[test]
    fn test_rejects_non_monotone_table() {
        let mut config = Config::default();
        config.scoring.liquidity_sol = crate::scoring::TierTable::higher_is_better(
            &[(100.0, 0.0), (500.0, 0.2)],
            1.0,
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_detector_params() {
        let mut config = Config::default();
        config.detectors.wash_trading.max_cycle_len = 1;
        assert!(config.validate().is_err());
    }
}
