//! Metrics normalizer
//!
//! Merges whatever source payloads arrived into one [`MetricsBundle`].
//! Missing sources never fail the run; only a malformed token identifier does.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::sources::{HolderPayload, MarketPayload, RugCheckPayload, SimulationPayload, SourcePayload, SourceSet};
use super::{MetricField, MetricsBundle, TokenProfile};
use crate::error::Result;
use crate::report::RiskLevel;
use crate::token::TokenId;

/// Symbol used when no source names the token
pub const UNKNOWN_SYMBOL: &str = "UNKNOWN";
/// Name used when no source names the token
pub const UNKNOWN_NAME: &str = "Unknown Token";

/// Normalizer tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// 24h gain (%) at or above which a subsequent dump counts as pump-and-dump
    #[serde(default = "default_pump_threshold_pct")]
    pub pump_threshold_pct: f64,

    /// 1h change (%) at or below which the pump counts as dumped
    #[serde(default = "default_dump_threshold_pct")]
    pub dump_threshold_pct: f64,

    /// Top-10 share (%) above which concentration is Medium
    #[serde(default = "default_concentration_medium_pct")]
    pub concentration_medium_pct: f64,

    /// Top-10 share (%) above which concentration is High
    #[serde(default = "default_concentration_high_pct")]
    pub concentration_high_pct: f64,

    /// Top-10 share (%) above which concentration is Critical
    #[serde(default = "default_concentration_critical_pct")]
    pub concentration_critical_pct: f64,
}

fn default_pump_threshold_pct() -> f64 {
    100.0
}
fn default_dump_threshold_pct() -> f64 {
    -30.0
}
fn default_concentration_medium_pct() -> f64 {
    30.0
}
fn default_concentration_high_pct() -> f64 {
    50.0
}
fn default_concentration_critical_pct() -> f64 {
    70.0
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            pump_threshold_pct: default_pump_threshold_pct(),
            dump_threshold_pct: default_dump_threshold_pct(),
            concentration_medium_pct: default_concentration_medium_pct(),
            concentration_high_pct: default_concentration_high_pct(),
            concentration_critical_pct: default_concentration_critical_pct(),
        }
    }
}

impl NormalizerConfig {
    /// Concentration band for a top-10 holder share
    pub fn concentration_band(&self, top10_pct: f64) -> RiskLevel {
        if top10_pct > self.concentration_critical_pct {
            RiskLevel::Critical
        } else if top10_pct > self.concentration_high_pct {
            RiskLevel::High
        } else if top10_pct > self.concentration_medium_pct {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Builds [`MetricsBundle`]s from raw payloads
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// Normalize against the current time
    pub fn normalize(&self, token_id: &str, sources: Vec<SourcePayload>) -> Result<MetricsBundle> {
        self.normalize_at(token_id, sources, Utc::now())
    }

    /// Normalize with an explicit clock, used for token age
    pub fn normalize_at(
        &self,
        token_id: &str,
        sources: Vec<SourcePayload>,
        now: DateTime<Utc>,
    ) -> Result<MetricsBundle> {
        let token = TokenId::parse(token_id)?;
        let set = SourceSet::from_payloads(sources);
        Ok(self.normalize_set(token, &set, now))
    }

    /// Normalize an already-sorted source set
    pub fn normalize_set(&self, token: TokenId, set: &SourceSet, now: DateTime<Utc>) -> MetricsBundle {
        let market = set.market.as_present();
        let rugcheck = set.rugcheck.as_present();

        let symbol = market
            .and_then(|m| m.symbol.clone())
            .or_else(|| rugcheck.and_then(|r| r.symbol.clone()))
            .unwrap_or_else(|| UNKNOWN_SYMBOL.to_string());
        let name = market
            .and_then(|m| m.name.clone())
            .or_else(|| rugcheck.and_then(|r| r.name.clone()))
            .unwrap_or_else(|| UNKNOWN_NAME.to_string());

        let mut bundle = MetricsBundle::empty(TokenProfile {
            address: token,
            symbol,
            name,
        });

        if let Some(payload) = market {
            self.apply_market(&mut bundle, payload, now);
        }
        if let Some(payload) = set.holders.as_present() {
            self.apply_holders(&mut bundle, payload);
        }
        if let Some(payload) = rugcheck {
            self.apply_rugcheck(&mut bundle, payload);
        }
        if let Some(payload) = set.simulation.as_present() {
            self.apply_simulation(&mut bundle, payload);
        }

        let missing = set.missing();
        if !missing.is_empty() {
            warn!(
                token = %bundle.token.address.short(),
                missing = ?missing,
                "Sources unavailable, affected metrics marked insufficient"
            );
        }
        debug!(
            token = %bundle.token.address.short(),
            available_fields = bundle.availability.len(),
            "Metrics normalized"
        );

        bundle
    }

    fn apply_market(&self, bundle: &mut MetricsBundle, payload: &MarketPayload, now: DateTime<Utc>) {
        let availability = &mut bundle.availability;

        if let Some(sol) = non_negative(payload.liquidity_native, "liquidity_native") {
            bundle.liquidity.total_liquidity_sol = sol;
            availability.mark(MetricField::LiquiditySol);
        }
        if let Some(usd) = non_negative(payload.liquidity_usd, "liquidity_usd") {
            bundle.liquidity.total_liquidity_usd = usd;
            availability.mark(MetricField::LiquidityUsd);
        }
        if let Some(created) = payload.pair_created_at {
            let age_secs = (now - created).num_seconds().max(0);
            bundle.market.age_days = age_secs as f64 / 86_400.0;
            availability.mark(MetricField::AgeDays);
        }
        if let Some(volume) = non_negative(payload.volume_h24_usd, "volume_h24_usd") {
            bundle.market.volume_h24_usd = volume;
            availability.mark(MetricField::VolumeH24Usd);
        }

        let h1 = finite(payload.price_change_h1, "price_change_h1");
        let h24 = finite(payload.price_change_h24, "price_change_h24");
        if let Some(h1) = h1 {
            bundle.market.price_change_h1 = h1;
            availability.mark(MetricField::PriceChangeH1);
        }
        if let Some(h24) = h24 {
            bundle.market.price_change_h24 = h24;
            availability.mark(MetricField::PriceChangeH24);
        }
        if let (Some(h1), Some(h24)) = (h1, h24) {
            bundle.market.pump_and_dump =
                h24 >= self.config.pump_threshold_pct && h1 <= self.config.dump_threshold_pct;
            availability.mark(MetricField::PumpAndDump);
        }

        if let (Some(buys), Some(sells)) = (payload.buys_h24, payload.sells_h24) {
            bundle.market.buys_h24 = buys;
            bundle.market.sells_h24 = sells;
            availability.mark(MetricField::TxnCountsH24);
        }
        if let Some(cap) = non_negative(payload.market_cap_usd, "market_cap_usd") {
            bundle.market.market_cap_usd = cap;
            availability.mark(MetricField::MarketCapUsd);
        }

        if payload.websites.is_some() || payload.socials.is_some() {
            bundle.market.website_count = payload.websites.as_ref().map_or(0, Vec::len) as u32;
            bundle.market.social_count = payload.socials.as_ref().map_or(0, Vec::len) as u32;
            availability.mark(MetricField::LinkCounts);
        }
    }

    fn apply_holders(&self, bundle: &mut MetricsBundle, payload: &HolderPayload) {
        let availability = &mut bundle.availability;

        if let Some(total) = payload.total_holders {
            bundle.holders.total_holders = total;
            availability.mark(MetricField::TotalHolders);
        }

        let top10 = payload.top_holder_pcts.as_ref().and_then(|pcts| {
            if pcts.iter().any(|p| !p.is_finite() || *p < 0.0) {
                warn!("Holder percentages contain invalid values, ignoring");
                return None;
            }
            Some(pcts.iter().take(10).sum::<f64>().min(100.0))
        });
        if let Some(top10) = top10 {
            bundle.holders.top10_pct = top10;
            availability.mark(MetricField::Top10Pct);
        }

        if let Some(creator) = non_negative(payload.creator_pct, "creator_pct") {
            bundle.holders.creator_pct = creator.min(100.0);
            availability.mark(MetricField::CreatorPct);
        }

        // Upstream label wins; otherwise derive from the top-10 share
        let band = payload
            .concentration_risk
            .as_deref()
            .and_then(RiskLevel::from_label)
            .or_else(|| top10.map(|pct| self.config.concentration_band(pct)));
        if let Some(band) = band {
            bundle.holders.concentration_risk = band;
            availability.mark(MetricField::ConcentrationRisk);
        }

        if let Some(bundles) = payload.bundle_wallets {
            bundle.trading.bundle_bots = bundles;
            availability.mark(MetricField::BundleBots);
        }
        if let Some(snipers) = payload.sniper_wallets {
            bundle.trading.snipers = snipers;
            availability.mark(MetricField::Snipers);
        }
    }

    fn apply_rugcheck(&self, bundle: &mut MetricsBundle, payload: &RugCheckPayload) {
        let availability = &mut bundle.availability;

        // Upstream reports revoked authorities as null; a missing key says nothing
        let held = |authority: &Option<Option<String>>| authority.as_ref().map(Option::is_some);
        let renounced = payload.owner_renounced.or_else(|| {
            match (held(&payload.mint_authority), held(&payload.freeze_authority)) {
                (Some(true), _) | (_, Some(true)) => Some(false),
                (Some(false), Some(false)) => Some(true),
                _ => None,
            }
        });
        if let Some(renounced) = renounced {
            bundle.contract.renounced = renounced;
            availability.mark(MetricField::Renounced);
        }

        let mintable = payload.is_mintable.or_else(|| held(&payload.mint_authority));
        if let Some(mintable) = mintable {
            bundle.contract.is_mintable = mintable;
            availability.mark(MetricField::IsMintable);
        }

        let flags = [
            (payload.verified, MetricField::Verified),
            (payload.has_blacklist, MetricField::HasBlacklist),
            (payload.has_whitelist, MetricField::HasWhitelist),
            (payload.is_proxy, MetricField::IsProxy),
            (payload.lp_burned, MetricField::LpBurned),
            (payload.lp_locked, MetricField::LpLocked),
            (payload.wash_trading, MetricField::WashTrading),
            (payload.honeypot, MetricField::HoneypotDetected),
        ];
        for (value, field) in flags {
            let Some(value) = value else { continue };
            match field {
                MetricField::Verified => bundle.contract.verified = value,
                MetricField::HasBlacklist => bundle.contract.has_blacklist = value,
                MetricField::HasWhitelist => bundle.contract.has_whitelist = value,
                MetricField::IsProxy => bundle.contract.is_proxy = value,
                MetricField::LpBurned => bundle.liquidity.lp_burned = value,
                MetricField::LpLocked => bundle.liquidity.lp_locked = value,
                MetricField::WashTrading => bundle.trading.wash_trading = value,
                MetricField::HoneypotDetected => bundle.trading.honeypot_detected = value,
                _ => continue,
            }
            availability.mark(field);
        }
    }

    fn apply_simulation(&self, bundle: &mut MetricsBundle, payload: &SimulationPayload) {
        let availability = &mut bundle.availability;

        if let (Some(buy_ok), Some(sell_ok)) = (payload.buy_success, payload.sell_success) {
            bundle.simulation.buy_amount_sol =
                non_negative(payload.buy_amount_sol, "buy_amount_sol").unwrap_or(0.0);
            bundle.simulation.buy_succeeded = buy_ok;
            bundle.simulation.sell_succeeded = sell_ok;
            availability.mark(MetricField::BuyOutcome);
        }

        if let Some(sell_ok) = payload.sell_success {
            bundle.trading.can_sell = sell_ok;
            availability.mark(MetricField::CanSell);
        }

        let sell_tax = non_negative(payload.sell_tax_pct, "sell_tax_pct");
        if let Some(sell_tax) = sell_tax {
            // Unreported buy/transfer taxes are taken as zero once a sell tax is known
            bundle.simulation.sell_tax_pct = sell_tax.min(100.0);
            bundle.simulation.buy_tax_pct = non_negative(payload.buy_tax_pct, "buy_tax_pct")
                .unwrap_or(0.0)
                .min(100.0);
            bundle.simulation.transfer_tax_pct =
                non_negative(payload.transfer_tax_pct, "transfer_tax_pct")
                    .unwrap_or(0.0)
                    .min(100.0);
            availability.mark(MetricField::Taxes);
        }

        bundle.simulation.max_tx_amount = non_negative(payload.max_tx_amount, "max_tx_amount");
        bundle.simulation.max_wallet_amount =
            non_negative(payload.max_wallet_amount, "max_wallet_amount");
        availability.mark(MetricField::TxLimits);
    }
}

fn finite(value: Option<f64>, field: &str) -> Option<f64> {
    match value {
        Some(v) if v.is_finite() => Some(v),
        Some(v) => {
            warn!(field = field, value = v, "Non-finite metric ignored");
            None
        }
        None => None,
    }
}

fn non_negative(value: Option<f64>, field: &str) -> Option<f64> {
    match finite(value, field) {
        Some(v) if v >= 0.0 => Some(v),
        Some(v) => {
            warn!(field = field, value = v, "Negative metric ignored");
            None
        }
        None => None,
    }
}
