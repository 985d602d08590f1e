//! Security report sections: Liquidity, Holders, Market, Trading, Contract

use crate::metrics::MetricsBundle;
use crate::report::RiskLevel;

use super::{Category, ScoreSheet, ScoringInput};

/// What protects the pool's liquidity from being pulled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LpProtection {
    Burned,
    LockedOnly,
    Unprotected,
    Unknown,
}

impl LpProtection {
    pub(crate) fn of(bundle: &MetricsBundle) -> Self {
        match (bundle.lp_burned(), bundle.lp_locked()) {
            (Some(true), _) => LpProtection::Burned,
            (_, Some(true)) => LpProtection::LockedOnly,
            (Some(false), Some(false)) => LpProtection::Unprotected,
            _ => LpProtection::Unknown,
        }
    }
}

/// Share of the top-10 budget lost for a concentration band label
pub(crate) fn concentration_penalty(level: RiskLevel) -> f64 {
    match level {
        RiskLevel::Low => 0.0,
        RiskLevel::Medium => 0.3,
        RiskLevel::High => 0.6,
        RiskLevel::Critical => 1.0,
    }
}

const LIQ_DEPTH: u32 = 10;
const LIQ_PROTECTION: u32 = 15;

pub fn liquidity(input: &ScoringInput<'_>) -> ScoreSheet {
    let bundle = input.bundle;
    let tables = input.tables;
    let mut sheet = ScoreSheet::new(Category::Liquidity);
    let protection = LpProtection::of(bundle);

    if protection == LpProtection::Unprotected {
        sheet.deduct(LIQ_DEPTH, "Liquidity can be withdrawn at any time; depth not credited");
    } else if let Some(sol) = bundle.liquidity_sol() {
        sheet.deduct(
            tables.liquidity_sol.deduction(sol, LIQ_DEPTH),
            format!("Pool liquidity {:.1} SOL", sol),
        );
    } else {
        sheet.tiered(
            bundle.liquidity_usd(),
            &tables.liquidity_usd,
            LIQ_DEPTH,
            "pool liquidity",
            |usd| format!("Pool liquidity ${:.0}", usd),
        );
    }

    match protection {
        LpProtection::Burned => sheet.note("LP tokens burned"),
        LpProtection::LockedOnly => sheet.deduct(5, "LP tokens locked but not burned"),
        LpProtection::Unprotected => {
            sheet.deduct(LIQ_PROTECTION, "LP tokens neither burned nor locked")
        }
        LpProtection::Unknown => sheet.insufficient(LIQ_PROTECTION, "LP burn/lock status"),
    }

    sheet
}

pub fn holders(input: &ScoringInput<'_>) -> ScoreSheet {
    let bundle = input.bundle;
    let tables = input.tables;
    let mut sheet = ScoreSheet::new(Category::Holders);

    sheet.tiered(
        bundle.total_holders().map(|n| n as f64),
        &tables.holder_count,
        5,
        "holder count",
        |n| format!("{:.0} holders", n),
    );

    match (bundle.top10_pct(), bundle.concentration_risk()) {
        (Some(top10), _) => sheet.deduct(
            tables.top10_pct.deduction(top10, 10),
            format!("Top 10 holders own {:.1}%", top10),
        ),
        (None, Some(level)) => sheet.deduct(
            (concentration_penalty(level) * 10.0).round() as u32,
            format!("Holder concentration rated {}", level),
        ),
        (None, None) => sheet.insufficient(10, "holder concentration"),
    }

    sheet.tiered(
        bundle.creator_pct(),
        &tables.creator_pct,
        5,
        "creator holdings",
        |pct| format!("Creator holds {:.1}%", pct),
    );

    match input.signals.bundle_bots {
        Some(0) => sheet.note("No bundled wallets"),
        Some(n) => sheet.deduct(5, format!("{} bundled wallets among holders", n)),
        None => sheet.insufficient(5, "bundled wallet count"),
    }

    sheet
}

pub fn market(input: &ScoringInput<'_>) -> ScoreSheet {
    let bundle = input.bundle;
    let tables = input.tables;
    let mut sheet = ScoreSheet::new(Category::Market);

    sheet.tiered(
        bundle.age_days(),
        &tables.age_days,
        5,
        "token age",
        |days| format!("Token is {:.1} days old", days),
    );
    sheet.risk(
        bundle.pump_and_dump(),
        5,
        "price history",
        "Pump-and-dump price pattern",
        "No pump-and-dump pattern",
    );
    sheet.tiered(
        bundle.volume_h24_usd(),
        &tables.volume_h24_usd,
        5,
        "24h volume",
        |usd| format!("24h volume ${:.0}", usd),
    );

    sheet
}

pub fn trading(input: &ScoringInput<'_>) -> ScoreSheet {
    let bundle = input.bundle;
    let tables = input.tables;
    let signals = input.signals;
    let mut sheet = ScoreSheet::new(Category::Trading);

    sheet.tiered(
        signals.snipers.map(f64::from),
        &tables.sniper_count,
        4,
        "sniper activity",
        |n| format!("{:.0} sniper wallets", n),
    );
    sheet.tiered(
        signals.bundle_bots.map(f64::from),
        &tables.bundle_wallets,
        4,
        "bundle activity",
        |n| format!("{:.0} bundle bot wallets", n),
    );
    sheet.risk(
        signals.wash_trading,
        4,
        "wash trading check",
        "Wash trading detected",
        "No wash trading",
    );
    sheet.risk(
        signals.honeypot,
        6,
        "honeypot check",
        "Honeypot detected",
        "Not a honeypot",
    );
    sheet.tiered(
        bundle.taxes().map(|(_, sell, _)| sell),
        &tables.sell_tax_pct,
        2,
        "sell tax",
        |tax| format!("Sell tax {:.1}%", tax),
    );

    if signals.can_sell == Some(false) {
        sheet.zero_out("Can sell: NO, trading budget forfeited");
    }

    sheet
}

pub fn contract(input: &ScoringInput<'_>) -> ScoreSheet {
    let bundle = input.bundle;
    let mut sheet = ScoreSheet::new(Category::Contract);

    sheet.risk(
        bundle.renounced().map(|r| !r),
        3,
        "ownership status",
        "Ownership not renounced",
        "Ownership renounced",
    );
    sheet.risk(
        bundle.verified().map(|v| !v),
        2,
        "verification status",
        "Contract not verified",
        "Contract verified",
    );
    sheet.risk(
        bundle.has_blacklist(),
        3,
        "blacklist check",
        "Blacklist function present",
        "No blacklist",
    );
    sheet.risk(
        bundle.has_whitelist(),
        1,
        "whitelist check",
        "Whitelist function present",
        "No whitelist",
    );
    sheet.risk(
        bundle.is_proxy(),
        2,
        "proxy check",
        "Upgradeable proxy contract",
        "Not a proxy",
    );
    sheet.risk(
        bundle.is_mintable(),
        4,
        "mint authority",
        "Supply is mintable",
        "Supply is fixed",
    );

    sheet
}
