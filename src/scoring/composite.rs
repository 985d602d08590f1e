//! Composite report categories
//!
//! Security, Fundamentals, Technical Analysis, Sentiment and Innovation, each
//! with a 100 point budget split across its rules.

use super::security_report::{concentration_penalty, LpProtection};
use super::{Category, ScoreSheet, ScoringInput};

pub fn security(input: &ScoringInput<'_>) -> ScoreSheet {
    let bundle = input.bundle;
    let signals = input.signals;
    let mut sheet = ScoreSheet::new(Category::Security);

    sheet.risk(
        bundle.is_mintable(),
        20,
        "mint authority",
        "Mint authority active, supply can be inflated",
        "Mint authority revoked",
    );
    sheet.risk(
        bundle.renounced().map(|r| !r),
        15,
        "ownership status",
        "Ownership not renounced",
        "Ownership renounced",
    );
    sheet.risk(
        bundle.has_blacklist(),
        15,
        "blacklist check",
        "Contract can blacklist holders",
        "No blacklist",
    );
    sheet.risk(
        bundle.is_proxy(),
        10,
        "proxy check",
        "Upgradeable proxy contract",
        "Not a proxy",
    );
    sheet.risk(
        bundle.verified().map(|v| !v),
        10,
        "verification status",
        "Contract not verified",
        "Contract verified",
    );

    // A failed sell is as bad as a confirmed honeypot
    let trapped = match (signals.honeypot, signals.can_sell) {
        (Some(true), _) | (_, Some(false)) => Some(true),
        (Some(false), _) | (_, Some(true)) => Some(false),
        (None, None) => None,
    };
    sheet.risk(
        trapped,
        20,
        "sell simulation",
        "Honeypot: selling is blocked",
        "Sell simulation passed",
    );

    sheet.tiered(
        bundle.taxes().map(|(_, sell, _)| sell),
        &input.tables.sell_tax_pct,
        10,
        "tax simulation",
        |tax| format!("Sell tax {:.1}%", tax),
    );

    sheet
}

pub fn fundamentals(input: &ScoringInput<'_>) -> ScoreSheet {
    let bundle = input.bundle;
    let tables = input.tables;
    let mut sheet = ScoreSheet::new(Category::Fundamentals);
    let protection = LpProtection::of(bundle);

    if protection == LpProtection::Unprotected {
        sheet.deduct(30, "Liquidity can be withdrawn at any time; depth not credited");
    } else if let Some(usd) = bundle.liquidity_usd() {
        sheet.deduct(
            tables.liquidity_usd.deduction(usd, 30),
            format!("Pool liquidity ${:.0}", usd),
        );
    } else {
        sheet.tiered(
            bundle.liquidity_sol(),
            &tables.liquidity_sol,
            30,
            "pool liquidity",
            |sol| format!("Pool liquidity {:.1} SOL", sol),
        );
    }

    match protection {
        LpProtection::Burned => sheet.note("LP tokens burned"),
        LpProtection::LockedOnly => sheet.deduct(7, "LP tokens locked but not burned"),
        LpProtection::Unprotected => sheet.deduct(20, "LP tokens neither burned nor locked"),
        LpProtection::Unknown => sheet.insufficient(20, "LP burn/lock status"),
    }

    sheet.tiered(
        bundle.total_holders().map(|n| n as f64),
        &tables.holder_count,
        15,
        "holder count",
        |n| format!("{:.0} holders", n),
    );

    match (bundle.top10_pct(), bundle.concentration_risk()) {
        (Some(top10), _) => sheet.deduct(
            tables.top10_pct.deduction(top10, 25),
            format!("Top 10 holders own {:.1}%", top10),
        ),
        (None, Some(level)) => sheet.deduct(
            (concentration_penalty(level) * 25.0).round() as u32,
            format!("Holder concentration rated {}", level),
        ),
        (None, None) => sheet.insufficient(25, "holder concentration"),
    }

    sheet.tiered(
        bundle.creator_pct(),
        &tables.creator_pct,
        10,
        "creator holdings",
        |pct| format!("Creator holds {:.1}%", pct),
    );

    sheet
}

pub fn technical(input: &ScoringInput<'_>) -> ScoreSheet {
    let bundle = input.bundle;
    let tables = input.tables;
    let signals = input.signals;
    let mut sheet = ScoreSheet::new(Category::TechnicalAnalysis);

    sheet.tiered(
        signals.snipers.map(f64::from),
        &tables.sniper_count,
        20,
        "sniper activity",
        |n| format!("{:.0} sniper wallets", n),
    );
    sheet.tiered(
        signals.bundle_bots.map(f64::from),
        &tables.bundle_wallets,
        20,
        "bundle activity",
        |n| format!("{:.0} bundle bot wallets", n),
    );
    sheet.risk(
        signals.wash_trading,
        25,
        "wash trading check",
        "Wash trading inflating volume",
        "No wash trading",
    );
    sheet.risk(
        bundle.pump_and_dump(),
        20,
        "price history",
        "Pump-and-dump price pattern",
        "No pump-and-dump pattern",
    );

    let churn = match (bundle.volume_h24_usd(), bundle.liquidity_usd()) {
        (Some(volume), Some(liquidity)) if liquidity > 0.0 => Some(volume / liquidity),
        _ => None,
    };
    sheet.tiered(
        churn,
        &tables.volume_liquidity_ratio,
        15,
        "volume to liquidity ratio",
        |ratio| format!("24h volume is {:.1}x liquidity", ratio),
    );

    sheet
}

pub fn sentiment(input: &ScoringInput<'_>) -> ScoreSheet {
    let bundle = input.bundle;
    let tables = input.tables;
    let mut sheet = ScoreSheet::new(Category::Sentiment);

    let buy_ratio = bundle.txn_counts_h24().and_then(|(buys, sells)| {
        let total = buys + sells;
        (total > 0).then(|| f64::from(buys) / f64::from(total))
    });
    sheet.tiered(
        buy_ratio,
        &tables.buy_ratio,
        40,
        "24h buy/sell counts",
        |ratio| format!("{:.0}% of 24h trades were buys", ratio * 100.0),
    );

    sheet.tiered(
        bundle.price_change_h24().map(f64::abs),
        &tables.price_swing_pct,
        30,
        "24h price change",
        |swing| format!("24h price moved {:.1}%", swing),
    );

    sheet.tiered(
        bundle.total_holders().map(|n| n as f64),
        &tables.holder_count,
        30,
        "holder count",
        |n| format!("{:.0} holders", n),
    );

    sheet
}

pub fn innovation(input: &ScoringInput<'_>) -> ScoreSheet {
    let bundle = input.bundle;
    let tables = input.tables;
    let mut sheet = ScoreSheet::new(Category::Innovation);
    let links = bundle.link_counts();

    sheet.tiered(
        links.map(|(_, socials)| f64::from(socials)),
        &tables.social_count,
        40,
        "social links",
        |n| format!("{:.0} social channels", n),
    );

    match links {
        Some((0, _)) => sheet.deduct(20, "No project website"),
        Some(_) => sheet.note("Project website listed"),
        None => sheet.insufficient(20, "project website"),
    }

    sheet.tiered(
        bundle.age_days(),
        &tables.age_days,
        20,
        "token age",
        |days| format!("Token is {:.1} days old", days),
    );

    sheet.risk(
        bundle.verified().map(|v| !v),
        20,
        "verification status",
        "Contract not verified",
        "Contract verified",
    );

    sheet
}
