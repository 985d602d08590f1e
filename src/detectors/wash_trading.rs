//! Wash trading detection
//!
//! Builds a directed transfer graph over the lookback window, finds short
//! cycles (A -> B -> ... -> A) and compares the volume moving around them to
//! pool liquidity. Circular volume at or above the configured share of
//! liquidity is wash trading.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use super::types::{Transaction, TxKind};
use super::{validate_history, Detection};
use crate::error::Result;
use crate::metrics::MetricsBundle;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WashTradingConfig {
    /// Only transfers within this many hours of the newest record count
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: u32,

    /// Longest cycle searched for, in wallets
    #[serde(default = "default_max_cycle_len")]
    pub max_cycle_len: usize,

    /// Circular volume / liquidity ratio that marks wash trading
    #[serde(default = "default_volume_liquidity_ratio")]
    pub volume_liquidity_ratio: f64,
}

fn default_lookback_hours() -> u32 {
    24
}
fn default_max_cycle_len() -> usize {
    3
}
fn default_volume_liquidity_ratio() -> f64 {
    0.5
}

impl Default for WashTradingConfig {
    fn default() -> Self {
        Self {
            lookback_hours: default_lookback_hours(),
            max_cycle_len: default_max_cycle_len(),
            volume_liquidity_ratio: default_volume_liquidity_ratio(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WashTradingFindings {
    /// Each cycle starts at its lexicographically smallest wallet
    pub cycles: Vec<Vec<String>>,
    pub circular_volume_sol: f64,
    pub liquidity_sol: f64,
    pub wash_trading: bool,
}

#[derive(Debug, Clone, Default)]
pub struct WashTradingDetector {
    config: WashTradingConfig,
}

impl WashTradingDetector {
    pub fn new(config: WashTradingConfig) -> Self {
        Self { config }
    }

    pub fn detect(
        &self,
        bundle: &MetricsBundle,
        history: Option<&[Transaction]>,
    ) -> Result<Detection<WashTradingFindings>> {
        let Some(history) = history else {
            return Ok(Detection::not_evaluated("no transaction history"));
        };
        let Some(liquidity_sol) = bundle.liquidity_sol() else {
            return Ok(Detection::not_evaluated("pool liquidity unavailable"));
        };

        validate_history(
            "wash_trading",
            history.iter().filter(|tx| tx.kind == TxKind::Transfer),
        )?;

        let edges = self.transfer_edges(history);
        let cycles = self.find_cycles(&edges);

        let mut cycle_edges: BTreeSet<(&str, &str)> = BTreeSet::new();
        for cycle in &cycles {
            for (i, from) in cycle.iter().enumerate() {
                let to = cycle[(i + 1) % cycle.len()];
                cycle_edges.insert((*from, to));
            }
        }
        let circular_volume_sol: f64 = cycle_edges
            .iter()
            .filter_map(|edge| edges.get(edge))
            .sum();

        let wash_trading = circular_volume_sol > 0.0
            && circular_volume_sol >= self.config.volume_liquidity_ratio * liquidity_sol;

        if wash_trading {
            info!(
                token = %bundle.token.address.short(),
                cycles = cycles.len(),
                circular_volume_sol = circular_volume_sol,
                liquidity_sol = liquidity_sol,
                "Wash trading detected"
            );
        } else {
            debug!(cycles = cycles.len(), "Wash trading scan complete");
        }

        Ok(Detection::Evaluated(WashTradingFindings {
            cycles: cycles
                .into_iter()
                .map(|c| c.into_iter().map(str::to_string).collect())
                .collect(),
            circular_volume_sol,
            liquidity_sol,
            wash_trading,
        }))
    }

    /// Aggregate transfer volume per directed wallet pair inside the window
    fn transfer_edges<'a>(&self, history: &'a [Transaction]) -> BTreeMap<(&'a str, &'a str), f64> {
        let mut edges = BTreeMap::new();
        let Some(latest) = history.iter().map(|tx| tx.timestamp).max() else {
            return edges;
        };
        let window_start = latest - Duration::hours(i64::from(self.config.lookback_hours));

        for tx in history {
            if tx.kind != TxKind::Transfer || !tx.success || tx.timestamp < window_start {
                continue;
            }
            let Some(to) = tx.to.as_deref() else {
                continue;
            };
            if to == tx.from {
                continue;
            }
            *edges.entry((tx.from.as_str(), to)).or_insert(0.0) += tx.amount_sol;
        }

        edges
    }

    /// Simple cycles of 2..=max_cycle_len wallets, each reported once
    fn find_cycles<'a>(&self, edges: &BTreeMap<(&'a str, &'a str), f64>) -> Vec<Vec<&'a str>> {
        let mut graph: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (from, to) in edges.keys() {
            graph.entry(*from).or_default().push(*to);
        }

        let mut cycles = Vec::new();
        for start in graph.keys().copied() {
            let mut path = vec![start];
            self.dfs_find_cycles(&graph, start, start, &mut path, &mut cycles);
        }
        cycles
    }

    fn dfs_find_cycles<'a>(
        &self,
        graph: &BTreeMap<&'a str, Vec<&'a str>>,
        current: &'a str,
        start: &'a str,
        path: &mut Vec<&'a str>,
        cycles: &mut Vec<Vec<&'a str>>,
    ) {
        let Some(targets) = graph.get(current) else {
            return;
        };

        for &target in targets {
            if target == start && path.len() >= 2 {
                cycles.push(path.clone());
            } else if target > start
                && !path.contains(&target)
                && path.len() < self.config.max_cycle_len
            {
                // Only walk through wallets greater than the start so each
                // cycle is found from its smallest member alone
                path.push(target);
                self.dfs_find_cycles(graph, target, start, path, cycles);
                path.pop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::fixtures;
    use chrono::Utc;

    fn transfer(from: &str, to: &str, amount: f64) -> Transaction {
        Transaction::new(TxKind::Transfer, from, 1, Utc::now())
            .to(to)
            .amount(amount)
    }

    fn triangle(amount: f64) -> Vec<Transaction> {
        vec![
            transfer("a", "b", amount),
            transfer("b", "c", amount),
            transfer("c", "a", amount),
        ]
    }

    #[test]
    fn test_circular_volume_against_liquidity() {
        // Clean fixture has 500 SOL of liquidity
        let bundle = fixtures::bundle(fixtures::clean_sources());

        let detection = WashTradingDetector::default()
            .detect(&bundle, Some(&triangle(100.0)))
            .unwrap();
        let findings = detection.evaluated().unwrap();
        assert_eq!(findings.cycles, vec![vec!["a".to_string(), "b".to_string(), "c".to_string()]]);
        assert!((findings.circular_volume_sol - 300.0).abs() < 1e-9);
        assert!(findings.wash_trading);

        let detection = WashTradingDetector::default()
            .detect(&bundle, Some(&triangle(10.0)))
            .unwrap();
        let findings = detection.evaluated().unwrap();
        assert_eq!(findings.cycles.len(), 1);
        assert!(!findings.wash_trading);
    }

    #[test]
    fn test_cycle_longer_than_limit_is_ignored() {
        let bundle = fixtures::bundle(fixtures::clean_sources());
        let history = vec![
            transfer("a", "b", 400.0),
            transfer("b", "c", 400.0),
            transfer("c", "d", 400.0),
            transfer("d", "a", 400.0),
        ];

        let detection = WashTradingDetector::default().detect(&bundle, Some(&history)).unwrap();
        let findings = detection.evaluated().unwrap();
        assert!(findings.cycles.is_empty());
        assert!(!findings.wash_trading);
    }

    #[test]
    fn test_shared_edges_counted_once() {
        let bundle = fixtures::bundle(fixtures::clean_sources());
        // a<->b two-cycle plus a -> b -> c -> a triangle sharing a->b
        let history = vec![
            transfer("a", "b", 100.0),
            transfer("b", "a", 50.0),
            transfer("b", "c", 10.0),
            transfer("c", "a", 10.0),
        ];

        let detection = WashTradingDetector::default().detect(&bundle, Some(&history)).unwrap();
        let findings = detection.evaluated().unwrap();
        assert_eq!(findings.cycles.len(), 2);
        assert!((findings.circular_volume_sol - 170.0).abs() < 1e-9);
    }

    #[test]
    fn test_transfers_outside_lookback_ignored() {
        let bundle = fixtures::bundle(fixtures::clean_sources());
        let old = Utc::now() - Duration::hours(48);
        let mut history = triangle(200.0);
        for tx in &mut history {
            tx.timestamp = old;
        }
        history.push(transfer("x", "y", 1.0));

        let detection = WashTradingDetector::default().detect(&bundle, Some(&history)).unwrap();
        assert!(detection.evaluated().unwrap().cycles.is_empty());
    }

    #[test]
    fn test_missing_liquidity_not_evaluated() {
        let bundle = fixtures::bundle(vec![]);
        let detection = WashTradingDetector::default()
            .detect(&bundle, Some(&triangle(100.0)))
            .unwrap();
        assert!(!detection.is_evaluated());
    }
}
