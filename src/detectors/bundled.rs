//! Bundled Wallet Detection
//!
//! Detects coordinated wallet activity (bundled wallets) that typically
//! indicates team/insider wallets that will dump together.
//!
//! Detection heuristics:
//! 1. Same-slot buys: 3+ wallets buying in the same slot
//! 2. Common funding: those wallets share a SOL funding source
//! 3. Identical amounts: buy amounts within 1% variance (corroborating only)
//!
//! Overlapping groups are merged by transitive closure over shared wallets
//! and shared funders, so every wallet lands in at most one bundle.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

use super::types::{Transaction, TxKind};
use super::{validate_history, Detection};
use crate::error::Result;

/// Configuration for bundled wallet detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleConfig {
    /// Minimum commonly-funded wallets buying in one slot to flag a bundle
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: u32,

    /// Amount variance threshold for "identical amounts" (0.01 = 1%)
    #[serde(default = "default_amount_variance")]
    pub amount_variance: f64,
}

fn default_min_cluster_size() -> u32 {
    3
}
fn default_amount_variance() -> f64 {
    0.01
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            min_cluster_size: default_min_cluster_size(),
            amount_variance: default_amount_variance(),
        }
    }
}

/// A detected bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleCluster {
    pub wallets: Vec<String>,
    pub funders: Vec<String>,
    pub slots: Vec<u64>,
    pub total_buy_sol: f64,
    /// Member buys were all within the configured amount variance
    pub identical_amounts: bool,
}

/// Bundle detector output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleFindings {
    pub clusters: Vec<BundleCluster>,
    /// Distinct wallets across all bundles
    pub bundled_wallets: u32,
}

impl BundleFindings {
    pub fn bundle_count(&self) -> u32 {
        self.clusters.len() as u32
    }
}

/// Same-slot buyers sharing one funder
struct Candidate<'a> {
    slot: u64,
    funder: &'a str,
    wallets: Vec<&'a str>,
}

/// Bundled wallet detector
#[derive(Debug, Clone, Default)]
pub struct BundleDetector {
    config: BundleConfig,
}

impl BundleDetector {
    /// Create a new bundled detector
    pub fn new(config: BundleConfig) -> Self {
        Self { config }
    }

    /// Analyze buy history for coordinated, commonly-funded wallets
    pub fn detect(&self, history: Option<&[Transaction]>) -> Result<Detection<BundleFindings>> {
        let Some(history) = history else {
            return Ok(Detection::not_evaluated("no transaction history"));
        };

        validate_history(
            "bundle",
            history
                .iter()
                .filter(|tx| matches!(tx.kind, TxKind::Buy | TxKind::Funding)),
        )?;

        // Without funding records common funders can't be seen
        if !history.iter().any(|tx| tx.kind == TxKind::Funding && tx.success) {
            return Ok(Detection::not_evaluated("no funding records in history"));
        }

        let candidates = self.find_candidates(history);
        let clusters = self.merge_candidates(history, &candidates);

        let bundled_wallets = clusters.iter().map(|c| c.wallets.len() as u32).sum();
        let findings = BundleFindings {
            clusters,
            bundled_wallets,
        };

        if findings.bundle_count() > 0 {
            info!(
                bundles = findings.bundle_count(),
                wallets = findings.bundled_wallets,
                "Bundled wallets detected"
            );
        }

        Ok(Detection::Evaluated(findings))
    }

    /// Group same-slot buyers by shared funder
    fn find_candidates<'a>(&self, history: &'a [Transaction]) -> Vec<Candidate<'a>> {
        // wallet -> funders
        let mut funders: HashMap<&str, BTreeSet<&str>> = HashMap::new();
        for tx in history {
            if tx.kind == TxKind::Funding && tx.success {
                if let Some(to) = tx.to.as_deref() {
                    funders.entry(to).or_default().insert(tx.from.as_str());
                }
            }
        }

        // slot -> buyers
        let mut by_slot: BTreeMap<u64, BTreeSet<&str>> = BTreeMap::new();
        for tx in history.iter().filter(|tx| tx.is_buy()) {
            by_slot.entry(tx.slot).or_default().insert(tx.from.as_str());
        }

        let mut candidates = Vec::new();
        for (slot, buyers) in by_slot {
            let mut by_funder: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
            for buyer in buyers {
                for funder in funders.get(buyer).into_iter().flatten() {
                    by_funder.entry(*funder).or_default().push(buyer);
                }
            }

            for (funder, wallets) in by_funder {
                if wallets.len() >= self.config.min_cluster_size as usize {
                    debug!(
                        slot = slot,
                        funder = %&funder[..funder.len().min(8)],
                        count = wallets.len(),
                        "Same-slot commonly-funded buyers"
                    );
                    candidates.push(Candidate {
                        slot,
                        funder,
                        wallets,
                    });
                }
            }
        }

        candidates
    }

    /// Merge candidates sharing a wallet or a funder
    fn merge_candidates(&self, history: &[Transaction], candidates: &[Candidate<'_>]) -> Vec<BundleCluster> {
        let mut sets = DisjointSet::default();
        for candidate in candidates {
            for wallet in &candidate.wallets {
                sets.union(candidate.funder, *wallet);
            }
        }

        #[derive(Default)]
        struct Acc<'a> {
            wallets: BTreeSet<&'a str>,
            funders: BTreeSet<&'a str>,
            slots: BTreeSet<u64>,
        }

        let mut groups: BTreeMap<usize, Acc<'_>> = BTreeMap::new();
        for candidate in candidates {
            let root = sets.find(candidate.funder);
            let acc = groups.entry(root).or_default();
            acc.funders.insert(candidate.funder);
            acc.slots.insert(candidate.slot);
            acc.wallets.extend(candidate.wallets.iter().copied());
        }

        let mut clusters: Vec<BundleCluster> = groups
            .into_values()
            .map(|acc| {
                let amounts: Vec<f64> = history
                    .iter()
                    .filter(|tx| {
                        tx.is_buy()
                            && acc.slots.contains(&tx.slot)
                            && acc.wallets.contains(tx.from.as_str())
                    })
                    .map(|tx| tx.amount_sol)
                    .collect();

                BundleCluster {
                    wallets: acc.wallets.iter().map(|w| w.to_string()).collect(),
                    funders: acc.funders.iter().map(|f| f.to_string()).collect(),
                    slots: acc.slots.iter().copied().collect(),
                    total_buy_sol: amounts.iter().sum(),
                    identical_amounts: self.has_identical_amounts(&amounts),
                }
            })
            .collect();

        clusters.sort_by(|a, b| a.slots.cmp(&b.slots).then_with(|| a.wallets.cmp(&b.wallets)));
        clusters
    }

    /// Check whether all amounts sit within the variance band around their mean
    fn has_identical_amounts(&self, amounts: &[f64]) -> bool {
        if amounts.len() < 2 {
            return false;
        }
        let avg_amount = amounts.iter().sum::<f64>() / amounts.len() as f64;
        if avg_amount <= 0.0 {
            return false;
        }
        let max_variance = amounts
            .iter()
            .map(|a| (a - avg_amount).abs() / avg_amount)
            .fold(0.0_f64, f64::max);

        max_variance <= self.config.amount_variance
    }
}

/// Union-find over wallet/funder addresses
#[derive(Default)]
struct DisjointSet<'a> {
    index: HashMap<&'a str, usize>,
    parent: Vec<usize>,
}

impl<'a> DisjointSet<'a> {
    fn id(&mut self, key: &'a str) -> usize {
        if let Some(&id) = self.index.get(key) {
            return id;
        }
        let id = self.parent.len();
        self.parent.push(id);
        self.index.insert(key, id);
        id
    }

    fn root(&mut self, mut id: usize) -> usize {
        while self.parent[id] != id {
            self.parent[id] = self.parent[self.parent[id]];
            id = self.parent[id];
        }
        id
    }

    fn find(&mut self, key: &'a str) -> usize {
        let id = self.id(key);
        self.root(id)
    }

    fn union(&mut self, a: &'a str, b: &'a str) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            // Lower id becomes root so merges are order-independent in output
            let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[child] = root;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn fund(funder: &str, wallet: &str) -> Transaction {
        Transaction::new(TxKind::Funding, funder, 1, Utc::now())
            .to(wallet)
            .amount(1.0)
    }

    fn buy(wallet: &str, slot: u64, amount: f64) -> Transaction {
        Transaction::new(TxKind::Buy, wallet, slot, Utc::now()).amount(amount)
    }

    fn findings(history: &[Transaction]) -> BundleFindings {
        match BundleDetector::default().detect(Some(history)).unwrap() {
            Detection::Evaluated(f) => f,
            Detection::NotEvaluated { reason } => panic!("not evaluated: {}", reason),
        }
    }

    #[test]
    fn test_same_slot_common_funding() {
        let history = vec![
            fund("funder", "wallet1"),
            fund("funder", "wallet2"),
            fund("funder", "wallet3"),
            buy("wallet1", 12345, 1.0),
            buy("wallet2", 12345, 1.005),
            buy("wallet3", 12345, 0.998),
        ];

        let found = findings(&history);
        assert_eq!(found.bundle_count(), 1);
        assert_eq!(found.bundled_wallets, 3);

        let cluster = &found.clusters[0];
        assert_eq!(cluster.slots, vec![12345]);
        assert_eq!(cluster.funders, vec!["funder".to_string()]);
        assert!(cluster.identical_amounts);
        assert!((cluster.total_buy_sol - 3.003).abs() < 1e-9);
    }

    #[test]
    fn test_below_cluster_size() {
        let history = vec![
            fund("funder", "wallet1"),
            fund("funder", "wallet2"),
            buy("wallet1", 7, 1.0),
            buy("wallet2", 7, 1.0),
        ];
        assert_eq!(findings(&history).bundle_count(), 0);
    }

    #[test]
    fn test_same_slot_without_common_funding() {
        let history = vec![
            fund("a", "wallet1"),
            fund("b", "wallet2"),
            fund("c", "wallet3"),
            buy("wallet1", 7, 1.0),
            buy("wallet2", 7, 1.0),
            buy("wallet3", 7, 1.0),
        ];
        assert_eq!(findings(&history).bundle_count(), 0);
    }

    #[test]
    fn test_overlapping_clusters_merge_transitively() {
        let history = vec![
            // F1 funds a same-slot trio in slot 10 and another in slot 11
            fund("F1", "w1"),
            fund("F1", "w2"),
            fund("F1", "w3"),
            fund("F1", "w4"),
            fund("F1", "w5"),
            fund("F1", "w6"),
            buy("w1", 10, 1.0),
            buy("w2", 10, 2.0),
            buy("w3", 10, 3.0),
            buy("w4", 11, 1.0),
            buy("w5", 11, 1.0),
            buy("w6", 11, 1.0),
            // F2 funds w1 again plus two fresh wallets buying in slot 12
            fund("F2", "w1"),
            fund("F2", "w7"),
            fund("F2", "w8"),
            buy("w1", 12, 0.5),
            buy("w7", 12, 0.5),
            buy("w8", 12, 0.5),
            // Unrelated trio funded by F3
            fund("F3", "x1"),
            fund("F3", "x2"),
            fund("F3", "x3"),
            buy("x1", 20, 0.1),
            buy("x2", 20, 0.1),
            buy("x3", 20, 0.1),
        ];

        let found = findings(&history);
        assert_eq!(found.bundle_count(), 2);
        // w1 is counted once even though it appears in two groups
        assert_eq!(found.bundled_wallets, 11);

        let merged = &found.clusters[0];
        assert_eq!(merged.slots, vec![10, 11, 12]);
        assert_eq!(merged.wallets.len(), 8);
        assert_eq!(merged.funders, vec!["F1".to_string(), "F2".to_string()]);
        assert!(!merged.identical_amounts);

        let separate = &found.clusters[1];
        assert_eq!(separate.slots, vec![20]);
        assert!(separate.identical_amounts);
    }

    #[test]
    fn test_failed_buys_ignored() {
        let history = vec![
            fund("funder", "wallet1"),
            fund("funder", "wallet2"),
            fund("funder", "wallet3"),
            buy("wallet1", 5, 1.0),
            buy("wallet2", 5, 1.0),
            buy("wallet3", 5, 1.0).failed(),
        ];
        assert_eq!(findings(&history).bundle_count(), 0);
    }

    #[test]
    fn test_buys_without_funding_not_evaluated() {
        let history = vec![
            buy("wallet1", 5, 1.0),
            buy("wallet2", 5, 1.0),
            buy("wallet3", 5, 1.0),
        ];
        match BundleDetector::default().detect(Some(&history)).unwrap() {
            Detection::NotEvaluated { reason } => assert!(reason.contains("funding")),
            Detection::Evaluated(f) => panic!("evaluated without funding: {:?}", f),
        }

        let failed_only = vec![fund("funder", "wallet1").failed(), buy("wallet1", 5, 1.0)];
        assert!(!BundleDetector::default()
            .detect(Some(&failed_only))
            .unwrap()
            .is_evaluated());
    }

    #[test]
    fn test_no_history() {
        let detection = BundleDetector::default().detect(None).unwrap();
        assert!(!detection.is_evaluated());
    }
}
