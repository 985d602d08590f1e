//! Monotone threshold tables
//!
//! A [`TierTable`] maps a measured value to a penalty share in `0.0..=1.0`.
//! Scorers multiply the share by a rule's point budget, so all tuning lives
//! in data and can be overridden from configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which way a value improves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

/// One step: values on the good side of `bound` take `penalty`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub bound: f64,
    pub penalty: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierTable {
    pub direction: Direction,
    /// Ordered best tier first
    pub tiers: Vec<Tier>,
    /// Penalty for values past the last tier
    pub floor_penalty: f64,
}

impl TierTable {
    /// `tiers` as `(minimum, penalty)` pairs, best first
    pub fn higher_is_better(tiers: &[(f64, f64)], floor_penalty: f64) -> Self {
        Self::build(Direction::HigherIsBetter, tiers, floor_penalty)
    }

    /// `tiers` as `(maximum, penalty)` pairs, best first
    pub fn lower_is_better(tiers: &[(f64, f64)], floor_penalty: f64) -> Self {
        Self::build(Direction::LowerIsBetter, tiers, floor_penalty)
    }

    fn build(direction: Direction, tiers: &[(f64, f64)], floor_penalty: f64) -> Self {
        Self {
            direction,
            tiers: tiers
                .iter()
                .map(|&(bound, penalty)| Tier { bound, penalty })
                .collect(),
            floor_penalty,
        }
    }

    /// Penalty share for a value
    pub fn penalty_share(&self, value: f64) -> f64 {
        self.tiers
            .iter()
            .find(|tier| match self.direction {
                Direction::HigherIsBetter => value >= tier.bound,
                Direction::LowerIsBetter => value <= tier.bound,
            })
            .map(|tier| tier.penalty)
            .unwrap_or(self.floor_penalty)
    }

    /// Points lost out of `budget`
    pub fn deduction(&self, value: f64, budget: u32) -> u32 {
        let points = (self.penalty_share(value) * f64::from(budget)).round();
        (points.max(0.0) as u32).min(budget)
    }

    /// Bounds strictly ordered, penalties non-decreasing and within `0..=1`
    pub fn validate(&self, name: &str) -> Result<()> {
        let in_range = |p: f64| (0.0..=1.0).contains(&p);

        if !in_range(self.floor_penalty) {
            return Err(Error::Config(format!(
                "{}: floor penalty {} outside 0..=1",
                name, self.floor_penalty
            )));
        }

        for tier in &self.tiers {
            if !tier.bound.is_finite() || !in_range(tier.penalty) {
                return Err(Error::Config(format!(
                    "{}: invalid tier (bound {}, penalty {})",
                    name, tier.bound, tier.penalty
                )));
            }
        }

        for pair in self.tiers.windows(2) {
            let ordered = match self.direction {
                Direction::HigherIsBetter => pair[0].bound > pair[1].bound,
                Direction::LowerIsBetter => pair[0].bound < pair[1].bound,
            };
            if !ordered {
                return Err(Error::Config(format!(
                    "{}: tier bounds must be strictly ordered best first",
                    name
                )));
            }
            if pair[1].penalty < pair[0].penalty {
                return Err(Error::Config(format!("{}: penalties must not decrease", name)));
            }
        }

        if let Some(last) = self.tiers.last() {
            if self.floor_penalty < last.penalty {
                return Err(Error::Config(format!(
                    "{}: floor penalty below last tier",
                    name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_higher_is_better() {
        let table = TierTable::higher_is_better(&[(500.0, 0.0), (100.0, 0.2), (10.0, 0.7)], 1.0);

        assert_eq!(table.penalty_share(1_000.0), 0.0);
        assert_eq!(table.penalty_share(500.0), 0.0);
        assert_eq!(table.penalty_share(499.0), 0.2);
        assert_eq!(table.penalty_share(10.0), 0.7);
        assert_eq!(table.penalty_share(0.0), 1.0);

        assert_eq!(table.deduction(250.0, 10), 2);
        assert_eq!(table.deduction(0.0, 10), 10);
        assert!(table.validate("liquidity").is_ok());
    }

    #[test]
    fn test_lower_is_better() {
        let table = TierTable::lower_is_better(&[(20.0, 0.0), (50.0, 0.5)], 1.0);

        assert_eq!(table.penalty_share(15.0), 0.0);
        assert_eq!(table.penalty_share(20.0), 0.0);
        assert_eq!(table.penalty_share(35.0), 0.5);
        assert_eq!(table.penalty_share(90.0), 1.0);
        assert_eq!(table.deduction(35.0, 25), 13);
    }

    #[test]
    fn test_monotone_over_range() {
        let table = TierTable::higher_is_better(&[(500.0, 0.0), (100.0, 0.2), (50.0, 0.4), (10.0, 0.7)], 1.0);
        let mut last = u32::MAX;
        for step in 0..=1_200 {
            let deduction = table.deduction(step as f64, 10);
            assert!(deduction <= last, "deduction rose at {}", step);
            last = deduction;
        }
    }

    #[test]
    fn test_validation_rejects_bad_tables() {
        let unordered = TierTable::higher_is_better(&[(10.0, 0.0), (100.0, 0.2)], 1.0);
        assert!(unordered.validate("t").is_err());

        let decreasing = TierTable::lower_is_better(&[(10.0, 0.5), (20.0, 0.2)], 1.0);
        assert!(decreasing.validate("t").is_err());

        let low_floor = TierTable::lower_is_better(&[(10.0, 0.0), (20.0, 0.8)], 0.5);
        assert!(low_floor.validate("t").is_err());

        let out_of_range = TierTable::lower_is_better(&[(10.0, 1.5)], 1.0);
        assert!(matches!(out_of_range.validate("t"), Err(Error::Config(_))));
    }
}
