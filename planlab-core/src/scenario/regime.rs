//! Market-regime labels and their per-category priority bias.
//!
//! A regime never alters prices or quantities. It reweights the raw-return
//! contribution of a sequence according to which calculators produced its
//! steps: accumulation categories are favored in a bull market, trimming
//! categories in a bear market, and a sideways market is neutral.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::Sequence;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    Bull,
    Bear,
    Sideways,
}

impl Regime {
    pub fn all() -> [Regime; 3] {
        [Regime::Bull, Regime::Bear, Regime::Sideways]
    }

    /// Priority bias for one opportunity category under this regime.
    /// Unknown categories are neutral.
    pub fn bias_for(self, category: &str) -> f64 {
        match (self, category) {
            (Regime::Bull, "opportunity_buys") => 1.3,
            (Regime::Bull, "averaging_down") => 1.2,
            (Regime::Bull, "rebalance_buys") => 1.1,
            (Regime::Bull, "profit_taking") => 0.9,
            (Regime::Bull, "rebalance_sells") => 0.8,

            (Regime::Bear, "profit_taking") => 1.3,
            (Regime::Bear, "rebalance_sells") => 1.2,
            (Regime::Bear, "weight_based") => 1.1,
            (Regime::Bear, "rebalance_buys") => 0.8,
            (Regime::Bear, "opportunity_buys") => 0.7,
            (Regime::Bear, "averaging_down") => 0.7,

            _ => 1.0,
        }
    }

    /// Mean bias across a sequence's steps, keyed by each step's producing
    /// category. Empty sequences are neutral.
    pub fn sequence_bias(self, sequence: &Sequence) -> f64 {
        if sequence.steps.is_empty() {
            return 1.0;
        }
        let total: f64 = sequence
            .steps
            .iter()
            .map(|step| self.bias_for(&step.opportunity.source))
            .sum();
        total / sequence.steps.len() as f64
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Regime::Bull => "bull",
            Regime::Bear => "bear",
            Regime::Sideways => "sideways",
        };
        write!(f, "{label}")
    }
}
