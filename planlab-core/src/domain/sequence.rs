//! Sequence — an ordered multi-step trade plan with its simulated trajectory.

use super::opportunity::Opportunity;
use crate::fingerprint::Fingerprint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One step of a plan: the trade plus the portfolio trajectory around it,
/// simulated at generation time against baseline prices.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SequenceStep {
    pub opportunity: Opportunity,
    pub score_before: f64,
    pub score_after: f64,
    pub cash_before: f64,
    pub cash_after: f64,
}

/// An ordered candidate plan. Identity is the [`Fingerprint`] over the
/// ordered (instrument, side, quantity) tuples — timestamps and trajectory
/// values do not participate, so a regenerated plan with the same trades
/// reuses the cached evaluation of its predecessor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sequence {
    pub steps: Vec<SequenceStep>,
    pub fingerprint: Fingerprint,
    pub created_at: DateTime<Utc>,
}

impl Sequence {
    pub fn new(steps: Vec<SequenceStep>) -> Self {
        let fingerprint = Fingerprint::of_steps(steps.iter().map(|s| {
            (
                s.opportunity.instrument.as_str(),
                s.opportunity.side,
                s.opportunity.quantity,
            )
        }));
        Self {
            steps,
            fingerprint,
            created_at: Utc::now(),
        }
    }

    pub fn depth(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Sum of step priorities; the generator's cheap pre-evaluation rank.
    pub fn priority_sum(&self) -> f64 {
        self.steps.iter().map(|s| s.opportunity.priority).sum()
    }

    pub fn buy_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.opportunity.side.is_buy())
            .count()
    }

    pub fn sell_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.opportunity.side.is_sell())
            .count()
    }

    /// Distinct instruments touched by the plan.
    pub fn instruments(&self) -> BTreeSet<&str> {
        self.steps
            .iter()
            .map(|s| s.opportunity.instrument.as_str())
            .collect()
    }

    /// A new sequence made of the first `n` steps (fresh fingerprint).
    /// Used for partial-execution variants.
    pub fn prefix(&self, n: usize) -> Self {
        Self::new(self.steps.iter().take(n).cloned().collect())
    }
}
