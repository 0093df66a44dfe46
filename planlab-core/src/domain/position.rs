//! Position — one open holding inside the portfolio snapshot.

use serde::{Deserialize, Serialize};

/// An open holding. Quantities are always non-negative; the planner is
/// long-only (shorting is a brokerage concern outside its scope).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub instrument: String,
    pub quantity: f64,
    pub average_cost: f64,
    /// Calendar days since the position was first opened.
    #[serde(default)]
    pub holding_days: u32,
    /// Calendar days since the last partial sell, `None` if never sold.
    #[serde(default)]
    pub days_since_last_sell: Option<u32>,
}

impl Position {
    pub fn new(instrument: impl Into<String>, quantity: f64, average_cost: f64) -> Self {
        Self {
            instrument: instrument.into(),
            quantity,
            average_cost,
            holding_days: 0,
            days_since_last_sell: None,
        }
    }

    pub fn with_holding_days(mut self, days: u32) -> Self {
        self.holding_days = days;
        self
    }

    pub fn with_days_since_last_sell(mut self, days: u32) -> Self {
        self.days_since_last_sell = Some(days);
        self
    }

    pub fn is_flat(&self) -> bool {
        self.quantity <= 0.0
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    /// Unrealized gain as a fraction of cost basis: 0.10 = +10%, -0.25 = -25%.
    /// Zero when the cost basis is degenerate.
    pub fn unrealized_gain_fraction(&self, price: f64) -> f64 {
        if self.average_cost <= 0.0 {
            return 0.0;
        }
        (price - self.average_cost) / self.average_cost
    }
}
