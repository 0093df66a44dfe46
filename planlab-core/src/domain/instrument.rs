//! Instrument metadata consumed by the planner.
//!
//! The planner never fetches market data itself; everything it knows about an
//! instrument — quality score, diversification tags, volatility history —
//! arrives pre-computed inside the portfolio snapshot.

use serde::{Deserialize, Serialize};

/// Static per-instrument metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instrument {
    pub id: String,
    /// Diversification tag: ISO-ish country label ("US", "DE", ...).
    pub country: String,
    /// Diversification tag: industry label ("tech", "energy", ...).
    pub industry: String,
    /// Quality score in [0, 1] from the upstream analysis pipeline.
    /// Drives opportunity priorities and the portfolio score.
    pub score: f64,
    /// Last known price per unit.
    pub price: f64,
    /// Annualized volatility (log-return stddev). `None` when the upstream
    /// pipeline had insufficient history; Monte Carlo skips such instruments.
    #[serde(default)]
    pub volatility: Option<f64>,
    /// Minimum tradeable lot. Quantities are floored to multiples of this.
    #[serde(default = "default_lot_size")]
    pub lot_size: f64,
}

fn default_lot_size() -> f64 {
    1.0
}

impl Instrument {
    pub fn new(id: impl Into<String>, country: &str, industry: &str, score: f64, price: f64) -> Self {
        Self {
            id: id.into(),
            country: country.to_string(),
            industry: industry.to_string(),
            score,
            price,
            volatility: None,
            lot_size: 1.0,
        }
    }

    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = Some(volatility);
        self
    }

    pub fn with_lot_size(mut self, lot_size: f64) -> Self {
        self.lot_size = lot_size;
        self
    }

    /// Floor a raw quantity to a whole number of lots. Returns 0.0 when the
    /// raw quantity is below one lot.
    pub fn round_to_lot(&self, quantity: f64) -> f64 {
        if self.lot_size <= 0.0 {
            return quantity;
        }
        (quantity / self.lot_size).floor() * self.lot_size
    }
}
