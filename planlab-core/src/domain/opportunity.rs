//! Opportunity — a single candidate trade proposed by one calculator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Trade direction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn is_buy(self) -> bool {
        matches!(self, Side::Buy)
    }

    pub fn is_sell(self) -> bool {
        matches!(self, Side::Sell)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// A candidate trade emitted by a calculator. Opportunities are inputs
/// to sequence construction; they carry the proposing calculator's name
/// and a priority used for candidate ranking and depth pruning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Opportunity {
    pub instrument: String,
    pub side: Side,
    pub quantity: f64,
    pub price: f64,
    /// Ranking score assigned by the proposing calculator. Higher is
    /// more attractive. Not comparable across calculator families
    /// until weighted by the candidate pool ranking.
    pub priority: f64,
    /// Name of the calculator that proposed this trade.
    pub source: String,
    /// Human-readable explanation carried through to plan output.
    pub reason: String,
}

impl Opportunity {
    pub fn buy(
        instrument: impl Into<String>,
        quantity: f64,
        price: f64,
        priority: f64,
        source: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            instrument: instrument.into(),
            side: Side::Buy,
            quantity,
            price,
            priority,
            source: source.into(),
            reason: reason.into(),
        }
    }

    pub fn sell(
        instrument: impl Into<String>,
        quantity: f64,
        price: f64,
        priority: f64,
        source: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            instrument: instrument.into(),
            side: Side::Sell,
            quantity,
            price,
            priority,
            source: source.into(),
            reason: reason.into(),
        }
    }

    /// Trade value at the proposing price.
    pub fn notional(&self) -> f64 {
        self.quantity * self.price
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notional() {
        let op = Opportunity::buy("AAPL", 10.0, 150.0, 0.8, "opportunity_buys", "high score");
        assert_eq!(op.notional(), 1500.0);
        assert!(op.side.is_buy());
    }

    #[test]
    fn side_display() {
        assert_eq!(Side::Buy.to_string(), "buy");
        assert_eq!(Side::Sell.to_string(), "sell");
    }
}
