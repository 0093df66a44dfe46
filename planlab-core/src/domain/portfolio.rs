//! PortfolioState — cash + open positions + the instrument catalog, with
//! target weights for diversification scoring.
//!
//! The planner never mutates a caller's portfolio: the generator and
//! evaluator each work on a private clone and replay trades against it via
//! [`PortfolioState::apply_trade`].

use super::instrument::Instrument;
use super::opportunity::{Opportunity, Side};
use super::position::Position;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Cost model applied to every executed trade: a fixed fee plus a fraction
/// of notional. Both charged per side.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TradeCosts {
    pub fixed: f64,
    pub percent: f64,
}

impl TradeCosts {
    pub fn new(fixed: f64, percent: f64) -> Self {
        Self { fixed, percent }
    }

    pub fn frictionless() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Total transaction cost for a trade of the given notional.
    pub fn cost_for(&self, notional: f64) -> f64 {
        self.fixed + self.percent * notional
    }
}

impl Default for TradeCosts {
    fn default() -> Self {
        Self::frictionless()
    }
}

/// Why a trade could not be applied to the portfolio. Local to one step:
/// the evaluator records the violation and marks the scenario infeasible,
/// it never aborts the planning pass.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TradeViolation {
    #[error("insufficient cash: need {required:.2}, have {available:.2}")]
    InsufficientCash { required: f64, available: f64 },

    #[error("sell of {requested} {instrument} exceeds held quantity {held}")]
    ExceedsHolding {
        instrument: String,
        requested: f64,
        held: f64,
    },

    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("quantity {quantity} for {instrument} is below one lot")]
    BelowMinimumLot { instrument: String, quantity: f64 },

    #[error("trade value {notional:.2} for {instrument} is below minimum {minimum:.2}")]
    BelowMinimumValue {
        instrument: String,
        notional: f64,
        minimum: f64,
    },
}

/// What one applied trade did to the portfolio.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeEffect {
    /// Quantity actually traded after lot rounding.
    pub quantity: f64,
    pub notional: f64,
    pub transaction_cost: f64,
    pub cash_after: f64,
}

/// Aggregate portfolio snapshot the planner operates on.
///
/// `instruments` is the catalog of everything the planner may trade,
/// carrying current price, quality score, and diversification tags.
/// Positions reference catalog entries by id. Target weights (per
/// instrument, country, industry) drive the concentration penalty; empty
/// target maps disable that dimension.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PortfolioState {
    pub cash: f64,
    pub positions: BTreeMap<String, Position>,
    pub instruments: BTreeMap<String, Instrument>,
    #[serde(default)]
    pub target_weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub target_country_weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub target_industry_weights: BTreeMap<String, f64>,
    /// Pairwise return correlations, keyed both ways or one way (lookup is
    /// symmetric). Used only when correlation-aware filtering is enabled.
    #[serde(default)]
    pub correlations: BTreeMap<String, BTreeMap<String, f64>>,
}

impl PortfolioState {
    pub fn new(cash: f64) -> Self {
        Self {
            cash,
            ..Self::default()
        }
    }

    pub fn add_instrument(&mut self, instrument: Instrument) {
        self.instruments.insert(instrument.id.clone(), instrument);
    }

    pub fn add_position(&mut self, position: Position) {
        self.positions.insert(position.instrument.clone(), position);
    }

    /// Current price of an instrument from the catalog.
    pub fn price_of(&self, instrument: &str) -> Option<f64> {
        self.instruments.get(instrument).map(|i| i.price)
    }

    /// Whether an instrument has an open (non-flat) position.
    pub fn has_position(&self, instrument: &str) -> bool {
        self.positions.get(instrument).is_some_and(|p| !p.is_flat())
    }

    pub fn position(&self, instrument: &str) -> Option<&Position> {
        self.positions.get(instrument).filter(|p| !p.is_flat())
    }

    /// Market value of one position at catalog prices (cost basis when the
    /// instrument is missing from the catalog).
    pub fn position_value(&self, instrument: &str) -> f64 {
        match self.positions.get(instrument) {
            Some(pos) => {
                let price = self.price_of(instrument).unwrap_or(pos.average_cost);
                pos.market_value(price)
            }
            None => 0.0,
        }
    }

    /// Total value = cash + sum of position market values at catalog prices.
    pub fn total_value(&self) -> f64 {
        let position_value: f64 = self
            .positions
            .keys()
            .map(|id| self.position_value(id))
            .sum();
        self.cash + position_value
    }

    /// Portfolio weight of one instrument, zero for degenerate totals.
    pub fn weight_of(&self, instrument: &str) -> f64 {
        let total = self.total_value();
        if total <= 0.0 {
            return 0.0;
        }
        self.position_value(instrument) / total
    }

    /// Quality score of the whole portfolio: value-weighted mean of
    /// instrument scores. Cash scores zero, so deploying cash into scored
    /// instruments raises the portfolio score.
    pub fn score(&self) -> f64 {
        let total = self.total_value();
        if total <= 0.0 {
            return 0.0;
        }
        self.positions
            .iter()
            .map(|(id, _)| {
                let score = self.instruments.get(id).map_or(0.0, |i| i.score);
                (self.position_value(id) / total) * score
            })
            .sum()
    }

    /// Position weight per country, from instrument tags.
    pub fn country_weights(&self) -> BTreeMap<String, f64> {
        self.tag_weights(|i| &i.country)
    }

    /// Position weight per industry, from instrument tags.
    pub fn industry_weights(&self) -> BTreeMap<String, f64> {
        self.tag_weights(|i| &i.industry)
    }

    fn tag_weights(&self, tag: impl Fn(&Instrument) -> &String) -> BTreeMap<String, f64> {
        let total = self.total_value();
        let mut weights = BTreeMap::new();
        if total <= 0.0 {
            return weights;
        }
        for id in self.positions.keys() {
            if let Some(instrument) = self.instruments.get(id) {
                let w = self.position_value(id) / total;
                *weights.entry(tag(instrument).clone()).or_insert(0.0) += w;
            }
        }
        weights
    }

    /// Concentration penalty in `[0, 1]`: mean total-variation distance of
    /// actual country and industry weights from their targets. A dimension
    /// with no configured targets contributes nothing.
    pub fn concentration_penalty(&self) -> f64 {
        let dims = [
            (self.country_weights(), &self.target_country_weights),
            (self.industry_weights(), &self.target_industry_weights),
        ];
        let mut active = 0usize;
        let mut penalty = 0.0;
        for (actual, targets) in dims {
            if targets.is_empty() {
                continue;
            }
            active += 1;
            let keys: std::collections::BTreeSet<&String> =
                actual.keys().chain(targets.keys()).collect();
            let deviation: f64 = keys
                .into_iter()
                .map(|k| {
                    let a = actual.get(k).copied().unwrap_or(0.0);
                    let t = targets.get(k).copied().unwrap_or(0.0);
                    (a - t).abs()
                })
                .sum();
            penalty += deviation / 2.0;
        }
        if active == 0 {
            0.0
        } else {
            penalty / active as f64
        }
    }

    /// Symmetric correlation lookup.
    pub fn correlation_between(&self, a: &str, b: &str) -> Option<f64> {
        self.correlations
            .get(a)
            .and_then(|row| row.get(b))
            .or_else(|| self.correlations.get(b).and_then(|row| row.get(a)))
            .copied()
    }

    /// Apply one trade at the given price, charging `costs`, mutating cash
    /// and positions. Returns what happened or why it could not.
    pub fn apply_trade(
        &mut self,
        op: &Opportunity,
        price: f64,
        costs: &TradeCosts,
    ) -> Result<TradeEffect, TradeViolation> {
        self.apply_trade_with_floor(op, price, costs, 0.0)
    }

    /// [`PortfolioState::apply_trade`] with an explicit cash floor.
    /// Relaxed-constraint scenarios pass a negative floor to permit bounded
    /// over-budget buys.
    pub fn apply_trade_with_floor(
        &mut self,
        op: &Opportunity,
        price: f64,
        costs: &TradeCosts,
        cash_floor: f64,
    ) -> Result<TradeEffect, TradeViolation> {
        let instrument = self
            .instruments
            .get(&op.instrument)
            .ok_or_else(|| TradeViolation::UnknownInstrument(op.instrument.clone()))?;
        let quantity = instrument.round_to_lot(op.quantity);
        if quantity <= 0.0 {
            return Err(TradeViolation::BelowMinimumLot {
                instrument: op.instrument.clone(),
                quantity: op.quantity,
            });
        }
        let notional = quantity * price;
        let cost = costs.cost_for(notional);

        match op.side {
            Side::Buy => {
                let required = notional + cost;
                if self.cash - required < cash_floor {
                    return Err(TradeViolation::InsufficientCash {
                        required,
                        available: self.cash - cash_floor,
                    });
                }
                self.cash -= required;
                match self.positions.get_mut(&op.instrument) {
                    Some(pos) => {
                        let total_cost = pos.average_cost * pos.quantity + notional;
                        pos.quantity += quantity;
                        pos.average_cost = total_cost / pos.quantity;
                    }
                    None => {
                        self.positions.insert(
                            op.instrument.clone(),
                            Position::new(op.instrument.clone(), quantity, price),
                        );
                    }
                }
            }
            Side::Sell => {
                let held = self.positions.get(&op.instrument).map_or(0.0, |p| p.quantity);
                if quantity > held {
                    return Err(TradeViolation::ExceedsHolding {
                        instrument: op.instrument.clone(),
                        requested: quantity,
                        held,
                    });
                }
                self.cash += notional - cost;
                if let Some(pos) = self.positions.get_mut(&op.instrument) {
                    pos.quantity -= quantity;
                    pos.days_since_last_sell = Some(0);
                    if pos.quantity <= f64::EPSILON {
                        self.positions.remove(&op.instrument);
                    }
                }
            }
        }

        Ok(TradeEffect {
            quantity,
            notional,
            transaction_cost: cost,
            cash_after: self.cash,
        })
    }
}
