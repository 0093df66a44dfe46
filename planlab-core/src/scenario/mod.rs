//! Scenario engine — alternate price/market worlds for stress-testing a
//! sequence before it is ranked.
//!
//! Each mode is independently toggleable from configuration. Every sequence
//! always receives the baseline scenario first, so a sequence is never left
//! without at least one world to be scored in, regardless of which optional
//! modes are enabled or how much market data its instruments carry.

mod monte_carlo;
mod regime;

pub use regime::Regime;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::PlannerConfig;
use crate::domain::{PortfolioState, Sequence};

/// Fixed perturbations applied uniformly to every instrument in the
/// sequence, around the 1.0 baseline.
const STOCHASTIC_SHIFTS: [(&str, f64); 4] = [
    ("down_10", 0.90),
    ("down_5", 0.95),
    ("up_5", 1.05),
    ("up_10", 1.10),
];

/// (years, blend weight) horizon ladder for multi-timeframe projections.
const HORIZONS: [(u32, f64); 3] = [(1, 0.2), (3, 0.3), (5, 0.5)];

/// Annual growth assumed per unit of instrument score when projecting a
/// horizon forward.
const HORIZON_GROWTH_RATE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScenarioKind {
    Baseline,
    Stochastic,
    MonteCarlo,
    Regime,
    MultiTimeframe,
    Relaxed,
}

/// Loosened limits for a relaxed variant: extra cash headroom as a fraction
/// of available cash, and the factor by which an over-ask sell is still
/// accepted (clamped to the held quantity).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Relaxation {
    pub cash_slack: f64,
    pub position_factor: f64,
}

impl Default for Relaxation {
    fn default() -> Self {
        Self {
            cash_slack: 0.2,
            position_factor: 1.5,
        }
    }
}

/// One hypothetical world a sequence is replayed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub label: String,
    pub kind: ScenarioKind,
    /// Per-instrument price multipliers; absent instruments trade at 1.0.
    pub price_multipliers: BTreeMap<String, f64>,
    pub regime: Option<Regime>,
    /// Aggregation weight within the non-stochastic mean.
    pub weight: f64,
    pub relaxation: Option<Relaxation>,
}

impl Scenario {
    pub fn baseline() -> Self {
        Self {
            label: "baseline".to_string(),
            kind: ScenarioKind::Baseline,
            price_multipliers: BTreeMap::new(),
            regime: None,
            weight: 1.0,
            relaxation: None,
        }
    }

    fn uniform(label: String, kind: ScenarioKind, sequence: &Sequence, factor: f64) -> Self {
        let price_multipliers = sequence
            .instruments()
            .into_iter()
            .map(|id| (id.to_string(), factor))
            .collect();
        Self {
            label,
            kind,
            price_multipliers,
            regime: None,
            weight: 1.0,
            relaxation: None,
        }
    }

    pub fn multiplier_for(&self, instrument: &str) -> f64 {
        self.price_multipliers.get(instrument).copied().unwrap_or(1.0)
    }

    /// Stochastic-style scenarios participate in the worst-case/mean blend.
    pub fn is_stochastic_style(&self) -> bool {
        matches!(self.kind, ScenarioKind::Stochastic | ScenarioKind::MonteCarlo)
    }

    pub fn is_relaxed(&self) -> bool {
        self.relaxation.is_some()
    }
}

/// Build the ordered scenario set for one sequence. Deterministic: the same
/// (sequence, portfolio, config) triple yields the same list.
pub fn scenarios_for(
    sequence: &Sequence,
    portfolio: &PortfolioState,
    config: &PlannerConfig,
) -> Vec<Scenario> {
    let mut scenarios = vec![Scenario::baseline()];

    if config.enable_stochastic_scenarios {
        for (name, factor) in STOCHASTIC_SHIFTS {
            scenarios.push(Scenario::uniform(
                format!("stochastic_{name}"),
                ScenarioKind::Stochastic,
                sequence,
                factor,
            ));
        }
    }

    if config.enable_monte_carlo_paths {
        scenarios.extend(monte_carlo::path_scenarios(sequence, portfolio, config));
    }

    if config.enable_market_regime_scenarios {
        for regime in Regime::all() {
            scenarios.push(Scenario {
                label: format!("regime_{regime}"),
                kind: ScenarioKind::Regime,
                price_multipliers: BTreeMap::new(),
                regime: Some(regime),
                weight: 1.0,
                relaxation: None,
            });
        }
    }

    if config.enable_multi_timeframe {
        for (years, weight) in HORIZONS {
            scenarios.push(horizon_scenario(sequence, portfolio, years, weight));
        }
    }

    if config.enable_constraint_relaxation {
        scenarios.push(Scenario {
            label: "relaxed".to_string(),
            kind: ScenarioKind::Relaxed,
            price_multipliers: BTreeMap::new(),
            regime: None,
            weight: 1.0,
            relaxation: Some(Relaxation::default()),
        });
    }

    scenarios
}

/// Project each instrument's price forward by `years` at a growth rate
/// proportional to its score. Instruments missing from the catalog keep
/// their baseline price.
fn horizon_scenario(
    sequence: &Sequence,
    portfolio: &PortfolioState,
    years: u32,
    weight: f64,
) -> Scenario {
    let price_multipliers = sequence
        .instruments()
        .into_iter()
        .filter_map(|id| {
            portfolio
                .instruments
                .get(id)
                .map(|i| (id.to_string(), (1.0 + HORIZON_GROWTH_RATE * i.score).powi(years as i32)))
        })
        .collect();
    Scenario {
        label: format!("horizon_{years}y"),
        kind: ScenarioKind::MultiTimeframe,
        price_multipliers,
        regime: None,
        weight,
        relaxation: None,
    }
}

/// Truncated prefixes of a sequence (first 1, 2, … steps), emitted as
/// independent candidates so interrupted execution is evaluated on its own
/// merits. Depth-1 sequences have no proper prefix.
pub fn partial_execution_variants(sequence: &Sequence) -> Vec<Sequence> {
    (1..sequence.depth()).map(|n| sequence.prefix(n)).collect()
}
