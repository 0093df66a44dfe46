//! Sequence evaluator — replays a sequence step-by-step in one scenario
//! world and scores the outcome.
//!
//! The replay works on a private portfolio clone with scenario prices
//! applied, so neither the caller's snapshot nor sibling evaluations observe
//! any mutation. Every failure is local: a hard-constraint violation, an
//! overrun deadline, or a non-finite score marks that one (sequence,
//! scenario) pair infeasible and the remaining scenarios still aggregate.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PlannerConfig;
use crate::domain::{Opportunity, PortfolioState, Sequence};
use crate::fingerprint::Fingerprint;
use crate::scenario::{self, Scenario, ScenarioKind};

/// Pairwise position correlation above this flags a sequence infeasible
/// under correlation-aware filtering.
const CORRELATION_LIMIT: f64 = 0.7;

/// Haircut applied when a sequence is feasible only under relaxed limits.
const RELAXATION_PENALTY: f64 = 0.25;

/// The four objective terms of the composite score, each ≥ 0 except the raw
/// return delta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub raw_return: f64,
    pub diversification_penalty: f64,
    pub cost_penalty: f64,
    pub risk_penalty: f64,
}

/// Outcome of replaying one sequence in one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub label: String,
    pub kind: ScenarioKind,
    pub composite: f64,
    pub components: ScoreComponents,
    pub feasible: bool,
    pub relaxed: bool,
    pub weight: f64,
}

impl ScenarioResult {
    fn infeasible(scenario: &Scenario) -> Self {
        Self {
            label: scenario.label.clone(),
            kind: scenario.kind,
            composite: 0.0,
            components: ScoreComponents::default(),
            feasible: false,
            relaxed: scenario.is_relaxed(),
            weight: scenario.weight,
        }
    }

    fn is_stochastic_style(&self) -> bool {
        matches!(self.kind, ScenarioKind::Stochastic | ScenarioKind::MonteCarlo)
    }
}

/// Aggregate over a sequence's feasible scenario results. Persisted in the
/// store keyed by fingerprint, and reused across regenerations while the
/// configuration hash matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub fingerprint: Fingerprint,
    pub composite: f64,
    pub components: ScoreComponents,
    pub feasible_results: usize,
    pub total_results: usize,
    /// True when only relaxed-limit scenarios were feasible; the composite
    /// already carries the corresponding haircut.
    pub relaxed_only: bool,
    pub config_hash: String,
    pub evaluated_at: DateTime<Utc>,
}

/// Replay `sequence` under `scenario` against a private copy of the
/// portfolio. `deadline` bounds this one evaluation; overrunning it yields
/// an infeasible result, never an error.
pub fn evaluate(
    sequence: &Sequence,
    scenario: &Scenario,
    portfolio: &PortfolioState,
    config: &PlannerConfig,
    deadline: Instant,
) -> ScenarioResult {
    let mut world = portfolio.clone();
    for (id, multiplier) in &scenario.price_multipliers {
        if let Some(instrument) = world.instruments.get_mut(id) {
            instrument.price *= multiplier;
        }
    }
    let cash_floor = scenario
        .relaxation
        .map_or(0.0, |r| -(r.cash_slack * world.cash));

    let score_before = world.score();
    let total_before = world.total_value();
    let costs = config.trade_costs();
    let mut total_costs = 0.0;

    for step in &sequence.steps {
        if Instant::now() >= deadline {
            debug!(
                fingerprint = sequence.fingerprint.short(),
                label = scenario.label,
                "evaluation deadline exceeded"
            );
            return ScenarioResult::infeasible(scenario);
        }
        let op = &step.opportunity;
        let price = op.price * scenario.multiplier_for(&op.instrument);
        let op = match adjust_for_relaxation(op, scenario, &world) {
            Some(op) => op,
            None => return ScenarioResult::infeasible(scenario),
        };
        if below_minimum_value(&op, price, config) {
            debug!(
                fingerprint = sequence.fingerprint.short(),
                label = scenario.label,
                instrument = op.instrument,
                "trade below minimum value"
            );
            return ScenarioResult::infeasible(scenario);
        }
        match world.apply_trade_with_floor(&op, price, &costs, cash_floor) {
            Ok(effect) => total_costs += effect.transaction_cost,
            Err(violation) => {
                debug!(
                    fingerprint = sequence.fingerprint.short(),
                    label = scenario.label,
                    %violation,
                    "scenario infeasible"
                );
                return ScenarioResult::infeasible(scenario);
            }
        }
    }

    let regime_bias = scenario
        .regime
        .map_or(1.0, |regime| regime.sequence_bias(sequence));
    let raw_return = (world.score() - score_before) * regime_bias;
    let diversification_penalty = world.concentration_penalty();
    let cost_penalty = if total_before > 0.0 {
        total_costs / total_before
    } else {
        0.0
    };

    let mut risk_penalty = 0.0;
    if config.enable_correlation_aware {
        match correlation_risk(&world) {
            Some(risk) => risk_penalty = risk,
            None => {
                debug!(
                    fingerprint = sequence.fingerprint.short(),
                    label = scenario.label,
                    "pairwise correlation above limit"
                );
                return ScenarioResult::infeasible(scenario);
            }
        }
    }

    let weights = config.risk_profile.weights();
    let composite = weights.raw_return * raw_return
        - weights.diversification * config.diversity_weight * diversification_penalty
        - weights.cost * config.cost_penalty_factor * cost_penalty
        - weights.risk * risk_penalty;
    if !composite.is_finite() {
        return ScenarioResult::infeasible(scenario);
    }

    ScenarioResult {
        label: scenario.label.clone(),
        kind: scenario.kind,
        composite,
        components: ScoreComponents {
            raw_return,
            diversification_penalty,
            cost_penalty,
            risk_penalty,
        },
        feasible: true,
        relaxed: scenario.is_relaxed(),
        weight: scenario.weight,
    }
}

/// Build scenarios, evaluate them all, and aggregate. `None` means every
/// scenario was infeasible and the sequence is dropped.
pub fn evaluate_sequence(
    sequence: &Sequence,
    portfolio: &PortfolioState,
    config: &PlannerConfig,
) -> Option<Evaluation> {
    let scenarios = scenario::scenarios_for(sequence, portfolio, config);
    let results: Vec<ScenarioResult> = scenarios
        .iter()
        .map(|s| {
            let deadline = Instant::now() + config.evaluation_timeout();
            evaluate(sequence, s, portfolio, config, deadline)
        })
        .collect();
    aggregate(sequence, &results, config)
}

/// Fold scenario results into one Evaluation. Strict (non-relaxed) feasible
/// results take precedence; when only relaxed results are feasible the
/// composite is haircut. The worst-case/mean blend applies only when
/// stochastic-style results are present.
pub fn aggregate(
    sequence: &Sequence,
    results: &[ScenarioResult],
    config: &PlannerConfig,
) -> Option<Evaluation> {
    let feasible: Vec<&ScenarioResult> = results.iter().filter(|r| r.feasible).collect();
    if feasible.is_empty() {
        return None;
    }
    let strict: Vec<&ScenarioResult> = feasible
        .iter()
        .copied()
        .filter(|r| !r.relaxed)
        .collect();
    let relaxed_only = strict.is_empty();
    let pool = if relaxed_only { &feasible } else { &strict };

    let weight_sum: f64 = pool.iter().map(|r| r.weight).sum();
    let mean = pool
        .iter()
        .map(|r| r.weight * r.composite)
        .sum::<f64>()
        / weight_sum;
    let worst = pool
        .iter()
        .map(|r| r.composite)
        .fold(f64::INFINITY, f64::min);

    let mut composite = if pool.iter().any(|r| r.is_stochastic_style()) {
        config.worst_case_weight * worst + config.mean_weight * mean
    } else {
        mean
    };
    if relaxed_only {
        composite *= 1.0 - RELAXATION_PENALTY;
    }

    let components = ScoreComponents {
        raw_return: weighted_component(pool, weight_sum, |c| c.raw_return),
        diversification_penalty: weighted_component(pool, weight_sum, |c| c.diversification_penalty),
        cost_penalty: weighted_component(pool, weight_sum, |c| c.cost_penalty),
        risk_penalty: weighted_component(pool, weight_sum, |c| c.risk_penalty),
    };

    Some(Evaluation {
        fingerprint: sequence.fingerprint.clone(),
        composite,
        components,
        feasible_results: feasible.len(),
        total_results: results.len(),
        relaxed_only,
        config_hash: config.config_hash(),
        evaluated_at: Utc::now(),
    })
}

fn weighted_component(
    pool: &[&ScenarioResult],
    weight_sum: f64,
    component: impl Fn(&ScoreComponents) -> f64,
) -> f64 {
    pool.iter()
        .map(|r| r.weight * component(&r.components))
        .sum::<f64>()
        / weight_sum
}

/// Under relaxation, a sell over-asking the held quantity by at most the
/// position factor is clamped to a full liquidation instead of failing.
/// Returns `None` when the over-ask exceeds even the relaxed limit.
fn adjust_for_relaxation(
    op: &Opportunity,
    scenario: &Scenario,
    world: &PortfolioState,
) -> Option<Opportunity> {
    let Some(relaxation) = scenario.relaxation else {
        return Some(op.clone());
    };
    if op.side.is_buy() {
        return Some(op.clone());
    }
    let held = world.position(&op.instrument).map_or(0.0, |p| p.quantity);
    if op.quantity <= held {
        return Some(op.clone());
    }
    if held > 0.0 && op.quantity <= relaxation.position_factor * held {
        let mut clamped = op.clone();
        clamped.quantity = held;
        return Some(clamped);
    }
    None
}

/// Per-calculator minimum trade value, resolved from the producing
/// calculator's own parameters. Calculators without one impose no minimum.
fn below_minimum_value(op: &Opportunity, price: f64, config: &PlannerConfig) -> bool {
    let key = if op.side.is_sell() {
        "min_sell_value"
    } else {
        "min_trade_value"
    };
    let minimum = config.calculator_param(&op.source, key).unwrap_or(0.0);
    op.quantity * price < minimum
}

/// Mean positive pairwise correlation across open positions, or `None` when
/// any pair breaches the limit. Pairs without correlation data are skipped.
fn correlation_risk(world: &PortfolioState) -> Option<f64> {
    let ids: Vec<&String> = world
        .positions
        .iter()
        .filter(|(_, p)| !p.is_flat())
        .map(|(id, _)| id)
        .collect();
    let mut sum = 0.0;
    let mut pairs = 0usize;
    for i in 0..ids.len() {
        for j in (i + 1)..ids.len() {
            if let Some(c) = world.correlation_between(ids[i], ids[j]) {
                if c > CORRELATION_LIMIT {
                    return None;
                }
                if c > 0.0 {
                    sum += c;
                }
                pairs += 1;
            }
        }
    }
    if pairs == 0 {
        Some(0.0)
    } else {
        Some(sum / pairs as f64)
    }
}
