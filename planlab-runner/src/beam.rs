//! Beam selector — rank, diversity, and Pareto stages over evaluated plans.
//!
//! The selector is a pipeline of stages composed from configuration: the rank
//! stage always runs, the diversity swap and the Pareto filter are optional.
//! It never fabricates a candidate — the output is a subset of the input,
//! reordered.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use planlab_core::config::PlannerConfig;
use planlab_core::domain::{Opportunity, PortfolioState, Sequence};
use planlab_core::evaluator::{Evaluation, ScoreComponents};
use planlab_core::fingerprint::Fingerprint;

/// One ranked recommendation in the current beam.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeamEntry {
    /// 1-based position after all selection stages.
    pub rank: usize,
    pub fingerprint: Fingerprint,
    pub composite: f64,
    pub components: ScoreComponents,
    pub depth: usize,
    /// Human-readable rendering of the plan's trades, in order.
    pub steps: Vec<String>,
}

impl BeamEntry {
    fn new(rank: usize, sequence: &Sequence, evaluation: &Evaluation) -> Self {
        Self {
            rank,
            fingerprint: evaluation.fingerprint.clone(),
            composite: evaluation.composite,
            components: evaluation.components,
            depth: sequence.depth(),
            steps: sequence
                .steps
                .iter()
                .map(|s| render_step(&s.opportunity))
                .collect(),
        }
    }
}

fn render_step(op: &Opportunity) -> String {
    format!("{} {} {} @ {:.2}", op.side, op.quantity, op.instrument, op.price)
}

/// A candidate with its diversity tag resolved against the portfolio.
struct Ranked<'a> {
    sequence: &'a Sequence,
    evaluation: &'a Evaluation,
    /// Whether the plan buys into an under-represented country or industry.
    diverse: bool,
}

/// Pick the beam from evaluated candidates.
///
/// Stages: rank by composite (non-finite scores rejected, top `beam_width`
/// kept), then an optional diversity swap bounded by `diversity_weight` as a
/// fraction of the beam, then an optional Pareto filter when multi-objective
/// selection is enabled. Ordering is deterministic: ties fall back to the
/// fingerprint.
pub fn select(
    candidates: &[(Sequence, Evaluation)],
    portfolio: &PortfolioState,
    config: &PlannerConfig,
) -> Vec<BeamEntry> {
    let (countries, industries) = underweight_tags(portfolio);

    let mut ranked: Vec<Ranked> = candidates
        .iter()
        .filter(|(_, evaluation)| evaluation.composite.is_finite())
        .map(|(sequence, evaluation)| Ranked {
            sequence,
            evaluation,
            diverse: buys_underweight(sequence, &countries, &industries, portfolio),
        })
        .collect();
    sort_candidates(&mut ranked, config);

    let mut rest = ranked.split_off(ranked.len().min(config.beam_width));
    let mut beam = ranked;

    if config.diversity_weight > 0.0 {
        diversity_swap(&mut beam, &mut rest, config);
        sort_candidates(&mut beam, config);
    }

    if config.enable_multi_objective {
        beam = pareto_filter(beam);
    }

    beam.iter()
        .enumerate()
        .map(|(i, c)| BeamEntry::new(i + 1, c.sequence, c.evaluation))
        .collect()
}

/// Composite descending; under multi-objective selection equal composites
/// order by raw return; with an active diversity stage equal scores favor
/// the diverse plan; the fingerprint settles the remaining ties.
fn sort_candidates(candidates: &mut [Ranked], config: &PlannerConfig) {
    candidates.sort_by(|a, b| {
        let mut ord = b.evaluation.composite.total_cmp(&a.evaluation.composite);
        if config.enable_multi_objective {
            ord = ord.then_with(|| {
                b.evaluation
                    .components
                    .raw_return
                    .total_cmp(&a.evaluation.components.raw_return)
            });
        }
        if config.diversity_weight > 0.0 {
            ord = ord.then_with(|| b.diverse.cmp(&a.diverse));
        }
        ord.then_with(|| a.evaluation.fingerprint.cmp(&b.evaluation.fingerprint))
    });
}

/// Countries and industries currently below their target weight.
fn underweight_tags(portfolio: &PortfolioState) -> (BTreeSet<String>, BTreeSet<String>) {
    let country_now = portfolio.country_weights();
    let industry_now = portfolio.industry_weights();
    let countries = portfolio
        .target_country_weights
        .iter()
        .filter(|(name, target)| country_now.get(*name).copied().unwrap_or(0.0) < **target)
        .map(|(name, _)| name.clone())
        .collect();
    let industries = portfolio
        .target_industry_weights
        .iter()
        .filter(|(name, target)| industry_now.get(*name).copied().unwrap_or(0.0) < **target)
        .map(|(name, _)| name.clone())
        .collect();
    (countries, industries)
}

/// Only buys raise exposure, so only buy steps count toward diversity.
fn buys_underweight(
    sequence: &Sequence,
    countries: &BTreeSet<String>,
    industries: &BTreeSet<String>,
    portfolio: &PortfolioState,
) -> bool {
    sequence.steps.iter().any(|step| {
        if !step.opportunity.side.is_buy() {
            return false;
        }
        portfolio
            .instruments
            .get(&step.opportunity.instrument)
            .is_some_and(|instrument| {
                countries.contains(&instrument.country) || industries.contains(&instrument.industry)
            })
    })
}

/// Replace up to `diversity_weight × beam` members that add no
/// under-represented exposure with the best leftover candidates that do.
fn diversity_swap<'a>(beam: &mut [Ranked<'a>], rest: &mut Vec<Ranked<'a>>, config: &PlannerConfig) {
    let budget = (config.diversity_weight * beam.len() as f64).floor() as usize;
    if budget == 0 || rest.is_empty() {
        return;
    }

    let mut swaps = 0usize;
    let mut i = beam.len();
    while i > 0 && swaps < budget {
        i -= 1;
        if beam[i].diverse {
            continue;
        }
        let Some(idx) = rest.iter().position(|c| c.diverse) else {
            break;
        };
        beam[i] = rest.remove(idx);
        swaps += 1;
    }
    if swaps > 0 {
        debug!(swaps, "diversity stage swapped beam members");
    }
}

/// Keep the non-dominated frontier over (composite, diversification, risk,
/// cost). Penalties count downward: `a` dominates `b` when it is at least as
/// good on every axis and strictly better on one.
fn pareto_filter(beam: Vec<Ranked>) -> Vec<Ranked> {
    let keep: Vec<bool> = beam
        .iter()
        .map(|candidate| !beam.iter().any(|other| dominates(other, candidate)))
        .collect();
    let dropped = keep.iter().filter(|k| !**k).count();
    if dropped > 0 {
        debug!(dropped, "pareto stage removed dominated plans");
    }
    beam.into_iter()
        .zip(keep)
        .filter_map(|(candidate, kept)| kept.then_some(candidate))
        .collect()
}

fn dominates(a: &Ranked, b: &Ranked) -> bool {
    let (ac, bc) = (&a.evaluation.components, &b.evaluation.components);
    let at_least_as_good = a.evaluation.composite >= b.evaluation.composite
        && ac.diversification_penalty <= bc.diversification_penalty
        && ac.risk_penalty <= bc.risk_penalty
        && ac.cost_penalty <= bc.cost_penalty;
    let strictly_better = a.evaluation.composite > b.evaluation.composite
        || ac.diversification_penalty < bc.diversification_penalty
        || ac.risk_penalty < bc.risk_penalty
        || ac.cost_penalty < bc.cost_penalty;
    at_least_as_good && strictly_better
}

// ─── Tests ───────────────────────────────────────────────────────────
