//! One planning pass: generate candidates, evaluate what the cache cannot
//! answer, merge into a fresh beam.
//!
//! The pass is the synchronous heart of the incremental planner. It owns no
//! thread and no clock — the scheduler calls it on a cadence, the CLI calls
//! it once. Evaluation reuse is keyed on (fingerprint, config hash): a
//! sequence whose fingerprint already carries an evaluation under the current
//! configuration is never scored again.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::{debug, info};

use planlab_core::catalog::Catalog;
use planlab_core::config::PlannerConfig;
use planlab_core::domain::{PortfolioState, Sequence};
use planlab_core::evaluator::{self, Evaluation};
use planlab_core::fingerprint::Fingerprint;
use planlab_core::generator;
use planlab_core::scenario;

use crate::beam::{self, BeamEntry};
use crate::scheduler::SchedulerPhase;
use crate::store::SequenceStore;

/// What one pass did, with the beam it produced.
#[derive(Debug, Clone)]
pub struct PassOutcome {
    pub beam: Vec<BeamEntry>,
    /// Distinct sequences produced by generation this pass.
    pub generated: usize,
    /// Generated sequences answered from the evaluation cache.
    pub reused: usize,
    /// Sequences scored fresh this pass, dropped ones included.
    pub evaluated: usize,
    /// Fresh scorings that were infeasible under every scenario.
    pub dropped_infeasible: usize,
    pub elapsed_secs: f64,
}

impl PassOutcome {
    fn partial(generated: usize, reused: usize, evaluated: usize, started: Instant) -> Self {
        Self {
            beam: Vec::new(),
            generated,
            reused,
            evaluated,
            dropped_infeasible: 0,
            elapsed_secs: started.elapsed().as_secs_f64(),
        }
    }
}

/// Run one full pass against the store.
///
/// Phase transitions are reported through `phase_cb` as the pass moves from
/// generation to evaluation to merge. `cancel` is checked between phases; a
/// cancelled pass returns what it has counted so far with an empty beam, and
/// everything already written to the store stays written.
pub fn run_pass(
    store: &dyn SequenceStore,
    portfolio: &PortfolioState,
    config: &PlannerConfig,
    phase_cb: Option<&dyn Fn(SchedulerPhase)>,
    cancel: Option<&AtomicBool>,
) -> Result<PassOutcome> {
    let started = Instant::now();
    let config_hash = config.config_hash();
    let report = |phase: SchedulerPhase| {
        if let Some(cb) = phase_cb {
            cb(phase);
        }
    };
    let cancelled = || cancel.is_some_and(|f| f.load(Ordering::Relaxed));

    if cancelled() {
        return Ok(PassOutcome::partial(0, 0, 0, started));
    }

    // ─── Generation ──────────────────────────────────────────────────

    report(SchedulerPhase::Generating);
    let opportunities = Catalog::new()
        .generate(portfolio, config)
        .context("opportunity generation failed")?;
    let mut pool = generator::expand(&opportunities, portfolio, config);
    if config.enable_partial_execution {
        let variants: Vec<Sequence> = pool
            .iter()
            .flat_map(scenario::partial_execution_variants)
            .collect();
        pool.extend(variants);
    }

    // Identity is the fingerprint; partial-execution prefixes routinely
    // collide with shallower survivors, so collapse duplicates here.
    let mut candidates: BTreeMap<Fingerprint, Sequence> = BTreeMap::new();
    for sequence in pool {
        candidates.entry(sequence.fingerprint.clone()).or_insert(sequence);
    }
    let generated = candidates.len();
    for sequence in candidates.values() {
        store.put_sequence(sequence)?;
    }

    if cancelled() {
        info!(generated, "planning pass cancelled after generation");
        return Ok(PassOutcome::partial(generated, 0, 0, started));
    }

    // ─── Evaluation ──────────────────────────────────────────────────

    report(SchedulerPhase::Evaluating);
    let mut reused = 0usize;
    let mut to_evaluate: Vec<&Sequence> = Vec::new();
    for sequence in candidates.values() {
        match store.get_evaluation(&sequence.fingerprint)? {
            Some(evaluation) if evaluation.config_hash == config_hash => reused += 1,
            _ => to_evaluate.push(sequence),
        }
    }
    let evaluated = to_evaluate.len();

    let results: Vec<(Fingerprint, Option<Evaluation>)> = to_evaluate
        .par_iter()
        .map(|sequence| {
            (
                sequence.fingerprint.clone(),
                evaluator::evaluate_sequence(sequence, portfolio, config),
            )
        })
        .collect();

    let mut dropped_infeasible = 0usize;
    for (fingerprint, evaluation) in results {
        match evaluation {
            Some(evaluation) => store.put_evaluation(&evaluation)?,
            None => {
                debug!(fingerprint = %fingerprint, "infeasible under every scenario, dropped");
                dropped_infeasible += 1;
            }
        }
    }

    if cancelled() {
        info!(generated, reused, evaluated, "planning pass cancelled before merge");
        return Ok(PassOutcome::partial(generated, reused, evaluated, started));
    }

    // ─── Merge ───────────────────────────────────────────────────────

    report(SchedulerPhase::Merging);
    // The beam competes over every stored sequence with a current-config
    // evaluation, not just this pass's candidates, so survivors from earlier
    // passes keep their seats until something better displaces them.
    let mut population: Vec<(Sequence, Evaluation)> = Vec::new();
    for fingerprint in store.sequence_fingerprints()? {
        let Some(evaluation) = store.get_evaluation(&fingerprint)? else {
            continue;
        };
        if evaluation.config_hash != config_hash {
            continue;
        }
        let Some(sequence) = store.get_sequence(&fingerprint)? else {
            continue;
        };
        population.push((sequence, evaluation));
    }
    let beam = beam::select(&population, portfolio, config);

    let elapsed_secs = started.elapsed().as_secs_f64();
    info!(
        generated,
        reused,
        evaluated,
        dropped_infeasible,
        population = population.len(),
        beam = beam.len(),
        elapsed_ms = (elapsed_secs * 1000.0) as u64,
        "planning pass complete"
    );

    Ok(PassOutcome {
        beam,
        generated,
        reused,
        evaluated,
        dropped_infeasible,
        elapsed_secs,
    })
}

// ─── Tests ───────────────────────────────────────────────────────────
