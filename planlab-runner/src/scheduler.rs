//! Incremental scheduler — the background thread that re-plans on a cadence.
//!
//! Communication with the owning thread is via an `mpsc` command channel; the
//! published state (beam, phase, cycle counters) lives behind an
//! `Arc<RwLock<PlannerSnapshot>>` and is swapped in one write at merge time,
//! so readers never observe a half-merged cycle.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, RwLock, RwLockWriteGuard};
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tracing::{debug, info, warn};

use planlab_core::config::PlannerConfig;
use planlab_core::domain::PortfolioState;

use crate::beam::BeamEntry;
use crate::history::RecommendationHistory;
use crate::pass::run_pass;
use crate::store::SequenceStore;

/// Commands sent to the scheduler thread.
#[derive(Debug)]
pub enum SchedulerCommand {
    /// Run one cycle now instead of waiting for the interval.
    RunCycle,
    /// Drop all sequences (evaluations are retained) and re-plan.
    Regenerate,
    /// Replace the planner configuration; a changed hash regenerates.
    SetConfig(Box<PlannerConfig>),
    Shutdown,
}

/// Where the scheduler currently is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    Idle,
    Generating,
    Evaluating,
    Merging,
    /// `incremental_planner_enabled = false`: commands other than
    /// configuration changes and shutdown are ignored.
    Disabled,
}

impl fmt::Display for SchedulerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SchedulerPhase::Idle => "idle",
            SchedulerPhase::Generating => "generating",
            SchedulerPhase::Evaluating => "evaluating",
            SchedulerPhase::Merging => "merging",
            SchedulerPhase::Disabled => "disabled",
        };
        f.write_str(s)
    }
}

/// Counters from the most recent completed cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleStats {
    pub generated: usize,
    pub reused: usize,
    pub evaluated: usize,
    pub dropped_infeasible: usize,
    pub elapsed_secs: f64,
}

/// Everything a reader can see of the scheduler, cloned out in one piece.
#[derive(Debug, Clone)]
pub struct PlannerSnapshot {
    pub phase: SchedulerPhase,
    /// Completed cycles since the scheduler started.
    pub cycle: u64,
    pub beam: Vec<BeamEntry>,
    /// Hash of the configuration the published beam was scored under.
    pub config_hash: String,
    pub last_cycle: Option<CycleStats>,
}

/// Returned by handle methods when the scheduler thread is gone.
#[derive(Debug, Error)]
#[error("scheduler is not running")]
pub struct SchedulerStopped;

/// Foreground handle to a running scheduler.
///
/// Dropping the handle disconnects the command channel and the thread exits
/// after its current cycle; [`SchedulerHandle::shutdown`] does the same but
/// also cancels mid-cycle work and joins.
pub struct SchedulerHandle {
    tx: Sender<SchedulerCommand>,
    cancel: Arc<AtomicBool>,
    snapshot: Arc<RwLock<PlannerSnapshot>>,
    join: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Current published state.
    pub fn snapshot(&self) -> PlannerSnapshot {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn run_cycle(&self) -> Result<(), SchedulerStopped> {
        self.tx
            .send(SchedulerCommand::RunCycle)
            .map_err(|_| SchedulerStopped)
    }

    pub fn regenerate(&self) -> Result<(), SchedulerStopped> {
        self.tx
            .send(SchedulerCommand::Regenerate)
            .map_err(|_| SchedulerStopped)
    }

    pub fn set_config(&self, config: PlannerConfig) -> Result<(), SchedulerStopped> {
        self.tx
            .send(SchedulerCommand::SetConfig(Box::new(config)))
            .map_err(|_| SchedulerStopped)
    }

    /// Cancel in-flight work, stop the thread, and wait for it.
    pub fn shutdown(mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        let _ = self.tx.send(SchedulerCommand::Shutdown);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Spawn the scheduler thread.
///
/// The portfolio snapshot and the initial configuration are owned by the
/// thread; readers observe it only through [`SchedulerHandle::snapshot`].
pub fn spawn_scheduler(
    store: Arc<dyn SequenceStore>,
    portfolio: PortfolioState,
    config: PlannerConfig,
    history: Option<RecommendationHistory>,
) -> SchedulerHandle {
    let (tx, rx) = mpsc::channel();
    let cancel = Arc::new(AtomicBool::new(false));
    let initial_phase = if config.incremental_planner_enabled {
        SchedulerPhase::Idle
    } else {
        SchedulerPhase::Disabled
    };
    let snapshot = Arc::new(RwLock::new(PlannerSnapshot {
        phase: initial_phase,
        cycle: 0,
        beam: Vec::new(),
        config_hash: config.config_hash(),
        last_cycle: None,
    }));

    let join = {
        let cancel = Arc::clone(&cancel);
        let snapshot = Arc::clone(&snapshot);
        thread::Builder::new()
            .name("planlab-scheduler".into())
            .spawn(move || {
                SchedulerLoop {
                    store,
                    portfolio,
                    config,
                    history,
                    cancel,
                    snapshot,
                    rx,
                    cycle_count: 0,
                }
                .run();
            })
            .expect("failed to spawn scheduler thread")
    };

    SchedulerHandle {
        tx,
        cancel,
        snapshot,
        join: Some(join),
    }
}

fn write_snapshot(snapshot: &RwLock<PlannerSnapshot>) -> RwLockWriteGuard<'_, PlannerSnapshot> {
    snapshot.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct SchedulerLoop {
    store: Arc<dyn SequenceStore>,
    portfolio: PortfolioState,
    config: PlannerConfig,
    history: Option<RecommendationHistory>,
    cancel: Arc<AtomicBool>,
    snapshot: Arc<RwLock<PlannerSnapshot>>,
    rx: Receiver<SchedulerCommand>,
    cycle_count: u64,
}

impl SchedulerLoop {
    fn run(mut self) {
        loop {
            let keep_going = if self.config.incremental_planner_enabled {
                match self.rx.recv_timeout(self.config.scheduler_interval()) {
                    Ok(cmd) => self.handle(cmd),
                    Err(RecvTimeoutError::Timeout) => {
                        self.cycle();
                        true
                    }
                    Err(RecvTimeoutError::Disconnected) => false,
                }
            } else {
                // Dormant: no cadence, block until a command arrives.
                match self.rx.recv() {
                    Ok(cmd) => self.handle(cmd),
                    Err(_) => false,
                }
            };
            if !keep_going {
                break;
            }
        }
        debug!("scheduler thread exiting");
    }

    /// Returns false when the loop should stop.
    fn handle(&mut self, cmd: SchedulerCommand) -> bool {
        match cmd {
            SchedulerCommand::RunCycle => {
                if self.config.incremental_planner_enabled {
                    self.cycle();
                } else {
                    warn!("cycle requested while the planner is disabled, ignoring");
                }
                true
            }
            SchedulerCommand::Regenerate => {
                if !self.config.incremental_planner_enabled {
                    warn!("regeneration requested while the planner is disabled, ignoring");
                    return true;
                }
                // Single-flight: collapse every queued regeneration into this
                // one, deferring other commands until it has run.
                let mut deferred = Vec::new();
                let mut collapsed = 0usize;
                while let Ok(queued) = self.rx.try_recv() {
                    match queued {
                        SchedulerCommand::Regenerate => collapsed += 1,
                        other => deferred.push(other),
                    }
                }
                if collapsed > 0 {
                    debug!(collapsed, "collapsed queued regeneration requests");
                }
                self.regenerate();
                for queued in deferred {
                    if !self.handle(queued) {
                        return false;
                    }
                }
                true
            }
            SchedulerCommand::SetConfig(config) => {
                self.set_config(*config);
                true
            }
            SchedulerCommand::Shutdown => false,
        }
    }

    fn regenerate(&mut self) {
        info!("regenerating: clearing sequences, evaluations retained");
        if let Err(e) = self.store.clear_sequences() {
            warn!(error = %e, "regeneration failed to clear sequences");
            return;
        }
        self.cycle();
    }

    fn set_config(&mut self, config: PlannerConfig) {
        let changed = config.config_hash() != self.config.config_hash();
        let enabled = config.incremental_planner_enabled;
        self.config = config;

        {
            let mut snap = write_snapshot(&self.snapshot);
            snap.phase = if enabled {
                SchedulerPhase::Idle
            } else {
                SchedulerPhase::Disabled
            };
            snap.config_hash = self.config.config_hash();
        }

        if changed && enabled {
            info!("configuration changed, regenerating");
            self.regenerate();
        }
    }

    fn cycle(&mut self) {
        let snapshot = Arc::clone(&self.snapshot);
        let publish_phase = move |phase: SchedulerPhase| {
            info!(phase = %phase, "scheduler phase");
            write_snapshot(&snapshot).phase = phase;
        };

        let outcome = match run_pass(
            self.store.as_ref(),
            &self.portfolio,
            &self.config,
            Some(&publish_phase),
            Some(self.cancel.as_ref()),
        ) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "planning cycle failed");
                write_snapshot(&self.snapshot).phase = SchedulerPhase::Idle;
                return;
            }
        };

        if self.cancel.load(Ordering::Relaxed) {
            // Shutdown in flight; leave the published beam untouched.
            return;
        }

        self.cycle_count += 1;
        let stats = CycleStats {
            generated: outcome.generated,
            reused: outcome.reused,
            evaluated: outcome.evaluated,
            dropped_infeasible: outcome.dropped_infeasible,
            elapsed_secs: outcome.elapsed_secs,
        };
        let config_hash = self.config.config_hash();
        let publish_beam = !outcome.beam.is_empty();

        {
            let mut snap = write_snapshot(&self.snapshot);
            snap.phase = SchedulerPhase::Idle;
            snap.cycle = self.cycle_count;
            snap.config_hash = config_hash.clone();
            snap.last_cycle = Some(stats);
            if publish_beam {
                snap.beam = outcome.beam.clone();
            } else {
                info!("zero feasible sequences, previous beam retained");
            }
        }

        if publish_beam {
            if let Some(history) = &self.history {
                if let Err(e) = history.append_beam(self.cycle_count, &config_hash, &outcome.beam)
                {
                    warn!(error = %e, "failed to append recommendation history");
                }
            }
        }

        info!(
            cycle = self.cycle_count,
            beam = outcome.beam.len(),
            "cycle complete"
        );
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
