//! PlanLab Core — the trade-sequence planning engine.
//!
//! This crate contains the heart of the planner:
//! - Domain types (instruments, positions, portfolio state, opportunities, sequences)
//! - Configuration gate with aggregated field-scoped validation
//! - Per-calculator parameter contract (closed kind enum + versioned registry)
//! - Opportunity catalog of pluggable calculators
//! - Breadth-first combinatorial sequence generator
//! - Scenario engine (stochastic shifts, Monte Carlo paths, regimes, horizons,
//!   relaxation, partial execution)
//! - Sequence evaluator with multi-objective composite scoring
//! - Content fingerprinting and deterministic RNG hierarchy

pub mod catalog;
pub mod config;
pub mod domain;
pub mod evaluator;
pub mod fingerprint;
pub mod generator;
pub mod rng;
pub mod scenario;
