//! Planner configuration — raw deserialized form, the validation gate, and
//! the immutable validated configuration the engine consumes.
//!
//! `RawPlannerConfig` is what arrives from a TOML file. The gate
//! ([`RawPlannerConfig::validate`]) is the only way to obtain a
//! [`PlannerConfig`]: bounds-checked fields are rejected with field-scoped
//! errors, un-gated tunables are clamped into range with a warning. A
//! `PlannerConfig` is never mutated — replacing the configuration swaps the
//! whole object and triggers regeneration downstream.

pub mod params;
pub mod validation;

pub use params::{
    full_validate_params, normalize_number, quick_validate_params, required_params, ParamKind,
    ParamSpec, REGISTRY_VERSION,
};
pub use validation::{ConfigurationError, ValidationError, ValidationErrors};

use crate::domain::TradeCosts;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::warn;

/// Risk profile reweighting the composite-score terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskProfile {
    #[default]
    Balanced,
    Conservative,
    Aggressive,
}

/// Multipliers for the four composite-score terms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskWeights {
    pub raw_return: f64,
    pub diversification: f64,
    pub cost: f64,
    pub risk: f64,
}

impl RiskProfile {
    pub fn weights(self) -> RiskWeights {
        match self {
            Self::Balanced => RiskWeights {
                raw_return: 1.0,
                diversification: 1.0,
                cost: 1.0,
                risk: 1.0,
            },
            Self::Conservative => RiskWeights {
                raw_return: 0.5,
                diversification: 2.0,
                cost: 1.5,
                risk: 2.0,
            },
            Self::Aggressive => RiskWeights {
                raw_return: 2.0,
                diversification: 0.5,
                cost: 0.5,
                risk: 0.5,
            },
        }
    }
}

/// Raw planner configuration as read from a TOML file. Every field has a
/// default, so an empty file is a valid starting point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawPlannerConfig {
    // ─── Gate-checked fields (rejected when out of bounds) ───
    pub max_depth: u32,
    pub max_opportunities_per_category: u32,
    pub diversity_weight: f64,
    pub transaction_cost_fixed: f64,
    pub transaction_cost_percent: f64,
    pub min_hold_days: u32,
    pub sell_cooldown_days: u32,
    pub max_loss_threshold: f64,
    pub max_sell_percentage: f64,
    pub allow_buy: bool,
    pub allow_sell: bool,
    pub enabled_calculators: BTreeSet<String>,
    /// Per-calculator parameters; values may be integers or floats and are
    /// normalized to `f64` by the gate.
    pub calculator_params: BTreeMap<String, BTreeMap<String, Value>>,

    // ─── Tunables (clamped into range, never rejected) ───
    pub beam_width: usize,
    pub cost_penalty_factor: f64,
    pub risk_profile: RiskProfile,
    pub enable_multi_objective: bool,
    pub enable_stochastic_scenarios: bool,
    pub enable_market_regime_scenarios: bool,
    pub enable_correlation_aware: bool,
    pub enable_partial_execution: bool,
    pub enable_constraint_relaxation: bool,
    pub enable_monte_carlo_paths: bool,
    pub monte_carlo_path_count: usize,
    pub enable_multi_timeframe: bool,
    pub incremental_planner_enabled: bool,
    pub combinatorial_max_combinations_per_depth: usize,
    pub combinatorial_max_sells: usize,
    pub combinatorial_max_buys: usize,
    pub combinatorial_max_candidates: usize,
    pub worst_case_weight: f64,
    pub mean_weight: f64,
    pub evaluation_timeout_ms: u64,
    pub scheduler_interval_secs: u64,
    pub master_seed: u64,
}

fn default_calculator_params() -> BTreeMap<String, BTreeMap<String, Value>> {
    fn table(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
    let mut params = BTreeMap::new();
    params.insert(
        "profit_taking".to_string(),
        table(&[
            ("gain_threshold", Value::from(0.15)),
            ("windfall_score", Value::from(0.2)),
            ("min_hold_days", Value::from(5)),
            ("sell_cooldown", Value::from(10)),
        ]),
    );
    params.insert(
        "averaging_down".to_string(),
        table(&[
            ("loss_threshold", Value::from(0.1)),
            ("max_loss_allowed", Value::from(0.3)),
        ]),
    );
    params.insert(
        "opportunity_buys".to_string(),
        table(&[
            ("score_threshold", Value::from(0.7)),
            ("max_position_value", Value::from(10_000.0)),
        ]),
    );
    params.insert(
        "rebalance_sells".to_string(),
        table(&[
            ("drift_threshold", Value::from(0.05)),
            ("min_sell_value", Value::from(500.0)),
        ]),
    );
    params.insert(
        "rebalance_buys".to_string(),
        table(&[
            ("drift_threshold", Value::from(0.05)),
            ("min_trade_value", Value::from(500.0)),
        ]),
    );
    params.insert(
        "weight_based".to_string(),
        table(&[
            ("weight_tolerance", Value::from(0.02)),
            ("trade_factor", Value::from(1.0)),
        ]),
    );
    params
}

impl Default for RawPlannerConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_opportunities_per_category: 5,
            diversity_weight: 0.5,
            transaction_cost_fixed: 0.0,
            transaction_cost_percent: 0.001,
            min_hold_days: 5,
            sell_cooldown_days: 10,
            max_loss_threshold: -0.5,
            max_sell_percentage: 0.5,
            allow_buy: true,
            allow_sell: true,
            enabled_calculators: [
                "profit_taking",
                "averaging_down",
                "opportunity_buys",
                "rebalance_sells",
                "rebalance_buys",
                "weight_based",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            calculator_params: default_calculator_params(),
            beam_width: 10,
            cost_penalty_factor: 0.5,
            risk_profile: RiskProfile::Balanced,
            enable_multi_objective: false,
            enable_stochastic_scenarios: true,
            enable_market_regime_scenarios: false,
            enable_correlation_aware: false,
            enable_partial_execution: false,
            enable_constraint_relaxation: false,
            enable_monte_carlo_paths: false,
            monte_carlo_path_count: 50,
            enable_multi_timeframe: false,
            incremental_planner_enabled: true,
            combinatorial_max_combinations_per_depth: 100,
            combinatorial_max_sells: 3,
            combinatorial_max_buys: 3,
            combinatorial_max_candidates: 15,
            worst_case_weight: 0.6,
            mean_weight: 0.4,
            evaluation_timeout_ms: 2000,
            scheduler_interval_secs: 300,
            master_seed: 42,
        }
    }
}

impl RawPlannerConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, toml::de::Error> {
        let mut config: Self = toml::from_str(input)?;
        config.fill_default_params();
        Ok(config)
    }

    /// Fill in defaults for any calculator parameter the file omitted, so a
    /// partial file only has to state what it overrides.
    fn fill_default_params(&mut self) {
        for (calculator, defaults) in default_calculator_params() {
            let params = self.calculator_params.entry(calculator).or_default();
            for (name, value) in defaults {
                params.entry(name).or_insert(value);
            }
        }
    }

    /// Structural checks only: flags, non-empty calculator set, parameter
    /// presence. A strict subset of [`full_validate`](Self::full_validate).
    pub fn quick_validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if !self.allow_buy && !self.allow_sell {
            errors.push("allow_buy/allow_sell", "at least one must be true");
        }
        if self.enabled_calculators.is_empty() {
            errors.push("enabled_calculators", "at least one calculator must be enabled");
        }
        for calculator in &self.enabled_calculators {
            let empty = BTreeMap::new();
            let params = self.calculator_params.get(calculator).unwrap_or(&empty);
            errors.extend(quick_validate_params(calculator, params));
        }
        errors
    }

    /// Everything: structural checks, field bounds, parameter ranges, and
    /// cross-parameter constraints. Never fail-fast.
    pub fn full_validate(&self) -> ValidationErrors {
        let mut errors = self.quick_validate();

        if !(1..=10).contains(&self.max_depth) {
            errors.push("max_depth", format!("must be between 1 and 10, got {}", self.max_depth));
        }
        if self.max_opportunities_per_category == 0 {
            errors.push("max_opportunities_per_category", "must be greater than zero");
        }
        if !(0.0..=1.0).contains(&self.diversity_weight) {
            errors.push(
                "diversity_weight",
                format!("must be between 0 and 1, got {}", self.diversity_weight),
            );
        }
        if self.transaction_cost_fixed < 0.0 {
            errors.push("transaction_cost_fixed", "must not be negative");
        }
        if self.transaction_cost_percent < 0.0 {
            errors.push("transaction_cost_percent", "must not be negative");
        }
        if self.min_hold_days > 365 {
            errors.push("min_hold_days", format!("must be at most 365, got {}", self.min_hold_days));
        }
        if self.sell_cooldown_days > 365 {
            errors.push(
                "sell_cooldown_days",
                format!("must be at most 365, got {}", self.sell_cooldown_days),
            );
        }
        if self.min_hold_days > 0
            && self.sell_cooldown_days > 0
            && self.min_hold_days >= self.sell_cooldown_days
        {
            errors.push(
                "min_hold_days/sell_cooldown_days",
                format!(
                    "min_hold_days ({}) must be less than sell_cooldown_days ({})",
                    self.min_hold_days, self.sell_cooldown_days
                ),
            );
        }
        if !(-1.0..=0.0).contains(&self.max_loss_threshold) {
            errors.push(
                "max_loss_threshold",
                format!("must be between -1 and 0, got {}", self.max_loss_threshold),
            );
        }
        if !(0.01..=1.0).contains(&self.max_sell_percentage) {
            errors.push(
                "max_sell_percentage",
                format!("must be between 0.01 and 1, got {}", self.max_sell_percentage),
            );
        }
        for calculator in &self.enabled_calculators {
            let empty = BTreeMap::new();
            let params = self.calculator_params.get(calculator).unwrap_or(&empty);
            let full = full_validate_params(calculator, params);
            // quick_validate already reported missing params; keep only the
            // additional range/cross failures to avoid duplicates.
            for e in full.errors {
                if !errors.errors.contains(&e) {
                    errors.errors.push(e);
                }
            }
        }
        errors
    }

    /// The configuration gate: reject bounded fields that are out of range,
    /// clamp un-gated tunables, normalize parameter values to `f64`.
    pub fn validate(self) -> Result<PlannerConfig, ValidationErrors> {
        self.full_validate().into_result()?;

        let calculator_params = self
            .calculator_params
            .iter()
            .map(|(calculator, params)| {
                let normalized = params
                    .iter()
                    .filter_map(|(name, value)| {
                        normalize_number(value).map(|v| (name.clone(), v))
                    })
                    .collect();
                (calculator.clone(), normalized)
            })
            .collect();

        let (worst_case_weight, mean_weight) =
            normalize_blend(self.worst_case_weight, self.mean_weight);

        Ok(PlannerConfig {
            max_depth: self.max_depth as usize,
            max_opportunities_per_category: self.max_opportunities_per_category as usize,
            diversity_weight: self.diversity_weight,
            transaction_cost_fixed: self.transaction_cost_fixed,
            transaction_cost_percent: self.transaction_cost_percent,
            min_hold_days: self.min_hold_days,
            sell_cooldown_days: self.sell_cooldown_days,
            max_loss_threshold: self.max_loss_threshold,
            max_sell_percentage: self.max_sell_percentage,
            allow_buy: self.allow_buy,
            allow_sell: self.allow_sell,
            enabled_calculators: self.enabled_calculators,
            calculator_params,
            beam_width: clamp_usize("beam_width", self.beam_width, 1, 50),
            cost_penalty_factor: clamp_f64("cost_penalty_factor", self.cost_penalty_factor, 0.0, 1.0),
            risk_profile: self.risk_profile,
            enable_multi_objective: self.enable_multi_objective,
            enable_stochastic_scenarios: self.enable_stochastic_scenarios,
            enable_market_regime_scenarios: self.enable_market_regime_scenarios,
            enable_correlation_aware: self.enable_correlation_aware,
            enable_partial_execution: self.enable_partial_execution,
            enable_constraint_relaxation: self.enable_constraint_relaxation,
            enable_monte_carlo_paths: self.enable_monte_carlo_paths,
            monte_carlo_path_count: clamp_usize(
                "monte_carlo_path_count",
                self.monte_carlo_path_count,
                10,
                500,
            ),
            enable_multi_timeframe: self.enable_multi_timeframe,
            incremental_planner_enabled: self.incremental_planner_enabled,
            max_combinations_per_depth: clamp_usize(
                "combinatorial_max_combinations_per_depth",
                self.combinatorial_max_combinations_per_depth,
                10,
                500,
            ),
            max_sells: clamp_usize("combinatorial_max_sells", self.combinatorial_max_sells, 1, 10),
            max_buys: clamp_usize("combinatorial_max_buys", self.combinatorial_max_buys, 1, 10),
            max_candidates: clamp_usize(
                "combinatorial_max_candidates",
                self.combinatorial_max_candidates,
                5,
                30,
            ),
            worst_case_weight,
            mean_weight,
            evaluation_timeout_ms: self.evaluation_timeout_ms,
            scheduler_interval_secs: self.scheduler_interval_secs,
            master_seed: self.master_seed,
        })
    }
}

fn clamp_f64(name: &str, value: f64, lo: f64, hi: f64) -> f64 {
    if value < lo || value > hi || value.is_nan() {
        let clamped = if value.is_nan() { lo } else { value.clamp(lo, hi) };
        warn!(field = name, value, clamped, "tunable out of range, clamped");
        clamped
    } else {
        value
    }
}

fn clamp_usize(name: &str, value: usize, lo: usize, hi: usize) -> usize {
    if value < lo || value > hi {
        let clamped = value.clamp(lo, hi);
        warn!(field = name, value, clamped, "tunable out of range, clamped");
        clamped
    } else {
        value
    }
}

/// Clamp both blend weights into `[0, 1]` and renormalize them to sum to 1.
/// A degenerate pair falls back to the documented 60/40 default.
fn normalize_blend(worst: f64, mean: f64) -> (f64, f64) {
    let worst = clamp_f64("worst_case_weight", worst, 0.0, 1.0);
    let mean = clamp_f64("mean_weight", mean, 0.0, 1.0);
    let sum = worst + mean;
    if sum <= 0.0 {
        warn!("worst_case_weight and mean_weight both zero, using 0.6/0.4");
        (0.6, 0.4)
    } else {
        (worst / sum, mean / sum)
    }
}

/// Validated, immutable planner configuration. Only
/// [`RawPlannerConfig::validate`] produces one.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlannerConfig {
    pub max_depth: usize,
    pub max_opportunities_per_category: usize,
    pub diversity_weight: f64,
    pub transaction_cost_fixed: f64,
    pub transaction_cost_percent: f64,
    pub min_hold_days: u32,
    pub sell_cooldown_days: u32,
    pub max_loss_threshold: f64,
    pub max_sell_percentage: f64,
    pub allow_buy: bool,
    pub allow_sell: bool,
    pub enabled_calculators: BTreeSet<String>,
    /// Parameter values normalized to `f64` at the gate.
    pub calculator_params: BTreeMap<String, BTreeMap<String, f64>>,
    pub beam_width: usize,
    pub cost_penalty_factor: f64,
    pub risk_profile: RiskProfile,
    pub enable_multi_objective: bool,
    pub enable_stochastic_scenarios: bool,
    pub enable_market_regime_scenarios: bool,
    pub enable_correlation_aware: bool,
    pub enable_partial_execution: bool,
    pub enable_constraint_relaxation: bool,
    pub enable_monte_carlo_paths: bool,
    pub monte_carlo_path_count: usize,
    pub enable_multi_timeframe: bool,
    pub incremental_planner_enabled: bool,
    pub max_combinations_per_depth: usize,
    pub max_sells: usize,
    pub max_buys: usize,
    pub max_candidates: usize,
    pub worst_case_weight: f64,
    pub mean_weight: f64,
    pub evaluation_timeout_ms: u64,
    pub scheduler_interval_secs: u64,
    pub master_seed: u64,
}

impl PlannerConfig {
    /// Deterministic content hash of this configuration.
    ///
    /// Evaluations are stamped with the hash they were computed under, so a
    /// configuration change invalidates cached evaluations while an
    /// unchanged configuration reuses them.
    pub fn config_hash(&self) -> String {
        let json = serde_json::to_string(self).expect("PlannerConfig serialization failed");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }

    pub fn trade_costs(&self) -> TradeCosts {
        TradeCosts::new(self.transaction_cost_fixed, self.transaction_cost_percent)
    }

    pub fn is_enabled(&self, calculator: &str) -> bool {
        self.enabled_calculators.contains(calculator)
    }

    /// Normalized parameter of one calculator, if configured.
    pub fn calculator_param(&self, calculator: &str, name: &str) -> Option<f64> {
        self.calculator_params
            .get(calculator)
            .and_then(|params| params.get(name))
            .copied()
    }

    pub fn evaluation_timeout(&self) -> Duration {
        Duration::from_millis(self.evaluation_timeout_ms)
    }

    pub fn scheduler_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler_interval_secs)
    }
}
