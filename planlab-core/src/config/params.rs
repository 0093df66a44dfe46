//! Per-calculator parameter contract — typed parameter kinds with range
//! checks, a static requirements registry, and cross-parameter rules.
//!
//! Parameter values arrive as JSON numbers (integer or float) and are
//! normalized to `f64` once, at this boundary, before any range check.
//! Failures are collected, never short-circuited: the caller sees every
//! missing parameter and every out-of-range value in one list.

use super::validation::ValidationErrors;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// Registry revision. Bumped whenever a calculator's requirements change,
/// so persisted configurations can be checked against the table they were
/// validated under.
pub const REGISTRY_VERSION: u32 = 1;

/// Closed set of parameter kinds. Each kind owns its range check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Fraction in `[0, 1]`.
    Threshold,
    /// Fraction in `[0, 1]`.
    Weight,
    /// Non-negative value.
    MinValue,
    /// Non-negative value.
    MaxValue,
    /// Positive integer.
    Count,
    /// Value in `[0, 100]`.
    Percentage,
    /// Strictly positive multiplier.
    Factor,
}

impl ParamKind {
    fn expectation(self) -> &'static str {
        match self {
            ParamKind::Threshold | ParamKind::Weight => "a value between 0 and 1",
            ParamKind::MinValue | ParamKind::MaxValue => "a non-negative value",
            ParamKind::Count => "a positive integer",
            ParamKind::Percentage => "a value between 0 and 100",
            ParamKind::Factor => "a positive value",
        }
    }

    /// Range check for a normalized value. `None` means in range.
    pub fn check(self, value: f64) -> Option<String> {
        let ok = match self {
            ParamKind::Threshold | ParamKind::Weight => (0.0..=1.0).contains(&value),
            ParamKind::MinValue | ParamKind::MaxValue => value >= 0.0,
            ParamKind::Count => value > 0.0 && value.fract() == 0.0,
            ParamKind::Percentage => (0.0..=100.0).contains(&value),
            ParamKind::Factor => value > 0.0,
        };
        if ok {
            None
        } else {
            Some(format!("expected {}, got {value}", self.expectation()))
        }
    }
}

/// One required parameter of a calculator.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
}

const fn spec(name: &'static str, kind: ParamKind) -> ParamSpec {
    ParamSpec { name, kind }
}

/// Required parameters per calculator. Unknown calculator names have no
/// requirements (permissive default, so externally defined calculators can
/// carry their own parameters without tripping validation).
pub fn required_params(calculator: &str) -> &'static [ParamSpec] {
    const PROFIT_TAKING: &[ParamSpec] = &[
        spec("gain_threshold", ParamKind::Threshold),
        spec("windfall_score", ParamKind::Weight),
        spec("min_hold_days", ParamKind::Count),
        spec("sell_cooldown", ParamKind::Count),
    ];
    const AVERAGING_DOWN: &[ParamSpec] = &[
        spec("loss_threshold", ParamKind::Threshold),
        spec("max_loss_allowed", ParamKind::Threshold),
    ];
    const OPPORTUNITY_BUYS: &[ParamSpec] = &[
        spec("score_threshold", ParamKind::Threshold),
        spec("max_position_value", ParamKind::MaxValue),
    ];
    const REBALANCE_SELLS: &[ParamSpec] = &[
        spec("drift_threshold", ParamKind::Threshold),
        spec("min_sell_value", ParamKind::MinValue),
    ];
    const REBALANCE_BUYS: &[ParamSpec] = &[
        spec("drift_threshold", ParamKind::Threshold),
        spec("min_trade_value", ParamKind::MinValue),
    ];
    const WEIGHT_BASED: &[ParamSpec] = &[
        spec("weight_tolerance", ParamKind::Weight),
        spec("trade_factor", ParamKind::Factor),
    ];
    match calculator {
        "profit_taking" => PROFIT_TAKING,
        "averaging_down" => AVERAGING_DOWN,
        "opportunity_buys" => OPPORTUNITY_BUYS,
        "rebalance_sells" => REBALANCE_SELLS,
        "rebalance_buys" => REBALANCE_BUYS,
        "weight_based" => WEIGHT_BASED,
        _ => &[],
    }
}

/// Normalize a JSON parameter value (integer or float) to `f64`.
pub fn normalize_number(value: &Value) -> Option<f64> {
    value.as_f64()
}

/// Presence check only: every required parameter must exist.
pub fn quick_validate_params(
    calculator: &str,
    params: &BTreeMap<String, Value>,
) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    for spec in required_params(calculator) {
        if !params.contains_key(spec.name) {
            errors.push(
                format!("{calculator}.{}", spec.name),
                "required parameter missing",
            );
        }
    }
    errors
}

/// Presence, range, and cross-parameter checks. Quick-validation failures
/// are a strict subset of the failures reported here.
pub fn full_validate_params(
    calculator: &str,
    params: &BTreeMap<String, Value>,
) -> ValidationErrors {
    let mut errors = quick_validate_params(calculator, params);

    for spec in required_params(calculator) {
        let Some(raw) = params.get(spec.name) else {
            continue; // already reported missing
        };
        match normalize_number(raw) {
            Some(value) => {
                if let Some(message) = spec.kind.check(value) {
                    errors.push(format!("{calculator}.{}", spec.name), message);
                }
            }
            None => errors.push(
                format!("{calculator}.{}", spec.name),
                format!("expected a number, got {raw}"),
            ),
        }
    }

    check_cross_constraints(calculator, params, &mut errors);
    errors
}

fn numeric(params: &BTreeMap<String, Value>, name: &str) -> Option<f64> {
    params.get(name).and_then(normalize_number)
}

fn check_cross_constraints(
    calculator: &str,
    params: &BTreeMap<String, Value>,
    errors: &mut ValidationErrors,
) {
    if calculator == "profit_taking" {
        if let (Some(hold), Some(cooldown)) =
            (numeric(params, "min_hold_days"), numeric(params, "sell_cooldown"))
        {
            if hold >= cooldown {
                errors.push(
                    "profit_taking.min_hold_days/sell_cooldown",
                    format!("min_hold_days ({hold}) must be less than sell_cooldown ({cooldown})"),
                );
            }
        }
    }

    if calculator == "averaging_down" {
        if let (Some(loss), Some(max_loss)) = (
            numeric(params, "loss_threshold"),
            numeric(params, "max_loss_allowed"),
        ) {
            if loss > max_loss {
                errors.push(
                    "averaging_down.loss_threshold/max_loss_allowed",
                    format!(
                        "loss_threshold ({loss}) must not exceed max_loss_allowed ({max_loss})"
                    ),
                );
            }
        }
    }

    // Legacy advisory: aggressive pruning combined with a huge combination
    // budget is almost always a misconfiguration, but remains accepted.
    if let (Some(pruning), Some(combos)) = (
        numeric(params, "pruning_threshold"),
        numeric(params, "max_combinations"),
    ) {
        if pruning > 0.9 && combos > 1000.0 {
            warn!(
                calculator,
                pruning_threshold = pruning,
                max_combinations = combos,
                "pruning_threshold above 0.9 with max_combinations above 1000"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn profit_taking_cross_constraint() {
        let p = params(&[("min_hold_days", json!(10)), ("sell_cooldown", json!(5))]);
        let errors = full_validate_params("profit_taking", &p);
        assert!(errors.has_field("profit_taking.min_hold_days/sell_cooldown"));
        // Missing required params are reported alongside, not instead.
        assert!(errors.has_field("profit_taking.gain_threshold"));
        assert!(errors.has_field("profit_taking.windfall_score"));
    }

    #[test]
    fn profit_taking_complete_and_valid() {
        let p = params(&[
            ("min_hold_days", json!(5)),
            ("sell_cooldown", json!(10)),
            ("gain_threshold", json!(0.1)),
            ("windfall_score", json!(0.2)),
        ]);
        assert!(full_validate_params("profit_taking", &p).is_empty());
    }

    #[test]
    fn quick_failures_are_subset_of_full() {
        let p = params(&[("gain_threshold", json!(2.5))]);
        let quick = quick_validate_params("profit_taking", &p);
        let full = full_validate_params("profit_taking", &p);
        for e in &quick.errors {
            assert!(full.has_field(&e.field));
        }
        // Range failure appears only in full.
        assert!(!quick.has_field("profit_taking.gain_threshold"));
        assert!(full.has_field("profit_taking.gain_threshold"));
    }

    #[test]
    fn integer_and_float_values_both_accepted() {
        let p = params(&[
            ("loss_threshold", json!(0.1)),
            ("max_loss_allowed", json!(1)),
        ]);
        assert!(full_validate_params("averaging_down", &p).is_empty());
    }

    #[test]
    fn count_rejects_fractions_and_zero() {
        assert!(ParamKind::Count.check(5.0).is_none());
        assert!(ParamKind::Count.check(5.5).is_some());
        assert!(ParamKind::Count.check(0.0).is_some());
        assert!(ParamKind::Count.check(-3.0).is_some());
    }

    #[test]
    fn non_numeric_value_is_reported() {
        let p = params(&[
            ("loss_threshold", json!("high")),
            ("max_loss_allowed", json!(0.3)),
        ]);
        let errors = full_validate_params("averaging_down", &p);
        assert!(errors.has_field("averaging_down.loss_threshold"));
    }

    #[test]
    fn unknown_calculator_has_no_requirements() {
        let p = params(&[("anything", json!(42))]);
        assert!(full_validate_params("custom_momentum", &p).is_empty());
        assert!(quick_validate_params("custom_momentum", &p).is_empty());
    }

    #[test]
    fn averaging_down_ordering_enforced() {
        let p = params(&[
            ("loss_threshold", json!(0.4)),
            ("max_loss_allowed", json!(0.2)),
        ]);
        let errors = full_validate_params("averaging_down", &p);
        assert!(errors.has_field("averaging_down.loss_threshold/max_loss_allowed"));
    }
}
