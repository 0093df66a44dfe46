//! Geometric-Brownian-motion price paths for Monte Carlo scenarios.
//!
//! Each path draws one terminal price multiplier per instrument over a
//! one-year horizon, parameterized by the instrument's annualized volatility.
//! Draws come from the deterministic RNG hierarchy scoped by (sequence
//! fingerprint, instrument, path index), so identical inputs reproduce
//! identical paths no matter how evaluation is ordered or parallelized.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::Rng;
use tracing::warn;

use super::{Scenario, ScenarioKind};
use crate::config::PlannerConfig;
use crate::domain::{PortfolioState, Sequence};
use crate::rng::RngHierarchy;

/// One Monte Carlo scenario per path. Instruments without a positive
/// volatility are skipped individually; if none qualify, no scenarios are
/// produced and the sequence falls back to whatever other modes emitted.
pub(crate) fn path_scenarios(
    sequence: &Sequence,
    portfolio: &PortfolioState,
    config: &PlannerConfig,
) -> Vec<Scenario> {
    let mut eligible: BTreeMap<&str, f64> = BTreeMap::new();
    let mut skipped: Vec<&str> = Vec::new();
    for instrument in sequence.instruments() {
        match portfolio.instruments.get(instrument).and_then(|i| i.volatility) {
            Some(vol) if vol > 0.0 => {
                eligible.insert(instrument, vol);
            }
            _ => skipped.push(instrument),
        }
    }
    if !skipped.is_empty() {
        warn!(
            fingerprint = sequence.fingerprint.short(),
            instruments = skipped.join(","),
            "no volatility history, skipped in monte carlo paths"
        );
    }
    if eligible.is_empty() {
        return Vec::new();
    }

    let hierarchy = RngHierarchy::new(config.master_seed);
    (0..config.monte_carlo_path_count)
        .map(|path| {
            let multipliers = eligible
                .iter()
                .map(|(instrument, vol)| {
                    let mut rng =
                        hierarchy.rng_for(sequence.fingerprint.as_str(), instrument, path as u64);
                    (instrument.to_string(), terminal_multiplier(*vol, &mut rng))
                })
                .collect();
            Scenario {
                label: format!("mc_path_{path}"),
                kind: ScenarioKind::MonteCarlo,
                price_multipliers: multipliers,
                regime: None,
                weight: 1.0,
                relaxation: None,
            }
        })
        .collect()
}

/// Terminal GBM multiplier over a one-year horizon with zero drift:
/// `exp(-sigma^2/2 + sigma * Z)`.
fn terminal_multiplier(volatility: f64, rng: &mut StdRng) -> f64 {
    let z = standard_normal(rng);
    (-0.5 * volatility * volatility + volatility * z).exp()
}

/// Box-Muller transform over two uniform draws.
fn standard_normal(rng: &mut StdRng) -> f64 {
    // 1 - u maps [0, 1) onto (0, 1] so the log argument is never zero.
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}
