//! Opportunity catalog — pluggable calculators proposing candidate trades.
//!
//! Each calculator is an independent, portfolio-snapshot-pure producer of
//! candidate single actions for one category. The catalog resolves enabled
//! calculators through a fixed registry built at construction, runs them,
//! and returns per-category lists sorted by descending priority and capped
//! at `max_opportunities_per_category`.

pub mod averaging_down;
pub mod opportunity_buys;
pub mod profit_taking;
pub mod rebalance_buys;
pub mod rebalance_sells;
pub mod weight_based;

use crate::config::params::{required_params, ParamSpec};
use crate::config::{ConfigurationError, PlannerConfig};
use crate::domain::{Opportunity, PortfolioState};
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub use averaging_down::AveragingDown;
pub use opportunity_buys::OpportunityBuys;
pub use profit_taking::ProfitTaking;
pub use rebalance_buys::RebalanceBuys;
pub use rebalance_sells::RebalanceSells;
pub use weight_based::WeightBased;

/// A calculator proposing candidate trades for one category.
///
/// Implementations are pure functions of the portfolio snapshot and the
/// configuration: no side effects, no hidden state, so the same inputs
/// always produce the same opportunities (the generator's determinism
/// guarantee starts here).
pub trait OpportunityCalculator: Send + Sync {
    /// Category name, also the key for this calculator's parameters.
    fn name(&self) -> &'static str;

    /// Parameters this calculator requires, from the shared registry.
    fn declared_params(&self) -> &'static [ParamSpec] {
        required_params(self.name())
    }

    /// Propose candidate trades against the given snapshot.
    fn generate(&self, portfolio: &PortfolioState, config: &PlannerConfig) -> Vec<Opportunity>;
}

/// The built-in calculator set, resolved once at construction.
pub struct Catalog {
    calculators: Vec<Box<dyn OpportunityCalculator>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            calculators: vec![
                Box::new(ProfitTaking),
                Box::new(AveragingDown),
                Box::new(OpportunityBuys),
                Box::new(RebalanceSells),
                Box::new(RebalanceBuys),
                Box::new(WeightBased),
            ],
        }
    }

    /// Run every enabled calculator and return its capped, priority-sorted
    /// candidate list keyed by category.
    ///
    /// The gate already rejects an empty calculator set; this re-asserts it
    /// because an empty catalog would silently plan nothing.
    pub fn generate(
        &self,
        portfolio: &PortfolioState,
        config: &PlannerConfig,
    ) -> Result<BTreeMap<String, Vec<Opportunity>>, ConfigurationError> {
        if config.enabled_calculators.is_empty() {
            return Err(ConfigurationError::NoCalculatorsEnabled);
        }

        let mut by_category = BTreeMap::new();
        for calculator in &self.calculators {
            if !config.is_enabled(calculator.name()) {
                continue;
            }
            let mut ops = calculator.generate(portfolio, config);
            ops.retain(|op| match op.side {
                crate::domain::Side::Buy => config.allow_buy,
                crate::domain::Side::Sell => config.allow_sell,
            });
            // Priority descending, instrument ascending on ties, so the
            // candidate order is reproducible across runs.
            ops.sort_by(|a, b| {
                b.priority
                    .total_cmp(&a.priority)
                    .then_with(|| a.instrument.cmp(&b.instrument))
            });
            ops.truncate(config.max_opportunities_per_category);
            debug!(
                category = calculator.name(),
                count = ops.len(),
                "calculator produced opportunities"
            );
            by_category.insert(calculator.name().to_string(), ops);
        }
        for name in &config.enabled_calculators {
            if !by_category.contains_key(name) {
                warn!(category = %name, "enabled calculator not in registry, skipped");
            }
        }
        Ok(by_category)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Largest trade value the current cash balance can fund once transaction
/// costs are accounted for.
pub(crate) fn affordable_value(portfolio: &PortfolioState, config: &PlannerConfig) -> f64 {
    let budget =
        (portfolio.cash - config.transaction_cost_fixed) / (1.0 + config.transaction_cost_percent);
    budget.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawPlannerConfig;
    use crate::domain::{Instrument, Position};
    use std::collections::BTreeSet;

    fn make_portfolio() -> PortfolioState {
        let mut portfolio = PortfolioState::new(20_000.0);
        portfolio.add_instrument(Instrument::new("AAPL", "US", "tech", 0.9, 100.0));
        portfolio.add_instrument(Instrument::new("NOVO", "DK", "pharma", 0.8, 50.0));
        portfolio.add_instrument(Instrument::new("SAP", "DE", "tech", 0.6, 120.0));
        portfolio.add_position(
            Position::new("AAPL", 50.0, 70.0).with_holding_days(30), // +43% gain
        );
        portfolio
    }

    fn make_config() -> PlannerConfig {
        RawPlannerConfig::default().validate().unwrap()
    }

    #[test]
    fn empty_calculator_set_is_reasserted() {
        let mut config = make_config();
        config.enabled_calculators = BTreeSet::new();
        let catalog = Catalog::new();
        let err = catalog.generate(&make_portfolio(), &config).unwrap_err();
        assert!(matches!(err, ConfigurationError::NoCalculatorsEnabled));
    }

    #[test]
    fn only_enabled_calculators_run() {
        let mut config = make_config();
        config.enabled_calculators =
            ["profit_taking"].into_iter().map(String::from).collect();
        let catalog = Catalog::new();
        let by_category = catalog.generate(&make_portfolio(), &config).unwrap();
        assert_eq!(by_category.len(), 1);
        assert!(by_category.contains_key("profit_taking"));
    }

    #[test]
    fn lists_are_sorted_and_capped() {
        let mut config = make_config();
        config.max_opportunities_per_category = 2;
        let catalog = Catalog::new();
        let by_category = catalog.generate(&make_portfolio(), &config).unwrap();
        for (category, ops) in &by_category {
            assert!(ops.len() <= 2, "{category} exceeded cap");
            for pair in ops.windows(2) {
                assert!(
                    pair[0].priority >= pair[1].priority,
                    "{category} not sorted by priority"
                );
            }
        }
    }

    #[test]
    fn sell_side_filtered_when_disallowed() {
        let mut config = make_config();
        config.allow_sell = false;
        let catalog = Catalog::new();
        let by_category = catalog.generate(&make_portfolio(), &config).unwrap();
        for ops in by_category.values() {
            assert!(ops.iter().all(|op| op.side.is_buy()));
        }
    }

    #[test]
    fn generation_is_deterministic() {
        let config = make_config();
        let portfolio = make_portfolio();
        let catalog = Catalog::new();
        let a = catalog.generate(&portfolio, &config).unwrap();
        let b = catalog.generate(&portfolio, &config).unwrap();
        assert_eq!(a, b);
    }
}
