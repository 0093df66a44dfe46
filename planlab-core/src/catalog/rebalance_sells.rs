//! Rebalance sells — trim positions that drifted above their target weight.
//!
//! Only instruments with an explicit per-instrument target participate.
//! The proposed sell trims exactly the excess weight; trades worth less
//! than `min_sell_value` are suppressed as churn.

use super::OpportunityCalculator;
use crate::config::PlannerConfig;
use crate::domain::{Opportunity, PortfolioState};

pub struct RebalanceSells;

impl OpportunityCalculator for RebalanceSells {
    fn name(&self) -> &'static str {
        "rebalance_sells"
    }

    fn generate(&self, portfolio: &PortfolioState, config: &PlannerConfig) -> Vec<Opportunity> {
        let name = self.name();
        let drift_threshold = config.calculator_param(name, "drift_threshold").unwrap_or(0.05);
        let min_sell_value = config.calculator_param(name, "min_sell_value").unwrap_or(500.0);
        let total = portfolio.total_value();
        if total <= 0.0 {
            return Vec::new();
        }

        let mut ops = Vec::new();
        for (id, target) in &portfolio.target_weights {
            let drift = portfolio.weight_of(id) - target;
            if drift <= drift_threshold {
                continue;
            }
            let Some(instrument) = portfolio.instruments.get(id) else {
                continue;
            };
            let price = instrument.price;
            if price <= 0.0 {
                continue;
            }
            let held = portfolio.position(id).map_or(0.0, |p| p.quantity);
            let quantity = instrument.round_to_lot((drift * total / price).min(held));
            let notional = quantity * price;
            if quantity <= 0.0 || notional < min_sell_value {
                continue;
            }
            ops.push(Opportunity::sell(
                id.clone(),
                quantity,
                price,
                drift,
                name,
                format!(
                    "overweight by {:.1}pp vs {:.1}% target",
                    drift * 100.0,
                    target * 100.0
                ),
            ));
        }
        ops
    }
}
