//! Profit taking — sell positions whose unrealized gain clears a threshold.
//!
//! Respects the calculator's own `min_hold_days` and `sell_cooldown`
//! parameters: a freshly opened or recently trimmed position is left alone
//! even when the gain qualifies. Priority scales with the gain and the
//! `windfall_score` weight.

use super::OpportunityCalculator;
use crate::config::PlannerConfig;
use crate::domain::{Opportunity, PortfolioState};

pub struct ProfitTaking;

impl OpportunityCalculator for ProfitTaking {
    fn name(&self) -> &'static str {
        "profit_taking"
    }

    fn generate(&self, portfolio: &PortfolioState, config: &PlannerConfig) -> Vec<Opportunity> {
        let name = self.name();
        let gain_threshold = config.calculator_param(name, "gain_threshold").unwrap_or(0.15);
        let windfall = config.calculator_param(name, "windfall_score").unwrap_or(0.2);
        let min_hold = config.calculator_param(name, "min_hold_days").unwrap_or(5.0) as u32;
        let cooldown = config.calculator_param(name, "sell_cooldown").unwrap_or(10.0) as u32;

        let mut ops = Vec::new();
        for (id, position) in &portfolio.positions {
            let Some(instrument) = portfolio.instruments.get(id) else {
                continue;
            };
            let price = instrument.price;
            if price <= 0.0 {
                continue;
            }
            let gain = position.unrealized_gain_fraction(price);
            if gain <= gain_threshold {
                continue;
            }
            if position.holding_days < min_hold {
                continue;
            }
            if position.days_since_last_sell.is_some_and(|days| days < cooldown) {
                continue;
            }
            let quantity = instrument.round_to_lot(position.quantity * config.max_sell_percentage);
            if quantity <= 0.0 {
                continue;
            }
            let priority = gain * (1.0 + windfall);
            ops.push(Opportunity::sell(
                id.clone(),
                quantity,
                price,
                priority,
                name,
                format!(
                    "unrealized gain {:.1}% above {:.1}% threshold",
                    gain * 100.0,
                    gain_threshold * 100.0
                ),
            ));
        }
        ops
    }
}
