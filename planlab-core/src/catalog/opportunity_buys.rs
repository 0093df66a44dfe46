//! Opportunity buys — enter or grow high-scoring instruments.
//!
//! Any catalog instrument scoring above `score_threshold` whose position is
//! below `max_position_value` is a candidate; the proposed buy fills the
//! value gap up to what cash can fund. Priority is the instrument score
//! scaled by how much of the gap remains, so an absent position on a great
//! instrument ranks highest.

use super::{affordable_value, OpportunityCalculator};
use crate::config::PlannerConfig;
use crate::domain::{Opportunity, PortfolioState};

pub struct OpportunityBuys;

impl OpportunityCalculator for OpportunityBuys {
    fn name(&self) -> &'static str {
        "opportunity_buys"
    }

    fn generate(&self, portfolio: &PortfolioState, config: &PlannerConfig) -> Vec<Opportunity> {
        let name = self.name();
        let score_threshold = config.calculator_param(name, "score_threshold").unwrap_or(0.7);
        let max_position_value = config
            .calculator_param(name, "max_position_value")
            .unwrap_or(10_000.0);
        let affordable = affordable_value(portfolio, config);

        let mut ops = Vec::new();
        for (id, instrument) in &portfolio.instruments {
            if instrument.score <= score_threshold || instrument.price <= 0.0 {
                continue;
            }
            let gap = max_position_value - portfolio.position_value(id);
            if gap <= 0.0 {
                continue;
            }
            let value = gap.min(affordable);
            let quantity = instrument.round_to_lot(value / instrument.price);
            if quantity <= 0.0 {
                continue;
            }
            let gap_fraction = (gap / max_position_value).clamp(0.0, 1.0);
            let priority = instrument.score * gap_fraction;
            ops.push(Opportunity::buy(
                id.clone(),
                quantity,
                instrument.price,
                priority,
                name,
                format!("score {:.2} above {score_threshold:.2} threshold", instrument.score),
            ));
        }
        ops
    }
}
