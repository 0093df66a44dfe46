//! Averaging down — buy more of a loser inside a bounded loss band.
//!
//! Only positions whose loss is at least `loss_threshold` but no worse than
//! `max_loss_allowed` qualify: a small dip is noise, a deep loss is a
//! falling knife. Priority favors quality (instrument score) and depth of
//! the dip within the band.

use super::{affordable_value, OpportunityCalculator};
use crate::config::PlannerConfig;
use crate::domain::{Opportunity, PortfolioState};

pub struct AveragingDown;

impl OpportunityCalculator for AveragingDown {
    fn name(&self) -> &'static str {
        "averaging_down"
    }

    fn generate(&self, portfolio: &PortfolioState, config: &PlannerConfig) -> Vec<Opportunity> {
        let name = self.name();
        let loss_threshold = config.calculator_param(name, "loss_threshold").unwrap_or(0.1);
        let max_loss = config.calculator_param(name, "max_loss_allowed").unwrap_or(0.3);
        let affordable = affordable_value(portfolio, config);

        let mut ops = Vec::new();
        for (id, position) in &portfolio.positions {
            let Some(instrument) = portfolio.instruments.get(id) else {
                continue;
            };
            let price = instrument.price;
            if price <= 0.0 {
                continue;
            }
            let loss = -position.unrealized_gain_fraction(price);
            if loss < loss_threshold || loss > max_loss {
                continue;
            }
            // Add half the current holding, capped by what cash can fund.
            let value = (position.quantity * 0.5 * price).min(affordable);
            let quantity = instrument.round_to_lot(value / price);
            if quantity <= 0.0 {
                continue;
            }
            let priority = instrument.score * (loss / max_loss);
            ops.push(Opportunity::buy(
                id.clone(),
                quantity,
                price,
                priority,
                name,
                format!("down {:.1}%, within averaging band", loss * 100.0),
            ));
        }
        ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawPlannerConfig;
    use crate::domain::{Instrument, Position};

    fn make_config() -> PlannerConfig {
        RawPlannerConfig::default().validate().unwrap()
    }

    fn make_portfolio(price: f64, cash: f64) -> PortfolioState {
        let mut portfolio = PortfolioState::new(cash);
        portfolio.add_instrument(Instrument::new("NOVO", "DK", "pharma", 0.8, price));
        portfolio.add_position(Position::new("NOVO", 100.0, 100.0));
        portfolio
    }

    #[test]
    fn buys_inside_the_band() {
        let portfolio = make_portfolio(80.0, 50_000.0); // -20%, band is 10%..30%
        let ops = AveragingDown.generate(&portfolio, &make_config());
        assert_eq!(ops.len(), 1);
        assert!(ops[0].side.is_buy());
        assert_eq!(ops[0].quantity, 50.0);
        assert!((ops[0].priority - 0.8 * (0.2 / 0.3)).abs() < 1e-9);
    }

    #[test]
    fn small_dip_is_ignored() {
        let portfolio = make_portfolio(95.0, 50_000.0); // -5% < 10%
        assert!(AveragingDown.generate(&portfolio, &make_config()).is_empty());
    }

    #[test]
    fn falling_knife_is_ignored() {
        let portfolio = make_portfolio(60.0, 50_000.0); // -40% > 30%
        assert!(AveragingDown.generate(&portfolio, &make_config()).is_empty());
    }

    #[test]
    fn winners_are_ignored() {
        let portfolio = make_portfolio(120.0, 50_000.0);
        assert!(AveragingDown.generate(&portfolio, &make_config()).is_empty());
    }

    #[test]
    fn trade_capped_by_cash() {
        let portfolio = make_portfolio(80.0, 1000.0); // half position = 4000, cash ~1000
        let ops = AveragingDown.generate(&portfolio, &make_config());
        assert_eq!(ops.len(), 1);
        assert!(ops[0].notional() <= 1000.0);
    }
}
