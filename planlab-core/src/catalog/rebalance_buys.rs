//! Rebalance buys — top up positions that drifted below their target weight.
//!
//! Mirror of `rebalance_sells`: explicit targets only, the buy fills the
//! weight shortfall, capped by available cash, suppressed below
//! `min_trade_value`.

use super::{affordable_value, OpportunityCalculator};
use crate::config::PlannerConfig;
use crate::domain::{Opportunity, PortfolioState};

pub struct RebalanceBuys;

impl OpportunityCalculator for RebalanceBuys {
    fn name(&self) -> &'static str {
        "rebalance_buys"
    }

    fn generate(&self, portfolio: &PortfolioState, config: &PlannerConfig) -> Vec<Opportunity> {
        let name = self.name();
        let drift_threshold = config.calculator_param(name, "drift_threshold").unwrap_or(0.05);
        let min_trade_value = config.calculator_param(name, "min_trade_value").unwrap_or(500.0);
        let total = portfolio.total_value();
        if total <= 0.0 {
            return Vec::new();
        }
        let affordable = affordable_value(portfolio, config);

        let mut ops = Vec::new();
        for (id, target) in &portfolio.target_weights {
            let drift = target - portfolio.weight_of(id);
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
            let value = (drift * total).min(affordable);
            let quantity = instrument.round_to_lot(value / price);
            let notional = quantity * price;
            if quantity <= 0.0 || notional < min_trade_value {
                continue;
            }
            ops.push(Opportunity::buy(
                id.clone(),
                quantity,
                price,
                drift,
                name,
                format!(
                    "underweight by {:.1}pp vs {:.1}% target",
                    drift * 100.0,
                    target * 100.0
                ),
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

    /// 20k portfolio: 10k AAPL (50%), 10k cash.
    fn make_portfolio() -> PortfolioState {
        let mut portfolio = PortfolioState::new(10_000.0);
        portfolio.add_instrument(Instrument::new("AAPL", "US", "tech", 0.9, 100.0));
        portfolio.add_instrument(Instrument::new("NOVO", "DK", "pharma", 0.8, 50.0));
        portfolio.add_position(Position::new("AAPL", 100.0, 80.0));
        portfolio
    }

    #[test]
    fn tops_up_underweight_position() {
        let mut portfolio = make_portfolio();
        portfolio.target_weights.insert("NOVO".into(), 0.25); // actual 0
        let ops = RebalanceBuys.generate(&portfolio, &make_config());
        assert_eq!(ops.len(), 1);
        assert!(ops[0].side.is_buy());
        // Shortfall 25% of 20k = 5k at 50/share = 100 shares.
        assert_eq!(ops[0].quantity, 100.0);
        assert!((ops[0].priority - 0.25).abs() < 1e-9);
    }

    #[test]
    fn shortfall_capped_by_cash() {
        let mut portfolio = make_portfolio();
        portfolio.cash = 1_200.0; // total 11.2k
        portfolio.target_weights.insert("NOVO".into(), 0.5); // shortfall 5.6k > cash
        let ops = RebalanceBuys.generate(&portfolio, &make_config());
        assert_eq!(ops.len(), 1);
        assert!(ops[0].notional() <= 1_200.0);
    }

    #[test]
    fn drift_inside_threshold_is_left_alone() {
        let mut portfolio = make_portfolio();
        portfolio.target_weights.insert("AAPL".into(), 0.54); // drift 0.04 < 0.05
        assert!(RebalanceBuys.generate(&portfolio, &make_config()).is_empty());
    }

    #[test]
    fn small_trades_are_suppressed() {
        let mut portfolio = make_portfolio();
        let mut config = make_config();
        config
            .calculator_params
            .get_mut("rebalance_buys")
            .unwrap()
            .insert("min_trade_value".into(), 3_000.0);
        portfolio.target_weights.insert("NOVO".into(), 0.10); // shortfall 2k < 3k
        assert!(RebalanceBuys.generate(&portfolio, &config).is_empty());
    }
}
