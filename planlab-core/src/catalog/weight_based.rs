//! Weight-based trades — close any target-weight gap in either direction.
//!
//! The generic rebalancer: wherever the actual weight is more than
//! `weight_tolerance` away from the target, propose a trade closing the gap,
//! scaled by `trade_factor`. Direction is gated by `allow_buy`/`allow_sell`.
//! Priority blends gap size with instrument quality so closing a gap on a
//! strong instrument outranks the same gap on a weak one.

use super::{affordable_value, OpportunityCalculator};
use crate::config::PlannerConfig;
use crate::domain::{Opportunity, PortfolioState};

pub struct WeightBased;

impl OpportunityCalculator for WeightBased {
    fn name(&self) -> &'static str {
        "weight_based"
    }

    fn generate(&self, portfolio: &PortfolioState, config: &PlannerConfig) -> Vec<Opportunity> {
        let name = self.name();
        let tolerance = config.calculator_param(name, "weight_tolerance").unwrap_or(0.02);
        let trade_factor = config.calculator_param(name, "trade_factor").unwrap_or(1.0);
        let total = portfolio.total_value();
        if total <= 0.0 {
            return Vec::new();
        }
        let affordable = affordable_value(portfolio, config);

        let mut ops = Vec::new();
        for (id, target) in &portfolio.target_weights {
            let Some(instrument) = portfolio.instruments.get(id) else {
                continue;
            };
            let price = instrument.price;
            if price <= 0.0 {
                continue;
            }
            let gap = target - portfolio.weight_of(id);
            let priority = gap.abs() * instrument.score;
            if gap > tolerance && config.allow_buy {
                let value = (gap * total * trade_factor).min(affordable);
                let quantity = instrument.round_to_lot(value / price);
                if quantity > 0.0 {
                    ops.push(Opportunity::buy(
                        id.clone(),
                        quantity,
                        price,
                        priority,
                        name,
                        format!("weight gap {:.1}pp below target", gap * 100.0),
                    ));
                }
            } else if -gap > tolerance && config.allow_sell {
                let held = portfolio.position(id).map_or(0.0, |p| p.quantity);
                let value = -gap * total * trade_factor;
                let quantity = instrument.round_to_lot((value / price).min(held));
                if quantity > 0.0 {
                    ops.push(Opportunity::sell(
                        id.clone(),
                        quantity,
                        price,
                        priority,
                        name,
                        format!("weight gap {:.1}pp above target", -gap * 100.0),
                    ));
                }
            }
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

    /// 10k portfolio: 6k AAPL (60%), 4k cash. Targets: AAPL 40%, NOVO 30%.
    fn make_portfolio() -> PortfolioState {
        let mut portfolio = PortfolioState::new(4_000.0);
        portfolio.add_instrument(Instrument::new("AAPL", "US", "tech", 0.9, 100.0));
        portfolio.add_instrument(Instrument::new("NOVO", "DK", "pharma", 0.8, 50.0));
        portfolio.add_position(Position::new("AAPL", 60.0, 80.0));
        portfolio.target_weights.insert("AAPL".into(), 0.40);
        portfolio.target_weights.insert("NOVO".into(), 0.30);
        portfolio
    }

    #[test]
    fn proposes_both_directions() {
        let ops = WeightBased.generate(&make_portfolio(), &make_config());
        assert_eq!(ops.len(), 2);
        let sell = ops.iter().find(|o| o.instrument == "AAPL").unwrap();
        let buy = ops.iter().find(|o| o.instrument == "NOVO").unwrap();
        assert!(sell.side.is_sell());
        // 20pp excess of 10k = 2k at 100/share.
        assert_eq!(sell.quantity, 20.0);
        assert!(buy.side.is_buy());
        // 30pp shortfall of 10k = 3k at 50/share.
        assert_eq!(buy.quantity, 60.0);
    }

    #[test]
    fn allow_flags_gate_direction() {
        let mut config = make_config();
        config.allow_sell = false;
        let ops = WeightBased.generate(&make_portfolio(), &config);
        assert!(ops.iter().all(|o| o.side.is_buy()));

        config.allow_sell = true;
        config.allow_buy = false;
        let ops = WeightBased.generate(&make_portfolio(), &config);
        assert!(ops.iter().all(|o| o.side.is_sell()));
    }

    #[test]
    fn trade_factor_scales_size() {
        let mut config = make_config();
        config
            .calculator_params
            .get_mut("weight_based")
            .unwrap()
            .insert("trade_factor".into(), 0.5);
        let ops = WeightBased.generate(&make_portfolio(), &config);
        let sell = ops.iter().find(|o| o.instrument == "AAPL").unwrap();
        assert_eq!(sell.quantity, 10.0); // half of the full 20-share trim
    }

    #[test]
    fn gap_inside_tolerance_is_ignored() {
        let mut portfolio = make_portfolio();
        portfolio.target_weights.insert("AAPL".into(), 0.59);
        portfolio.target_weights.remove("NOVO");
        assert!(WeightBased.generate(&portfolio, &make_config()).is_empty());
    }

    #[test]
    fn priority_blends_gap_and_score() {
        let ops = WeightBased.generate(&make_portfolio(), &make_config());
        let sell = ops.iter().find(|o| o.instrument == "AAPL").unwrap();
        let buy = ops.iter().find(|o| o.instrument == "NOVO").unwrap();
        assert!((sell.priority - 0.20 * 0.9).abs() < 1e-9);
        assert!((buy.priority - 0.30 * 0.8).abs() < 1e-9);
    }
}
