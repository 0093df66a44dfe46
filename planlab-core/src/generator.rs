//! Sequence generator — breadth-first combinatorial expansion of candidate
//! trade sequences.
//!
//! At each depth every surviving sequence is extended with every still-valid
//! opportunity from the candidate pool. Validity is checked against the
//! portfolio as it stands *after* the earlier steps of that sequence:
//! cumulative sell caps, hold/cooldown windows, loss limits, and cash. The
//! frontier is pruned per depth by provisional priority sum — a cheap
//! pre-filter, distinct from the beam selector's post-evaluation ranking.
//!
//! Expansion is single-threaded and fully deterministic: identical inputs
//! produce the identical sequence set and fingerprint set. The evaluation
//! cache's reuse guarantee depends on this.

use crate::config::PlannerConfig;
use crate::domain::{Opportunity, PortfolioState, Sequence, SequenceStep, Side};
use crate::fingerprint::Fingerprint;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// One in-progress sequence during expansion.
struct Partial {
    steps: Vec<SequenceStep>,
    portfolio: PortfolioState,
    used: Vec<bool>,
    /// Cumulative quantity sold per instrument, against the baseline holding.
    sold: BTreeMap<String, f64>,
    priority_sum: f64,
    buys: usize,
    sells: usize,
    fingerprint: Fingerprint,
}

impl Partial {
    fn root(portfolio: PortfolioState, pool_len: usize) -> Self {
        Self {
            steps: Vec::new(),
            portfolio,
            used: vec![false; pool_len],
            sold: BTreeMap::new(),
            priority_sum: 0.0,
            buys: 0,
            sells: 0,
            fingerprint: Fingerprint::of_steps(std::iter::empty::<(&str, Side, f64)>()),
        }
    }
}

/// Expand the opportunity map into candidate sequences of depth
/// `1..=max_depth`. Finite, restartable, deterministic.
pub fn expand(
    opportunities: &BTreeMap<String, Vec<Opportunity>>,
    portfolio: &PortfolioState,
    config: &PlannerConfig,
) -> Vec<Sequence> {
    let pool = candidate_pool(opportunities, config);
    if pool.is_empty() {
        return Vec::new();
    }

    let costs = config.trade_costs();
    let mut sequences = Vec::new();
    let mut frontier = vec![Partial::root(portfolio.clone(), pool.len())];

    for depth in 1..=config.max_depth {
        let mut next: Vec<Partial> = Vec::new();
        for partial in &frontier {
            for (idx, op) in pool.iter().enumerate() {
                if partial.used[idx] {
                    continue;
                }
                match op.side {
                    Side::Buy if partial.buys >= config.max_buys => continue,
                    Side::Sell if partial.sells >= config.max_sells => continue,
                    _ => {}
                }
                if op.side.is_sell() && !sell_is_valid(op, partial, portfolio, config) {
                    continue;
                }

                let mut evolved = partial.portfolio.clone();
                let score_before = evolved.score();
                let cash_before = evolved.cash;
                if evolved.apply_trade(op, op.price, &costs).is_err() {
                    // Infeasible extensions (and depth-1 roots) are dropped,
                    // not resized; partial-execution variants cover
                    // interruption explicitly.
                    continue;
                }

                let step = SequenceStep {
                    opportunity: op.clone(),
                    score_before,
                    score_after: evolved.score(),
                    cash_before,
                    cash_after: evolved.cash,
                };
                let mut steps = partial.steps.clone();
                steps.push(step);
                let fingerprint = Fingerprint::of_steps(
                    steps
                        .iter()
                        .map(|s| (s.opportunity.instrument.as_str(), s.opportunity.side, s.opportunity.quantity)),
                );
                let mut used = partial.used.clone();
                used[idx] = true;
                let mut sold = partial.sold.clone();
                if op.side.is_sell() {
                    *sold.entry(op.instrument.clone()).or_insert(0.0) += op.quantity;
                }
                next.push(Partial {
                    priority_sum: partial.priority_sum + op.priority,
                    buys: partial.buys + usize::from(op.side.is_buy()),
                    sells: partial.sells + usize::from(op.side.is_sell()),
                    steps,
                    portfolio: evolved,
                    used,
                    sold,
                    fingerprint,
                });
            }
        }

        // Provisional rank: priority sum descending, fingerprint ascending
        // on ties.
        next.sort_by(|a, b| {
            b.priority_sum
                .total_cmp(&a.priority_sum)
                .then_with(|| a.fingerprint.cmp(&b.fingerprint))
        });
        next.truncate(config.max_combinations_per_depth);

        debug!(depth, survivors = next.len(), "expansion depth complete");
        if next.is_empty() {
            break;
        }
        sequences.extend(next.iter().map(|p| Sequence::new(p.steps.clone())));
        frontier = next;
    }

    sequences
}

/// Flatten the per-category lists and keep the top `max_candidates`
/// extension points, in a total, reproducible order. When two calculators
/// propose the same action on the same instrument, the higher-priority
/// proposal wins.
fn candidate_pool(
    opportunities: &BTreeMap<String, Vec<Opportunity>>,
    config: &PlannerConfig,
) -> Vec<Opportunity> {
    let mut pool: Vec<Opportunity> = opportunities.values().flatten().cloned().collect();
    pool.sort_by(|a, b| {
        b.priority
            .total_cmp(&a.priority)
            .then_with(|| a.instrument.cmp(&b.instrument))
            .then_with(|| a.side.cmp(&b.side))
            .then_with(|| a.quantity.total_cmp(&b.quantity))
            .then_with(|| a.source.cmp(&b.source))
    });
    let mut seen = BTreeSet::new();
    pool.retain(|op| seen.insert((op.instrument.clone(), op.side, op.quantity.to_bits())));
    pool.truncate(config.max_candidates);
    pool
}

/// Sell validity against the evolved portfolio and the baseline holding.
fn sell_is_valid(
    op: &Opportunity,
    partial: &Partial,
    baseline: &PortfolioState,
    config: &PlannerConfig,
) -> bool {
    let Some(position) = partial.portfolio.position(&op.instrument) else {
        return false;
    };
    if position.holding_days < config.min_hold_days {
        return false;
    }
    if position
        .days_since_last_sell
        .is_some_and(|days| days < config.sell_cooldown_days)
    {
        return false;
    }
    // Never realize a loss deeper than the configured floor.
    let price = op.price;
    if position.unrealized_gain_fraction(price) < config.max_loss_threshold {
        return false;
    }
    // Cumulative sells across the sequence stay within the cap, measured
    // against the holding at the start of the pass.
    let baseline_held = baseline.position(&op.instrument).map_or(0.0, |p| p.quantity);
    if baseline_held <= 0.0 {
        return false;
    }
    let sold = partial.sold.get(&op.instrument).copied().unwrap_or(0.0);
    (sold + op.quantity) / baseline_held <= config.max_sell_percentage
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawPlannerConfig;
    use crate::domain::{Instrument, Position};

    fn make_config() -> PlannerConfig {
        RawPlannerConfig::default().validate().unwrap()
    }

    fn make_portfolio() -> PortfolioState {
        let mut portfolio = PortfolioState::new(10_000.0);
        portfolio.add_instrument(Instrument::new("AAPL", "US", "tech", 0.9, 100.0));
        portfolio.add_instrument(Instrument::new("NOVO", "DK", "pharma", 0.8, 50.0));
        portfolio.add_instrument(Instrument::new("SAP", "DE", "tech", 0.6, 120.0));
        portfolio.add_position(
            Position::new("AAPL", 100.0, 70.0)
                .with_holding_days(30)
                .with_days_since_last_sell(30),
        );
        portfolio
    }

    fn ops_map(ops: Vec<Opportunity>) -> BTreeMap<String, Vec<Opportunity>> {
        let mut map = BTreeMap::new();
        map.insert("test".to_string(), ops);
        map
    }

    fn fingerprints(sequences: &[Sequence]) -> BTreeSet<Fingerprint> {
        sequences.iter().map(|s| s.fingerprint.clone()).collect()
    }

    #[test]
    fn expansion_is_deterministic() {
        let portfolio = make_portfolio();
        let config = make_config();
        let ops = ops_map(vec![
            Opportunity::buy("NOVO", 20.0, 50.0, 0.8, "test", ""),
            Opportunity::sell("AAPL", 30.0, 100.0, 0.6, "test", ""),
            Opportunity::buy("SAP", 10.0, 120.0, 0.4, "test", ""),
        ]);
        let a = expand(&ops, &portfolio, &config);
        let b = expand(&ops, &portfolio, &config);
        assert!(!a.is_empty());
        assert_eq!(fingerprints(&a), fingerprints(&b));
        // Emission order identical too, not just the set.
        let order_a: Vec<_> = a.iter().map(|s| s.fingerprint.clone()).collect();
        let order_b: Vec<_> = b.iter().map(|s| s.fingerprint.clone()).collect();
        assert_eq!(order_a, order_b);
    }

    #[test]
    fn depths_bounded_and_all_emitted() {
        let portfolio = make_portfolio();
        let mut config = make_config();
        config.max_depth = 2;
        let ops = ops_map(vec![
            Opportunity::buy("NOVO", 20.0, 50.0, 0.8, "test", ""),
            Opportunity::buy("SAP", 10.0, 120.0, 0.4, "test", ""),
        ]);
        let sequences = expand(&ops, &portfolio, &config);
        // Depth 1: two singles. Depth 2: both orders of the pair.
        assert_eq!(sequences.iter().filter(|s| s.depth() == 1).count(), 2);
        assert_eq!(sequences.iter().filter(|s| s.depth() == 2).count(), 2);
        assert!(sequences.iter().all(|s| s.depth() <= 2));
    }

    #[test]
    fn an_opportunity_is_used_at_most_once_per_sequence() {
        let portfolio = make_portfolio();
        let config = make_config();
        let ops = ops_map(vec![Opportunity::buy("NOVO", 20.0, 50.0, 0.8, "test", "")]);
        let sequences = expand(&ops, &portfolio, &config);
        assert_eq!(sequences.len(), 1);
        assert_eq!(sequences[0].depth(), 1);
    }

    #[test]
    fn infeasible_buy_is_dropped_not_resized() {
        let portfolio = make_portfolio(); // cash 10k
        let config = make_config();
        let ops = ops_map(vec![Opportunity::buy("SAP", 1000.0, 120.0, 0.9, "test", "")]);
        assert!(expand(&ops, &portfolio, &config).is_empty());
    }

    #[test]
    fn cumulative_sell_cap_blocks_second_trim() {
        let portfolio = make_portfolio(); // 100 AAPL, max_sell_percentage 0.5
        let mut config = make_config();
        // Neutralize the time windows so the cap is the binding check.
        config.min_hold_days = 0;
        config.sell_cooldown_days = 0;
        let ops = ops_map(vec![
            Opportunity::sell("AAPL", 40.0, 100.0, 0.8, "test", ""),
            Opportunity::sell("AAPL", 30.0, 100.0, 0.7, "test", ""),
        ]);
        let sequences = expand(&ops, &portfolio, &config);
        // Each sell alone is ≤ 50%; together they are 70% and must not pair.
        assert!(sequences.iter().all(|s| s.depth() == 1));
        assert_eq!(sequences.len(), 2);
    }

    #[test]
    fn hold_and_cooldown_windows_block_sells() {
        let mut portfolio = make_portfolio();
        let config = make_config();
        let ops = ops_map(vec![Opportunity::sell("AAPL", 30.0, 100.0, 0.8, "test", "")]);

        portfolio.positions.get_mut("AAPL").unwrap().holding_days = 2; // < 5
        assert!(expand(&ops, &portfolio, &config).is_empty());

        portfolio.positions.get_mut("AAPL").unwrap().holding_days = 30;
        portfolio.positions.get_mut("AAPL").unwrap().days_since_last_sell = Some(3); // < 10
        assert!(expand(&ops, &portfolio, &config).is_empty());
    }

    #[test]
    fn deep_loss_sell_is_blocked() {
        let mut portfolio = make_portfolio();
        // Average cost 70, price 30: -57% is below the -50% floor.
        portfolio.instruments.get_mut("AAPL").unwrap().price = 30.0;
        let config = make_config();
        let ops = ops_map(vec![Opportunity::sell("AAPL", 30.0, 30.0, 0.8, "test", "")]);
        assert!(expand(&ops, &portfolio, &config).is_empty());
    }

    #[test]
    fn per_depth_prune_caps_survivors() {
        let portfolio = make_portfolio();
        let mut config = make_config();
        config.max_depth = 2;
        config.max_combinations_per_depth = 10;
        // Six affordable buys: depth 2 would otherwise hold 6*5 = 30.
        let ops = ops_map(
            (0..6)
                .map(|i| {
                    Opportunity::buy("NOVO", 1.0 + i as f64, 50.0, 0.5 + i as f64 * 0.01, "test", "")
                })
                .collect(),
        );
        let sequences = expand(&ops, &portfolio, &config);
        assert!(sequences.iter().filter(|s| s.depth() == 2).count() <= 10);
    }

    #[test]
    fn duplicate_trade_content_collapses() {
        let portfolio = make_portfolio();
        let config = make_config();
        // Same action proposed by two calculators.
        let mut map = BTreeMap::new();
        map.insert(
            "rebalance_buys".to_string(),
            vec![Opportunity::buy("NOVO", 20.0, 50.0, 0.8, "rebalance_buys", "")],
        );
        map.insert(
            "weight_based".to_string(),
            vec![Opportunity::buy("NOVO", 20.0, 50.0, 0.6, "weight_based", "")],
        );
        let sequences = expand(&map, &portfolio, &config);
        assert_eq!(sequences.len(), 1);
    }

    #[test]
    fn steps_carry_the_simulated_trajectory() {
        let portfolio = make_portfolio();
        let config = make_config();
        let ops = ops_map(vec![Opportunity::buy("NOVO", 20.0, 50.0, 0.8, "test", "")]);
        let sequences = expand(&ops, &portfolio, &config);
        let step = &sequences[0].steps[0];
        assert_eq!(step.cash_before, 10_000.0);
        assert!(step.cash_after < step.cash_before);
        // Deploying cash into a scored instrument raises the portfolio score.
        assert!(step.score_after > step.score_before);
    }
}
