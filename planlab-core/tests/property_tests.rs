//! Property tests for planner invariants.
//!
//! Uses proptest to verify:
//! 1. Fingerprint identity — deterministic, order-sensitive, quantity-exact
//! 2. Validation subset — quick_validate failures are a subset of full_validate
//! 3. Generator bounds — depth, side caps, and determinism hold for arbitrary pools
//! 4. Seed hierarchy — sub-seed derivation is stable and collision-free across labels

use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

use planlab_core::config::RawPlannerConfig;
use planlab_core::domain::{Instrument, Opportunity, PortfolioState, Position, Side};
use planlab_core::fingerprint::Fingerprint;
use planlab_core::generator;
use planlab_core::rng::RngHierarchy;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_instrument() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["AAPL", "NOVO", "SAP", "MSFT"]).prop_map(String::from)
}

fn arb_side() -> impl Strategy<Value = Side> {
    prop::bool::ANY.prop_map(|b| if b { Side::Buy } else { Side::Sell })
}

fn arb_quantity() -> impl Strategy<Value = f64> {
    (1.0..500.0_f64).prop_map(|q| (q * 100.0).round() / 100.0)
}

fn arb_steps() -> impl Strategy<Value = Vec<(String, Side, f64)>> {
    prop::collection::vec((arb_instrument(), arb_side(), arb_quantity()), 1..6)
}

fn arb_buy_pool() -> impl Strategy<Value = Vec<Opportunity>> {
    prop::collection::vec(
        (arb_instrument(), 1.0..20.0_f64, 0.0..1.0_f64),
        1..8,
    )
    .prop_map(|entries| {
        entries
            .into_iter()
            .map(|(instrument, quantity, priority)| {
                Opportunity::buy(instrument, quantity.floor().max(1.0), 50.0, priority, "test", "")
            })
            .collect()
    })
}

fn make_portfolio() -> PortfolioState {
    let mut portfolio = PortfolioState::new(100_000.0);
    for (id, country, industry, score) in [
        ("AAPL", "US", "tech", 0.9),
        ("NOVO", "DK", "pharma", 0.8),
        ("SAP", "DE", "tech", 0.6),
        ("MSFT", "US", "tech", 0.7),
    ] {
        portfolio.add_instrument(Instrument::new(id, country, industry, score, 50.0));
    }
    portfolio.add_position(
        Position::new("AAPL", 1_000.0, 40.0)
            .with_holding_days(30)
            .with_days_since_last_sell(30),
    );
    portfolio
}

// ── 1. Fingerprint Identity ──────────────────────────────────────────

proptest! {
    /// The same ordered tuple list always hashes to the same fingerprint.
    #[test]
    fn fingerprint_is_deterministic(steps in arb_steps()) {
        fn view(s: &[(String, Side, f64)]) -> Vec<(&str, Side, f64)> {
            s.iter().map(|(i, side, q)| (i.as_str(), *side, *q)).collect::<Vec<_>>()
        }
        let a = Fingerprint::of_steps(view(&steps));
        let b = Fingerprint::of_steps(view(&steps));
        prop_assert_eq!(a, b);
    }

    /// Changing any single quantity changes the fingerprint.
    #[test]
    fn fingerprint_sees_quantity_changes(
        steps in arb_steps(),
        pick in 0..6usize,
    ) {
        let idx = pick % steps.len();
        let original = Fingerprint::of_steps(
            steps.iter().map(|(i, s, q)| (i.as_str(), *s, *q)),
        );
        let mutated = Fingerprint::of_steps(steps.iter().enumerate().map(|(n, (i, s, q))| {
            let q = if n == idx { q + 0.5 } else { *q };
            (i.as_str(), *s, q)
        }));
        prop_assert_ne!(original, mutated);
    }

    /// Reversing a multi-step sequence changes the fingerprint: order is
    /// part of the identity.
    #[test]
    fn fingerprint_is_order_sensitive(steps in arb_steps()) {
        prop_assume!(steps.len() >= 2);
        prop_assume!(steps.first() != steps.last());
        let forward = Fingerprint::of_steps(
            steps.iter().map(|(i, s, q)| (i.as_str(), *s, *q)),
        );
        let reversed = Fingerprint::of_steps(
            steps.iter().rev().map(|(i, s, q)| (i.as_str(), *s, *q)),
        );
        prop_assert_ne!(forward, reversed);
    }
}

// ── 2. Validation Subset ─────────────────────────────────────────────

proptest! {
    /// Every field quick_validate flags is also flagged by full_validate,
    /// whatever shape the raw configuration is in.
    #[test]
    fn quick_failures_are_a_subset_of_full(
        max_depth in 0u32..20,
        allow_buy in prop::bool::ANY,
        allow_sell in prop::bool::ANY,
        clear_calculators in prop::bool::ANY,
        drop_profit_taking_params in prop::bool::ANY,
    ) {
        let mut raw = RawPlannerConfig::default();
        raw.max_depth = max_depth;
        raw.allow_buy = allow_buy;
        raw.allow_sell = allow_sell;
        if clear_calculators {
            raw.enabled_calculators = BTreeSet::new();
        }
        if drop_profit_taking_params {
            raw.calculator_params.insert("profit_taking".to_string(), BTreeMap::new());
        }

        let quick = raw.quick_validate();
        let full = raw.full_validate();
        for error in quick.iter() {
            prop_assert!(
                full.has_field(&error.field),
                "field {} flagged by quick but not by full",
                error.field
            );
        }
    }
}

// ── 3. Generator Bounds ──────────────────────────────────────────────

proptest! {
    /// Emitted sequences never exceed the configured depth or side caps,
    /// for arbitrary all-buy pools.
    #[test]
    fn generator_respects_depth_and_side_caps(
        pool in arb_buy_pool(),
        max_depth in 1u32..4,
        max_buys in 1usize..4,
    ) {
        let mut config = RawPlannerConfig::default().validate().unwrap();
        config.max_depth = max_depth as usize;
        config.max_buys = max_buys;
        let mut opportunities = BTreeMap::new();
        opportunities.insert("test".to_string(), pool);

        let sequences = generator::expand(&opportunities, &make_portfolio(), &config);
        for sequence in &sequences {
            prop_assert!(sequence.depth() >= 1);
            prop_assert!(sequence.depth() <= max_depth as usize);
            prop_assert!(sequence.buy_count() <= max_buys);
        }
    }

    /// Two expansions of the same inputs produce identical fingerprint sets.
    #[test]
    fn generator_is_deterministic(pool in arb_buy_pool()) {
        let config = RawPlannerConfig::default().validate().unwrap();
        let portfolio = make_portfolio();
        let mut opportunities = BTreeMap::new();
        opportunities.insert("test".to_string(), pool);

        let collect = || -> BTreeSet<Fingerprint> {
            generator::expand(&opportunities, &portfolio, &config)
                .into_iter()
                .map(|s| s.fingerprint)
                .collect()
        };
        prop_assert_eq!(collect(), collect());
    }
}

// ── 4. Seed Hierarchy ────────────────────────────────────────────────

proptest! {
    /// Sub-seed derivation is a pure function of (master, scope, label, index).
    #[test]
    fn sub_seeds_are_stable(
        master in prop::num::u64::ANY,
        scope in "[a-f0-9]{8}",
        label in "[A-Z]{1,6}",
        index in 0u64..1000,
    ) {
        let h = RngHierarchy::new(master);
        prop_assert_eq!(
            h.sub_seed(&scope, &label, index),
            h.sub_seed(&scope, &label, index)
        );
    }

    /// Adjacent indices never collide (BLAKE3 expansion, not arithmetic).
    #[test]
    fn adjacent_indices_differ(
        master in prop::num::u64::ANY,
        scope in "[a-f0-9]{8}",
        index in 0u64..1000,
    ) {
        let h = RngHierarchy::new(master);
        prop_assert_ne!(
            h.sub_seed(&scope, "AAPL", index),
            h.sub_seed(&scope, "AAPL", index + 1)
        );
    }
}
