//! Criterion benchmarks for planner hot paths.
//!
//! Benchmarks:
//! 1. Sequence generation (breadth-first expansion at growing pool sizes)
//! 2. Scenario construction (stochastic + Monte Carlo path sets)
//! 3. Sequence evaluation (full replay + aggregate across scenarios)
//! 4. Fingerprint hashing

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::BTreeMap;
use std::time::Instant;

use planlab_core::config::{PlannerConfig, RawPlannerConfig};
use planlab_core::domain::{Instrument, Opportunity, PortfolioState, Position, Sequence, SequenceStep, Side};
use planlab_core::fingerprint::Fingerprint;
use planlab_core::{evaluator, generator, scenario};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_config() -> PlannerConfig {
    RawPlannerConfig::default().validate().unwrap()
}

fn make_portfolio(instrument_count: usize) -> PortfolioState {
    let mut portfolio = PortfolioState::new(1_000_000.0);
    for i in 0..instrument_count {
        let id = format!("SYM{i}");
        let country = if i % 2 == 0 { "US" } else { "DK" };
        let industry = if i % 3 == 0 { "tech" } else { "pharma" };
        let score = 0.3 + (i as f64 % 7.0) / 10.0;
        portfolio.add_instrument(
            Instrument::new(&id, country, industry, score, 50.0 + i as f64).with_volatility(0.25),
        );
        if i % 2 == 0 {
            portfolio.add_position(
                Position::new(&id, 100.0, 40.0 + i as f64)
                    .with_holding_days(30)
                    .with_days_since_last_sell(30),
            );
        }
    }
    portfolio
}

fn make_pool(size: usize) -> BTreeMap<String, Vec<Opportunity>> {
    let ops = (0..size)
        .map(|i| {
            let id = format!("SYM{i}");
            if i % 3 == 0 {
                Opportunity::sell(id, 20.0, 50.0 + i as f64, 0.9 - i as f64 * 0.01, "bench", "")
            } else {
                Opportunity::buy(id, 20.0, 50.0 + i as f64, 0.9 - i as f64 * 0.01, "bench", "")
            }
        })
        .collect();
    let mut map = BTreeMap::new();
    map.insert("bench".to_string(), ops);
    map
}

fn make_sequence(depth: usize) -> Sequence {
    let steps = (0..depth)
        .map(|i| SequenceStep {
            opportunity: Opportunity::buy(format!("SYM{}", i * 2 + 1), 20.0, 50.0, 0.8, "bench", ""),
            score_before: 0.0,
            score_after: 0.0,
            cash_before: 0.0,
            cash_after: 0.0,
        })
        .collect();
    Sequence::new(steps)
}

// ── 1. Sequence Generation ───────────────────────────────────────────

fn bench_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequence_generation");

    for &pool_size in &[6, 15, 30] {
        let portfolio = make_portfolio(pool_size);
        let pool = make_pool(pool_size);
        let config = make_config();

        group.bench_with_input(
            BenchmarkId::new("depth_3", pool_size),
            &pool_size,
            |b, _| {
                b.iter(|| {
                    generator::expand(black_box(&pool), black_box(&portfolio), black_box(&config))
                });
            },
        );
    }

    let portfolio = make_portfolio(15);
    let pool = make_pool(15);
    let mut deep_config = make_config();
    deep_config.max_depth = 5;
    group.bench_function("depth_5_pool_15", |b| {
        b.iter(|| {
            generator::expand(black_box(&pool), black_box(&portfolio), black_box(&deep_config))
        });
    });

    group.finish();
}

// ── 2. Scenario Construction ─────────────────────────────────────────

fn bench_scenarios(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenario_construction");

    let portfolio = make_portfolio(10);
    let sequence = make_sequence(3);

    let stochastic_config = make_config();
    group.bench_function("stochastic_only", |b| {
        b.iter(|| {
            scenario::scenarios_for(
                black_box(&sequence),
                black_box(&portfolio),
                black_box(&stochastic_config),
            )
        });
    });

    for &paths in &[50, 200] {
        let mut config = make_config();
        config.enable_monte_carlo_paths = true;
        config.monte_carlo_path_count = paths;
        group.bench_with_input(BenchmarkId::new("monte_carlo", paths), &paths, |b, _| {
            b.iter(|| {
                scenario::scenarios_for(
                    black_box(&sequence),
                    black_box(&portfolio),
                    black_box(&config),
                )
            });
        });
    }

    group.finish();
}

// ── 3. Sequence Evaluation ───────────────────────────────────────────

fn bench_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequence_evaluation");

    let portfolio = make_portfolio(10);
    let sequence = make_sequence(3);

    let config = make_config();
    group.bench_function("replay_baseline", |b| {
        let baseline = scenario::Scenario::baseline();
        b.iter(|| {
            evaluator::evaluate(
                black_box(&sequence),
                black_box(&baseline),
                black_box(&portfolio),
                black_box(&config),
                Instant::now() + std::time::Duration::from_secs(60),
            )
        });
    });

    let mut full_config = make_config();
    full_config.enable_monte_carlo_paths = true;
    full_config.monte_carlo_path_count = 50;
    full_config.enable_market_regime_scenarios = true;
    full_config.enable_multi_timeframe = true;
    group.bench_function("full_scenario_set", |b| {
        b.iter(|| {
            evaluator::evaluate_sequence(
                black_box(&sequence),
                black_box(&portfolio),
                black_box(&full_config),
            )
        });
    });

    group.finish();
}

// ── 4. Fingerprint Hashing ───────────────────────────────────────────

fn bench_fingerprint(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint");

    for &depth in &[1usize, 5, 10] {
        let steps: Vec<(String, Side, f64)> = (0..depth)
            .map(|i| (format!("SYM{i}"), Side::Buy, 10.0 + i as f64))
            .collect();
        group.bench_with_input(BenchmarkId::new("of_steps", depth), &depth, |b, _| {
            b.iter(|| {
                Fingerprint::of_steps(
                    black_box(&steps)
                        .iter()
                        .map(|(id, side, q)| (id.as_str(), *side, *q)),
                )
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_generation,
    bench_scenarios,
    bench_evaluation,
    bench_fingerprint,
);
criterion_main!(benches);
