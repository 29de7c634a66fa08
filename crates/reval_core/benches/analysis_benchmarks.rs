//! Criterion benchmarks for reval_core analyses
//!
//! Run with: cargo bench -p reval_core

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use reval_core::model::{EquityRole, ScenarioConfig};
use reval_core::monte_carlo::{SimulationConfig, simulate};
use reval_core::sensitivity::{Range, SensitivityConfig, sweep};
use reval_core::valuation::Valuation;
use reval_core::{InputVariable, ProForma, ScenarioBuilder, SolverConfig, TargetKpi, solve};

fn create_mixed_use(hold_years: u16) -> ScenarioConfig {
    ScenarioBuilder::new()
        .hold_years(hold_years)
        .seasonal_hotel(
            "Tower Hotel",
            220,
            240.0,
            [0.58, 0.6, 0.68, 0.72, 0.78, 0.86, 0.9, 0.9, 0.8, 0.74, 0.64, 0.62],
        )
        .leasing("Podium Retail", 9_000.0, 48.0, 0.9)
        .ancillary("Parking", 650_000.0)
        .initial_investment(65_000_000.0)
        .senior_debt(35_000_000.0, 0.06, 25)
        .equity("Investors", EquityRole::Limited, 0.9)
        .equity("Sponsor", EquityRole::General, 0.1)
        .tier(Some(1.5), 0.1)
        .tier(Some(2.0), 0.2)
        .tier(None, 0.35)
        .build()
}

fn bench_single_valuation(c: &mut Criterion) {
    let scenario = create_mixed_use(10);

    c.bench_function("pro_forma_10yr", |b| {
        b.iter(|| ProForma.evaluate(black_box(&scenario)))
    });
}

fn bench_goal_seek(c: &mut Criterion) {
    let scenario = create_mixed_use(10);
    let config = SolverConfig::new(TargetKpi::Npv, 0.0, InputVariable::RoomRate);

    c.bench_function("goal_seek_break_even_adr", |b| {
        b.iter(|| solve(&ProForma, black_box(&scenario), black_box(&config)))
    });
}

fn bench_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("sweep");
    let scenario = create_mixed_use(10);

    for steps in [5usize, 11, 21].iter() {
        let config = SensitivityConfig::two_way(
            InputVariable::RoomRate,
            Range::new(0.8, 1.2, *steps),
            InputVariable::Occupancy,
            Range::new(0.5, 0.9, *steps),
        );
        group.bench_with_input(BenchmarkId::new("two_way", steps), steps, |b, _| {
            b.iter(|| sweep(&ProForma, black_box(&scenario), black_box(&config), None))
        });
    }

    group.finish();
}

fn bench_monte_carlo(c: &mut Criterion) {
    let mut group = c.benchmark_group("monte_carlo");
    let scenario = create_mixed_use(10);

    for iterations in [100, 500, 1000].iter() {
        let config = SimulationConfig::defaults_for(&scenario)
            .with_seed(42)
            .with_iterations(*iterations);

        group.bench_with_input(
            BenchmarkId::new("iterations", iterations),
            iterations,
            |b, _| b.iter(|| simulate(&ProForma, black_box(&scenario), black_box(&config), None)),
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_single_valuation,
    bench_goal_seek,
    bench_sweep,
    bench_monte_carlo,
);
criterion_main!(benches);
