use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dispatch_engine::models::{AsPrices, CycleSelection, RtInterval, INTERVALS_PER_DAY};
use dispatch_engine::{
    simulate_co_optimized, simulate_hourly, BatteryConfig, HourlyBatteryConfig, Scenario,
    ScenarioSet,
};

fn hourly_prices() -> Vec<f64> {
    (0..24)
        .map(|hour| match hour {
            0..=5 | 21..=23 => 20.0 + hour as f64 * 0.1,
            17..=20 => 100.0 + hour as f64,
            _ => 50.0 - hour as f64 * 0.2,
        })
        .collect()
}

fn rt_day() -> Vec<RtInterval> {
    (0..INTERVALS_PER_DAY)
        .map(|i| {
            let hour = i / 12;
            let lmp = match hour {
                0..=5 => 18.0 + (i % 12) as f64 * 0.3,
                16..=19 => 90.0 + (i % 7) as f64 * 12.0,
                _ => 45.0 + (i % 5) as f64,
            };
            RtInterval::new(
                i,
                lmp,
                AsPrices {
                    reg_up: 9.0,
                    reg_down: 4.0,
                    rrs: 11.0,
                    ecrs: 24.0,
                    non_spin: 3.0,
                },
            )
        })
        .collect()
}

fn benchmark_hourly(c: &mut Criterion) {
    let prices = hourly_prices();
    let greedy = HourlyBatteryConfig::new(100.0, 2.0, 0.85, 3, 1.0).unwrap();
    let chronological = greedy.clone().with_selection(CycleSelection::Chronological);

    c.bench_function("hourly_greedy_3_cycles", |b| {
        b.iter(|| black_box(simulate_hourly(black_box(&prices), &greedy)))
    });
    c.bench_function("hourly_chronological_3_cycles", |b| {
        b.iter(|| black_box(simulate_hourly(black_box(&prices), &chronological)))
    });
}

fn benchmark_co_optimized(c: &mut Criterion) {
    let intervals = rt_day();
    let config = BatteryConfig::from_duration(100.0, 4.0).unwrap();

    c.bench_function("co_optimized_day", |b| {
        b.iter(|| black_box(simulate_co_optimized(black_box(&intervals), &config)))
    });
}

fn benchmark_scenario_sweep(c: &mut Criterion) {
    let intervals = rt_day();
    let mut scenarios = ScenarioSet::new();
    for duration in [1.0, 2.0, 4.0, 6.0, 8.0] {
        for power in [50.0, 100.0, 200.0] {
            let name = format!("{}MW_{}h", power, duration);
            scenarios.add(Scenario::new(&name, power, duration, 0.86, 2, 1.5, 0.1).unwrap());
        }
    }

    c.bench_function("co_optimized_sweep_15_scenarios", |b| {
        b.iter(|| black_box(scenarios.sweep_co_optimized(black_box(&intervals))))
    });
}

criterion_group!(
    benches,
    benchmark_hourly,
    benchmark_co_optimized,
    benchmark_scenario_sweep
);
criterion_main!(benches);
