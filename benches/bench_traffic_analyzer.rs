use criterion::{
    black_box, criterion_group, criterion_main, AxisScale, BenchmarkId, Criterion,
    PlotConfiguration,
};

use intersection_sim::flow_analyzer::traffic_analyzer::{
    average_queue_lengths, histogram, throughput_by_direction, travel_times, RunSummary,
};
use intersection_sim::simulation_engine::config::SimulationConfig;
use intersection_sim::simulation_engine::simulation::Simulation;

/// Runs a seeded simulation long enough to produce the given number of ticks
/// of queue samples and a matching history of removed vehicles.
fn finished_simulation(ticks: u64) -> Simulation {
    let config = SimulationConfig {
        spawn_rate: 0.8,
        ..SimulationConfig::default()
    };
    let mut sim = Simulation::from_seed(config, 7).expect("default config is valid");
    for _ in 0..ticks {
        sim.step();
    }
    sim
}

/// Benchmarks the end-of-run analytics for runs of 500, 2000 and 8000 ticks.
fn bench_run_analytics(c: &mut Criterion) {
    let run_lengths = [500u64, 2000, 8000];

    let mut group = c.benchmark_group("Run_Analytics_Benchmarks");
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for &ticks in run_lengths.iter() {
        let sim = finished_simulation(ticks);

        group.bench_with_input(BenchmarkId::new("average_queue_lengths", ticks), &ticks, |b, _| {
            b.iter(|| black_box(average_queue_lengths(black_box(sim.metrics()))));
        });

        group.bench_with_input(BenchmarkId::new("travel_time_histogram", ticks), &ticks, |b, _| {
            b.iter(|| {
                let times = travel_times(black_box(sim.removed()));
                black_box(histogram(&times, 20))
            });
        });

        group.bench_with_input(BenchmarkId::new("run_summary", ticks), &ticks, |b, _| {
            b.iter(|| {
                black_box(throughput_by_direction(sim.removed()));
                black_box(RunSummary::collect(
                    sim.tick(),
                    sim.metrics(),
                    sim.removed(),
                    sim.active().len(),
                ))
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_run_analytics);
criterion_main!(benches);
