// benches/bench_simulation_step.rs
use criterion::{
    black_box, criterion_group, criterion_main, AxisScale, BatchSize, BenchmarkId, Criterion,
    PlotConfiguration,
};
use intersection_sim::simulation_engine::config::SimulationConfig;
use intersection_sim::simulation_engine::simulation::Simulation;
use std::time::Duration;

/// A simulation that has run long enough for queues to build up.
fn warmed_up(spawn_rate: f64) -> Simulation {
    let config = SimulationConfig {
        spawn_rate,
        ..SimulationConfig::default()
    };
    let mut sim = Simulation::from_seed(config, 42).expect("benchmark config is valid");
    for _ in 0..300 {
        sim.step();
    }
    sim
}

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulation_step");
    group.sample_size(50);
    group.measurement_time(Duration::from_secs(5));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Linear));

    for &rate in [0.1, 0.5, 1.0].iter() {
        group.bench_with_input(BenchmarkId::new("spawn_rate", rate), &rate, |b, &rate| {
            b.iter_batched(
                || warmed_up(rate),
                |mut sim| {
                    for _ in 0..10 {
                        sim.step();
                    }
                    black_box(sim.tick())
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_frame_snapshot(c: &mut Criterion) {
    let sim = warmed_up(1.0);
    c.bench_function("frame_snapshot", |b| b.iter(|| black_box(sim.frame())));
}

criterion_group!(benches, bench_step, bench_frame_snapshot);
criterion_main!(benches);
