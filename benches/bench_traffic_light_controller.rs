// benches/bench_traffic_light_controller.rs
use criterion::{
    black_box, criterion_group, criterion_main, AxisScale, Criterion, PlotConfiguration,
};
use intersection_sim::control_system::traffic_light_controller::TrafficLight;
use std::time::Duration;

fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("traffic_light_update");

    group.sample_size(100);
    group.measurement_time(Duration::from_secs(5));
    group.warm_up_time(Duration::from_secs(2));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Linear));

    // Short cycles change phase far more often per update.
    for &cycle in [10u32, 60, 600].iter() {
        group.bench_function(format!("cycle_{}", cycle), |b| {
            let mut light = TrafficLight::new(cycle, 0.5);
            b.iter(|| {
                light.update();
                black_box(light.snapshot());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_update);
criterion_main!(benches);
