// simulation_main.rs
use intersection_sim::global_variables::ANIMATION_FILE;
use intersection_sim::monitoring::animation::AnimationRecorder;
use intersection_sim::monitoring::traffic_monitoring_system::{
    count_csv_records, run_stamp, write_reports,
};
use intersection_sim::simulation_engine::config::SimulationConfig;
use intersection_sim::simulation_engine::simulation::Simulation;
use log::{error, info, warn};
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;
use structopt::StructOpt;

const ANIMATION_SIZE: u32 = 600;
const DEFAULT_FRAME_DELAY_MS: u32 = 100;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "simulation_main",
    about = "Simulates traffic through a four-way signalized intersection"
)]
struct Opt {
    /// JSON configuration file; defaults are used for anything it omits
    #[structopt(long, parse(from_os_str))]
    config: Option<PathBuf>,

    /// Number of ticks to simulate
    #[structopt(long, default_value = "500")]
    steps: u64,

    /// Seed for a reproducible run, overrides the configuration
    #[structopt(long)]
    seed: Option<u64>,

    /// Chance per tick of spawning a vehicle, overrides the configuration
    #[structopt(long)]
    spawn_rate: Option<f64>,

    /// Wall-clock pause between ticks; 0 runs as fast as possible
    #[structopt(long, default_value = "0")]
    frame_interval_ms: u64,

    /// Where charts, exports and the animation are written
    #[structopt(long, default_value = "output", parse(from_os_str))]
    output_dir: PathBuf,

    /// Do not record the GIF animation
    #[structopt(long)]
    no_animation: bool,

    /// Write the CSV and JSON exports but no charts
    #[structopt(long)]
    no_charts: bool,
}

fn load_config(opt: &Opt) -> Result<SimulationConfig, Box<dyn Error>> {
    let mut config = match &opt.config {
        Some(path) => SimulationConfig::from_json_file(path)?,
        None => SimulationConfig::default(),
    };
    if opt.seed.is_some() {
        config.seed = opt.seed;
    }
    if let Some(rate) = opt.spawn_rate {
        config.spawn_rate = rate;
    }
    Ok(config)
}

async fn run(opt: Opt) -> Result<(), Box<dyn Error>> {
    let config = load_config(&opt)?;
    let mut sim = Simulation::new(config)?;
    std::fs::create_dir_all(&opt.output_dir)?;
    let stamp = run_stamp();

    let animation_path = opt
        .output_dir
        .join(format!("{}_{}.gif", ANIMATION_FILE, stamp));
    let frame_delay = match opt.frame_interval_ms {
        0 => DEFAULT_FRAME_DELAY_MS,
        ms => u32::try_from(ms).unwrap_or(u32::MAX),
    };
    let mut recorder = if opt.no_animation {
        None
    } else {
        match AnimationRecorder::create(&animation_path, *sim.geometry(), ANIMATION_SIZE, frame_delay) {
            Ok(recorder) => Some(recorder),
            Err(e) => {
                warn!("Could not open {}, animation disabled: {}", animation_path.display(), e);
                None
            }
        }
    };

    let mut pacing = if opt.frame_interval_ms > 0 {
        Some(tokio::time::interval(Duration::from_millis(opt.frame_interval_ms)))
    } else {
        None
    };

    println!("Starting intersection simulation for {} ticks...", opt.steps);
    for _ in 0..opt.steps {
        if let Some(interval) = pacing.as_mut() {
            interval.tick().await;
        }
        let tick = sim.step();

        let failed = match recorder.as_mut() {
            Some(recorder) => recorder.render_frame(&sim.frame()).err(),
            None => None,
        };
        if let Some(e) = failed {
            warn!("Animation stopped at tick {}: {}", tick, e);
            recorder = None;
        }
        if tick % 100 == 0 {
            info!(
                "Tick {}: {} active, {} exited, {} collisions",
                tick,
                sim.active().len(),
                sim.metrics().throughput,
                sim.metrics().collisions
            );
        }
    }

    if let Some(recorder) = recorder {
        let frames = recorder.finish();
        println!("Animation with {} frames saved to {}", frames, animation_path.display());
    }

    let summary = sim.summary();
    println!("\nSimulation Results:");
    println!("Ticks simulated: {}", summary.ticks);
    println!("Vehicles spawned: {}", summary.total_spawned);
    println!("Total throughput: {} vehicles", summary.throughput);
    println!("Collisions: {}", summary.collisions);
    println!("Still on the road: {}", summary.still_active);
    println!("Average wait time: {:.2} ticks", summary.avg_wait_time);
    println!("Average travel time: {:.2} ticks", summary.avg_travel_time);
    println!("\nAverage queue lengths:");
    for (direction, avg) in &summary.avg_queue_lengths {
        println!("{}: {:.2} vehicles", direction, avg);
    }

    let output_dir = opt.output_dir.clone();
    let metrics = sim.metrics().clone();
    let removed = sim.removed().to_vec();
    let with_charts = !opt.no_charts;
    let written = tokio::task::spawn_blocking(move || {
        write_reports(&output_dir, &stamp, &metrics, &removed, &summary, with_charts)
            .map_err(|e| e.to_string())
    })
    .await??;

    println!("\nWrote {} files to {}", written.len(), opt.output_dir.display());
    for path in &written {
        if path.extension().map_or(false, |ext| ext == "csv") {
            println!("{}: {} records", path.display(), count_csv_records(path)?);
        } else {
            info!("  {}", path.display());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let opt = Opt::from_args();
    if let Err(e) = run(opt).await {
        error!("Simulation failed: {}", e);
        eprintln!("Simulation failed: {}", e);
        std::process::exit(1);
    }
}
