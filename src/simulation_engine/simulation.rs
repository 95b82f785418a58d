// simulation.rs
use crate::control_system::traffic_light_controller::{LightSnapshot, LightState, TrafficLight};
use crate::flow_analyzer::traffic_analyzer::RunSummary;
use crate::global_variables::{COLLISION_DISTANCE, QUEUE_DETECTION_DISTANCE};
use crate::shared_data::{FrameSnapshot, Metrics, VehicleSnapshot};
use crate::simulation_engine::config::{ConfigError, SimulationConfig};
use crate::simulation_engine::intersections::{
    gap_ahead, Axis, Direction, IntersectionGeometry, Point2d,
};
use crate::simulation_engine::vehicles::{RemovalCause, TurnIntent, Vehicle};
use cgmath::MetricSpace;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A single four-way intersection with one traffic light per axis.
///
/// Everything is driven by [`Simulation::step`]; one call is one tick. All
/// random decisions come from the generator `R`, so two simulations built
/// with the same configuration and seed evolve identically.
pub struct Simulation<R: Rng = StdRng> {
    config: SimulationConfig,
    geometry: IntersectionGeometry,
    north_south_light: TrafficLight,
    east_west_light: TrafficLight,
    /// Vehicles on the road, in spawn order.
    active: Vec<Vehicle>,
    /// Vehicles that exited or collided, in removal order.
    removed: Vec<Vehicle>,
    metrics: Metrics,
    next_vehicle_id: u64,
    tick: u64,
    rng: R,
}

impl Simulation<StdRng> {
    /// Builds a simulation seeded from `config.seed`, or from the OS when unset.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::with_rng(config, rng)
    }

    pub fn from_seed(config: SimulationConfig, seed: u64) -> Result<Self, ConfigError> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Simulation<R> {
    pub fn with_rng(config: SimulationConfig, rng: R) -> Result<Self, ConfigError> {
        config.validate()?;
        let ns = config.north_south_light;
        let ew = config.east_west_light;
        info!(
            "Intersection ready: road {} x lane {}, spawn rate {}, lights {}/{} and {}/{}",
            config.road_length,
            config.lane_width,
            config.spawn_rate,
            ns.cycle_length,
            ns.green_ratio,
            ew.cycle_length,
            ew.green_ratio
        );
        Ok(Self {
            geometry: IntersectionGeometry::new(config.road_length, config.lane_width),
            north_south_light: TrafficLight::new(ns.cycle_length, ns.green_ratio),
            east_west_light: TrafficLight::new(ew.cycle_length, ew.green_ratio)
                .starting_in(LightState::Red),
            active: Vec::new(),
            removed: Vec::new(),
            metrics: Metrics::new(),
            next_vehicle_id: 0,
            tick: 0,
            config,
            rng,
        })
    }

    /// Advances the simulation by one tick and returns the tick number.
    pub fn step(&mut self) -> u64 {
        self.tick += 1;
        let tick = self.tick;

        self.update_lights();

        let roll: f64 = self.rng.random();
        if roll < self.config.spawn_rate {
            self.spawn_vehicle();
        }

        for index in 0..self.active.len() {
            let direction = self.active[index].direction();
            let light = self.light(direction.axis()).state();
            let signal_distance = self.signal_distance(&self.active[index]);
            let front_distance = self.front_distance(index);

            let vehicle = &mut self.active[index];
            vehicle.update_speed(front_distance, light, signal_distance, &mut self.rng);
            vehicle.move_forward(tick);

            if self.collides(index) {
                let vehicle = &mut self.active[index];
                vehicle.mark_removed(RemovalCause::Collided, tick);
                self.metrics.record_collision();
                debug!("Vehicle {} ({}) collided at tick {}", vehicle.id(), direction, tick);
            } else if self.has_exited(&self.active[index]) {
                let vehicle = &mut self.active[index];
                vehicle.mark_removed(RemovalCause::Exited, tick);
                let travel = vehicle.travel_ticks().unwrap_or(0);
                self.metrics.record_exit(travel, vehicle.wait_ticks());
                debug!(
                    "Vehicle {} ({}) exited at tick {} after {} ticks, {} waiting",
                    vehicle.id(),
                    direction,
                    tick,
                    travel,
                    vehicle.wait_ticks()
                );
            }
        }

        let (gone, staying): (Vec<Vehicle>, Vec<Vehicle>) = self
            .active
            .drain(..)
            .partition(|vehicle| vehicle.removal().is_some());
        self.active = staying;
        self.removed.extend(gone);

        self.record_queue_lengths();
        tick
    }

    /// Places a vehicle on the road directly, bypassing the random spawner.
    /// It counts as spawned and is updated from the next tick on.
    pub fn insert_vehicle(&mut self, direction: Direction, position: Point2d) -> u64 {
        let turn_intent = TurnIntent::sample(&mut self.rng);
        self.add_vehicle(direction, position, turn_intent)
    }

    fn spawn_vehicle(&mut self) {
        let direction = Direction::ALL[self.rng.random_range(0..Direction::ALL.len())];
        let (low, high) = self.geometry.lane_band();
        let lateral = self.rng.random_range(low..high);
        let turn_intent = TurnIntent::sample(&mut self.rng);
        let position = self.geometry.spawn_point(direction, lateral);
        let id = self.add_vehicle(direction, position, turn_intent);
        debug!(
            "Spawned vehicle {} heading {} ({:?}) at ({:.1}, {:.1})",
            id, direction, turn_intent, position.x, position.y
        );
    }

    fn add_vehicle(&mut self, direction: Direction, position: Point2d, turn_intent: TurnIntent) -> u64 {
        let id = self.next_vehicle_id;
        self.next_vehicle_id += 1;
        let mut vehicle = Vehicle::new(id, direction, self.config.vehicle, turn_intent)
            .with_path_capacity(self.config.path_capacity);
        vehicle.place(position, self.tick);
        self.active.push(vehicle);
        self.metrics.record_spawn();
        id
    }

    fn update_lights(&mut self) {
        for (axis, light) in [
            (Axis::NorthSouth, &mut self.north_south_light),
            (Axis::EastWest, &mut self.east_west_light),
        ] {
            let before = light.state();
            light.update();
            if light.state() != before {
                debug!("{} light turned {} at tick {}", axis, light.state(), self.tick);
            }
        }
    }

    /// Distance to the stop line, or infinity once the line is behind the
    /// vehicle and the light no longer applies to it.
    fn signal_distance(&self, vehicle: &Vehicle) -> f64 {
        match vehicle.position() {
            Some(position) => {
                let distance = self.geometry.stop_line_distance(vehicle.direction(), position);
                if distance >= 0.0 {
                    distance
                } else {
                    f64::INFINITY
                }
            }
            None => f64::INFINITY,
        }
    }

    /// Gap to the closest vehicle ahead travelling the same way.
    fn front_distance(&self, index: usize) -> Option<f64> {
        let own = &self.active[index];
        let position = own.position()?;
        self.active
            .iter()
            .enumerate()
            .filter(|(other_index, other)| {
                *other_index != index && other.direction() == own.direction()
            })
            .filter_map(|(_, other)| other.position())
            .map(|other| gap_ahead(own.direction(), position, other))
            .filter(|&gap| gap > 0.0)
            .min_by(|a, b| a.total_cmp(b))
    }

    fn collides(&self, index: usize) -> bool {
        let Some(position) = self.active[index].position() else {
            return false;
        };
        self.active
            .iter()
            .enumerate()
            .filter(|(other_index, _)| *other_index != index)
            .filter_map(|(_, other)| other.position())
            .any(|other| position.distance(other) < COLLISION_DISTANCE)
    }

    fn has_exited(&self, vehicle: &Vehicle) -> bool {
        vehicle
            .position()
            .map(|position| self.geometry.has_exited(vehicle.direction(), position))
            .unwrap_or(false)
    }

    /// Counts stopped vehicles close to their stop line, per direction.
    fn record_queue_lengths(&mut self) {
        let mut queues = [0usize; 4];
        for vehicle in &self.active {
            let Some(position) = vehicle.position() else {
                continue;
            };
            let distance = self.geometry.stop_line_distance(vehicle.direction(), position);
            if (0.0..QUEUE_DETECTION_DISTANCE).contains(&distance) && vehicle.speed() == 0.0 {
                let slot = Direction::ALL
                    .iter()
                    .position(|&d| d == vehicle.direction())
                    .unwrap_or(0);
                queues[slot] += 1;
            }
        }
        self.metrics
            .record_queue_lengths(Direction::ALL.iter().copied().zip(queues));
    }

    /// Number of ticks simulated so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn geometry(&self) -> &IntersectionGeometry {
        &self.geometry
    }

    pub fn light(&self, axis: Axis) -> &TrafficLight {
        match axis {
            Axis::NorthSouth => &self.north_south_light,
            Axis::EastWest => &self.east_west_light,
        }
    }

    pub fn light_snapshots(&self) -> [(Axis, LightSnapshot); 2] {
        [
            (Axis::NorthSouth, self.north_south_light.snapshot()),
            (Axis::EastWest, self.east_west_light.snapshot()),
        ]
    }

    pub fn active(&self) -> &[Vehicle] {
        &self.active
    }

    pub fn removed(&self) -> &[Vehicle] {
        &self.removed
    }

    pub fn vehicle_snapshots(&self) -> Vec<VehicleSnapshot> {
        self.active
            .iter()
            .filter_map(|vehicle| {
                vehicle.position().map(|position| VehicleSnapshot {
                    id: vehicle.id(),
                    x: position.x,
                    y: position.y,
                    direction: vehicle.direction(),
                    speed: vehicle.speed(),
                })
            })
            .collect()
    }

    /// Read-only view of the current tick for renderers.
    pub fn frame(&self) -> FrameSnapshot {
        FrameSnapshot {
            tick: self.tick,
            vehicles: self.vehicle_snapshots(),
            lights: self.light_snapshots(),
            throughput: self.metrics.throughput,
            avg_wait_time: self.metrics.avg_wait_time(),
            avg_travel_time: self.metrics.avg_travel_time(),
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary::collect(self.tick, &self.metrics, &self.removed, self.active.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation_engine::config::LightConfig;
    use crate::simulation_engine::vehicles::VehicleParams;
    use std::collections::HashMap;

    fn quiet_config() -> SimulationConfig {
        SimulationConfig {
            spawn_rate: 0.0,
            vehicle: VehicleParams {
                noise_probability: 0.0,
                ..VehicleParams::default()
            },
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn lights_start_on_opposite_phases() {
        let sim = Simulation::from_seed(SimulationConfig::default(), 1).unwrap();
        assert_eq!(sim.light(Axis::NorthSouth).state(), LightState::Green);
        assert_eq!(sim.light(Axis::EastWest).state(), LightState::Red);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SimulationConfig {
            lane_width: -1.0,
            ..SimulationConfig::default()
        };
        assert!(Simulation::from_seed(config, 1).is_err());
    }

    #[test]
    fn no_spawns_at_zero_rate() {
        let mut sim = Simulation::from_seed(quiet_config(), 9).unwrap();
        for _ in 0..100 {
            sim.step();
        }
        assert_eq!(sim.metrics().total_spawned, 0);
        assert!(sim.active().is_empty());
    }

    #[test]
    fn spawns_every_tick_at_full_rate() {
        let config = SimulationConfig {
            spawn_rate: 1.0,
            ..SimulationConfig::default()
        };
        let mut sim = Simulation::from_seed(config, 9).unwrap();
        for tick in 1..=20u64 {
            sim.step();
            assert_eq!(sim.metrics().total_spawned, tick);
        }
        assert_eq!(
            sim.active().len() + sim.removed().len(),
            sim.metrics().total_spawned as usize
        );
    }

    #[test]
    fn spawned_vehicles_enter_on_their_edge() {
        let config = SimulationConfig {
            spawn_rate: 1.0,
            ..SimulationConfig::default()
        };
        let mut sim = Simulation::from_seed(config, 21).unwrap();
        sim.step();
        let vehicle = &sim.active()[0];
        let (low, high) = sim.geometry().lane_band();
        let position = vehicle.position().unwrap();
        let (along, across) = match vehicle.direction() {
            Direction::North => (position.y, position.x),
            Direction::South => (200.0 - position.y, position.x),
            Direction::East => (position.x, position.y),
            Direction::West => (200.0 - position.x, position.y),
        };
        assert!((low..high).contains(&across));
        assert!(along <= vehicle.params().max_speed);
    }

    #[test]
    fn one_queue_sample_per_tick() {
        let config = SimulationConfig {
            spawn_rate: 0.3,
            ..SimulationConfig::default()
        };
        let mut sim = Simulation::from_seed(config, 5).unwrap();
        for _ in 0..250 {
            sim.step();
        }
        for direction in Direction::ALL {
            assert_eq!(sim.metrics().queue_lengths(direction).len(), 250);
        }
    }

    #[test]
    fn vehicle_held_at_red_is_queued() {
        let mut sim = Simulation::from_seed(quiet_config(), 2).unwrap();
        let stop_line = sim.geometry().center() - sim.geometry().box_size() / 2.0;
        sim.insert_vehicle(Direction::East, Point2d::new(stop_line - 0.1, 100.0));

        for _ in 0..26 {
            sim.step();
        }
        assert_eq!(sim.metrics().queue_lengths(Direction::East), vec![1usize; 26].as_slice());
        assert_eq!(sim.metrics().queue_lengths(Direction::North), vec![0usize; 26].as_slice());
        assert_eq!(sim.active()[0].wait_ticks(), 26);

        sim.step();
        assert_eq!(sim.light(Axis::EastWest).state(), LightState::Green);
        assert_eq!(sim.metrics().queue_lengths(Direction::East)[26], 0);
    }

    #[test]
    fn survivors_keep_their_order() {
        let config = SimulationConfig {
            spawn_rate: 0.6,
            ..SimulationConfig::default()
        };
        let mut sim = Simulation::from_seed(config, 77).unwrap();
        for _ in 0..300 {
            sim.step();
            let ids: Vec<u64> = sim.active().iter().map(|v| v.id()).collect();
            assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
        }
    }

    #[test]
    fn wait_ticks_only_grow_when_stopped() {
        let config = SimulationConfig {
            spawn_rate: 0.5,
            north_south_light: LightConfig {
                cycle_length: 30,
                green_ratio: 0.3,
            },
            ..SimulationConfig::default()
        };
        let mut sim = Simulation::from_seed(config, 13).unwrap();
        let mut previous: HashMap<u64, u64> = HashMap::new();
        for _ in 0..300 {
            sim.step();
            let mut current = HashMap::new();
            for vehicle in sim.active() {
                let stopped = u64::from(vehicle.speed() == 0.0);
                let before = previous.get(&vehicle.id()).copied().unwrap_or(0);
                assert_eq!(vehicle.wait_ticks(), before + stopped);
                current.insert(vehicle.id(), vehicle.wait_ticks());
            }
            previous = current;
        }
    }

    #[test]
    fn same_seed_same_run() {
        let run = |seed| {
            let mut sim = Simulation::from_seed(SimulationConfig::default(), seed).unwrap();
            for _ in 0..300 {
                sim.step();
            }
            let exits: Vec<(u64, Option<u64>)> =
                sim.removed().iter().map(|v| (v.id(), v.exit_tick())).collect();
            (
                sim.metrics().throughput,
                sim.metrics().avg_travel_time(),
                sim.metrics().queue_lengths(Direction::South).to_vec(),
                exits,
            )
        };
        assert_eq!(run(99), run(99));
    }
}
