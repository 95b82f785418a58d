// src/shared_data.rs

use crate::control_system::traffic_light_controller::LightSnapshot;
use crate::flow_analyzer::traffic_analyzer::RunningMean;
use crate::simulation_engine::intersections::{Axis, Direction};
use crate::simulation_engine::vehicles::{RemovalCause, TurnIntent, Vehicle};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Running statistics of a simulation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Metrics {
    pub total_spawned: u64,
    /// Vehicles that left the road through its far end.
    pub throughput: u64,
    pub collisions: u64,
    wait_time: RunningMean,
    travel_time: RunningMean,
    /// One sample per tick for each direction.
    queue_lengths: HashMap<Direction, Vec<usize>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_spawn(&mut self) {
        self.total_spawned += 1;
    }

    pub fn record_collision(&mut self) {
        self.collisions += 1;
    }

    /// Counts an exit and folds its times into the running averages.
    pub fn record_exit(&mut self, travel_ticks: u64, wait_ticks: u64) {
        self.throughput += 1;
        self.travel_time.push(travel_ticks as f64);
        self.wait_time.push(wait_ticks as f64);
    }

    pub fn record_queue_lengths<I>(&mut self, samples: I)
    where
        I: IntoIterator<Item = (Direction, usize)>,
    {
        for (direction, length) in samples {
            self.queue_lengths.entry(direction).or_default().push(length);
        }
    }

    /// Average ticks spent stopped, over the vehicles that exited.
    pub fn avg_wait_time(&self) -> f64 {
        self.wait_time.mean()
    }

    /// Average ticks between entry and exit, over the vehicles that exited.
    pub fn avg_travel_time(&self) -> f64 {
        self.travel_time.mean()
    }

    pub fn queue_lengths(&self, direction: Direction) -> &[usize] {
        self.queue_lengths
            .get(&direction)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn all_queue_lengths(&self) -> &HashMap<Direction, Vec<usize>> {
        &self.queue_lengths
    }
}

/// What a renderer needs to draw one vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VehicleSnapshot {
    pub id: u64,
    pub x: f64,
    pub y: f64,
    pub direction: Direction,
    pub speed: f64,
}

/// Everything the animation shows for one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameSnapshot {
    pub tick: u64,
    pub vehicles: Vec<VehicleSnapshot>,
    pub lights: [(Axis, LightSnapshot); 2],
    pub throughput: u64,
    pub avg_wait_time: f64,
    pub avg_travel_time: f64,
}

/// Flat row describing a vehicle that left the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovedVehicleRecord {
    pub id: u64,
    pub direction: Direction,
    pub turn_intent: TurnIntent,
    pub cause: Option<RemovalCause>,
    pub entry_tick: u64,
    pub exit_tick: Option<u64>,
    pub travel_ticks: Option<u64>,
    pub wait_ticks: u64,
    /// Unix seconds.
    pub entered_at: f64,
    /// Unix seconds.
    pub exited_at: Option<f64>,
    pub travel_seconds: Option<f64>,
}

impl From<&Vehicle> for RemovedVehicleRecord {
    fn from(vehicle: &Vehicle) -> Self {
        Self {
            id: vehicle.id(),
            direction: vehicle.direction(),
            turn_intent: vehicle.turn_intent(),
            cause: vehicle.removal(),
            entry_tick: vehicle.entry_tick(),
            exit_tick: vehicle.exit_tick(),
            travel_ticks: vehicle.travel_ticks(),
            wait_ticks: vehicle.wait_ticks(),
            entered_at: unix_seconds(vehicle.entered_at()),
            exited_at: vehicle.exited_at().map(unix_seconds),
            travel_seconds: vehicle.travel_duration().map(|d| d.as_secs_f64()),
        }
    }
}

pub fn unix_seconds(time: SystemTime) -> f64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
