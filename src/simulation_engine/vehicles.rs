use crate::control_system::traffic_light_controller::LightState;
use crate::global_variables::{
    FOLLOWING_GAP, MIN_SAFE_DISTANCE, NOISE_SLOWDOWN, SAFE_DISTANCE_FACTOR,
    TURN_LEFT_PROBABILITY, TURN_STRAIGHT_PROBABILITY,
};
use crate::simulation_engine::intersections::{Direction, Point2d};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, SystemTime};

/// What the driver intends to do at the crossing. Recorded only; paths are
/// always straight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnIntent {
    Straight,
    Left,
    Right,
}

impl TurnIntent {
    /// Straight 60%, left 25%, right 15%.
    pub fn sample<R: Rng>(rng: &mut R) -> Self {
        let r: f64 = rng.random();
        if r < TURN_STRAIGHT_PROBABILITY {
            TurnIntent::Straight
        } else if r < TURN_STRAIGHT_PROBABILITY + TURN_LEFT_PROBABILITY {
            TurnIntent::Left
        } else {
            TurnIntent::Right
        }
    }
}

/// Why a vehicle left the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalCause {
    Exited,
    Collided,
}

/// Kinematic parameters shared by every spawned vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleParams {
    pub max_speed: f64,
    pub acceleration: f64,
    pub deceleration: f64,
    /// Chance per tick that a moving driver eases off by one unit.
    pub noise_probability: f64,
}

impl Default for VehicleParams {
    fn default() -> Self {
        Self {
            max_speed: 5.0,
            acceleration: 1.0,
            deceleration: 2.0,
            noise_probability: 0.1,
        }
    }
}

/// One entry of a vehicle's trajectory log.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PathSample {
    pub x: f64,
    pub y: f64,
    pub tick: u64,
}

/// Represents a vehicle travelling straight through the intersection.
#[derive(Debug, Clone)]
pub struct Vehicle {
    id: u64,
    direction: Direction,
    params: VehicleParams,
    turn_intent: TurnIntent,
    speed: f64,
    position: Option<Point2d>,
    /// Ticks spent with zero speed.
    wait_ticks: u64,
    entry_tick: u64,
    exit_tick: Option<u64>,
    entered_at: SystemTime,
    exited_at: Option<SystemTime>,
    removal: Option<RemovalCause>,
    path: VecDeque<PathSample>,
    path_capacity: usize,
}

impl Vehicle {
    pub fn new(id: u64, direction: Direction, params: VehicleParams, turn_intent: TurnIntent) -> Self {
        Self {
            id,
            direction,
            params,
            turn_intent,
            speed: 0.0,
            position: None,
            wait_ticks: 0,
            entry_tick: 0,
            exit_tick: None,
            entered_at: SystemTime::now(),
            exited_at: None,
            removal: None,
            path: VecDeque::new(),
            path_capacity: 0,
        }
    }

    /// Keeps the last `capacity` positions. Zero turns the log off.
    pub fn with_path_capacity(mut self, capacity: usize) -> Self {
        self.path_capacity = capacity;
        self
    }

    /// Puts the vehicle on the road and stamps its entry time.
    pub fn place(&mut self, position: Point2d, tick: u64) {
        self.position = Some(position);
        self.entry_tick = tick;
        self.entered_at = SystemTime::now();
    }

    /// Applies, in order: acceleration, car following, signal compliance and
    /// random slowdown. Only the first step can raise the speed.
    pub fn update_speed<R: Rng>(
        &mut self,
        front_distance: Option<f64>,
        light: LightState,
        signal_distance: f64,
        rng: &mut R,
    ) {
        if self.speed < self.params.max_speed {
            self.speed = (self.speed + self.params.acceleration).min(self.params.max_speed);
        }

        let safe_distance = MIN_SAFE_DISTANCE.max(self.speed * SAFE_DISTANCE_FACTOR);
        if let Some(gap) = front_distance {
            if gap < safe_distance {
                self.speed = self.speed.min(gap - FOLLOWING_GAP).max(0.0);
            }
        }

        if light.requires_stop() && signal_distance < safe_distance * 2.0 {
            let braking_distance = self.speed.powi(2) / (2.0 * self.params.deceleration);
            if signal_distance < braking_distance {
                self.speed = (self.speed - self.params.deceleration).max(0.0);
            }
        }

        // always draw so the random stream does not depend on the speed
        let roll: f64 = rng.random();
        if roll < self.params.noise_probability && self.speed > 0.0 {
            self.speed = (self.speed - NOISE_SLOWDOWN).max(0.0);
        }
    }

    /// Moves the vehicle by its current speed. A vehicle that is not on the
    /// road stays put, but still accumulates waiting time when stopped.
    pub fn move_forward(&mut self, tick: u64) {
        if let Some(position) = self.position {
            if self.path_capacity > 0 {
                if self.path.len() == self.path_capacity {
                    self.path.pop_front();
                }
                self.path.push_back(PathSample {
                    x: position.x,
                    y: position.y,
                    tick,
                });
            }
            self.position = Some(position + self.direction.unit() * self.speed);
        }

        if self.speed == 0.0 {
            self.wait_ticks += 1;
        }
    }

    /// Records the removal. Returns false if the vehicle was already removed.
    pub fn mark_removed(&mut self, cause: RemovalCause, tick: u64) -> bool {
        if self.removal.is_some() {
            return false;
        }
        self.removal = Some(cause);
        self.exit_tick = Some(tick);
        self.exited_at = Some(SystemTime::now());
        true
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn params(&self) -> &VehicleParams {
        &self.params
    }

    pub fn turn_intent(&self) -> TurnIntent {
        self.turn_intent
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn position(&self) -> Option<Point2d> {
        self.position
    }

    pub fn wait_ticks(&self) -> u64 {
        self.wait_ticks
    }

    pub fn entry_tick(&self) -> u64 {
        self.entry_tick
    }

    pub fn exit_tick(&self) -> Option<u64> {
        self.exit_tick
    }

    pub fn entered_at(&self) -> SystemTime {
        self.entered_at
    }

    pub fn exited_at(&self) -> Option<SystemTime> {
        self.exited_at
    }

    pub fn removal(&self) -> Option<RemovalCause> {
        self.removal
    }

    pub fn path(&self) -> impl Iterator<Item = &PathSample> {
        self.path.iter()
    }

    /// Ticks between entry and removal.
    pub fn travel_ticks(&self) -> Option<u64> {
        self.exit_tick.map(|exit| exit.saturating_sub(self.entry_tick))
    }

    /// Wall-clock time between entry and removal, for reporting only.
    pub fn travel_duration(&self) -> Option<Duration> {
        self.exited_at
            .map(|exit| exit.duration_since(self.entered_at).unwrap_or_default())
    }
}
