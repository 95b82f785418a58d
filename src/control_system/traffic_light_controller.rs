use crate::global_variables::YELLOW_DURATION;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The possible states of a traffic light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightState {
    Green,
    Yellow,
    Red,
}

impl LightState {
    /// Whether approaching vehicles are expected to stop.
    pub fn requires_stop(self) -> bool {
        matches!(self, LightState::Yellow | LightState::Red)
    }
}

impl fmt::Display for LightState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LightState::Green => "green",
            LightState::Yellow => "yellow",
            LightState::Red => "red",
        };
        f.write_str(name)
    }
}

/// A fixed-cycle traffic light for one axis of the intersection.
///
/// Durations are counted in ticks. The red duration is whatever is left of the
/// cycle after green and yellow, so it can be zero or negative when the light
/// is misconfigured; the phase checks are applied as-is in that case.
#[derive(Debug, Clone, PartialEq)]
pub struct TrafficLight {
    cycle_length: i64,
    green_duration: i64,
    yellow_duration: i64,
    red_duration: i64,
    state: LightState,
    elapsed: i64,
}

/// Read-only view of a light for renderers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LightSnapshot {
    pub state: LightState,
    pub remaining_time: i64,
}

impl TrafficLight {
    /// Creates a light that starts at the beginning of its green phase.
    pub fn new(cycle_length: u32, green_ratio: f64) -> Self {
        let cycle_length = i64::from(cycle_length);
        let green_duration = (cycle_length as f64 * green_ratio) as i64;
        let yellow_duration = YELLOW_DURATION;
        Self {
            cycle_length,
            green_duration,
            yellow_duration,
            red_duration: cycle_length - green_duration - yellow_duration,
            state: LightState::Green,
            elapsed: 0,
        }
    }

    /// Same light, but starting at the beginning of `state` instead.
    pub fn starting_in(mut self, state: LightState) -> Self {
        self.state = state;
        self.elapsed = 0;
        self
    }

    // Advances the light by one tick. At most one transition fires per call.
    pub fn update(&mut self) {
        self.elapsed += 1;
        let next = match self.state {
            LightState::Green if self.elapsed >= self.green_duration => Some(LightState::Yellow),
            LightState::Yellow if self.elapsed >= self.yellow_duration => Some(LightState::Red),
            LightState::Red if self.elapsed >= self.red_duration => Some(LightState::Green),
            _ => None,
        };
        if let Some(next) = next {
            self.state = next;
            self.elapsed = 0;
        }
    }

    pub fn state(&self) -> LightState {
        self.state
    }

    pub fn elapsed(&self) -> i64 {
        self.elapsed
    }

    /// Ticks left in the current phase.
    pub fn remaining_time(&self) -> i64 {
        self.phase_duration(self.state) - self.elapsed
    }

    pub fn phase_duration(&self, state: LightState) -> i64 {
        match state {
            LightState::Green => self.green_duration,
            LightState::Yellow => self.yellow_duration,
            LightState::Red => self.red_duration,
        }
    }

    pub fn cycle_length(&self) -> i64 {
        self.cycle_length
    }

    pub fn snapshot(&self) -> LightSnapshot {
        LightSnapshot {
            state: self.state,
            remaining_time: self.remaining_time(),
        }
    }
}
