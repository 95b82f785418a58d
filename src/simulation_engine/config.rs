use crate::simulation_engine::intersections::IntersectionGeometry;
use crate::simulation_engine::vehicles::VehicleParams;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Timing of one traffic light.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    /// Full cycle length in ticks.
    pub cycle_length: u32,
    /// Share of the cycle spent green.
    pub green_ratio: f64,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            cycle_length: 60,
            green_ratio: 0.5,
        }
    }
}

/// Everything needed to build a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Span of each road, and of the simulated square.
    pub road_length: f64,
    /// Width of each road.
    pub lane_width: f64,
    /// Chance per tick that one vehicle is spawned (not per direction).
    pub spawn_rate: f64,
    pub north_south_light: LightConfig,
    pub east_west_light: LightConfig,
    pub vehicle: VehicleParams,
    /// Number of trajectory samples kept per vehicle; 0 disables the log.
    pub path_capacity: usize,
    /// Seed for a reproducible run.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            road_length: 200.0,
            lane_width: 15.0,
            spawn_rate: 0.5,
            north_south_light: LightConfig::default(),
            east_west_light: LightConfig::default(),
            vehicle: VehicleParams::default(),
            path_capacity: 0,
            seed: None,
        }
    }
}

/// A configuration value that cannot produce a meaningful run.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    NonPositive { field: &'static str, value: f64 },
    NotAProbability { field: &'static str, value: f64 },
    LaneWiderThanRoad { lane_width: f64, road_length: f64 },
    /// The lane is too narrow to leave room for a spawn position.
    EmptyLane { lane_width: f64, road_length: f64 },
    ZeroCycle { light: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NonPositive { field, value } => {
                write!(f, "{} must be a positive number, got {}", field, value)
            }
            ConfigError::NotAProbability { field, value } => {
                write!(f, "{} must lie in [0, 1], got {}", field, value)
            }
            ConfigError::LaneWiderThanRoad {
                lane_width,
                road_length,
            } => write!(
                f,
                "lane_width {} does not fit on a road of length {}",
                lane_width, road_length
            ),
            ConfigError::EmptyLane {
                lane_width,
                road_length,
            } => write!(
                f,
                "lane_width {} is too narrow to place vehicles on a road of length {}",
                lane_width, road_length
            ),
            ConfigError::ZeroCycle { light } => {
                write!(f, "{} light has a zero-length cycle", light)
            }
        }
    }
}

impl Error for ConfigError {}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

fn probability(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::NotAProbability { field, value })
    }
}

impl LightConfig {
    fn validate(&self, light: &'static str) -> Result<(), ConfigError> {
        if self.cycle_length == 0 {
            return Err(ConfigError::ZeroCycle { light });
        }
        // green + yellow may exceed the cycle; that timing is kept as given
        probability("green_ratio", self.green_ratio)
    }
}

impl SimulationConfig {
    /// Loads a JSON configuration. Missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        let file = File::open(path.as_ref())?;
        let config: SimulationConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the model has no sensible interpretation for.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("road_length", self.road_length)?;
        positive("lane_width", self.lane_width)?;
        if self.lane_width > self.road_length {
            return Err(ConfigError::LaneWiderThanRoad {
                lane_width: self.lane_width,
                road_length: self.road_length,
            });
        }
        let (low, high) = IntersectionGeometry::new(self.road_length, self.lane_width).lane_band();
        if low >= high {
            return Err(ConfigError::EmptyLane {
                lane_width: self.lane_width,
                road_length: self.road_length,
            });
        }
        probability("spawn_rate", self.spawn_rate)?;
        self.north_south_light.validate("north-south")?;
        self.east_west_light.validate("east-west")?;
        positive("max_speed", self.vehicle.max_speed)?;
        positive("acceleration", self.vehicle.acceleration)?;
        positive("deceleration", self.vehicle.deceleration)?;
        probability("noise_probability", self.vehicle.noise_probability)
    }
}
