// traffic_analyzer.rs

use crate::shared_data::Metrics;
use crate::simulation_engine::intersections::Direction;
use crate::simulation_engine::vehicles::{RemovalCause, Vehicle};
use serde::{Deserialize, Serialize};

/// Running average updated one sample at a time, without keeping the samples.
///
/// Each push computes `(mean * (n - 1) + value) / n`, so the result depends on
/// the order of the samples only through floating point rounding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningMean {
    mean: f64,
    count: u64,
}

impl RunningMean {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let n = self.count as f64;
        self.mean = (self.mean * (n - 1.0) + value) / n;
    }

    /// 0 until the first sample arrives.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

/// Equal-width histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// `counts.len() + 1` bin edges, ascending.
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn max_count(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    pub fn bins(&self) -> impl Iterator<Item = (f64, f64, usize)> + '_ {
        self.edges
            .windows(2)
            .zip(self.counts.iter())
            .map(|(edge, &count)| (edge[0], edge[1], count))
    }
}

/// Bins `values` into `bins` equal-width buckets spanning their range. The
/// last bucket is closed on the right. A single distinct value gets a range
/// of one unit centred on it.
pub fn histogram(values: &[f64], bins: usize) -> Option<Histogram> {
    if values.is_empty() || bins == 0 {
        return None;
    }
    let mut lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let mut hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / bins as f64;
    let edges: Vec<f64> = (0..=bins).map(|i| lo + width * i as f64).collect();
    let mut counts = vec![0; bins];
    for &value in values {
        let index = (((value - lo) / width) as usize).min(bins - 1);
        counts[index] += 1;
    }
    Some(Histogram { edges, counts })
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Mean queue length of every direction, 0 for an empty series.
pub fn average_queue_lengths(metrics: &Metrics) -> Vec<(Direction, f64)> {
    Direction::ALL
        .iter()
        .map(|&direction| {
            let samples: Vec<f64> = metrics
                .queue_lengths(direction)
                .iter()
                .map(|&q| q as f64)
                .collect();
            (direction, mean(&samples).unwrap_or(0.0))
        })
        .collect()
}

/// Number of vehicles that drove out of the simulation, per direction.
/// Collided vehicles are not counted.
pub fn throughput_by_direction(removed: &[Vehicle]) -> Vec<(Direction, usize)> {
    Direction::ALL
        .iter()
        .map(|&direction| {
            let count = removed
                .iter()
                .filter(|v| v.direction() == direction && v.removal() == Some(RemovalCause::Exited))
                .count();
            (direction, count)
        })
        .collect()
}

/// Travel times in ticks of every vehicle that exited.
pub fn travel_times(removed: &[Vehicle]) -> Vec<f64> {
    removed
        .iter()
        .filter(|v| v.removal() == Some(RemovalCause::Exited))
        .filter_map(|v| v.travel_ticks())
        .map(|ticks| ticks as f64)
        .collect()
}

/// End-of-run figures, as printed by the driver and exported to JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub ticks: u64,
    pub total_spawned: u64,
    pub throughput: u64,
    pub collisions: u64,
    pub still_active: usize,
    /// In ticks.
    pub avg_wait_time: f64,
    /// In ticks.
    pub avg_travel_time: f64,
    pub avg_queue_lengths: Vec<(Direction, f64)>,
    pub throughput_by_direction: Vec<(Direction, usize)>,
}

impl RunSummary {
    pub fn collect(ticks: u64, metrics: &Metrics, removed: &[Vehicle], still_active: usize) -> Self {
        Self {
            ticks,
            total_spawned: metrics.total_spawned,
            throughput: metrics.throughput,
            collisions: metrics.collisions,
            still_active,
            avg_wait_time: metrics.avg_wait_time(),
            avg_travel_time: metrics.avg_travel_time(),
            avg_queue_lengths: average_queue_lengths(metrics),
            throughput_by_direction: throughput_by_direction(removed),
        }
    }
}
