pub mod traffic_analyzer;

pub use traffic_analyzer::{RunSummary, RunningMean};
