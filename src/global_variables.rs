// Traffic light timing
pub const YELLOW_DURATION: i64 = 3;

// Vehicle behaviour
pub const MIN_SAFE_DISTANCE: f64 = 2.0;
pub const SAFE_DISTANCE_FACTOR: f64 = 1.5;
pub const FOLLOWING_GAP: f64 = 1.0;
pub const NOISE_SLOWDOWN: f64 = 1.0;

// Turn intent probabilities (straight, then left; the rest turn right)
pub const TURN_STRAIGHT_PROBABILITY: f64 = 0.60;
pub const TURN_LEFT_PROBABILITY: f64 = 0.25;

// Intersection bookkeeping
pub const COLLISION_DISTANCE: f64 = 2.0;
pub const QUEUE_DETECTION_DISTANCE: f64 = 30.0;
pub const INTERSECTION_SIZE_FACTOR: f64 = 1.5;

// Analytics
pub const TRAVEL_TIME_BINS: usize = 20;

// Output file prefixes
pub const QUEUE_LENGTH_CHART: &str = "queue_length_ts";
pub const AVG_QUEUE_CHART: &str = "avg_queue_length";
pub const THROUGHPUT_CHART: &str = "throughput_distribution";
pub const TRAVEL_TIME_CHART: &str = "travel_time_distribution";
pub const COMPOSITE_CHART: &str = "traffic_metrics_composite";
pub const ANIMATION_FILE: &str = "intersection_animation";
pub const REMOVED_VEHICLES_CSV: &str = "removed_vehicles";
pub const QUEUE_LENGTHS_CSV: &str = "queue_lengths";
pub const RUN_SUMMARY_JSON: &str = "run_summary";
