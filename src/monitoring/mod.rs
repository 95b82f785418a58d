pub mod animation;
pub mod traffic_monitoring_system;
