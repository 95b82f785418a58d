// simulation_engine/mod.rs
pub mod config;
pub mod intersections;
pub mod simulation;
pub mod vehicles;
