use crate::global_variables::INTERSECTION_SIZE_FACTOR;
use cgmath::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 2D point in road coordinates (x grows east, y grows north).
pub type Point2d = Point2<f64>;

/// A 2D vector in road coordinates.
pub type Vector2d = Vector2<f64>;

/// Direction of travel of a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    South,
    East,
    West,
}

/// A pair of opposing directions controlled by the same traffic light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    NorthSouth,
    EastWest,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    pub fn axis(self) -> Axis {
        match self {
            Direction::North | Direction::South => Axis::NorthSouth,
            Direction::East | Direction::West => Axis::EastWest,
        }
    }

    /// Unit displacement for one unit of speed.
    pub fn unit(self) -> Vector2d {
        match self {
            Direction::North => Vector2d::new(0.0, 1.0),
            Direction::South => Vector2d::new(0.0, -1.0),
            Direction::East => Vector2d::new(1.0, 0.0),
            Direction::West => Vector2d::new(-1.0, 0.0),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::NorthSouth => f.write_str("north-south"),
            Axis::EastWest => f.write_str("east-west"),
        }
    }
}

/// Layout of the crossing: two perpendicular roads of `road_length` meeting in
/// the middle, each `lane_width` wide.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectionGeometry {
    pub road_length: f64,
    pub lane_width: f64,
}

impl IntersectionGeometry {
    pub fn new(road_length: f64, lane_width: f64) -> Self {
        Self {
            road_length,
            lane_width,
        }
    }

    /// Coordinate of the centre on both axes.
    pub fn center(&self) -> f64 {
        self.road_length / 2.0
    }

    /// Side length of the square central zone.
    pub fn box_size(&self) -> f64 {
        self.lane_width * INTERSECTION_SIZE_FACTOR
    }

    /// Lateral band covered by a road, shared by both directions on it.
    pub fn lane_band(&self) -> (f64, f64) {
        let half = self.lane_width / 2.0;
        (self.center() - half, self.center() + half)
    }

    /// Signed distance left to travel before reaching the stop line.
    /// Negative once the vehicle has passed it.
    pub fn stop_line_distance(&self, direction: Direction, position: Point2d) -> f64 {
        let near = self.center() - self.box_size() / 2.0;
        let far = self.center() + self.box_size() / 2.0;
        match direction {
            Direction::North => near - position.y,
            Direction::South => position.y - far,
            Direction::East => near - position.x,
            Direction::West => position.x - far,
        }
    }

    /// Entry point on the edge opposite to the direction of travel.
    /// `lateral` is the coordinate across the road.
    pub fn spawn_point(&self, direction: Direction, lateral: f64) -> Point2d {
        match direction {
            Direction::North => Point2d::new(lateral, 0.0),
            Direction::South => Point2d::new(lateral, self.road_length),
            Direction::East => Point2d::new(0.0, lateral),
            Direction::West => Point2d::new(self.road_length, lateral),
        }
    }

    /// Whether a vehicle has left the road in its direction of travel.
    pub fn has_exited(&self, direction: Direction, position: Point2d) -> bool {
        match direction {
            Direction::North => position.y > self.road_length,
            Direction::South => position.y < 0.0,
            Direction::East => position.x > self.road_length,
            Direction::West => position.x < 0.0,
        }
    }
}

/// How far `other` is ahead of `own` along the axis of `direction`.
/// Negative when `other` is behind.
pub fn gap_ahead(direction: Direction, own: Point2d, other: Point2d) -> f64 {
    match direction {
        Direction::North => other.y - own.y,
        Direction::South => own.y - other.y,
        Direction::East => other.x - own.x,
        Direction::West => own.x - other.x,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn stop_line_distance_shrinks_on_approach() {
        let geometry = IntersectionGeometry::new(200.0, 15.0);
        for direction in Direction::ALL {
            let start = geometry.spawn_point(direction, geometry.center());
            let closer = start + direction.unit() * 10.0;
            let d0 = geometry.stop_line_distance(direction, start);
            let d1 = geometry.stop_line_distance(direction, closer);
            assert_approx_eq!(d0 - d1, 10.0);
            assert_approx_eq!(d0, 100.0 - 11.25);
        }
    }

    #[test]
    fn spawn_points_are_on_opposite_edge() {
        let geometry = IntersectionGeometry::new(200.0, 15.0);
        assert_eq!(geometry.spawn_point(Direction::North, 100.0), Point2d::new(100.0, 0.0));
        assert_eq!(geometry.spawn_point(Direction::South, 100.0), Point2d::new(100.0, 200.0));
        assert_eq!(geometry.spawn_point(Direction::East, 95.0), Point2d::new(0.0, 95.0));
        assert_eq!(geometry.spawn_point(Direction::West, 95.0), Point2d::new(200.0, 95.0));
    }

    #[test]
    fn exit_is_strictly_past_the_boundary() {
        let geometry = IntersectionGeometry::new(200.0, 15.0);
        assert!(!geometry.has_exited(Direction::North, Point2d::new(100.0, 200.0)));
        assert!(geometry.has_exited(Direction::North, Point2d::new(100.0, 200.5)));
        assert!(geometry.has_exited(Direction::West, Point2d::new(-0.1, 100.0)));
        assert!(!geometry.has_exited(Direction::East, Point2d::new(-5.0, 100.0)));
    }

    #[test]
    fn gap_ahead_follows_travel_direction() {
        let a = Point2d::new(100.0, 10.0);
        let b = Point2d::new(100.0, 25.0);
        assert_approx_eq!(gap_ahead(Direction::North, a, b), 15.0);
        assert_approx_eq!(gap_ahead(Direction::South, a, b), -15.0);
    }
}
