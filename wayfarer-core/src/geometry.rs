//! Positions, distances and path segments in area-local coordinates.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer tile coordinate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Truncated Euclidean distance, the metric used for every arrival check.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn distance_to(self, other: Self) -> i32 {
        let dx = f64::from(other.x - self.x);
        let dy = f64::from(other.y - self.y);
        dx.hypot(dy) as i32
    }

    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

impl From<(i32, i32)> for Position {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// Waypoint sequence for a single target, as produced by the path service.
///
/// Waypoints are local to the grid the path was searched on; `offset` maps
/// them back into the area coordinates the actor moves in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    waypoints: Vec<Position>,
    offset: Position,
    approx_distance: i32,
}

impl Path {
    /// Build a path. Returns `None` for an empty waypoint list.
    #[must_use]
    pub fn new(waypoints: Vec<Position>, offset: Position, approx_distance: i32) -> Option<Self> {
        if waypoints.is_empty() {
            return None;
        }
        Some(Self {
            waypoints,
            offset,
            approx_distance,
        })
    }

    /// Convenience for paths already expressed in area coordinates.
    #[must_use]
    pub fn local(waypoints: Vec<Position>) -> Option<Self> {
        let approx = waypoints
            .windows(2)
            .map(|w| w[0].distance_to(w[1]).max(1))
            .sum();
        Self::new(waypoints, Position::default(), approx)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// Paths are never empty; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    #[must_use]
    pub const fn offset(&self) -> Position {
        self.offset
    }

    #[must_use]
    pub const fn approx_distance(&self) -> i32 {
        self.approx_distance
    }

    #[must_use]
    pub fn waypoints(&self) -> &[Position] {
        &self.waypoints
    }

    /// First waypoint in area coordinates.
    #[must_use]
    pub fn from(&self) -> Position {
        self.world_at(0)
    }

    /// Waypoint `index` (clamped to the last one) in area coordinates.
    #[must_use]
    pub fn world_at(&self, index: usize) -> Position {
        let idx = index.min(self.waypoints.len() - 1);
        let local = self.waypoints[idx];
        local.offset(self.offset.x, self.offset.y)
    }

    /// Index of the last waypoint.
    #[must_use]
    pub fn last_index(&self) -> usize {
        self.waypoints.len() - 1
    }

    /// Drop the consumed prefix so that waypoint `step` becomes the new head.
    pub fn advance(&mut self, step: usize) {
        let step = step.min(self.last_index());
        if step > 0 {
            self.waypoints.drain(..step);
        }
    }
}
