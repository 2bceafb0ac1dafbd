//! Path segmentation: how far along the cached path one primitive goes.
use crate::constants::{
    MIN_SAFE_CHECK_RADIUS, TELEPORT_STEP, TOWN_STEP, WALK_STEP_SAFE, WALK_STEP_THREATENED,
};
use crate::geometry::{Path, Position};
use crate::ports::PathService;
use crate::world::Snapshot;

/// Inputs for one segmentation decision.
#[derive(Debug, Clone, Copy)]
pub struct StepPolicy {
    pub clear_path_radius: i32,
    /// Previous tick ended without displacement.
    pub stuck: bool,
}

impl StepPolicy {
    /// Radius checked for threats when choosing a walking step.
    #[must_use]
    pub fn safe_radius(&self) -> i32 {
        (self.clear_path_radius * 2).max(MIN_SAFE_CHECK_RADIUS)
    }

    /// Maximum waypoints consumed this tick.
    #[must_use]
    pub fn max_step(&self, snapshot: &Snapshot, path: &Path, paths: &dyn PathService) -> usize {
        if snapshot.in_town() {
            return TOWN_STEP;
        }
        if snapshot.actor.can_teleport {
            return TELEPORT_STEP.min(paths.last_path_index_on_screen(path));
        }
        let threatened = snapshot.enemies_within(self.safe_radius()).next().is_some();
        if threatened || self.stuck {
            WALK_STEP_THREATENED
        } else {
            WALK_STEP_SAFE
        }
    }
}

/// The waypoint the next primitive targets and how many waypoints it consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub to: Position,
    pub consumed: usize,
}

/// Clamp `max_step` to the path and snap to `target` when the chosen
/// waypoint is already within `finish_distance` of it.
#[must_use]
pub fn next_step(path: &Path, target: Position, max_step: usize, finish_distance: i32) -> Step {
    let consumed = max_step.min(path.last_index());
    if consumed == 0 {
        return Step {
            to: target,
            consumed,
        };
    }
    let waypoint = path.world_at(consumed);
    let to = if waypoint.distance_to(target) <= finish_distance {
        target
    } else {
        waypoint
    };
    Step { to, consumed }
}
