//! Target providers evaluated once per controller tick.
use crate::geometry::Position;
use crate::ports::PathService;
use crate::world::Snapshot;

/// Source of the destination for a `move_to` call.
///
/// Returning `None` ends the call successfully; the position may change
/// between ticks.
pub trait TargetProvider: Send {
    fn next_target(&mut self, snapshot: &Snapshot, paths: &dyn PathService) -> Option<Position>;
}

/// A destination that never moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedTarget(pub Position);

impl TargetProvider for FixedTarget {
    fn next_target(&mut self, _snapshot: &Snapshot, _paths: &dyn PathService) -> Option<Position> {
        Some(self.0)
    }
}

impl<F> TargetProvider for F
where
    F: FnMut(&Snapshot, &dyn PathService) -> Option<Position> + Send,
{
    fn next_target(&mut self, snapshot: &Snapshot, paths: &dyn PathService) -> Option<Position> {
        self(snapshot, paths)
    }
}
