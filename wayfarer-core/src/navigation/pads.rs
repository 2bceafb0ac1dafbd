//! Teleport-pad maze traversal.
//!
//! Inside pad mazes the path service dead-ends between islands, so the
//! controller hops pads: always toward the closest reachable pad not visited
//! yet, blacklisting both the pad taken and the pad it lands on.
use log::debug;
use smallvec::SmallVec;

use crate::constants::LOG_TARGET;
use crate::error::NavError;
use crate::geometry::Position;
use crate::ports::PathService;
use crate::world::{Interactable, Snapshot};

use super::hazard::{Detour, DetourKind};

/// Visited-pad memory for one `move_to` call. Pads are keyed by position.
#[derive(Debug, Clone, Default)]
pub struct PadWalker {
    visited: SmallVec<[Position; 16]>,
}

impl PadWalker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_visited(&self, position: Position) -> bool {
        self.visited.contains(&position)
    }

    #[must_use]
    pub fn visited(&self) -> &[Position] {
        &self.visited
    }

    fn candidates<'a>(&'a self, snapshot: &'a Snapshot) -> impl Iterator<Item = &'a Interactable> {
        snapshot
            .objects
            .iter()
            .filter(move |o| o.is_teleport_pad() && !self.is_visited(o.position))
    }

    /// Closest pad by path length; it is blacklisted before being handed out.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::TeleportPadDeadEnd`] when no unvisited pad is reachable.
    pub fn next_pad(
        &mut self,
        snapshot: &Snapshot,
        paths: &dyn PathService,
    ) -> Result<Detour, NavError> {
        let me = snapshot.actor.position;
        let best = self
            .candidates(snapshot)
            .filter_map(|pad| {
                paths
                    .get_path(me, pad.position)
                    .map(|path| (*pad, path.approx_distance()))
            })
            .min_by_key(|(_, distance)| *distance);

        let Some((pad, distance)) = best else {
            debug!(
                target: LOG_TARGET,
                "pad maze dead end after {} pads",
                self.visited.len()
            );
            return Err(NavError::TeleportPadDeadEnd);
        };
        debug!(target: LOG_TARGET, "next pad at {} ({distance} away)", pad.position);
        self.visited.push(pad.position);
        Ok(Detour {
            object: pad,
            kind: DetourKind::TeleportPad,
        })
    }

    /// After a hop, blacklist the pad the actor landed on.
    pub fn mark_exit(&mut self, snapshot: &Snapshot) -> Option<Position> {
        let me = snapshot.actor.position;
        let exit = self
            .candidates(snapshot)
            .min_by_key(|pad| me.distance_to(pad.position))
            .map(|pad| pad.position)?;
        self.visited.push(exit);
        Some(exit)
    }
}
