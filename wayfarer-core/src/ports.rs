//! Collaborator ports consumed by the navigation loop.
//!
//! Each actor owns one [`World`] handle: anything that implements every port
//! below is a `World` through the blanket impl at the bottom of this file.

use async_trait::async_trait;

use crate::error::{MoveFailure, ServiceError};
use crate::geometry::{Path, Position};
use crate::options::{MonsterFilter, MoveOptions};
use crate::world::{AreaId, Interactable, ObjectId, Snapshot};

/// Outcome of a priority checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    Granted,
    Interrupted,
}

/// Shortest-path search over the current area. Black box to the core.
pub trait PathService: Send + Sync {
    /// Path from `from` to `to`, or `None` when unreachable.
    fn get_path(&self, from: Position, to: Position) -> Option<Path>;

    fn distance(&self, from: Position, to: Position) -> i32 {
        from.distance_to(to)
    }

    /// Closed door lying on the segment between two positions, if any.
    fn has_door_between(
        &self,
        from: Position,
        to: Position,
        objects: &[Interactable],
    ) -> Option<Interactable>;

    /// Path to the walkable tile closest to `to` when `to` itself is blocked.
    fn closest_walkable_path(&self, from: Position, to: Position) -> Option<Path>;

    fn line_of_sight(&self, from: Position, to: Position) -> bool;

    /// Highest waypoint index of `path` that is still on screen.
    fn last_path_index_on_screen(&self, path: &Path) -> usize;
}

/// Perception refresh.
#[async_trait]
pub trait Perception: Send {
    async fn refresh(&mut self) -> Snapshot;
}

/// Low-level input primitives.
#[async_trait]
pub trait MovementInput: Send {
    /// Move the actor one step toward `to`.
    async fn move_step(&mut self, to: Position, options: &MoveOptions) -> Result<(), MoveFailure>;

    /// Short random displacement used to shake loose a stuck actor.
    async fn random_movement(&mut self);

    async fn click_at(&mut self, position: Position);

    async fn interact(&mut self, id: ObjectId) -> Result<(), ServiceError>;

    async fn interact_entrance(&mut self, area: AreaId) -> Result<(), ServiceError>;

    async fn use_town_portal(&mut self) -> Result<(), ServiceError>;
}

/// Combat resolution.
#[async_trait]
pub trait CombatService: Send {
    async fn clear_area_around(
        &mut self,
        center: Position,
        radius: i32,
        filters: &[MonsterFilter],
    ) -> Result<(), ServiceError>;
}

/// Item pickup policy.
#[async_trait]
pub trait LootService: Send {
    async fn pick_up_items(&mut self, radius: i32) -> Result<(), ServiceError>;
}

/// External scheduler that can pause or cancel the actor.
#[async_trait]
pub trait PriorityGate: Send {
    /// Blocks until the actor holds priority.
    async fn checkpoint(&mut self) -> Turn;
}

/// Every port an actor needs, bundled.
pub trait World:
    Perception + MovementInput + CombatService + LootService + PriorityGate + PathService
{
}

impl<T> World for T where
    T: Perception + MovementInput + CombatService + LootService + PriorityGate + PathService
{
}
