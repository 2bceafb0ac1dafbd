//! Wayfarer Navigation Engine
//!
//! Perception-driven movement control for game-automation actors: a
//! cooperative per-actor navigation loop with hazard detours, area
//! transitions, teleport-pad traversal and failure recovery. The engine
//! talks to the game only through the service traits in [`ports`].

pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod geometry;
pub mod interaction;
pub mod navigation;
pub mod options;
pub mod ports;
pub mod target;
pub mod world;

#[cfg(test)]
mod testkit;

// Re-export commonly used types
pub use config::{ChestMode, NavConfig, Timings};
pub use context::{ActorContext, NavStats};
pub use error::{ConfigError, MoveFailure, NavError, NavErrorKind, ServiceError};
pub use geometry::{Path, Position};
pub use interaction::{interact_object, open_door};
pub use navigation::hazard::{Detour, DetourKind};
pub use navigation::{
    NavigationState, TransitionRule, TransitionStrategy, TransitionTable, ensure_area_sync,
    move_to, move_to_area, move_to_coords,
};
pub use options::{MonsterFilter, MoveOptions};
pub use ports::{
    CombatService, LootService, MovementInput, PathService, Perception, PriorityGate, Turn, World,
};
pub use target::{FixedTarget, TargetProvider};
pub use world::{
    ActorState, AdjacentArea, AreaData, AreaId, BuffState, Interactable, Monster, ObjectId,
    ObjectKind, ShrineKind, Snapshot, WalkGrid,
};
