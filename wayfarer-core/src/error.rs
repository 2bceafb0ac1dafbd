//! Error types surfaced by the navigation loop and its collaborators.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::Position;
use crate::world::AreaId;

/// Failure reported by the single-step movement primitive.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MoveFailure {
    #[error("monsters are blocking the path")]
    MonstersInPath,
    #[error("player is stuck")]
    Stuck,
    #[error("player round trip detected")]
    RoundTrip,
    #[error("no path to the step target")]
    NoPath,
    #[error("{0}")]
    Other(String),
}

/// Failure reported by a collaborator service (interaction, portal, combat).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("interaction rejected: {0}")]
    Rejected(String),
    #[error("target not found")]
    NotFound,
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

/// Coarse classification of [`NavError`], used for stats and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavErrorKind {
    Fatal,
    Interrupted,
    PathNotFound,
    TeleportPadDeadEnd,
    Transition,
    Movement,
}

/// Errors returned by every exposed navigation operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NavError {
    #[error("actor died")]
    Died,
    #[error("health {hp}% at or below chicken threshold {threshold}%")]
    Chicken { hp: u8, threshold: u8 },
    #[error("navigation interrupted by a higher priority task")]
    Interrupted,
    #[error("path could not be calculated from {from} to {to}")]
    PathNotFound { from: Position, to: Position },
    #[error("no reachable unvisited teleport pad")]
    TeleportPadDeadEnd,
    #[error("area {expected} not synchronised after {attempts} polls (current {current})")]
    AreaSyncTimeout {
        expected: AreaId,
        current: AreaId,
        attempts: u32,
    },
    #[error("destination {to} is not adjacent to {from}")]
    DestinationNotAdjacent { from: AreaId, to: AreaId },
    #[error("failed to enter {area} after {attempts} attempts")]
    EntranceFailed { area: AreaId, attempts: u32 },
    #[error("interaction with object {id} failed after {attempts} attempts")]
    InteractionFailed { id: u32, attempts: u32 },
    #[error("area transition to {area} exceeded recursion depth {depth}")]
    TransitionDepth { area: AreaId, depth: u32 },
    #[error("town portal failed: {0}")]
    TownPortal(ServiceError),
    #[error("movement failed: {0}")]
    Movement(MoveFailure),
}

impl NavError {
    #[must_use]
    pub const fn kind(&self) -> NavErrorKind {
        match self {
            Self::Died | Self::Chicken { .. } => NavErrorKind::Fatal,
            Self::Interrupted => NavErrorKind::Interrupted,
            Self::PathNotFound { .. } => NavErrorKind::PathNotFound,
            Self::TeleportPadDeadEnd => NavErrorKind::TeleportPadDeadEnd,
            Self::AreaSyncTimeout { .. }
            | Self::DestinationNotAdjacent { .. }
            | Self::EntranceFailed { .. }
            | Self::InteractionFailed { .. }
            | Self::TransitionDepth { .. }
            | Self::TownPortal(_) => NavErrorKind::Transition,
            Self::Movement(_) => NavErrorKind::Movement,
        }
    }

    /// Fatal and interrupt errors end every enclosing operation untouched.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self.kind(),
            NavErrorKind::Fatal | NavErrorKind::Interrupted
        )
    }
}

/// Errors raised when navigation configuration invariants are violated.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be at least {min} (got {value})")]
    MinViolation {
        field: &'static str,
        min: i64,
        value: i64,
    },
    #[error("{field} must be between {min} and {max} (got {value})")]
    RangeViolation {
        field: &'static str,
        min: i64,
        max: i64,
        value: i64,
    },
    #[error("area {0} is listed as both a pad maze and a no-shrine area")]
    ConflictingArea(u32),
    #[error("JSON parsing error: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_group_transition_failures() {
        let err = NavError::EntranceFailed {
            area: AreaId(3),
            attempts: 3,
        };
        assert_eq!(err.kind(), NavErrorKind::Transition);
        assert!(!err.is_terminal());
        assert!(NavError::Died.is_terminal());
        assert!(NavError::Interrupted.is_terminal());
        assert_eq!(
            NavError::Movement(MoveFailure::Other("x".into())).kind(),
            NavErrorKind::Movement
        );
    }

    #[test]
    fn messages_name_the_positions() {
        let err = NavError::PathNotFound {
            from: Position::new(1, 2),
            to: Position::new(3, 4),
        };
        assert_eq!(err.to_string(), "path could not be calculated from 1,2 to 3,4");
    }
}
