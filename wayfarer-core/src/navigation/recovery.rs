//! Classification of movement failures and per-tick progress.
use crate::constants::MAX_PATH_ERROR_NUDGES;
use crate::error::MoveFailure;
use crate::geometry::Position;

/// What the controller does after a movement primitive fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Retry next tick with a recomputed path.
    Continue,
    /// Force a threat-clear pass, then retry. Costs no path error.
    ClearAndContinue,
    /// One random-movement nudge, then retry.
    NudgeAndContinue,
    /// Unrecoverable here; hand the failure to the caller.
    Propagate,
}

/// Facts about the actor that shape recovery.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoveryInput {
    pub can_teleport: bool,
    pub in_town: bool,
    /// The previous tick already ended stuck.
    pub stuck: bool,
    /// Waypoints consumed by the failed step.
    pub path_step: usize,
}

#[must_use]
pub fn classify(failure: &MoveFailure, input: RecoveryInput) -> Recovery {
    match failure {
        MoveFailure::MonstersInPath => Recovery::ClearAndContinue,
        MoveFailure::Stuck | MoveFailure::RoundTrip => {
            // Teleporters usually free themselves on the next hop.
            if !input.can_teleport || input.stuck || input.in_town {
                Recovery::NudgeAndContinue
            } else {
                Recovery::Continue
            }
        }
        MoveFailure::NoPath if input.path_step > 0 => Recovery::NudgeAndContinue,
        MoveFailure::NoPath | MoveFailure::Other(_) => Recovery::Propagate,
    }
}

/// Outcome of one path-search failure against the nudge budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathErrorVerdict {
    Nudge,
    GiveUp,
}

/// `errors` counts consecutive failed searches including this one.
#[must_use]
pub const fn path_error_verdict(errors: u32) -> PathErrorVerdict {
    if errors <= MAX_PATH_ERROR_NUDGES {
        PathErrorVerdict::Nudge
    } else {
        PathErrorVerdict::GiveUp
    }
}

/// Arrival test. The widened threshold is a flat doubling; repeated stalls
/// never widen it further.
#[must_use]
pub const fn arrived(distance: i32, threshold: i32, widen: bool) -> bool {
    distance <= threshold || (widen && distance <= threshold.saturating_mul(2))
}

/// Displacement observed after a successful movement primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Moved,
    Stalled,
    /// Back where the actor stood two moves ago.
    Oscillating,
}

/// Rolling window of post-move positions.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    previous: Option<Position>,
    before_previous: Option<Position>,
    stall_streak: u32,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(start: Position) -> Self {
        Self {
            previous: Some(start),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn stall_streak(&self) -> u32 {
        self.stall_streak
    }

    /// Record the position reported after a move.
    pub fn record(&mut self, current: Position) -> Progress {
        let progress = if self.previous == Some(current) {
            self.stall_streak += 1;
            Progress::Stalled
        } else if self.before_previous == Some(current) {
            self.stall_streak = 0;
            Progress::Oscillating
        } else {
            self.stall_streak = 0;
            Progress::Moved
        };
        if progress != Progress::Stalled {
            self.before_previous = self.previous;
            self.previous = Some(current);
        }
        progress
    }

    /// Forget history after a recovery action moved the actor on purpose.
    pub fn reset(&mut self, current: Position) {
        *self = Self::new(current);
    }
}
