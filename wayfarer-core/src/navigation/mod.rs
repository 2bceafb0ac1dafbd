//! The navigation controller: one cooperative loop per `move_to` call.
//!
//! Each tick yields to the scheduler, refreshes perception, resolves the
//! target, lets the hazard interceptor override it, segments the cached path
//! and issues one movement primitive. Failures are classified by
//! [`recovery`]; area changes go through [`transition`].

pub mod hazard;
pub mod pads;
pub mod recovery;
pub mod step;
pub mod transition;

use log::{debug, info, warn};
use std::collections::HashSet;

use crate::constants::{DEFAULT_FINISH_DISTANCE, LOG_TARGET, PAD_DISPLACEMENT};
use crate::context::ActorContext;
use crate::error::{MoveFailure, NavError};
use crate::geometry::{Path, Position};
use crate::interaction::{interact_object, open_door};
use crate::options::MoveOptions;
use crate::ports::World;
use crate::target::{FixedTarget, TargetProvider};
use crate::world::{ObjectId, Snapshot};

use hazard::Detour;
use pads::PadWalker;
use recovery::{PathErrorVerdict, Progress, ProgressTracker, Recovery, RecoveryInput};
use step::StepPolicy;

pub use transition::{
    TransitionRule, TransitionStrategy, TransitionTable, ensure_area_sync, move_to_area,
};

/// Loop-local state of one `move_to` call. Built fresh per call.
#[derive(Debug, Clone)]
pub struct NavigationState {
    /// Target resolved from the provider this tick.
    pub target: Option<Position>,
    /// Effective target the cached path leads to.
    pub previous_target: Option<Position>,
    pub path: Option<Path>,
    /// Last tick ended without displacement; walkers take baby steps.
    pub stuck: bool,
    pub path_errors: u32,
    /// Interactables handled (or failed) during this call.
    pub blacklist: HashSet<ObjectId>,
    /// Doors that refused to open; never retried this call.
    pub stuck_doors: HashSet<ObjectId>,
    /// Doubles the arrival threshold for the next arrival check only.
    pub widen: bool,
    pub detour: Option<Detour>,
    pub pads: PadWalker,
    pub progress: ProgressTracker,
    started_in_town: bool,
}

impl NavigationState {
    #[must_use]
    pub fn new(snapshot: &Snapshot) -> Self {
        Self {
            target: None,
            previous_target: None,
            path: None,
            stuck: false,
            path_errors: 0,
            blacklist: HashSet::new(),
            stuck_doors: HashSet::new(),
            widen: false,
            detour: None,
            pads: PadWalker::new(),
            progress: ProgressTracker::new(snapshot.actor.position),
            started_in_town: snapshot.in_town(),
        }
    }

    /// Force a path search on the next tick.
    pub fn invalidate_path(&mut self) {
        self.previous_target = None;
        self.path = None;
    }

    /// Drop a shrine/chest detour whose object vanished or was used by
    /// someone else.
    fn drop_stale_detour(&mut self, snapshot: &Snapshot) {
        let Some(detour) = self.detour else {
            return;
        };
        if detour.is_pad() {
            return;
        }
        let live = snapshot.object(detour.id()).is_some_and(|o| o.selectable);
        if !live {
            self.blacklist.insert(detour.id());
            self.detour = None;
        }
    }
}

enum Flow {
    Continue,
    Done,
}

/// Walk or teleport toward whatever `target` yields until it yields `None`
/// or the actor arrives.
///
/// # Errors
///
/// Returns fatal, interrupt, path, pad dead-end and unclassified movement
/// errors; see [`NavError`].
pub async fn move_to<W, T>(
    ctx: &mut ActorContext<W>,
    mut target: T,
    options: &MoveOptions,
) -> Result<(), NavError>
where
    W: World,
    T: TargetProvider,
{
    preflight(ctx).await?;
    drive(ctx, &mut target, options).await
}

/// [`move_to`] with a [`FixedTarget`].
///
/// # Errors
///
/// Same as [`move_to`].
pub async fn move_to_coords<W: World>(
    ctx: &mut ActorContext<W>,
    position: Position,
    options: &MoveOptions,
) -> Result<(), NavError> {
    preflight(ctx).await?;
    drive(ctx, &mut FixedTarget(position), options).await
}

async fn preflight<W: World>(ctx: &mut ActorContext<W>) -> Result<(), NavError> {
    ctx.refresh().await;
    ctx.fatal_check()?;
    let area = ctx.snapshot.area.area;
    ensure_area_sync(ctx, area).await
}

async fn drive<W, T>(
    ctx: &mut ActorContext<W>,
    target: &mut T,
    options: &MoveOptions,
) -> Result<(), NavError>
where
    W: World,
    T: TargetProvider,
{
    let mut state = NavigationState::new(&ctx.snapshot);
    loop {
        if let Flow::Done = tick(ctx, target, options, &mut state).await? {
            return Ok(());
        }
    }
}

#[allow(clippy::too_many_lines)]
async fn tick<W, T>(
    ctx: &mut ActorContext<W>,
    provider: &mut T,
    options: &MoveOptions,
    state: &mut NavigationState,
) -> Result<Flow, NavError>
where
    W: World,
    T: TargetProvider,
{
    ctx.stats.ticks += 1;
    ctx.checkpoint().await?;
    ctx.refresh().await;
    ctx.fatal_check()?;

    let Some(real) = provider.next_target(&ctx.snapshot, &ctx.world) else {
        return Ok(Flow::Done);
    };
    state.target = Some(real);

    if !state.started_in_town && ctx.snapshot.in_town() && !ctx.snapshot.area.contains(real) {
        debug!(target: LOG_TARGET, "{}: unexpectedly in town, waiting", ctx.name);
        ctx.sleep(ctx.config.timings.town_wait).await;
        return Ok(Flow::Continue);
    }

    if !ctx.snapshot.in_town() {
        let may_clear = !ctx.snapshot.actor.can_teleport || options.clear_path_override.is_some();
        if may_clear && ctx.clear_threats(options, false).await {
            ctx.refresh().await;
            ctx.fatal_check()?;
        }
        state.drop_stale_detour(&ctx.snapshot);
        if state.detour.is_none() {
            state.detour = hazard::select(&ctx.snapshot, &ctx.config, &ctx.world, &state.blacklist);
            if state.detour.is_some() {
                ctx.stats.detours += 1;
            }
        }
    }

    let effective = state.detour.map_or(real, |d| d.position());
    let me = ctx.position();
    if state.previous_target != Some(effective) || state.path.is_none() {
        state.previous_target = Some(effective);
        state.path = ctx
            .world
            .get_path(me, effective)
            .or_else(|| ctx.world.closest_walkable_path(me, effective));
    }

    // The widened threshold only survives one tick, with or without a path.
    let widen = std::mem::take(&mut state.widen);
    if state.path.is_none() {
        return missing_path(ctx, state, real, effective).await;
    }
    state.path_errors = 0;

    let threshold = if state.detour.is_some() {
        DEFAULT_FINISH_DISTANCE
    } else {
        options.finish_distance.unwrap_or(DEFAULT_FINISH_DISTANCE)
    };
    let distance = ctx.world.distance(me, effective);
    if recovery::arrived(distance, threshold, widen) {
        let Some(detour) = state.detour.take() else {
            debug!(target: LOG_TARGET, "{}: arrived at {real}", ctx.name);
            return Ok(Flow::Done);
        };
        finish_detour(ctx, state, detour, options).await?;
        return Ok(Flow::Continue);
    }

    let Some(path) = state.path.as_ref() else {
        return Ok(Flow::Continue);
    };
    let policy = StepPolicy {
        clear_path_radius: options
            .clear_path_override
            .unwrap_or(ctx.config.clear_path_radius),
        stuck: state.stuck,
    };
    let max_step = policy.max_step(&ctx.snapshot, path, &ctx.world);
    let next = step::next_step(path, effective, max_step, threshold);

    if !ctx.snapshot.actor.can_teleport
        && let Some(door) = ctx
            .world
            .has_door_between(me, next.to, &ctx.snapshot.objects)
        && !state.stuck_doors.contains(&door.id)
    {
        if open_door(ctx, door).await? {
            state.invalidate_path();
            return Ok(Flow::Continue);
        }
        state.stuck_doors.insert(door.id);
    }

    let detour_options;
    let step_options = if state.detour.is_some() && options.finish_distance.is_some() {
        detour_options = MoveOptions {
            finish_distance: None,
            ..options.clone()
        };
        &detour_options
    } else {
        options
    };

    ctx.stats.primitives += 1;
    if let Err(failure) = ctx.world.move_step(next.to, step_options).await {
        state.previous_target = None;
        let input = RecoveryInput {
            can_teleport: ctx.snapshot.actor.can_teleport,
            in_town: ctx.snapshot.in_town(),
            stuck: state.stuck,
            path_step: next.consumed,
        };
        match recovery::classify(&failure, input) {
            Recovery::Continue => {}
            Recovery::ClearAndContinue => {
                debug!(target: LOG_TARGET, "{}: monsters in path, clearing", ctx.name);
                ctx.clear_threats(options, true).await;
            }
            Recovery::NudgeAndContinue => {
                warn!(target: LOG_TARGET, "{}: {failure}, nudging", ctx.name);
                ctx.nudge().await;
            }
            Recovery::Propagate => return Err(NavError::Movement(failure)),
        }
        if matches!(failure, MoveFailure::Stuck | MoveFailure::RoundTrip) {
            state.stuck = true;
        }
        return Ok(Flow::Continue);
    }

    ctx.refresh().await;
    let now = ctx.position();
    match state.progress.record(now) {
        Progress::Moved => {
            state.stuck = false;
            if let Some(path) = state.path.as_mut() {
                path.advance(next.consumed);
            }
        }
        Progress::Stalled => {
            ctx.stats.stalls += 1;
            state.stuck = true;
            state.widen = true;
            if state.progress.stall_streak() >= 2 {
                warn!(target: LOG_TARGET, "{}: no progress at {now}, nudging", ctx.name);
                recover_in_place(ctx, state).await;
            }
        }
        Progress::Oscillating => {
            warn!(target: LOG_TARGET, "{}: round trip detected at {now}, nudging", ctx.name);
            recover_in_place(ctx, state).await;
        }
    }
    Ok(Flow::Continue)
}

/// Nudge, switch to baby steps and restart progress tracking.
async fn recover_in_place<W: World>(ctx: &mut ActorContext<W>, state: &mut NavigationState) {
    ctx.nudge().await;
    state.stuck = true;
    state.invalidate_path();
    ctx.refresh().await;
    state.progress.reset(ctx.position());
}

async fn missing_path<W: World>(
    ctx: &mut ActorContext<W>,
    state: &mut NavigationState,
    real: Position,
    effective: Position,
) -> Result<Flow, NavError> {
    if ctx.snapshot.in_town() && !ctx.snapshot.area.contains(real) {
        info!(target: LOG_TARGET, "{}: target outside town, using a portal", ctx.name);
        ctx.world
            .use_town_portal()
            .await
            .map_err(NavError::TownPortal)?;
        ctx.sleep(ctx.config.timings.town_wait).await;
        state.invalidate_path();
        return Ok(Flow::Continue);
    }

    if let Some(detour) = state.detour.take() {
        debug!(
            target: LOG_TARGET,
            "{}: detour at {} unreachable, dropping it",
            ctx.name,
            detour.position()
        );
        if !detour.is_pad() {
            state.blacklist.insert(detour.id());
        }
        return Ok(Flow::Continue);
    }

    if ctx.config.is_teleport_pad_area(ctx.snapshot.area.area) {
        let pad = state.pads.next_pad(&ctx.snapshot, &ctx.world)?;
        state.detour = Some(pad);
        return Ok(Flow::Continue);
    }

    state.path_errors += 1;
    ctx.stats.path_errors += 1;
    match recovery::path_error_verdict(state.path_errors) {
        PathErrorVerdict::Nudge => {
            warn!(
                target: LOG_TARGET,
                "{}: no path to {effective} ({} of {}), trying random movement",
                ctx.name,
                state.path_errors,
                crate::constants::MAX_PATH_ERROR_NUDGES
            );
            ctx.nudge().await;
            Ok(Flow::Continue)
        }
        PathErrorVerdict::GiveUp => Err(NavError::PathNotFound {
            from: ctx.position(),
            to: effective,
        }),
    }
}

async fn finish_detour<W: World>(
    ctx: &mut ActorContext<W>,
    state: &mut NavigationState,
    detour: Detour,
    options: &MoveOptions,
) -> Result<(), NavError> {
    let id = detour.id();
    state.invalidate_path();

    if detour.is_pad() {
        let origin = detour.position();
        interact_object(ctx, id, move |s| {
            s.actor.position.distance_to(origin) > PAD_DISPLACEMENT
        })
        .await?;
        let exit = state.pads.mark_exit(&ctx.snapshot);
        debug!(
            target: LOG_TARGET,
            "{}: pad at {origin} took us to {}, exit pad {exit:?}",
            ctx.name,
            ctx.position()
        );
        state.progress.reset(ctx.position());
        return Ok(());
    }

    let outcome = interact_object(ctx, id, move |s| s.object(id).is_none_or(|o| !o.selectable)).await;
    state.blacklist.insert(id);
    match outcome {
        Ok(()) => debug!(target: LOG_TARGET, "{}: took {:?}", ctx.name, detour.kind),
        Err(err) if err.is_terminal() => return Err(err),
        Err(err) => warn!(
            target: LOG_TARGET,
            "{}: failed to interact with {:?}: {err}",
            ctx.name,
            detour.kind
        ),
    }
    ctx.loot(options).await;
    Ok(())
}
