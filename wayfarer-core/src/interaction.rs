//! Bounded interaction loops for map objects and doors.
use log::{debug, warn};

use crate::constants::{LOG_TARGET, MAX_DOOR_ATTEMPTS, MAX_INTERACTION_ATTEMPTS};
use crate::context::ActorContext;
use crate::error::NavError;
use crate::ports::World;
use crate::world::{Interactable, ObjectId, Snapshot};

/// Interact with `id` until `is_done` holds on a fresh snapshot.
///
/// Fatal and interrupt conditions are observed between attempts.
///
/// # Errors
///
/// Propagates fatal/interrupt errors, and returns
/// [`NavError::InteractionFailed`] once the attempt budget is spent.
pub async fn interact_object<W, F>(
    ctx: &mut ActorContext<W>,
    id: ObjectId,
    is_done: F,
) -> Result<(), NavError>
where
    W: World,
    F: Fn(&Snapshot) -> bool + Send,
{
    for attempt in 1..=MAX_INTERACTION_ATTEMPTS {
        ctx.checkpoint().await?;
        ctx.refresh().await;
        ctx.fatal_check()?;
        if is_done(&ctx.snapshot) {
            return Ok(());
        }

        ctx.stats.interactions += 1;
        if let Err(err) = ctx.world.interact(id).await {
            debug!(
                target: LOG_TARGET,
                "{}: interaction {attempt} with object {} rejected: {err}",
                ctx.name,
                id.0
            );
        }
        ctx.sleep(ctx.config.timings.interaction_delay).await;

        ctx.refresh().await;
        ctx.fatal_check()?;
        if is_done(&ctx.snapshot) {
            return Ok(());
        }
    }
    Err(NavError::InteractionFailed {
        id: id.0,
        attempts: MAX_INTERACTION_ATTEMPTS,
    })
}

/// Open a door blocking the next segment, nudging between attempts.
/// Returns whether the door ended up open.
///
/// # Errors
///
/// Propagates fatal/interrupt errors only.
pub async fn open_door<W: World>(
    ctx: &mut ActorContext<W>,
    door: Interactable,
) -> Result<bool, NavError> {
    let is_open = |s: &Snapshot| s.object(door.id).is_none_or(|d| !d.selectable);
    for attempt in 1..=MAX_DOOR_ATTEMPTS {
        ctx.checkpoint().await?;
        ctx.stats.interactions += 1;
        if let Err(err) = ctx.world.interact(door.id).await {
            debug!(target: LOG_TARGET, "{}: door attempt {attempt} failed: {err}", ctx.name);
        }
        ctx.refresh().await;
        ctx.fatal_check()?;
        if is_open(&ctx.snapshot) {
            ctx.stats.doors_opened += 1;
            return Ok(true);
        }
        if attempt < MAX_DOOR_ATTEMPTS {
            ctx.nudge().await;
        }
    }
    warn!(
        target: LOG_TARGET,
        "{}: door at {} still closed after {MAX_DOOR_ATTEMPTS} attempts",
        ctx.name,
        door.position
    );
    Ok(false)
}
