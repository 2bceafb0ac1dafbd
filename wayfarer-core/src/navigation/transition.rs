//! Area transitions: the area-sync barrier and `move_to_area`.
//!
//! Most transitions walk to an entrance (or across an open boundary) and
//! interact. A small data table covers the exceptions: fixed approach
//! points for boundaries whose advertised position is unusable, a probed
//! choice between two approach points, portal objects that replace the
//! adjacency entirely, and widened finish distances for narrow entrances.
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::OnceLock;

use crate::constants::{
    ENTRANCE_CLICK_DISTANCE, ENTRANCE_CLICK_OFFSET, ENTRANCE_REAPPROACH_DISTANCE,
    LOG_TARGET_TRANSITION, MAX_AREA_SYNC_POLLS, MAX_ENTRANCE_ATTEMPTS, MAX_TRANSITION_DEPTH,
};
use crate::context::ActorContext;
use crate::error::NavError;
use crate::geometry::Position;
use crate::interaction::interact_object;
use crate::options::MoveOptions;
use crate::ports::{PathService, World};
use crate::world::{AdjacentArea, AreaId, Interactable, ObjectKind, Snapshot};

use super::{move_to, move_to_coords};

const DEFAULT_TRANSITION_DATA: &str = include_str!("../../assets/transitions.json");

/// How one specific transition deviates from "walk to the adjacency".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransitionStrategy {
    /// Walk to a fixed world position instead of the advertised crossing.
    StaticTarget { position: Position },
    /// Walk to `if_reachable` when `probe` has a path, else `otherwise`.
    ProbePath {
        probe: Position,
        if_reachable: Position,
        otherwise: Position,
    },
    /// Use a portal object with this code. When `activator` is set, that
    /// object must be interacted with first to make the portal appear.
    Portal {
        code: u32,
        #[serde(default)]
        activator: Option<u32>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRule {
    pub from: AreaId,
    pub to: AreaId,
    #[serde(default)]
    pub strategy: Option<TransitionStrategy>,
    /// Finish distance for the approach walk.
    #[serde(default)]
    pub finish_distance: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransitionTable {
    #[serde(default)]
    pub rules: Vec<TransitionRule>,
}

impl TransitionTable {
    #[must_use]
    pub fn load_from_static() -> Self {
        serde_json::from_str(DEFAULT_TRANSITION_DATA).unwrap_or_default()
    }

    #[must_use]
    pub fn default_table() -> &'static Self {
        static TABLE: OnceLock<TransitionTable> = OnceLock::new();
        TABLE.get_or_init(Self::load_from_static)
    }

    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into a transition table.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn rule(&self, from: AreaId, to: AreaId) -> Option<&TransitionRule> {
        self.rules.iter().find(|r| r.from == from && r.to == to)
    }

    #[must_use]
    pub fn strategy(&self, from: AreaId, to: AreaId) -> Option<&TransitionStrategy> {
        self.rule(from, to).and_then(|r| r.strategy.as_ref())
    }

    #[must_use]
    pub fn finish_distance(&self, from: AreaId, to: AreaId) -> Option<i32> {
        self.rule(from, to).and_then(|r| r.finish_distance)
    }
}

/// Wait until perception reports `expected` with a usable walk grid.
///
/// When the first poll already matches, no settle delay is paid.
///
/// # Errors
///
/// Propagates fatal/interrupt errors and returns
/// [`NavError::AreaSyncTimeout`] once the poll budget is spent.
pub async fn ensure_area_sync<W: World>(
    ctx: &mut ActorContext<W>,
    expected: AreaId,
) -> Result<(), NavError> {
    for attempt in 0..MAX_AREA_SYNC_POLLS {
        ctx.checkpoint().await?;
        ctx.refresh().await;
        ctx.fatal_check()?;
        if ctx.snapshot.area.area == expected && ctx.snapshot.area.has_valid_grid() {
            if attempt > 0 {
                ctx.sleep(ctx.config.timings.area_sync_settle).await;
                ctx.refresh().await;
            }
            return Ok(());
        }
        ctx.sleep(ctx.config.timings.area_sync_interval).await;
    }
    warn!(
        target: LOG_TARGET_TRANSITION,
        "{}: area {expected} never synchronised",
        ctx.name
    );
    Err(NavError::AreaSyncTimeout {
        expected,
        current: ctx.snapshot.area.area,
        attempts: MAX_AREA_SYNC_POLLS,
    })
}

/// Move into the adjacent area `destination`.
///
/// # Errors
///
/// Propagates fatal/interrupt errors and any navigation error from the
/// approach walk, plus the transition-specific errors of [`NavError`].
pub async fn move_to_area<W: World>(
    ctx: &mut ActorContext<W>,
    destination: AreaId,
) -> Result<(), NavError> {
    enter_area(ctx, destination, 0).await
}

type Transition<'a> = Pin<Box<dyn Future<Output = Result<(), NavError>> + Send + 'a>>;

fn enter_area<W: World>(
    ctx: &mut ActorContext<W>,
    destination: AreaId,
    depth: u32,
) -> Transition<'_> {
    Box::pin(async move {
        if depth > MAX_TRANSITION_DEPTH {
            return Err(NavError::TransitionDepth {
                area: destination,
                depth,
            });
        }
        ctx.refresh().await;
        ctx.fatal_check()?;
        let current = ctx.snapshot.area.area;
        ensure_area_sync(ctx, current).await?;
        if current == destination {
            return Ok(());
        }

        let rule = ctx.transitions.rule(current, destination).cloned();
        let strategy = rule.as_ref().and_then(|r| r.strategy.clone());
        if let Some(TransitionStrategy::Portal { code, activator }) = strategy {
            return take_portal(ctx, current, destination, code, activator).await;
        }

        let Some(adjacent) = ctx.snapshot.adjacent_to(destination).cloned() else {
            return Err(NavError::DestinationNotAdjacent {
                from: current,
                to: destination,
            });
        };
        info!(
            target: LOG_TARGET_TRANSITION,
            "{}: moving from {current} to {destination}",
            ctx.name
        );

        let approach = approach_point(ctx, &adjacent);
        let options = match rule.as_ref().and_then(|r| r.finish_distance) {
            Some(distance) => MoveOptions::new().with_finish_distance(distance),
            None => MoveOptions::new(),
        };
        let target = move |snapshot: &Snapshot, paths: &dyn PathService| -> Option<Position> {
            if snapshot.area.area == destination {
                return None;
            }
            match &strategy {
                Some(TransitionStrategy::StaticTarget { position }) => Some(*position),
                Some(TransitionStrategy::ProbePath {
                    probe,
                    if_reachable,
                    otherwise,
                }) => {
                    let reachable = paths.get_path(snapshot.actor.position, *probe).is_some();
                    Some(if reachable { *if_reachable } else { *otherwise })
                }
                _ => Some(approach),
            }
        };

        if let Err(err) = move_to(ctx, target, &options).await {
            if err.is_terminal() || !adjacent.is_entrance {
                return Err(err);
            }
            warn!(
                target: LOG_TARGET_TRANSITION,
                "{}: approach to entrance {destination} failed, trying to interact anyway: {err}",
                ctx.name
            );
        }

        if adjacent.is_entrance {
            let entered = use_entrance(ctx, &adjacent, depth).await?;
            if !entered {
                // A deeper re-approach already finished the transition.
                return Ok(());
            }
        }

        ensure_area_sync(ctx, destination).await?;
        ctx.stats.area_transitions += 1;
        info!(target: LOG_TARGET_TRANSITION, "{}: entered {destination}", ctx.name);
        Ok(())
    })
}

/// Closest landmark with a path for open boundaries, the entrance itself
/// otherwise.
fn approach_point<W: World>(ctx: &ActorContext<W>, adjacent: &AdjacentArea) -> Position {
    if adjacent.is_entrance {
        return adjacent.position;
    }
    let me = ctx.position();
    let mut landmarks = adjacent.landmarks.clone();
    landmarks.sort_by_key(|p| ctx.world.distance(me, *p));
    landmarks
        .into_iter()
        .find(|p| ctx.world.get_path(me, *p).is_some())
        .unwrap_or(adjacent.position)
}

/// Interact with the entrance, re-approaching or clicking toward it when the
/// actor stopped short. Returns `false` when a recursive re-approach handled
/// the whole transition.
async fn use_entrance<W: World>(
    ctx: &mut ActorContext<W>,
    adjacent: &AdjacentArea,
    depth: u32,
) -> Result<bool, NavError> {
    let destination = adjacent.area;
    for attempt in 1..=MAX_ENTRANCE_ATTEMPTS {
        ctx.refresh().await;
        let distance = ctx.world.distance(ctx.position(), adjacent.position);
        if distance > ENTRANCE_REAPPROACH_DISTANCE {
            debug!(
                target: LOG_TARGET_TRANSITION,
                "{}: entrance {destination} is {distance} away, approaching again",
                ctx.name
            );
            enter_area(ctx, destination, depth + 1).await?;
            return Ok(false);
        }
        if distance > ENTRANCE_CLICK_DISTANCE {
            let nearer = adjacent
                .position
                .offset(ENTRANCE_CLICK_OFFSET, ENTRANCE_CLICK_OFFSET);
            ctx.world.click_at(nearer).await;
            ctx.sleep(ctx.config.timings.entrance_click_settle).await;
        }

        ctx.checkpoint().await?;
        ctx.refresh().await;
        ctx.fatal_check()?;
        match ctx.world.interact_entrance(destination).await {
            Ok(()) => return Ok(true),
            Err(err) => {
                debug!(
                    target: LOG_TARGET_TRANSITION,
                    "{}: entrance attempt {attempt} to {destination} failed: {err}",
                    ctx.name
                );
                if attempt < MAX_ENTRANCE_ATTEMPTS {
                    ctx.sleep(ctx.config.timings.entrance_retry).await;
                }
            }
        }
    }
    Err(NavError::EntranceFailed {
        area: destination,
        attempts: MAX_ENTRANCE_ATTEMPTS,
    })
}

fn find_by_code(snapshot: &Snapshot, wanted: u32) -> Option<Interactable> {
    snapshot
        .objects
        .iter()
        .find(|o| matches!(o.kind, ObjectKind::Portal { code } if code == wanted))
        .copied()
}

async fn take_portal<W: World>(
    ctx: &mut ActorContext<W>,
    current: AreaId,
    destination: AreaId,
    code: u32,
    activator: Option<u32>,
) -> Result<(), NavError> {
    let missing = NavError::DestinationNotAdjacent {
        from: current,
        to: destination,
    };
    if let Some(activator) = activator
        && find_by_code(&ctx.snapshot, code).is_none()
    {
        let trigger = find_by_code(&ctx.snapshot, activator).ok_or_else(|| missing.clone())?;
        debug!(
            target: LOG_TARGET_TRANSITION,
            "{}: activating portal via object at {}",
            ctx.name,
            trigger.position
        );
        move_to_coords(ctx, trigger.position, &MoveOptions::new()).await?;
        interact_object(ctx, trigger.id, move |s| find_by_code(s, code).is_some()).await?;
    }

    let portal = find_by_code(&ctx.snapshot, code).ok_or(missing)?;
    info!(
        target: LOG_TARGET_TRANSITION,
        "{}: taking portal at {} to {destination}",
        ctx.name,
        portal.position
    );
    move_to_coords(ctx, portal.position, &MoveOptions::new()).await?;
    interact_object(ctx, portal.id, move |s| s.area.area == destination).await?;
    ensure_area_sync(ctx, destination).await?;
    ctx.stats.area_transitions += 1;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{AreaState, Call, ScriptedWorld, actor};

    type Hook = Option<Box<dyn FnOnce(&mut Snapshot) + Send + Sync>>;

    fn two_areas(start: Position) -> ScriptedWorld {
        let mut world = ScriptedWorld::open_field(50, 50, start);
        world.add_area(AreaState::open(AreaId(2), Position::new(100, 0), 50, 50));
        world
    }

    fn single_rule(rule: TransitionRule) -> TransitionTable {
        TransitionTable { rules: vec![rule] }
    }

    #[test]
    fn bundled_table_loads() {
        let table = TransitionTable::default_table();
        let narrow = Some(crate::constants::NARROW_ENTRANCE_FINISH_DISTANCE);
        assert_eq!(table.finish_distance(AreaId(40), AreaId(50)), narrow);
        assert_eq!(table.finish_distance(AreaId(24), AreaId(25)), narrow);
        assert_eq!(
            table.strategy(AreaId(7), AreaId(26)),
            Some(&TransitionStrategy::StaticTarget {
                position: Position::new(15139, 5056)
            })
        );
        assert!(matches!(
            table.strategy(AreaId(54), AreaId(74)),
            Some(TransitionStrategy::Portal { activator: None, .. })
        ));
        assert_eq!(table.rule(AreaId(1), AreaId(2)), None);
    }

    #[test]
    fn table_parses_from_json() {
        let table = TransitionTable::from_json(
            r#"{"rules":[{"from":3,"to":4,"strategy":{"type":"portal","code":9}}]}"#,
        )
        .unwrap();
        assert_eq!(
            table.strategy(AreaId(3), AreaId(4)),
            Some(&TransitionStrategy::Portal {
                code: 9,
                activator: None
            })
        );
        assert!(TransitionTable::from_json("{\"rules\":7}").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn area_sync_waits_for_both_area_and_grid() {
        let mut world = two_areas(Position::new(5, 5));
        world.place_in(AreaId(2));
        let stale: Hook = Some(Box::new(|s: &mut Snapshot| s.area.area = AreaId(1)));
        let stale_again: Hook = Some(Box::new(|s: &mut Snapshot| s.area.area = AreaId(1)));
        let no_grid: Hook = Some(Box::new(|s: &mut Snapshot| s.area.grid = None));
        world.script_views(vec![stale, stale_again, no_grid]);
        let mut ctx = actor(world);

        ensure_area_sync(&mut ctx, AreaId(2)).await.unwrap();

        // Four polls, then one settle refresh.
        assert_eq!(ctx.world.count(|c| *c == Call::Refresh), 5);
        assert!(ctx.snapshot.area.has_valid_grid());
    }

    #[tokio::test(start_paused = true)]
    async fn area_sync_is_immediate_when_already_synchronised() {
        let world = ScriptedWorld::open_field(50, 50, Position::new(5, 5));
        let mut ctx = actor(world);
        ensure_area_sync(&mut ctx, AreaId(1)).await.unwrap();
        assert_eq!(ctx.world.count(|c| *c == Call::Refresh), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn area_sync_times_out() {
        let mut world = two_areas(Position::new(5, 5));
        world.place_in(AreaId(2));
        let hooks: Vec<Hook> = (0..MAX_AREA_SYNC_POLLS)
            .map(|_| -> Hook { Some(Box::new(|s: &mut Snapshot| s.area.grid = None)) })
            .collect();
        world.script_views(hooks);
        let mut ctx = actor(world);

        assert_eq!(
            ensure_area_sync(&mut ctx, AreaId(2)).await,
            Err(NavError::AreaSyncTimeout {
                expected: AreaId(2),
                current: AreaId(2),
                attempts: MAX_AREA_SYNC_POLLS,
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn walks_to_entrance_and_enters() {
        let mut world = two_areas(Position::new(5, 10));
        world.connect(AreaId(1), AreaId(2), Position::new(30, 10), true);
        let mut ctx = actor(world);

        move_to_area(&mut ctx, AreaId(2)).await.unwrap();

        assert_eq!(ctx.world.current_area(), AreaId(2));
        assert_eq!(ctx.snapshot.area.area, AreaId(2));
        assert_eq!(ctx.world.count(|c| *c == Call::Entrance(AreaId(2))), 1);
        assert_eq!(ctx.stats.area_transitions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn entrance_is_retried_then_reported() {
        let mut world = two_areas(Position::new(5, 10));
        world.connect(AreaId(1), AreaId(2), Position::new(30, 10), true);
        world.fail_entrances(2);
        let mut ctx = actor(world);
        move_to_area(&mut ctx, AreaId(2)).await.unwrap();
        assert_eq!(ctx.world.count(|c| matches!(c, Call::Entrance(_))), 3);

        let mut world = two_areas(Position::new(5, 10));
        world.connect(AreaId(1), AreaId(2), Position::new(30, 10), true);
        world.fail_entrances(3);
        let mut ctx = actor(world);
        assert_eq!(
            move_to_area(&mut ctx, AreaId(2)).await,
            Err(NavError::EntranceFailed {
                area: AreaId(2),
                attempts: MAX_ENTRANCE_ATTEMPTS,
            })
        );
        assert_eq!(ctx.world.current_area(), AreaId(1));
    }

    #[tokio::test(start_paused = true)]
    async fn nearby_but_not_close_entrance_gets_a_click() {
        let mut world = two_areas(Position::new(24, 10));
        world.connect(AreaId(1), AreaId(2), Position::new(30, 10), true);
        let table = single_rule(TransitionRule {
            from: AreaId(1),
            to: AreaId(2),
            strategy: None,
            finish_distance: Some(7),
        });
        let mut ctx = actor(world).with_transitions(table);

        move_to_area(&mut ctx, AreaId(2)).await.unwrap();

        assert!(ctx.world.moves().is_empty());
        assert_eq!(ctx.world.count(|c| *c == Call::Click(Position::new(28, 8))), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reapproach_recursion_is_bounded() {
        let mut world = two_areas(Position::new(21, 10));
        world.connect(AreaId(1), AreaId(2), Position::new(30, 10), true);
        let table = single_rule(TransitionRule {
            from: AreaId(1),
            to: AreaId(2),
            strategy: None,
            finish_distance: Some(10),
        });
        let mut ctx = actor(world).with_transitions(table);

        assert_eq!(
            move_to_area(&mut ctx, AreaId(2)).await,
            Err(NavError::TransitionDepth {
                area: AreaId(2),
                depth: MAX_TRANSITION_DEPTH + 1,
            })
        );
        assert_eq!(ctx.world.count(|c| matches!(c, Call::Entrance(_))), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_destination_is_rejected() {
        let world = two_areas(Position::new(5, 10));
        let mut ctx = actor(world);
        assert_eq!(
            move_to_area(&mut ctx, AreaId(9)).await,
            Err(NavError::DestinationNotAdjacent {
                from: AreaId(1),
                to: AreaId(9),
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn open_boundary_is_walked_across() {
        let mut world = two_areas(Position::new(5, 10));
        world.connect(AreaId(1), AreaId(2), Position::new(45, 10), false);
        world.set_landmarks(AreaId(1), AreaId(2), vec![Position::new(300, 300)]);
        let mut ctx = actor(world);

        move_to_area(&mut ctx, AreaId(2)).await.unwrap();

        assert_eq!(ctx.world.current_area(), AreaId(2));
        assert_eq!(ctx.world.count(|c| matches!(c, Call::Entrance(_))), 0);
        assert_eq!(ctx.stats.area_transitions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_rule_falls_back_when_probe_is_unreachable() {
        let mut world = two_areas(Position::new(5, 10));
        world.wall_column(40, 30, 49);
        world.connect(AreaId(1), AreaId(2), Position::new(10, 45), false);
        let table = single_rule(TransitionRule {
            from: AreaId(1),
            to: AreaId(2),
            strategy: Some(TransitionStrategy::ProbePath {
                probe: Position::new(40, 40),
                if_reachable: Position::new(45, 10),
                otherwise: Position::new(10, 45),
            }),
            finish_distance: None,
        });
        let mut ctx = actor(world).with_transitions(table);

        move_to_area(&mut ctx, AreaId(2)).await.unwrap();

        assert_eq!(ctx.world.current_area(), AreaId(2));
        assert!(ctx.world.moves().iter().all(|p| p.x <= 10));
    }

    #[tokio::test(start_paused = true)]
    async fn portal_rule_replaces_the_adjacency() {
        let mut world = ScriptedWorld::open_field_in(AreaId(54), 50, 50, Position::new(5, 10));
        world.add_area(AreaState::open(AreaId(74), Position::new(100, 0), 50, 50));
        let portal = world.add_object(Position::new(20, 10), ObjectKind::Portal { code: 298 });
        world.link_portal(portal, AreaId(74));
        let mut ctx = actor(world);

        move_to_area(&mut ctx, AreaId(74)).await.unwrap();

        assert_eq!(ctx.world.current_area(), AreaId(74));
        assert_eq!(ctx.world.count(|c| *c == Call::Interact(portal)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn activated_portal_needs_its_trigger_first() {
        let mut world = ScriptedWorld::open_field_in(AreaId(74), 50, 50, Position::new(5, 10));
        world.add_area(AreaState::open(AreaId(46), Position::new(100, 0), 50, 50));
        let tome = world.add_object(Position::new(15, 10), ObjectKind::Portal { code: 357 });
        let mut ctx = actor(world);

        // The trigger never spawns a portal here.
        let err = move_to_area(&mut ctx, AreaId(46)).await.unwrap_err();
        assert!(matches!(err, NavError::InteractionFailed { .. }));
        assert!(ctx.world.count(|c| *c == Call::Interact(tome)) >= 1);
    }
}
