use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;

use wayfarer_core::constants::DEFAULT_FINISH_DISTANCE;
use wayfarer_core::{
    ActorContext, ActorState, AreaId, Interactable, MoveOptions, NavConfig, NavError,
    NavErrorKind, NavStats, PathService, Position, Snapshot, move_to, move_to_area,
    move_to_coords,
};

use crate::sim::{SimLog, SimWorld};

pub type WorldBuilder = fn(u64) -> Result<SimWorld>;
pub type Expectation = fn(&RunSummary) -> Result<()>;

/// What the actor is asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Goal {
    /// Walk to the map's `G` marker.
    Marker,
    /// Walk to a fixed position.
    Coords(Position),
    /// Visit each waypoint in turn; the target moves as waypoints are reached.
    Patrol(Vec<Position>),
    /// Cross into each area in order.
    Areas(Vec<AreaId>),
}

impl Goal {
    /// Replace [`Goal::Marker`] with the marker's world position.
    ///
    /// # Errors
    ///
    /// Fails when the world has no goal marker.
    pub fn resolve(&self, world: &SimWorld) -> Result<Self> {
        match self {
            Self::Marker => world
                .goal()
                .map(Self::Coords)
                .context("world has no goal marker"),
            other => Ok(other.clone()),
        }
    }

    /// Final position the actor should end near, if any.
    #[must_use]
    pub fn destination(&self) -> Option<Position> {
        match self {
            Self::Coords(position) => Some(*position),
            Self::Patrol(points) => points.last().copied(),
            Self::Marker | Self::Areas(_) => None,
        }
    }
}

#[derive(Clone)]
pub struct SimulationPlan {
    pub build: WorldBuilder,
    pub goal: Goal,
    pub configure: fn(&mut NavConfig),
    pub options: fn() -> MoveOptions,
    pub expectations: Vec<Expectation>,
}

impl fmt::Debug for SimulationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationPlan")
            .field("goal", &self.goal)
            .field("expectations", &self.expectations.len())
            .finish_non_exhaustive()
    }
}

impl SimulationPlan {
    #[must_use]
    pub fn new(build: WorldBuilder, goal: Goal) -> Self {
        Self {
            build,
            goal,
            configure: |_| {},
            options: MoveOptions::new,
            expectations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, configure: fn(&mut NavConfig)) -> Self {
        self.configure = configure;
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: fn() -> MoveOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_expectation(mut self, expectation: Expectation) -> Self {
        self.expectations.push(expectation);
        self
    }
}

/// Everything observed about one actor's run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub actor: String,
    pub seed: u64,
    pub error: Option<String>,
    pub error_kind: Option<NavErrorKind>,
    pub final_area: AreaId,
    pub final_state: ActorState,
    /// Distance to [`Goal::destination`], when the goal has one.
    pub goal_distance: Option<i32>,
    pub stats: NavStats,
    pub log: SimLog,
    /// Objects in the final area that can still be interacted with.
    pub remaining: Vec<Interactable>,
}

impl RunSummary {
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    #[must_use]
    pub fn outcome_label(&self) -> &str {
        self.error.as_deref().unwrap_or("ok")
    }

    /// Fails unless the run ended without error within the finish distance
    /// of its destination.
    pub fn ensure_arrived(&self) -> Result<()> {
        anyhow::ensure!(
            self.succeeded(),
            "navigation failed: {}",
            self.outcome_label()
        );
        if let Some(distance) = self.goal_distance {
            anyhow::ensure!(
                distance <= DEFAULT_FINISH_DISTANCE,
                "ended {distance} from the destination"
            );
        }
        Ok(())
    }
}

/// Build the plan's world for `seed` and drive one actor through it.
///
/// # Errors
///
/// Fails when the world cannot be built or the configuration is invalid;
/// navigation errors are recorded in the summary instead.
pub async fn run_plan(
    plan: &SimulationPlan,
    seed: u64,
    actor: usize,
    base: &NavConfig,
) -> Result<RunSummary> {
    let world = (plan.build)(seed).with_context(|| format!("building world for seed {seed}"))?;
    let mut config = base.clone();
    (plan.configure)(&mut config);
    config.validate().context("scenario configuration")?;
    let options = (plan.options)();
    let goal = plan.goal.resolve(&world)?;

    let mut ctx = ActorContext::new(format!("actor-{actor}"), config, world);
    let outcome = drive(&mut ctx, &goal, &options).await;

    let world = &ctx.world;
    let final_state = world.actor().clone();
    Ok(RunSummary {
        actor: ctx.name.clone(),
        seed,
        error: outcome.as_ref().err().map(ToString::to_string),
        error_kind: outcome.as_ref().err().map(NavError::kind),
        final_area: world.current_area(),
        goal_distance: goal
            .destination()
            .map(|d| final_state.position.distance_to(d)),
        final_state,
        stats: ctx.stats.clone(),
        log: world.log.clone(),
        remaining: world
            .objects()
            .iter()
            .filter(|o| o.selectable)
            .copied()
            .collect(),
    })
}

async fn drive(
    ctx: &mut ActorContext<SimWorld>,
    goal: &Goal,
    options: &MoveOptions,
) -> Result<(), NavError> {
    match goal {
        Goal::Coords(position) => move_to_coords(ctx, *position, options).await,
        Goal::Marker => match ctx.world.goal() {
            Some(position) => move_to_coords(ctx, position, options).await,
            None => Ok(()),
        },
        Goal::Patrol(points) => {
            let points = points.clone();
            let mut next = 0;
            let patrol = move |snapshot: &Snapshot, _paths: &dyn PathService| {
                let me = snapshot.actor.position;
                while points
                    .get(next)
                    .is_some_and(|p| me.distance_to(*p) <= DEFAULT_FINISH_DISTANCE)
                {
                    next += 1;
                }
                points.get(next).copied()
            };
            move_to(ctx, patrol, options).await
        }
        Goal::Areas(chain) => {
            for area in chain {
                move_to_area(ctx, *area).await?;
            }
            Ok(())
        }
    }
}
