//! Per-actor navigation context.
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::NavConfig;
use crate::constants::{LOG_TARGET, LOOT_RADIUS};
use crate::error::NavError;
use crate::geometry::Position;
use crate::navigation::transition::TransitionTable;
use crate::options::MoveOptions;
use crate::ports::{Turn, World};
use crate::world::Snapshot;

/// Counters accumulated across every navigation call made with one context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavStats {
    pub ticks: u64,
    pub primitives: u64,
    pub nudges: u64,
    pub clears: u64,
    pub loot_passes: u64,
    pub detours: u64,
    pub interactions: u64,
    pub doors_opened: u64,
    pub path_errors: u64,
    pub stalls: u64,
    pub area_transitions: u64,
}

impl NavStats {
    pub fn merge(&mut self, other: &Self) {
        self.ticks += other.ticks;
        self.primitives += other.primitives;
        self.nudges += other.nudges;
        self.clears += other.clears;
        self.loot_passes += other.loot_passes;
        self.detours += other.detours;
        self.interactions += other.interactions;
        self.doors_opened += other.doors_opened;
        self.path_errors += other.path_errors;
        self.stalls += other.stalls;
        self.area_transitions += other.area_transitions;
    }
}

/// Everything one actor owns while navigating. Passed by `&mut` into every
/// exposed operation; never shared between actors.
pub struct ActorContext<W> {
    pub name: String,
    pub config: NavConfig,
    pub transitions: TransitionTable,
    pub world: W,
    pub snapshot: Snapshot,
    pub stats: NavStats,
    last_clear: Option<Instant>,
}

impl<W: World> ActorContext<W> {
    pub fn new(name: impl Into<String>, config: NavConfig, world: W) -> Self {
        Self {
            name: name.into(),
            config,
            transitions: TransitionTable::default_table().clone(),
            world,
            snapshot: Snapshot::default(),
            stats: NavStats::default(),
            last_clear: None,
        }
    }

    #[must_use]
    pub fn with_transitions(mut self, transitions: TransitionTable) -> Self {
        self.transitions = transitions;
        self
    }

    /// Pull a fresh snapshot from perception.
    pub async fn refresh(&mut self) -> &Snapshot {
        self.snapshot = self.world.refresh().await;
        &self.snapshot
    }

    #[must_use]
    pub fn position(&self) -> Position {
        self.snapshot.actor.position
    }

    /// Death, or health at/below the chicken threshold outside town.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Died`] or [`NavError::Chicken`].
    pub fn fatal_check(&self) -> Result<(), NavError> {
        let actor = &self.snapshot.actor;
        if actor.is_dead() {
            return Err(NavError::Died);
        }
        let threshold = self.config.chicken_percent;
        if threshold > 0 && !self.snapshot.in_town() && actor.hp_percent <= threshold {
            return Err(NavError::Chicken {
                hp: actor.hp_percent,
                threshold,
            });
        }
        Ok(())
    }

    /// Cooperative yield.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Interrupted`] when the scheduler cancels the actor.
    pub async fn checkpoint(&mut self) -> Result<(), NavError> {
        match self.world.checkpoint().await {
            Turn::Granted => Ok(()),
            Turn::Interrupted => {
                debug!(target: LOG_TARGET, "{}: interrupted at checkpoint", self.name);
                Err(NavError::Interrupted)
            }
        }
    }

    pub async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }

    /// Random-movement recovery followed by the settle delay.
    pub async fn nudge(&mut self) {
        self.stats.nudges += 1;
        self.world.random_movement().await;
        self.sleep(self.config.timings.nudge_delay).await;
    }

    /// Threat-clear pass around the actor, rate-limited unless `force`d,
    /// followed by a loot pass. Returns whether a pass ran.
    pub async fn clear_threats(&mut self, options: &MoveOptions, force: bool) -> bool {
        if options.ignore_monsters {
            return false;
        }
        let now = Instant::now();
        if !force
            && self
                .last_clear
                .is_some_and(|t| now.duration_since(t) < self.config.timings.clear_cooldown)
        {
            return false;
        }
        self.last_clear = Some(now);
        self.stats.clears += 1;
        let radius = options
            .clear_path_override
            .unwrap_or(self.config.clear_path_radius);
        let center = self.position();
        if let Err(err) = self
            .world
            .clear_area_around(center, radius, &options.monster_filters)
            .await
        {
            warn!(target: LOG_TARGET, "{}: clear pass failed: {err}", self.name);
        }
        self.loot(options).await;
        true
    }

    /// Loot pass unless items are ignored.
    pub async fn loot(&mut self, options: &MoveOptions) {
        if options.ignore_items {
            return;
        }
        self.stats.loot_passes += 1;
        if let Err(err) = self.world.pick_up_items(LOOT_RADIUS).await {
            warn!(target: LOG_TARGET, "{}: error picking up items: {err}", self.name);
        }
    }
}
