//! Centralized tuning constants for the navigation loop.
//!
//! Distances are in tiles, budgets are attempt counts. Delays live in
//! [`crate::config::Timings`] so tests and simulations can shrink them.

// Arrival ------------------------------------------------------------------
/// Arrival threshold when the caller gives no override, and for detours.
pub const DEFAULT_FINISH_DISTANCE: i32 = 4;
/// Arrival threshold for narrow entrances.
pub const NARROW_ENTRANCE_FINISH_DISTANCE: i32 = 7;

// Step-size policy ---------------------------------------------------------
pub const TELEPORT_STEP: usize = 10;
pub const WALK_STEP_SAFE: usize = 8;
pub const WALK_STEP_THREATENED: usize = 3;
pub const TOWN_STEP: usize = 12;
/// Floor for the radius checked for nearby threats when picking a walk step.
pub const MIN_SAFE_CHECK_RADIUS: i32 = 30;

// Budgets ------------------------------------------------------------------
pub const MAX_PATH_ERROR_NUDGES: u32 = 5;
pub const MAX_AREA_SYNC_POLLS: u32 = 10;
pub const MAX_ENTRANCE_ATTEMPTS: u32 = 3;
pub const MAX_INTERACTION_ATTEMPTS: u32 = 5;
pub const MAX_DOOR_ATTEMPTS: u32 = 5;
pub const MAX_TRANSITION_DEPTH: u32 = 3;

// Hazard interceptor -------------------------------------------------------
pub const SHRINE_SCAN_RADIUS: i32 = 50;
pub const CHEST_SCAN_RADIUS: i32 = 20;
/// Always-take shrines are skipped while their resource is above this.
pub const RESOURCE_SUPPRESS_PERCENT: u8 = 95;

// Side effects -------------------------------------------------------------
pub const LOOT_RADIUS: i32 = 25;
pub const DEFAULT_CLEAR_PATH_RADIUS: i32 = 15;

// Area transitions ---------------------------------------------------------
/// Beyond this, an entrance is too far to click and the approach restarts.
pub const ENTRANCE_REAPPROACH_DISTANCE: i32 = 7;
/// Beyond this (and within the reapproach distance) a targeted click is issued.
pub const ENTRANCE_CLICK_DISTANCE: i32 = 3;
/// Offset applied to the entrance position for the targeted click.
pub const ENTRANCE_CLICK_OFFSET: i32 = -2;

// Teleport pads ------------------------------------------------------------
/// Displacement that proves a pad fired.
pub const PAD_DISPLACEMENT: i32 = 5;

// Logging keys -------------------------------------------------------------
pub(crate) const LOG_TARGET: &str = "wayfarer::nav";
pub(crate) const LOG_TARGET_HAZARD: &str = "wayfarer::hazard";
pub(crate) const LOG_TARGET_TRANSITION: &str = "wayfarer::transition";
