//! Navigation configuration: switches, thresholds and timings.
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::DEFAULT_CLEAR_PATH_RADIUS;
use crate::error::ConfigError;
use crate::world::AreaId;

/// Which chests the hazard interceptor detours for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChestMode {
    #[default]
    Disabled,
    SuperOnly,
    All,
}

/// Delays used at every suspension point of the loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timings {
    #[serde(with = "millis", default = "Timings::default_clear_cooldown")]
    pub clear_cooldown: Duration,
    #[serde(with = "millis", default = "Timings::default_area_sync_interval")]
    pub area_sync_interval: Duration,
    #[serde(with = "millis", default = "Timings::default_area_sync_settle")]
    pub area_sync_settle: Duration,
    #[serde(with = "millis", default = "Timings::default_entrance_click_settle")]
    pub entrance_click_settle: Duration,
    #[serde(with = "millis", default = "Timings::default_entrance_retry")]
    pub entrance_retry: Duration,
    #[serde(with = "millis", default = "Timings::default_town_wait")]
    pub town_wait: Duration,
    #[serde(with = "millis", default = "Timings::default_nudge_delay")]
    pub nudge_delay: Duration,
    #[serde(with = "millis", default = "Timings::default_interaction_delay")]
    pub interaction_delay: Duration,
}

impl Timings {
    const fn default_clear_cooldown() -> Duration {
        Duration::from_millis(500)
    }

    const fn default_area_sync_interval() -> Duration {
        Duration::from_millis(200)
    }

    const fn default_area_sync_settle() -> Duration {
        Duration::from_millis(250)
    }

    const fn default_entrance_click_settle() -> Duration {
        Duration::from_millis(800)
    }

    const fn default_entrance_retry() -> Duration {
        Duration::from_millis(1000)
    }

    const fn default_town_wait() -> Duration {
        Duration::from_millis(100)
    }

    const fn default_nudge_delay() -> Duration {
        Duration::from_millis(200)
    }

    const fn default_interaction_delay() -> Duration {
        Duration::from_millis(500)
    }

    /// All delays zeroed; for simulations that do not model wall-clock time.
    #[must_use]
    pub const fn instant() -> Self {
        Self {
            clear_cooldown: Duration::ZERO,
            area_sync_interval: Duration::ZERO,
            area_sync_settle: Duration::ZERO,
            entrance_click_settle: Duration::ZERO,
            entrance_retry: Duration::ZERO,
            town_wait: Duration::ZERO,
            nudge_delay: Duration::ZERO,
            interaction_delay: Duration::ZERO,
        }
    }
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            clear_cooldown: Self::default_clear_cooldown(),
            area_sync_interval: Self::default_area_sync_interval(),
            area_sync_settle: Self::default_area_sync_settle(),
            entrance_click_settle: Self::default_entrance_click_settle(),
            entrance_retry: Self::default_entrance_retry(),
            town_wait: Self::default_town_wait(),
            nudge_delay: Self::default_nudge_delay(),
            interaction_delay: Self::default_interaction_delay(),
        }
    }
}

/// Per-actor navigation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavConfig {
    #[serde(default = "NavConfig::default_clear_path_radius")]
    pub clear_path_radius: i32,
    #[serde(default = "NavConfig::default_interact_with_shrines")]
    pub interact_with_shrines: bool,
    #[serde(default)]
    pub chest_mode: ChestMode,
    /// Health percentage at or below which the actor bails out of
    /// non-town areas. Zero disables the check.
    #[serde(default = "NavConfig::default_chicken_percent")]
    pub chicken_percent: u8,
    #[serde(default = "NavConfig::default_teleport_pad_areas")]
    pub teleport_pad_areas: Vec<AreaId>,
    #[serde(default = "NavConfig::default_no_shrine_areas")]
    pub no_shrine_areas: Vec<AreaId>,
    #[serde(default)]
    pub timings: Timings,
}

impl NavConfig {
    const fn default_clear_path_radius() -> i32 {
        DEFAULT_CLEAR_PATH_RADIUS
    }

    const fn default_interact_with_shrines() -> bool {
        true
    }

    const fn default_chicken_percent() -> u8 {
        30
    }

    fn default_teleport_pad_areas() -> Vec<AreaId> {
        // Arcane sanctuary.
        vec![AreaId(74)]
    }

    fn default_no_shrine_areas() -> Vec<AreaId> {
        // Tower cellar, bottom level.
        vec![AreaId(25)]
    }

    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed or fails validation.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// # Errors
    ///
    /// Returns an error when a field is outside its accepted range or an area
    /// is configured with conflicting roles.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clear_path_radius < 0 {
            return Err(ConfigError::MinViolation {
                field: "clear_path_radius",
                min: 0,
                value: i64::from(self.clear_path_radius),
            });
        }
        if self.chicken_percent >= 100 {
            return Err(ConfigError::RangeViolation {
                field: "chicken_percent",
                min: 0,
                max: 99,
                value: i64::from(self.chicken_percent),
            });
        }
        if let Some(area) = self
            .teleport_pad_areas
            .iter()
            .find(|a| self.no_shrine_areas.contains(a))
        {
            return Err(ConfigError::ConflictingArea(area.0));
        }
        Ok(())
    }

    #[must_use]
    pub fn is_teleport_pad_area(&self, area: AreaId) -> bool {
        self.teleport_pad_areas.contains(&area)
    }

    #[must_use]
    pub fn is_no_shrine_area(&self, area: AreaId) -> bool {
        self.no_shrine_areas.contains(&area)
    }
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            clear_path_radius: Self::default_clear_path_radius(),
            interact_with_shrines: Self::default_interact_with_shrines(),
            chest_mode: ChestMode::default(),
            chicken_percent: Self::default_chicken_percent(),
            teleport_pad_areas: Self::default_teleport_pad_areas(),
            no_shrine_areas: Self::default_no_shrine_areas(),
            timings: Timings::default(),
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
