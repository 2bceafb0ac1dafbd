//! Perception snapshot: the actor-local view refreshed at the top of every tick.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::geometry::Position;

/// Numeric area identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AreaId(pub u32);

impl fmt::Display for AreaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "area#{}", self.0)
    }
}

/// Identifier of a live interactable object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u32);

/// Shrine flavours that matter for detour selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShrineKind {
    Health,
    Mana,
    Refill,
    Experience,
    ManaRegen,
    Stamina,
    Skill,
    Armor,
    Combat,
    ResistLightning,
    ResistFire,
    ResistCold,
    ResistPoison,
    /// Anything the interceptor never detours for.
    Other,
}

impl ShrineKind {
    /// Shrines that replace (and therefore break) an active curse.
    #[must_use]
    pub const fn breaks_curses(self) -> bool {
        matches!(
            self,
            Self::Experience
                | Self::ManaRegen
                | Self::Stamina
                | Self::Skill
                | Self::Armor
                | Self::Combat
                | Self::ResistLightning
                | Self::ResistFire
                | Self::ResistCold
                | Self::ResistPoison
        )
    }

    /// Resource shrines taken whenever the resource is not already full.
    #[must_use]
    pub const fn is_always_take(self) -> bool {
        matches!(self, Self::Health | Self::Mana | Self::Refill)
    }

    /// Buff rank (0 = best) for shrines taken only when they improve the
    /// actor's current buff.
    #[must_use]
    pub const fn priority_rank(self) -> Option<usize> {
        match self {
            Self::Experience => Some(0),
            Self::ManaRegen => Some(1),
            Self::Stamina => Some(2),
            Self::Skill => Some(3),
            _ => None,
        }
    }
}

/// Buff states granted by prioritized shrines, ranked like
/// [`ShrineKind::priority_rank`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuffState {
    Experience,
    ManaRegen,
    Stamina,
    Skill,
}

impl BuffState {
    #[must_use]
    pub const fn rank(self) -> usize {
        match self {
            Self::Experience => 0,
            Self::ManaRegen => 1,
            Self::Stamina => 2,
            Self::Skill => 3,
        }
    }
}

/// Interactable flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectKind {
    Shrine { shrine: ShrineKind },
    Chest { super_chest: bool },
    TeleportPad,
    Door,
    /// Permanent portal or scripted object identified by its object code.
    Portal { code: u32 },
    Entrance { leads_to: AreaId },
}

/// Map object the actor can interact with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interactable {
    pub id: ObjectId,
    pub position: Position,
    /// False once opened/used.
    pub selectable: bool,
    pub kind: ObjectKind,
}

impl Interactable {
    #[must_use]
    pub const fn shrine(&self) -> Option<ShrineKind> {
        match self.kind {
            ObjectKind::Shrine { shrine } => Some(shrine),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_chest(&self) -> bool {
        matches!(self.kind, ObjectKind::Chest { .. })
    }

    #[must_use]
    pub const fn is_super_chest(&self) -> bool {
        matches!(self.kind, ObjectKind::Chest { super_chest: true })
    }

    #[must_use]
    pub const fn is_teleport_pad(&self) -> bool {
        matches!(self.kind, ObjectKind::TeleportPad)
    }

    #[must_use]
    pub const fn is_door(&self) -> bool {
        matches!(self.kind, ObjectKind::Door)
    }
}

/// Threat visible to the actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monster {
    pub id: u32,
    pub position: Position,
    pub hostile: bool,
    /// Elite/boss flag, exposed for caller-supplied filters.
    #[serde(default)]
    pub elite: bool,
}

/// Walkability grid for one area. `true` cells are walkable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkGrid {
    pub width: usize,
    pub height: usize,
    pub cells: Vec<bool>,
}

impl WalkGrid {
    #[must_use]
    pub fn open(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![true; width * height],
        }
    }

    /// Non-empty and structurally consistent.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.cells.is_empty() && self.width * self.height == self.cells.len()
    }

    /// Walkability of a grid-local coordinate; out of bounds is blocked.
    #[must_use]
    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        let (Ok(ux), Ok(uy)) = (usize::try_from(x), usize::try_from(y)) else {
            return false;
        };
        if ux >= self.width || uy >= self.height {
            return false;
        }
        self.cells.get(uy * self.width + ux).copied().unwrap_or(false)
    }
}

/// Current area description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaData {
    pub area: AreaId,
    #[serde(default)]
    pub is_town: bool,
    /// Area origin in world coordinates.
    #[serde(default)]
    pub offset: Position,
    #[serde(default)]
    pub grid: Option<WalkGrid>,
}

impl AreaData {
    #[must_use]
    pub fn has_valid_grid(&self) -> bool {
        self.grid.as_ref().is_some_and(WalkGrid::is_valid)
    }

    /// Whether `pos` (world coordinates) lies inside this area's grid.
    #[must_use]
    pub fn contains(&self, pos: Position) -> bool {
        let Some(grid) = &self.grid else {
            return false;
        };
        let local = pos.offset(-self.offset.x, -self.offset.y);
        let (Ok(x), Ok(y)) = (usize::try_from(local.x), usize::try_from(local.y)) else {
            return false;
        };
        x < grid.width && y < grid.height
    }
}

/// Entry of the adjacent-area table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjacentArea {
    pub area: AreaId,
    /// Entrance object position, or a boundary crossing point.
    pub position: Position,
    /// True when the transition needs an entrance interaction.
    pub is_entrance: bool,
    /// Known object positions inside the neighbouring area, used as
    /// approach points for open-boundary transitions.
    #[serde(default)]
    pub landmarks: Vec<Position>,
}

/// Actor status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorState {
    pub position: Position,
    pub hp_percent: u8,
    pub mp_percent: u8,
    #[serde(default)]
    pub dead: bool,
    #[serde(default)]
    pub can_teleport: bool,
    /// Amplify-damage style curse currently applied.
    #[serde(default)]
    pub cursed: bool,
    #[serde(default)]
    pub stunned: bool,
    #[serde(default)]
    pub buffs: Vec<BuffState>,
}

impl Default for ActorState {
    fn default() -> Self {
        Self {
            position: Position::default(),
            hp_percent: 100,
            mp_percent: 100,
            dead: false,
            can_teleport: false,
            cursed: false,
            stunned: false,
            buffs: Vec::new(),
        }
    }
}

impl ActorState {
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.dead || self.hp_percent == 0
    }

    /// Best (lowest) rank among held prioritized buffs.
    #[must_use]
    pub fn best_buff_rank(&self) -> Option<usize> {
        self.buffs.iter().map(|b| b.rank()).min()
    }
}

/// Everything the navigation loop reads about the world in one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub actor: ActorState,
    pub area: AreaData,
    #[serde(default)]
    pub adjacent: Vec<AdjacentArea>,
    #[serde(default)]
    pub objects: Vec<Interactable>,
    #[serde(default)]
    pub monsters: Vec<Monster>,
}

impl Snapshot {
    #[must_use]
    pub fn in_town(&self) -> bool {
        self.area.is_town
    }

    #[must_use]
    pub fn object(&self, id: ObjectId) -> Option<&Interactable> {
        self.objects.iter().find(|o| o.id == id)
    }

    #[must_use]
    pub fn adjacent_to(&self, area: AreaId) -> Option<&AdjacentArea> {
        self.adjacent.iter().find(|a| a.area == area)
    }

    /// Hostile monsters within `radius` of the actor.
    pub fn enemies_within(&self, radius: i32) -> impl Iterator<Item = &Monster> {
        let me = self.actor.position;
        self.monsters
            .iter()
            .filter(move |m| m.hostile && me.distance_to(m.position) <= radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_validity_requires_consistent_dimensions() {
        assert!(WalkGrid::open(3, 2).is_valid());
        assert!(!WalkGrid::default().is_valid());
        let broken = WalkGrid {
            width: 4,
            height: 4,
            cells: vec![true; 3],
        };
        assert!(!broken.is_valid());
    }

    #[test]
    fn area_contains_respects_offset() {
        let area = AreaData {
            area: AreaId(1),
            is_town: true,
            offset: Position::new(100, 100),
            grid: Some(WalkGrid::open(10, 10)),
        };
        assert!(area.contains(Position::new(105, 109)));
        assert!(!area.contains(Position::new(99, 105)));
        assert!(!area.contains(Position::new(110, 105)));
    }

    #[test]
    fn shrine_classification_matches_detour_tiers() {
        assert!(ShrineKind::Health.is_always_take());
        assert!(!ShrineKind::Health.breaks_curses());
        assert!(ShrineKind::Armor.breaks_curses());
        assert_eq!(ShrineKind::Experience.priority_rank(), Some(0));
        assert_eq!(ShrineKind::Armor.priority_rank(), None);
    }

    #[test]
    fn zero_health_counts_as_dead() {
        let actor = ActorState {
            hp_percent: 0,
            ..ActorState::default()
        };
        assert!(actor.is_dead());
        assert_eq!(ActorState::default().best_buff_rank(), None);
    }
}
