//! Opportunistic detour selection: shrines first, then chests.
use log::debug;
use std::collections::HashSet;

use crate::config::{ChestMode, NavConfig};
use crate::constants::{
    CHEST_SCAN_RADIUS, LOG_TARGET_HAZARD, RESOURCE_SUPPRESS_PERCENT, SHRINE_SCAN_RADIUS,
};
use crate::geometry::Position;
use crate::ports::PathService;
use crate::world::{ActorState, Interactable, ObjectId, ShrineKind, Snapshot};

/// Why a detour was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetourKind {
    CurseBreaker(ShrineKind),
    Resource(ShrineKind),
    Buff(ShrineKind),
    Chest,
    TeleportPad,
}

/// The single interactable currently overriding the real target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detour {
    pub object: Interactable,
    pub kind: DetourKind,
}

impl Detour {
    #[must_use]
    pub const fn id(&self) -> ObjectId {
        self.object.id
    }

    #[must_use]
    pub const fn position(&self) -> Position {
        self.object.position
    }

    #[must_use]
    pub const fn is_pad(&self) -> bool {
        matches!(self.kind, DetourKind::TeleportPad)
    }
}

/// Pick at most one detour for this tick.
#[must_use]
pub fn select(
    snapshot: &Snapshot,
    config: &NavConfig,
    paths: &dyn PathService,
    blacklist: &HashSet<ObjectId>,
) -> Option<Detour> {
    let actor = &snapshot.actor;
    if snapshot.in_town()
        || actor.is_dead()
        || (config.chicken_percent > 0 && actor.hp_percent <= config.chicken_percent)
    {
        return None;
    }

    let shrine_allowed =
        config.interact_with_shrines && !config.is_no_shrine_area(snapshot.area.area);
    if shrine_allowed && let Some(detour) = select_shrine(snapshot, paths, blacklist) {
        debug!(
            target: LOG_TARGET_HAZARD,
            "detour to {:?} at {}",
            detour.kind,
            detour.position()
        );
        return Some(detour);
    }

    let chest = select_chest(snapshot, config.chest_mode, paths, blacklist)?;
    debug!(target: LOG_TARGET_HAZARD, "detour to chest at {}", chest.position());
    Some(chest)
}

fn select_shrine(
    snapshot: &Snapshot,
    paths: &dyn PathService,
    blacklist: &HashSet<ObjectId>,
) -> Option<Detour> {
    let me = snapshot.actor.position;
    let candidates: Vec<(Interactable, ShrineKind, i32)> = snapshot
        .objects
        .iter()
        .filter(|o| o.selectable && !blacklist.contains(&o.id))
        .filter_map(|o| o.shrine().map(|kind| (*o, kind, paths.distance(me, o.position))))
        .filter(|(_, _, d)| *d < SHRINE_SCAN_RADIUS)
        .collect();

    let closest = |keep: &dyn Fn(ShrineKind) -> bool| {
        candidates
            .iter()
            .filter(|(_, kind, _)| keep(*kind))
            .min_by_key(|(_, _, d)| *d)
            .copied()
    };

    if snapshot.actor.cursed
        && let Some((object, kind, _)) = closest(&|k| k.breaks_curses())
    {
        return Some(Detour {
            object,
            kind: DetourKind::CurseBreaker(kind),
        });
    }

    let actor = &snapshot.actor;
    if let Some((object, kind, _)) = closest(&|k| k.is_always_take() && !resource_full(actor, k)) {
        return Some(Detour {
            object,
            kind: DetourKind::Resource(kind),
        });
    }

    let current = actor.best_buff_rank();
    closest(&|k| {
        k.priority_rank()
            .is_some_and(|rank| current.is_none_or(|held| rank < held))
    })
    .map(|(object, kind, _)| Detour {
        object,
        kind: DetourKind::Buff(kind),
    })
}

fn resource_full(actor: &ActorState, kind: ShrineKind) -> bool {
    let hp_full = actor.hp_percent > RESOURCE_SUPPRESS_PERCENT;
    let mp_full = actor.mp_percent > RESOURCE_SUPPRESS_PERCENT;
    match kind {
        ShrineKind::Health => hp_full,
        ShrineKind::Mana => mp_full,
        ShrineKind::Refill => hp_full && mp_full,
        _ => false,
    }
}

fn select_chest(
    snapshot: &Snapshot,
    mode: ChestMode,
    paths: &dyn PathService,
    blacklist: &HashSet<ObjectId>,
) -> Option<Detour> {
    let wanted: fn(&Interactable) -> bool = match mode {
        ChestMode::Disabled => return None,
        ChestMode::SuperOnly => Interactable::is_super_chest,
        ChestMode::All => Interactable::is_chest,
    };
    let me = snapshot.actor.position;
    snapshot
        .objects
        .iter()
        .filter(|o| wanted(o) && o.selectable && !blacklist.contains(&o.id))
        .map(|o| (o, paths.distance(me, o.position)))
        .filter(|(o, d)| *d <= CHEST_SCAN_RADIUS && paths.line_of_sight(me, o.position))
        .min_by_key(|(_, d)| *d)
        .map(|(o, _)| Detour {
            object: *o,
            kind: DetourKind::Chest,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::ScriptedWorld;
    use crate::world::{BuffState, ObjectKind};

    fn shrine(kind: ShrineKind) -> ObjectKind {
        ObjectKind::Shrine { shrine: kind }
    }

    fn scene(build: impl FnOnce(&mut ScriptedWorld)) -> (ScriptedWorld, Snapshot) {
        let mut world = ScriptedWorld::open_field(100, 100, Position::new(50, 50));
        build(&mut world);
        let snapshot = world.view();
        (world, snapshot)
    }

    fn pick(world: &ScriptedWorld, snapshot: &Snapshot, config: &NavConfig) -> Option<Detour> {
        select(snapshot, config, world, &HashSet::new())
    }

    #[test]
    fn curse_breaker_beats_closer_resource_shrine() {
        let (world, mut snap) = scene(|w| {
            w.add_object(Position::new(52, 50), shrine(ShrineKind::Health));
            w.add_object(Position::new(70, 50), shrine(ShrineKind::Armor));
        });
        snap.actor.cursed = true;
        snap.actor.hp_percent = 40;
        let detour = pick(&world, &snap, &NavConfig { chicken_percent: 0, ..NavConfig::default() })
            .unwrap();
        assert_eq!(detour.kind, DetourKind::CurseBreaker(ShrineKind::Armor));
    }

    #[test]
    fn full_resources_suppress_always_take_shrines() {
        let (world, mut snap) = scene(|w| {
            w.add_object(Position::new(52, 50), shrine(ShrineKind::Health));
            w.add_object(Position::new(53, 50), shrine(ShrineKind::Refill));
            w.add_object(Position::new(60, 50), shrine(ShrineKind::Mana));
        });
        snap.actor.mp_percent = 50;
        let detour = pick(&world, &snap, &NavConfig::default()).unwrap();
        assert_eq!(detour.kind, DetourKind::Resource(ShrineKind::Refill));

        snap.actor.mp_percent = 100;
        assert_eq!(pick(&world, &snap, &NavConfig::default()), None);
    }

    #[test]
    fn buff_shrines_only_when_better_than_held_buff() {
        let (world, mut snap) = scene(|w| {
            w.add_object(Position::new(55, 50), shrine(ShrineKind::Skill));
        });
        snap.actor.buffs = vec![BuffState::ManaRegen];
        assert_eq!(pick(&world, &snap, &NavConfig::default()), None);

        snap.actor.buffs = vec![BuffState::Skill];
        assert_eq!(pick(&world, &snap, &NavConfig::default()), None);

        snap.actor.buffs.clear();
        let detour = pick(&world, &snap, &NavConfig::default()).unwrap();
        assert_eq!(detour.kind, DetourKind::Buff(ShrineKind::Skill));
    }

    #[test]
    fn better_buff_shrine_upgrades_held_buff() {
        let (world, mut snap) = scene(|w| {
            w.add_object(Position::new(54, 50), shrine(ShrineKind::Stamina));
        });
        snap.actor.buffs = vec![BuffState::Skill];
        let detour = pick(&world, &snap, &NavConfig::default()).unwrap();
        assert_eq!(detour.kind, DetourKind::Buff(ShrineKind::Stamina));
    }

    #[test]
    fn shrines_outside_scan_radius_are_ignored() {
        let (world, snap) = scene(|w| {
            w.add_object(Position::new(50, 0), shrine(ShrineKind::Experience));
        });
        assert_eq!(pick(&world, &snap, &NavConfig::default()), None);
    }

    #[test]
    fn chests_only_when_no_shrine_pending() {
        let (world, snap) = scene(|w| {
            w.add_object(Position::new(55, 50), ObjectKind::Chest { super_chest: false });
            w.add_object(Position::new(58, 50), ObjectKind::Chest { super_chest: true });
            w.add_object(Position::new(60, 50), shrine(ShrineKind::Experience));
        });
        let all = NavConfig {
            chest_mode: ChestMode::All,
            ..NavConfig::default()
        };
        let detour = pick(&world, &snap, &all).unwrap();
        assert!(matches!(detour.kind, DetourKind::Buff(_)));

        let no_shrines = NavConfig {
            interact_with_shrines: false,
            ..all.clone()
        };
        assert_eq!(pick(&world, &snap, &no_shrines).unwrap().position(), Position::new(55, 50));

        let super_only = NavConfig {
            chest_mode: ChestMode::SuperOnly,
            ..no_shrines
        };
        assert_eq!(pick(&world, &snap, &super_only).unwrap().position(), Position::new(58, 50));
    }

    #[test]
    fn blacklisted_objects_are_skipped_in_every_pass() {
        let mut world = ScriptedWorld::open_field(100, 100, Position::new(50, 50));
        let near = world.add_object(Position::new(52, 50), shrine(ShrineKind::Experience));
        world.add_object(Position::new(56, 50), shrine(ShrineKind::Experience));
        let snap = world.view();
        let blacklist = HashSet::from([near]);
        let detour = select(&snap, &NavConfig::default(), &world, &blacklist).unwrap();
        assert_eq!(detour.position(), Position::new(56, 50));
    }

    #[test]
    fn selection_is_suppressed_in_town_and_no_shrine_areas() {
        let (world, mut snap) = scene(|w| {
            w.add_object(Position::new(52, 50), shrine(ShrineKind::Experience));
        });
        let cfg = NavConfig {
            no_shrine_areas: vec![snap.area.area],
            ..NavConfig::default()
        };
        assert_eq!(pick(&world, &snap, &cfg), None);

        snap.area.is_town = true;
        assert_eq!(pick(&world, &snap, &NavConfig::default()), None);

        snap.area.is_town = false;
        snap.actor.hp_percent = 10;
        assert_eq!(pick(&world, &snap, &NavConfig::default()), None);
    }
}
