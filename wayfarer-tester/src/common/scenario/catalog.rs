//! Built-in scenarios over hand-drawn maps.
use anyhow::{Context, Result};

use wayfarer_core::constants::DEFAULT_FINISH_DISTANCE;
use wayfarer_core::{
    AreaId, BuffState, ChestMode, Interactable, MoveOptions, NavErrorKind, Position, ShrineKind,
};

use super::SimulationScenario;
use crate::logic::simulation::{Goal, RunSummary, SimulationPlan};
use crate::sim::{ParsedMap, SimRules, SimWorld};

/// Checkpoints before the simulated watchdog stops a runaway actor.
const TICK_BUDGET: u32 = 5_000;

const MAIN_AREA: AreaId = AreaId(1);
const COURTYARD_AREA: AreaId = AreaId(2);
const KEEP_AREA: AreaId = AreaId(3);
const CELLAR_AREA: AreaId = AreaId(54);
const SANCTUARY_AREA: AreaId = AreaId(74);
const CANYON_AREA: AreaId = AreaId(46);
const SANCTUARY_PORTAL: u32 = 298;
const CANYON_PORTAL: u32 = 60;
const CANYON_ACTIVATOR: u32 = 357;

pub struct CatalogEntry {
    pub key: &'static str,
    pub alias: Option<&'static str>,
    pub scenario: fn() -> SimulationScenario,
}

pub const CATALOG: &[CatalogEntry] = &[
    entry("open-field", Some("smoke"), open_field_scenario),
    entry("maze", None, maze_scenario),
    entry("teleport", None, teleport_scenario),
    entry("patrol", None, patrol_scenario),
    entry("shrines", None, shrine_scenario),
    entry("chests", None, chest_scenario),
    entry("super-chests", None, super_chest_scenario),
    entry("monsters", None, monster_scenario),
    entry("guarded-corridor", Some("corridor"), guarded_corridor_scenario),
    entry("doors", None, door_scenario),
    entry("pad-maze", Some("pads"), pad_maze_scenario),
    entry("area-chain", Some("areas"), area_chain_scenario),
    entry("portal", None, portal_scenario),
    entry("activated-portal", Some("tome"), activated_portal_scenario),
    entry("town-portal", Some("town"), town_portal_scenario),
    entry("sticky-floor", Some("sticky"), sticky_floor_scenario),
    entry("sealed-vault", Some("unreachable"), sealed_vault_scenario),
    entry("ambush", None, ambush_scenario),
    entry("interrupt", None, interrupt_scenario),
    entry("death", None, death_scenario),
];

const fn entry(
    key: &'static str,
    alias: Option<&'static str>,
    scenario: fn() -> SimulationScenario,
) -> CatalogEntry {
    CatalogEntry {
        key,
        alias,
        scenario,
    }
}

pub fn find_catalog_scenario(key: &str) -> Option<SimulationScenario> {
    CATALOG
        .iter()
        .find(|e| e.key == key || e.alias == Some(key))
        .map(|e| (e.scenario)())
}

// World builders

fn rules() -> SimRules {
    SimRules {
        tick_budget: TICK_BUDGET,
        ..SimRules::default()
    }
}

fn single_area(seed: u64, rules: SimRules, area: AreaId, map: &str) -> Result<SimWorld> {
    let parsed = ParsedMap::parse(map)?;
    let mut world = SimWorld::new(seed, rules);
    world.add_area(area, Position::default(), false, &parsed);
    world.spawn_in(area);
    Ok(world)
}

fn exit_of(map: &ParsedMap, offset: Position) -> Result<Position> {
    map.exits
        .first()
        .map(|p| p.offset(offset.x, offset.y))
        .context("map has no exit marker")
}

fn open_field(seed: u64) -> Result<SimWorld> {
    single_area(seed, rules(), MAIN_AREA, OPEN_FIELD)
}

fn maze(seed: u64) -> Result<SimWorld> {
    single_area(seed, rules(), MAIN_AREA, MAZE)
}

fn teleport_field(seed: u64) -> Result<SimWorld> {
    let rules = SimRules {
        can_teleport: true,
        ..rules()
    };
    single_area(seed, rules, MAIN_AREA, OPEN_FIELD)
}

fn shrine_field(seed: u64) -> Result<SimWorld> {
    let rules = SimRules {
        cursed: true,
        ..rules()
    };
    single_area(seed, rules, MAIN_AREA, SHRINE_FIELD)
}

fn chest_field(seed: u64) -> Result<SimWorld> {
    single_area(seed, rules(), MAIN_AREA, CHEST_FIELD)
}

fn monster_field(seed: u64) -> Result<SimWorld> {
    let rules = SimRules {
        monster_damage: 10,
        ..rules()
    };
    single_area(seed, rules, MAIN_AREA, MONSTER_FIELD)
}

fn guarded_corridor(seed: u64) -> Result<SimWorld> {
    let rules = SimRules {
        can_teleport: true,
        ..rules()
    };
    single_area(seed, rules, MAIN_AREA, CORRIDOR)
}

fn door_hall(seed: u64) -> Result<SimWorld> {
    single_area(seed, rules(), MAIN_AREA, DOOR_HALL)
}

fn pad_islands(seed: u64) -> Result<SimWorld> {
    single_area(seed, rules(), SANCTUARY_AREA, PAD_ISLANDS)
}

fn castle(seed: u64) -> Result<SimWorld> {
    let gatehouse = ParsedMap::parse(GATEHOUSE)?;
    let courtyard = ParsedMap::parse(COURTYARD)?;
    let keep = ParsedMap::parse(KEEP)?;
    let courtyard_offset = Position::new(100, 0);
    let keep_offset = Position::new(200, 0);

    let mut world = SimWorld::new(
        seed,
        SimRules {
            sync_lag: 2,
            ..rules()
        },
    );
    world.add_area(MAIN_AREA, Position::default(), false, &gatehouse);
    world.add_area(COURTYARD_AREA, courtyard_offset, false, &courtyard);
    world.add_area(KEEP_AREA, keep_offset, false, &keep);
    let gate = exit_of(&gatehouse, Position::default())?;
    world.connect(MAIN_AREA, COURTYARD_AREA, gate, true, Vec::new());
    let border = exit_of(&courtyard, courtyard_offset)?;
    world.connect(COURTYARD_AREA, KEEP_AREA, border, false, Vec::new());
    world.spawn_in(MAIN_AREA);
    Ok(world)
}

fn palace_cellar(seed: u64) -> Result<SimWorld> {
    let cellar = ParsedMap::parse(CELLAR)?;
    let sanctuary = ParsedMap::parse(SANCTUARY)?;
    let mut world = SimWorld::new(seed, rules());
    world.add_area(CELLAR_AREA, Position::default(), false, &cellar);
    world.add_area(SANCTUARY_AREA, Position::new(300, 0), false, &sanctuary);
    let portal = exit_of(&cellar, Position::default())?;
    world.add_portal(CELLAR_AREA, portal, SANCTUARY_PORTAL, SANCTUARY_AREA);
    world.spawn_in(CELLAR_AREA);
    Ok(world)
}

/// Cellar to sanctuary, then out through a portal that only opens once the
/// tome beside it is read.
fn sanctuary_and_canyon(seed: u64) -> Result<SimWorld> {
    let mut world = palace_cellar(seed)?;
    let sanctuary = ParsedMap::parse(SANCTUARY)?;
    let canyon = ParsedMap::parse(OPEN_FIELD)?;
    let sanctuary_offset = Position::new(300, 0);
    world.add_area(CANYON_AREA, Position::new(500, 0), false, &canyon);
    let tome = exit_of(&sanctuary, sanctuary_offset)?;
    world.add_activator(
        SANCTUARY_AREA,
        tome,
        CANYON_ACTIVATOR,
        CANYON_PORTAL,
        sanctuary_offset.offset(10, 1),
        CANYON_AREA,
    );
    Ok(world)
}

fn town_and_field(seed: u64) -> Result<SimWorld> {
    let town = ParsedMap::parse(GATEHOUSE)?;
    let field = ParsedMap::parse(OPEN_FIELD)?;
    let mut world = SimWorld::new(seed, rules());
    world.add_area(MAIN_AREA, Position::default(), true, &town);
    world.add_area(COURTYARD_AREA, Position::new(100, 0), false, &field);
    world.set_town_portal(COURTYARD_AREA);
    world.spawn_in(MAIN_AREA);
    Ok(world)
}

fn sticky_field(seed: u64) -> Result<SimWorld> {
    let rules = SimRules {
        stall_chance: 0.35,
        ..rules()
    };
    single_area(seed, rules, MAIN_AREA, OPEN_FIELD)
}

fn vault(seed: u64) -> Result<SimWorld> {
    single_area(seed, rules(), MAIN_AREA, VAULT)
}

fn ambush_field(seed: u64) -> Result<SimWorld> {
    let rules = SimRules {
        monster_damage: 25,
        ..rules()
    };
    single_area(seed, rules, MAIN_AREA, AMBUSH_FIELD)
}

fn interrupting_field(seed: u64) -> Result<SimWorld> {
    let rules = SimRules {
        interrupt_after: Some(3),
        ..rules()
    };
    single_area(seed, rules, MAIN_AREA, OPEN_FIELD)
}

fn deadly_field(seed: u64) -> Result<SimWorld> {
    let rules = SimRules {
        die_after_moves: Some(3),
        ..rules()
    };
    single_area(seed, rules, MAIN_AREA, OPEN_FIELD)
}

// Expectations

fn arrived(summary: &RunSummary) -> Result<()> {
    summary.ensure_arrived()
}

fn walked_cleanly(summary: &RunSummary) -> Result<()> {
    anyhow::ensure!(
        summary.log.nudges == 0,
        "expected no nudges on open ground, saw {}",
        summary.log.nudges
    );
    anyhow::ensure!(
        summary.stats.path_errors == 0,
        "path errors on open ground: {}",
        summary.stats.path_errors
    );
    Ok(())
}

fn teleported_in_long_hops(summary: &RunSummary) -> Result<()> {
    anyhow::ensure!(
        summary.stats.primitives < 10,
        "teleporting actor issued {} primitives",
        summary.stats.primitives
    );
    Ok(())
}

fn shrines_handled(summary: &RunSummary) -> Result<()> {
    let actor = &summary.final_state;
    anyhow::ensure!(!actor.cursed, "curse was never broken");
    anyhow::ensure!(
        actor.buffs.contains(&BuffState::Experience),
        "experience shrine skipped (buffs: {:?})",
        actor.buffs
    );
    anyhow::ensure!(
        summary
            .remaining
            .iter()
            .any(|o| o.shrine() == Some(ShrineKind::Refill)),
        "refill shrine taken at full health"
    );
    Ok(())
}

fn every_chest_opened(summary: &RunSummary) -> Result<()> {
    anyhow::ensure!(
        summary.log.chests_opened == 3,
        "opened {} of 3 chests",
        summary.log.chests_opened
    );
    anyhow::ensure!(
        !summary.remaining.iter().any(Interactable::is_chest),
        "closed chests left behind"
    );
    Ok(())
}

fn only_super_chest_opened(summary: &RunSummary) -> Result<()> {
    anyhow::ensure!(
        summary.log.chests_opened == 1,
        "opened {} chests, expected only the super chest",
        summary.log.chests_opened
    );
    anyhow::ensure!(
        !summary.remaining.iter().any(Interactable::is_super_chest),
        "super chest left closed"
    );
    Ok(())
}

fn monsters_cleared_before_contact(summary: &RunSummary) -> Result<()> {
    anyhow::ensure!(
        summary.log.monsters_killed >= 4,
        "only {} monsters cleared",
        summary.log.monsters_killed
    );
    anyhow::ensure!(
        summary.log.damage_taken == 0,
        "took {} damage walking through cleared ground",
        summary.log.damage_taken
    );
    Ok(())
}

fn blockers_cleared(summary: &RunSummary) -> Result<()> {
    anyhow::ensure!(summary.stats.clears >= 1, "no forced clear happened");
    anyhow::ensure!(
        summary.log.monsters_killed >= 1,
        "blocking monsters survived"
    );
    Ok(())
}

fn door_opened(summary: &RunSummary) -> Result<()> {
    anyhow::ensure!(
        summary.log.doors_opened == 1 && summary.stats.doors_opened == 1,
        "door opened {} times (stats {})",
        summary.log.doors_opened,
        summary.stats.doors_opened
    );
    Ok(())
}

fn pads_used(summary: &RunSummary) -> Result<()> {
    anyhow::ensure!(summary.log.pad_hops >= 1, "never used a teleport pad");
    Ok(())
}

fn reached_keep(summary: &RunSummary) -> Result<()> {
    anyhow::ensure!(summary.succeeded(), "{}", summary.outcome_label());
    anyhow::ensure!(
        summary.final_area == KEEP_AREA,
        "ended in {}",
        summary.final_area
    );
    anyhow::ensure!(
        summary.stats.area_transitions >= 2,
        "only {} transitions confirmed",
        summary.stats.area_transitions
    );
    anyhow::ensure!(summary.log.entrances >= 1, "gate never used");
    Ok(())
}

fn reached_sanctuary(summary: &RunSummary) -> Result<()> {
    anyhow::ensure!(summary.succeeded(), "{}", summary.outcome_label());
    anyhow::ensure!(
        summary.final_area == SANCTUARY_AREA,
        "ended in {}",
        summary.final_area
    );
    Ok(())
}

fn reached_canyon(summary: &RunSummary) -> Result<()> {
    anyhow::ensure!(summary.succeeded(), "{}", summary.outcome_label());
    anyhow::ensure!(
        summary.final_area == CANYON_AREA,
        "ended in {}",
        summary.final_area
    );
    anyhow::ensure!(
        summary.log.areas_visited.contains(&SANCTUARY_AREA),
        "never passed through the sanctuary"
    );
    anyhow::ensure!(
        summary.stats.area_transitions == 2,
        "expected two transitions, saw {}",
        summary.stats.area_transitions
    );
    Ok(())
}

fn left_town_by_portal(summary: &RunSummary) -> Result<()> {
    anyhow::ensure!(
        summary.final_area == COURTYARD_AREA,
        "still in {}",
        summary.final_area
    );
    anyhow::ensure!(
        summary.log.town_portals == 1,
        "used {} town portals",
        summary.log.town_portals
    );
    Ok(())
}

fn arrived_within_widened_threshold(summary: &RunSummary) -> Result<()> {
    anyhow::ensure!(summary.succeeded(), "{}", summary.outcome_label());
    let distance = summary.goal_distance.unwrap_or(0);
    anyhow::ensure!(
        distance <= DEFAULT_FINISH_DISTANCE * 2,
        "ended {distance} from the destination"
    );
    Ok(())
}

fn path_not_found(summary: &RunSummary) -> Result<()> {
    anyhow::ensure!(
        summary.error_kind == Some(NavErrorKind::PathNotFound),
        "expected a path failure, got {}",
        summary.outcome_label()
    );
    anyhow::ensure!(summary.log.nudges >= 1, "gave up without nudging");
    anyhow::ensure!(summary.log.moves == 0, "moved toward a sealed target");
    Ok(())
}

fn chickened_out(summary: &RunSummary) -> Result<()> {
    anyhow::ensure!(
        summary.error_kind == Some(NavErrorKind::Fatal),
        "expected a chicken exit, got {}",
        summary.outcome_label()
    );
    anyhow::ensure!(
        !summary.final_state.dead && summary.final_state.hp_percent <= 30,
        "left at {}% health (dead: {})",
        summary.final_state.hp_percent,
        summary.final_state.dead
    );
    Ok(())
}

fn interrupted(summary: &RunSummary) -> Result<()> {
    anyhow::ensure!(
        summary.error_kind == Some(NavErrorKind::Interrupted),
        "expected an interrupt, got {}",
        summary.outcome_label()
    );
    anyhow::ensure!(
        !summary.log.watchdog_tripped,
        "interrupt came from the watchdog"
    );
    Ok(())
}

fn died(summary: &RunSummary) -> Result<()> {
    anyhow::ensure!(
        summary.error_kind == Some(NavErrorKind::Fatal) && summary.final_state.dead,
        "expected death, got {}",
        summary.outcome_label()
    );
    Ok(())
}

// Scenarios

fn open_field_scenario() -> SimulationScenario {
    SimulationScenario::new(
        "Open Field Walk",
        SimulationPlan::new(open_field, Goal::Marker)
            .with_expectation(arrived)
            .with_expectation(walked_cleanly),
    )
}

fn maze_scenario() -> SimulationScenario {
    SimulationScenario::new(
        "Maze Traversal",
        SimulationPlan::new(maze, Goal::Marker).with_expectation(arrived),
    )
}

fn teleport_scenario() -> SimulationScenario {
    SimulationScenario::new(
        "Teleport Hops",
        SimulationPlan::new(teleport_field, Goal::Marker)
            .with_expectation(arrived)
            .with_expectation(teleported_in_long_hops),
    )
}

fn patrol_scenario() -> SimulationScenario {
    SimulationScenario::new(
        "Patrol Route",
        SimulationPlan::new(
            open_field,
            Goal::Patrol(vec![
                Position::new(20, 2),
                Position::new(20, 10),
                Position::new(38, 1),
                Position::new(5, 10),
            ]),
        )
        .with_expectation(arrived),
    )
}

fn shrine_scenario() -> SimulationScenario {
    SimulationScenario::new(
        "Shrine Detours",
        SimulationPlan::new(shrine_field, Goal::Marker)
            .with_expectation(arrived)
            .with_expectation(shrines_handled),
    )
}

fn chest_scenario() -> SimulationScenario {
    SimulationScenario::new(
        "Chest Looting",
        SimulationPlan::new(chest_field, Goal::Marker)
            .with_config(|config| config.chest_mode = ChestMode::All)
            .with_expectation(arrived)
            .with_expectation(every_chest_opened),
    )
}

fn super_chest_scenario() -> SimulationScenario {
    SimulationScenario::new(
        "Super Chest Only",
        SimulationPlan::new(chest_field, Goal::Marker)
            .with_config(|config| config.chest_mode = ChestMode::SuperOnly)
            .with_expectation(arrived)
            .with_expectation(only_super_chest_opened),
    )
}

fn monster_scenario() -> SimulationScenario {
    SimulationScenario::new(
        "Monster Gauntlet",
        SimulationPlan::new(monster_field, Goal::Marker)
            .with_expectation(arrived)
            .with_expectation(monsters_cleared_before_contact),
    )
}

fn guarded_corridor_scenario() -> SimulationScenario {
    SimulationScenario::new(
        "Guarded Corridor",
        SimulationPlan::new(guarded_corridor, Goal::Marker)
            .with_expectation(arrived)
            .with_expectation(blockers_cleared),
    )
}

fn door_scenario() -> SimulationScenario {
    SimulationScenario::new(
        "Door Handling",
        SimulationPlan::new(door_hall, Goal::Marker)
            .with_options(|| MoveOptions::new().ignoring_items())
            .with_expectation(arrived)
            .with_expectation(door_opened),
    )
}

fn pad_maze_scenario() -> SimulationScenario {
    SimulationScenario::new(
        "Teleport Pad Maze",
        SimulationPlan::new(pad_islands, Goal::Marker)
            .with_expectation(arrived)
            .with_expectation(pads_used),
    )
}

fn area_chain_scenario() -> SimulationScenario {
    SimulationScenario::new(
        "Area Chain With Load Lag",
        SimulationPlan::new(castle, Goal::Areas(vec![COURTYARD_AREA, KEEP_AREA]))
            .with_expectation(reached_keep),
    )
}

fn portal_scenario() -> SimulationScenario {
    SimulationScenario::new(
        "Portal Transition",
        SimulationPlan::new(palace_cellar, Goal::Areas(vec![SANCTUARY_AREA]))
            .with_expectation(reached_sanctuary),
    )
}

fn activated_portal_scenario() -> SimulationScenario {
    SimulationScenario::new(
        "Activated Portal",
        SimulationPlan::new(
            sanctuary_and_canyon,
            Goal::Areas(vec![SANCTUARY_AREA, CANYON_AREA]),
        )
        .with_expectation(reached_canyon),
    )
}

fn town_portal_scenario() -> SimulationScenario {
    SimulationScenario::new(
        "Town Portal Fallback",
        SimulationPlan::new(town_and_field, Goal::Marker)
            .with_expectation(arrived)
            .with_expectation(left_town_by_portal),
    )
}

fn sticky_floor_scenario() -> SimulationScenario {
    SimulationScenario::new(
        "Sticky Floor Recovery",
        SimulationPlan::new(sticky_field, Goal::Marker)
            .with_expectation(arrived_within_widened_threshold),
    )
}

fn sealed_vault_scenario() -> SimulationScenario {
    SimulationScenario::new(
        "Sealed Vault",
        SimulationPlan::new(vault, Goal::Marker).with_expectation(path_not_found),
    )
}

fn ambush_scenario() -> SimulationScenario {
    SimulationScenario::new(
        "Ambush Chicken",
        SimulationPlan::new(ambush_field, Goal::Marker).with_expectation(chickened_out),
    )
}

fn interrupt_scenario() -> SimulationScenario {
    SimulationScenario::new(
        "Priority Interrupt",
        SimulationPlan::new(interrupting_field, Goal::Marker).with_expectation(interrupted),
    )
}

fn death_scenario() -> SimulationScenario {
    SimulationScenario::new(
        "Death Mid-Route",
        SimulationPlan::new(deadly_field, Goal::Marker).with_expectation(died),
    )
}

// Maps

const OPEN_FIELD: &str = "
########################################
#@.....................................#
#......................................#
#......................................#
#......................................#
#......................................#
#......................................#
#......................................#
#......................................#
#......................................#
#.....................................G#
########################################
";

const SHRINE_FIELD: &str = "
########################################
#@.....................................#
#.............................R........#
#.........A............................#
#......................................#
#......................................#
#......................................#
#......................................#
#...................S..................#
#......................................#
#.....................................G#
########################################
";

const CHEST_FIELD: &str = "
########################################
#@.....................................#
#...................C..................#
#......................................#
#......................................#
#......................................#
#.......c..............................#
#......................................#
#......................................#
#.............................c........#
#.....................................G#
########################################
";

const MONSTER_FIELD: &str = "
########################################
#@.....................................#
#.........m............................#
#.....................m................#
#......................................#
#...............m......................#
#...........................M..........#
#......................................#
#................................m.....#
#......................................#
#.....................................G#
########################################
";

const CORRIDOR: &str = "
##################################################
#..............m.................................#
#@......................................m.......G#
#.............................m..................#
##################################################
";

const DOOR_HALL: &str = "
##############################
#@.............#.............#
#..............#.............#
#..............#.............#
#..............D.............#
#..............#.............#
#..............#.............#
#..............#............G#
##############################
";

const PAD_ISLANDS: &str = "
########################################
#@..................#..................#
#...................#..................#
#....P..............#.............P....#
#...................#..................#
#...................#.................G#
########################################
";

const GATEHOUSE: &str = "
####################
#..................#
#..................#
#@................E#
#..................#
#..................#
####################
";

const COURTYARD: &str = "
####################
#..................#
#..................#
#@................E#
#..................#
#..................#
####################
";

const KEEP: &str = "
####################
#..................#
#..................#
#@................G#
#..................#
#..................#
####################
";

const CELLAR: &str = "
####################
#..................#
#..................#
#@.............E...#
#..................#
#..................#
####################
";

const SANCTUARY: &str = "
############
#..........#
#@......E..#
#..........#
############
";

const VAULT: &str = "
########################################
#@.....................................#
#...................#############......#
#...................#...........#......#
#...................#...........#......#
#...................#...........#......#
#...................#...........#......#
#...................#...........#......#
#...................#.....G.....#......#
#...................#...........#......#
#...................#...........#......#
#...................#...........#......#
#...................#...........#......#
#...................#...........#......#
#...................#############......#
#......................................#
########################################
";

const AMBUSH_FIELD: &str = "
########################################
#@M....................................#
#......................................#
#......................................#
#......................................#
#......................................#
#......................................#
#......................................#
#......................................#
#......................................#
#.....................................G#
########################################
";

const MAZE: &str = "
###############################
#@....#.........#.............#
#.###.#.#######.#.###########.#
#.#...#.#.....#.#.#.........#.#
#.#.###.#.###.#.#.#.#######.#.#
#.#.....#.#...#...#.#.....#.#.#
#.#######.#.#######.#.###.#.#.#
#.........#.........#...#...#.#
#######################.#####.#
#......................G......#
###############################
";
