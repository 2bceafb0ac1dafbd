//! Simulated game world implementing every navigation port.
use async_trait::async_trait;
use log::{debug, trace};
use pathfinding::prelude::astar;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::Serialize;
use std::collections::HashMap;

use wayfarer_core::constants::DEFAULT_FINISH_DISTANCE;
use wayfarer_core::{
    ActorState, AdjacentArea, AreaData, AreaId, BuffState, CombatService, Interactable,
    LootService, Monster, MonsterFilter, MoveFailure, MoveOptions, MovementInput, ObjectId,
    ObjectKind, Path, PathService, Perception, Position, PriorityGate, ServiceError, ShrineKind,
    Snapshot, Turn,
};

use super::map::ParsedMap;

pub const ASTAR_CARDINAL_COST: u32 = 10;
pub const ASTAR_DIAGONAL_COST: u32 = 14;
const SCREEN_RADIUS: i32 = 30;
/// Objects further than this do not respond to interaction.
const REACH: i32 = 10;
const ENTRANCE_REACH: i32 = 5;
/// Monsters this close to a segment block it and hurt the actor.
const CONTACT_RANGE: i32 = 2;
const FALLBACK_SEARCH_RADIUS: i32 = 4;
const NUDGE_RADIUS: i32 = 2;

const NEIGHBOURS: [(i32, i32); 8] = [
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (1, 1),
    (-1, 1),
    (1, -1),
];

/// Knobs a scenario turns on the simulated world.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimRules {
    /// Probability that a step silently leaves the actor in place.
    pub stall_chance: f64,
    /// Refreshes that still report the previous area after a transition.
    pub sync_lag: u32,
    /// Health lost per refresh for every monster in contact.
    pub monster_damage: u8,
    pub die_after_moves: Option<u32>,
    pub interrupt_after: Option<u32>,
    /// Checkpoints before the watchdog interrupts a runaway actor; 0 disables.
    pub tick_budget: u32,
    pub can_teleport: bool,
    pub cursed: bool,
}

/// Observable side effects, for scenario expectations.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimLog {
    pub moves: u32,
    pub nudges: u32,
    pub clicks: u32,
    pub interactions: HashMap<ObjectId, u32>,
    pub shrines_taken: u32,
    pub chests_opened: u32,
    pub doors_opened: u32,
    pub pad_hops: u32,
    pub monsters_killed: u32,
    pub damage_taken: u32,
    pub entrances: u32,
    pub town_portals: u32,
    pub loot_passes: u32,
    pub areas_visited: Vec<AreaId>,
    pub watchdog_tripped: bool,
}

#[derive(Debug, Clone)]
pub struct SimArea {
    pub data: AreaData,
    pub adjacent: Vec<AdjacentArea>,
    pub objects: Vec<Interactable>,
    pub monsters: Vec<Monster>,
    pub arrival: Position,
}

impl SimArea {
    fn void() -> Self {
        Self {
            data: AreaData::default(),
            adjacent: Vec::new(),
            objects: Vec::new(),
            monsters: Vec::new(),
            arrival: Position::default(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Link {
    Pad(Position),
    Portal(AreaId),
    Spawns {
        code: u32,
        at: Position,
        leads_to: AreaId,
    },
}

pub struct SimWorld {
    current: SimArea,
    parked: HashMap<AreaId, SimArea>,
    actor: ActorState,
    rng: ChaCha20Rng,
    rules: SimRules,
    links: HashMap<ObjectId, Link>,
    next_object: u32,
    next_monster: u32,
    lag: u32,
    stale_area: Option<AreaId>,
    checkpoints: u32,
    town_portal: Option<AreaId>,
    goal: Option<Position>,
    pub log: SimLog,
}

impl SimWorld {
    #[must_use]
    pub fn new(seed: u64, rules: SimRules) -> Self {
        let actor = ActorState {
            can_teleport: rules.can_teleport,
            cursed: rules.cursed,
            ..ActorState::default()
        };
        Self {
            current: SimArea::void(),
            parked: HashMap::new(),
            actor,
            rng: ChaCha20Rng::seed_from_u64(seed),
            rules,
            links: HashMap::new(),
            next_object: 1,
            next_monster: 1,
            lag: 0,
            stale_area: None,
            checkpoints: 0,
            town_portal: None,
            goal: None,
            log: SimLog::default(),
        }
    }

    /// Register an area built from `map`, placed at `offset` in world
    /// coordinates. Pads are linked pairwise in reading order; a `G` marker
    /// becomes the world's goal.
    pub fn add_area(&mut self, id: AreaId, offset: Position, is_town: bool, map: &ParsedMap) {
        let world = |p: Position| p.offset(offset.x, offset.y);
        if let Some(goal) = map.goal {
            self.goal = Some(world(goal));
        }
        let mut area = SimArea {
            data: AreaData {
                area: id,
                is_town,
                offset,
                grid: Some(map.grid.clone()),
            },
            adjacent: Vec::new(),
            objects: Vec::new(),
            monsters: Vec::new(),
            arrival: map.start.map_or(offset.offset(1, 1), world),
        };
        for (pos, kind) in &map.objects {
            let id = self.allocate_object();
            area.objects.push(Interactable {
                id,
                position: world(*pos),
                selectable: true,
                kind: *kind,
            });
        }
        let pads: Vec<(ObjectId, Position)> = area
            .objects
            .iter()
            .filter(|o| o.is_teleport_pad())
            .map(|o| (o.id, o.position))
            .collect();
        for pair in pads.chunks_exact(2) {
            self.links.insert(pair[0].0, Link::Pad(pair[1].1));
            self.links.insert(pair[1].0, Link::Pad(pair[0].1));
        }
        for (pos, elite) in &map.monsters {
            area.monsters.push(Monster {
                id: self.next_monster,
                position: world(*pos),
                hostile: true,
                elite: *elite,
            });
            self.next_monster += 1;
        }
        self.parked.insert(id, area);
    }

    /// Put the actor into `area` at its arrival point.
    pub fn spawn_in(&mut self, area: AreaId) -> bool {
        let entered = self.enter(area);
        self.lag = 0;
        entered
    }

    pub fn connect(
        &mut self,
        from: AreaId,
        to: AreaId,
        position: Position,
        is_entrance: bool,
        landmarks: Vec<Position>,
    ) {
        let id = self.allocate_object();
        let Some(area) = self.area_mut(from) else {
            return;
        };
        area.adjacent.push(AdjacentArea {
            area: to,
            position,
            is_entrance,
            landmarks,
        });
        if is_entrance {
            area.objects.push(Interactable {
                id,
                position,
                selectable: true,
                kind: ObjectKind::Entrance { leads_to: to },
            });
        }
    }

    /// Portal object with `code` at `position` leading to `leads_to`.
    pub fn add_portal(&mut self, area: AreaId, position: Position, code: u32, leads_to: AreaId) {
        let id = self.place_object(area, position, ObjectKind::Portal { code });
        self.links.insert(id, Link::Portal(leads_to));
    }

    /// Object that spawns portal `code` at `at` once interacted with.
    pub fn add_activator(
        &mut self,
        area: AreaId,
        position: Position,
        activator: u32,
        code: u32,
        at: Position,
        leads_to: AreaId,
    ) {
        let id = self.place_object(area, position, ObjectKind::Portal { code: activator });
        self.links.insert(id, Link::Spawns { code, at, leads_to });
    }

    pub fn set_town_portal(&mut self, area: AreaId) {
        self.town_portal = Some(area);
    }

    #[must_use]
    pub const fn actor(&self) -> &ActorState {
        &self.actor
    }

    /// World position of the last registered `G` marker.
    #[must_use]
    pub const fn goal(&self) -> Option<Position> {
        self.goal
    }

    #[must_use]
    pub const fn current_area(&self) -> AreaId {
        self.current.data.area
    }

    #[must_use]
    pub fn objects(&self) -> &[Interactable] {
        &self.current.objects
    }

    fn allocate_object(&mut self) -> ObjectId {
        let id = ObjectId(self.next_object);
        self.next_object += 1;
        id
    }

    fn place_object(&mut self, area: AreaId, position: Position, kind: ObjectKind) -> ObjectId {
        let id = self.allocate_object();
        if let Some(target) = self.area_mut(area) {
            target.objects.push(Interactable {
                id,
                position,
                selectable: true,
                kind,
            });
        }
        id
    }

    fn area_mut(&mut self, id: AreaId) -> Option<&mut SimArea> {
        if self.current.data.area == id {
            Some(&mut self.current)
        } else {
            self.parked.get_mut(&id)
        }
    }

    fn enter(&mut self, id: AreaId) -> bool {
        let Some(next) = self.parked.remove(&id) else {
            return false;
        };
        let previous = std::mem::replace(&mut self.current, next);
        let previous_id = previous.data.area;
        if previous.data.grid.is_some() {
            self.parked.insert(previous_id, previous);
        }
        self.actor.position = self.current.arrival;
        self.lag = self.rules.sync_lag;
        self.stale_area = Some(previous_id);
        self.log.areas_visited.push(id);
        debug!(target: "wayfarer::sim", "actor entered {id}");
        true
    }

    fn to_local(&self, pos: Position) -> Position {
        let offset = self.current.data.offset;
        pos.offset(-offset.x, -offset.y)
    }

    fn walkable(&self, pos: Position) -> bool {
        let local = self.to_local(pos);
        self.current
            .data
            .grid
            .as_ref()
            .is_some_and(|g| g.is_walkable(local.x, local.y))
    }

    /// A* route between two world positions, in grid-local coordinates.
    fn route(&self, from: Position, to: Position) -> Option<(Vec<Position>, u32)> {
        let grid = self.current.data.grid.as_ref()?;
        let (start, goal) = (self.to_local(from), self.to_local(to));
        if !grid.is_walkable(start.x, start.y) || !grid.is_walkable(goal.x, goal.y) {
            return None;
        }
        astar(
            &start,
            |p| {
                let p = *p;
                NEIGHBOURS
                    .iter()
                    .map(move |(dx, dy)| (p.offset(*dx, *dy), *dx != 0 && *dy != 0))
                    .filter(|(n, _)| grid.is_walkable(n.x, n.y))
                    .map(|(n, diagonal)| {
                        let cost = if diagonal {
                            ASTAR_DIAGONAL_COST
                        } else {
                            ASTAR_CARDINAL_COST
                        };
                        (n, cost)
                    })
                    .collect::<Vec<_>>()
            },
            |p| octile(*p, goal),
            |p| *p == goal,
        )
    }

    fn to_path(&self, route: (Vec<Position>, u32)) -> Option<Path> {
        let (waypoints, cost) = route;
        let approx = i32::try_from(cost / ASTAR_CARDINAL_COST).unwrap_or(i32::MAX);
        Path::new(waypoints, self.current.data.offset, approx)
    }

    fn closed_door_on<'a>(
        &self,
        route: &[Position],
        objects: &'a [Interactable],
    ) -> Option<&'a Interactable> {
        let offset = self.current.data.offset;
        route.iter().skip(1).find_map(|p| {
            let world = p.offset(offset.x, offset.y);
            objects
                .iter()
                .find(|o| o.is_door() && o.selectable && o.position == world)
        })
    }

    fn monster_near_segment(&self, from: Position, to: Position) -> bool {
        let line = bresenham(from, to);
        self.current.monsters.iter().any(|m| {
            m.hostile
                && line
                    .iter()
                    .skip(1)
                    .any(|p| p.distance_to(m.position) <= CONTACT_RANGE)
        })
    }

    fn apply_contact_damage(&mut self) {
        let damage = self.rules.monster_damage;
        if damage == 0 || self.actor.is_dead() {
            return;
        }
        let me = self.actor.position;
        let hits = self
            .current
            .monsters
            .iter()
            .filter(|m| m.hostile && me.distance_to(m.position) <= CONTACT_RANGE)
            .count();
        for _ in 0..hits {
            self.actor.hp_percent = self.actor.hp_percent.saturating_sub(damage);
            self.log.damage_taken += u32::from(damage);
        }
        if self.actor.hp_percent == 0 {
            self.actor.dead = true;
        }
    }

    fn cross_boundary(&mut self) {
        let me = self.actor.position;
        let crossing = self
            .current
            .adjacent
            .iter()
            .find(|a| !a.is_entrance && a.position.distance_to(me) <= DEFAULT_FINISH_DISTANCE)
            .map(|a| a.area);
        if let Some(area) = crossing {
            self.enter(area);
        }
    }

    fn apply_shrine(&mut self, shrine: ShrineKind) {
        self.log.shrines_taken += 1;
        if shrine.breaks_curses() {
            self.actor.cursed = false;
        }
        match shrine {
            ShrineKind::Health => self.actor.hp_percent = 100,
            ShrineKind::Mana => self.actor.mp_percent = 100,
            ShrineKind::Refill => {
                self.actor.hp_percent = 100;
                self.actor.mp_percent = 100;
            }
            ShrineKind::Experience => self.grant_buff(BuffState::Experience),
            ShrineKind::ManaRegen => self.grant_buff(BuffState::ManaRegen),
            ShrineKind::Stamina => self.grant_buff(BuffState::Stamina),
            ShrineKind::Skill => self.grant_buff(BuffState::Skill),
            _ => {}
        }
    }

    fn grant_buff(&mut self, buff: BuffState) {
        self.actor.buffs.clear();
        self.actor.buffs.push(buff);
    }
}

fn octile(a: Position, b: Position) -> u32 {
    let dx = (a.x - b.x).unsigned_abs();
    let dy = (a.y - b.y).unsigned_abs();
    ASTAR_CARDINAL_COST * dx.max(dy) + (ASTAR_DIAGONAL_COST - ASTAR_CARDINAL_COST) * dx.min(dy)
}

fn bresenham(from: Position, to: Position) -> Vec<Position> {
    let (mut x, mut y) = (from.x, from.y);
    let dx = (to.x - from.x).abs();
    let dy = -(to.y - from.y).abs();
    let sx = if from.x < to.x { 1 } else { -1 };
    let sy = if from.y < to.y { 1 } else { -1 };
    let mut err = dx + dy;
    let mut line = vec![from];
    while (x, y) != (to.x, to.y) {
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
        line.push(Position::new(x, y));
    }
    line
}

impl PathService for SimWorld {
    fn get_path(&self, from: Position, to: Position) -> Option<Path> {
        self.route(from, to).and_then(|route| self.to_path(route))
    }

    fn has_door_between(
        &self,
        from: Position,
        to: Position,
        objects: &[Interactable],
    ) -> Option<Interactable> {
        let (route, _) = self.route(from, to)?;
        self.closed_door_on(&route, objects).copied()
    }

    fn closest_walkable_path(&self, from: Position, to: Position) -> Option<Path> {
        let r = FALLBACK_SEARCH_RADIUS;
        let mut candidates: Vec<Position> = (-r..=r)
            .flat_map(|dx| (-r..=r).map(move |dy| to.offset(dx, dy)))
            .filter(|p| *p != to && self.walkable(*p))
            .collect();
        candidates.sort_by_key(|p| (p.distance_to(to), p.distance_to(from)));
        candidates
            .into_iter()
            .find_map(|p| self.route(from, p))
            .and_then(|route| self.to_path(route))
    }

    fn line_of_sight(&self, from: Position, to: Position) -> bool {
        bresenham(from, to).iter().all(|p| self.walkable(*p))
    }

    fn last_path_index_on_screen(&self, path: &Path) -> usize {
        let origin = path.from();
        (0..path.len())
            .take_while(|i| origin.distance_to(path.world_at(*i)) <= SCREEN_RADIUS)
            .last()
            .unwrap_or(0)
    }
}

#[async_trait]
impl Perception for SimWorld {
    async fn refresh(&mut self) -> Snapshot {
        self.apply_contact_damage();
        let mut snapshot = Snapshot {
            actor: self.actor.clone(),
            area: self.current.data.clone(),
            adjacent: self.current.adjacent.clone(),
            objects: self.current.objects.clone(),
            monsters: self.current.monsters.clone(),
        };
        if self.lag > 0 {
            self.lag -= 1;
            if let Some(stale) = self.stale_area {
                snapshot.area.area = stale;
            }
            snapshot.area.grid = None;
        }
        snapshot
    }
}

#[async_trait]
impl MovementInput for SimWorld {
    async fn move_step(&mut self, to: Position, options: &MoveOptions) -> Result<(), MoveFailure> {
        self.log.moves += 1;
        if let Some(limit) = self.rules.die_after_moves
            && self.log.moves >= limit
        {
            self.actor.hp_percent = 0;
            self.actor.dead = true;
            return Ok(());
        }
        if !self.walkable(to) {
            return Err(MoveFailure::NoPath);
        }
        let me = self.actor.position;
        if !options.ignore_monsters && self.monster_near_segment(me, to) {
            return Err(MoveFailure::MonstersInPath);
        }
        if !self.actor.can_teleport {
            let Some((route, _)) = self.route(me, to) else {
                return Err(MoveFailure::NoPath);
            };
            if self.closed_door_on(&route, &self.current.objects).is_some() {
                return Err(MoveFailure::Stuck);
            }
        }
        let stall = self.rules.stall_chance.clamp(0.0, 1.0);
        if stall > 0.0 && self.rng.gen_bool(stall) {
            trace!(target: "wayfarer::sim", "step to {to} swallowed");
            return Ok(());
        }
        self.actor.position = to;
        self.cross_boundary();
        Ok(())
    }

    async fn random_movement(&mut self) {
        self.log.nudges += 1;
        let me = self.actor.position;
        let options: Vec<Position> = (-NUDGE_RADIUS..=NUDGE_RADIUS)
            .flat_map(|dx| (-NUDGE_RADIUS..=NUDGE_RADIUS).map(move |dy| me.offset(dx, dy)))
            .filter(|p| *p != me && self.walkable(*p))
            .collect();
        if let Some(next) = options.choose(&mut self.rng) {
            self.actor.position = *next;
        }
    }

    async fn click_at(&mut self, position: Position) {
        self.log.clicks += 1;
        if self.route(self.actor.position, position).is_some() {
            self.actor.position = position;
        }
    }

    async fn interact(&mut self, id: ObjectId) -> Result<(), ServiceError> {
        *self.log.interactions.entry(id).or_default() += 1;
        let Some(object) = self.current.objects.iter().find(|o| o.id == id).copied() else {
            return Err(ServiceError::NotFound);
        };
        if self.actor.position.distance_to(object.position) > REACH {
            return Err(ServiceError::Rejected("out of reach".into()));
        }

        match self.links.get(&id).copied() {
            Some(Link::Pad(destination)) => {
                self.log.pad_hops += 1;
                self.actor.position = destination;
                return Ok(());
            }
            Some(Link::Portal(area)) => {
                return if self.enter(area) {
                    Ok(())
                } else {
                    Err(ServiceError::Unavailable(format!("{area} not loaded")))
                };
            }
            Some(Link::Spawns { code, at, leads_to }) if object.selectable => {
                let area = self.current.data.area;
                self.add_portal(area, at, code, leads_to);
            }
            _ => {}
        }

        if !object.selectable {
            return Ok(());
        }
        match object.kind {
            ObjectKind::Shrine { shrine } => self.apply_shrine(shrine),
            ObjectKind::Chest { .. } => self.log.chests_opened += 1,
            ObjectKind::Door => self.log.doors_opened += 1,
            _ => {}
        }
        if let Some(used) = self.current.objects.iter_mut().find(|o| o.id == id) {
            used.selectable = false;
        }
        Ok(())
    }

    async fn interact_entrance(&mut self, area: AreaId) -> Result<(), ServiceError> {
        self.log.entrances += 1;
        let me = self.actor.position;
        let Some(entrance) = self
            .current
            .adjacent
            .iter()
            .find(|a| a.area == area && a.is_entrance)
        else {
            return Err(ServiceError::NotFound);
        };
        if entrance.position.distance_to(me) > ENTRANCE_REACH {
            return Err(ServiceError::Rejected("entrance out of reach".into()));
        }
        if self.enter(area) {
            Ok(())
        } else {
            Err(ServiceError::Unavailable(format!("{area} not loaded")))
        }
    }

    async fn use_town_portal(&mut self) -> Result<(), ServiceError> {
        self.log.town_portals += 1;
        let portal = self.town_portal;
        match portal {
            Some(area) if self.enter(area) => Ok(()),
            _ => Err(ServiceError::Unavailable("no town portal".into())),
        }
    }
}

#[async_trait]
impl CombatService for SimWorld {
    async fn clear_area_around(
        &mut self,
        center: Position,
        radius: i32,
        filters: &[MonsterFilter],
    ) -> Result<(), ServiceError> {
        let before = self.current.monsters.len();
        self.current.monsters.retain(|m| {
            !(m.hostile
                && center.distance_to(m.position) <= radius
                && MonsterFilter::all_keep(filters, m))
        });
        let killed = before - self.current.monsters.len();
        self.log.monsters_killed += u32::try_from(killed).unwrap_or(u32::MAX);
        Ok(())
    }
}

#[async_trait]
impl LootService for SimWorld {
    async fn pick_up_items(&mut self, _radius: i32) -> Result<(), ServiceError> {
        self.log.loot_passes += 1;
        Ok(())
    }
}

#[async_trait]
impl PriorityGate for SimWorld {
    async fn checkpoint(&mut self) -> Turn {
        self.checkpoints += 1;
        tokio::task::yield_now().await;
        if self.rules.interrupt_after.is_some_and(|n| self.checkpoints > n) {
            return Turn::Interrupted;
        }
        if self.rules.tick_budget > 0 && self.checkpoints > self.rules.tick_budget {
            self.log.watchdog_tripped = true;
            return Turn::Interrupted;
        }
        Turn::Granted
    }
}
