//! Scripted in-memory world for unit tests.
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};

use crate::config::NavConfig;
use crate::constants::DEFAULT_FINISH_DISTANCE;
use crate::context::ActorContext;
use crate::error::{MoveFailure, ServiceError};
use crate::geometry::{Path, Position};
use crate::options::{MonsterFilter, MoveOptions};
use crate::ports::{
    CombatService, LootService, MovementInput, PathService, Perception, PriorityGate, Turn,
};
use crate::world::{
    ActorState, AdjacentArea, AreaData, AreaId, Interactable, Monster, ObjectId, ObjectKind,
    Snapshot, WalkGrid,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Refresh,
    Checkpoint,
    Move(Position),
    Nudge,
    Click(Position),
    Interact(ObjectId),
    Entrance(AreaId),
    TownPortal,
    Clear(Position, i32),
    Loot,
}

#[derive(Debug, Clone)]
pub struct AreaState {
    pub data: AreaData,
    pub adjacent: Vec<AdjacentArea>,
    pub objects: Vec<Interactable>,
    pub monsters: Vec<Monster>,
    pub arrival: Position,
}

impl AreaState {
    pub fn open(area: AreaId, offset: Position, width: usize, height: usize) -> Self {
        Self {
            data: AreaData {
                area,
                is_town: false,
                offset,
                grid: Some(WalkGrid::open(width, height)),
            },
            adjacent: Vec::new(),
            objects: Vec::new(),
            monsters: Vec::new(),
            arrival: offset.offset(1, 1),
        }
    }

    pub fn town(mut self) -> Self {
        self.data.is_town = true;
        self
    }
}

type ViewHook = Box<dyn FnOnce(&mut Snapshot) + Send + Sync>;

pub struct ScriptedWorld {
    pub actor: ActorState,
    current: AreaId,
    areas: HashMap<AreaId, AreaState>,
    pub calls: Vec<Call>,
    next_object: u32,
    refreshes: u32,
    checkpoints: u32,
    die_on_refresh: Option<u32>,
    interrupt_at: Option<u32>,
    views: VecDeque<Option<ViewHook>>,
    move_failures: VecDeque<MoveFailure>,
    entrance_failures: u32,
    frozen: bool,
    no_paths: bool,
    walkable_fallback: bool,
    jammed: HashSet<ObjectId>,
    pad_links: HashMap<ObjectId, Position>,
    portal_links: HashMap<ObjectId, AreaId>,
    town_portal_to: Option<AreaId>,
}

impl ScriptedWorld {
    pub fn open_field(width: usize, height: usize, start: Position) -> Self {
        Self::open_field_in(AreaId(1), width, height, start)
    }

    pub fn open_field_in(id: AreaId, width: usize, height: usize, start: Position) -> Self {
        let area = AreaState::open(id, Position::default(), width, height);
        let mut areas = HashMap::new();
        areas.insert(id, area);
        Self {
            actor: ActorState {
                position: start,
                ..ActorState::default()
            },
            current: id,
            areas,
            calls: Vec::new(),
            next_object: 1,
            refreshes: 0,
            checkpoints: 0,
            die_on_refresh: None,
            interrupt_at: None,
            views: VecDeque::new(),
            move_failures: VecDeque::new(),
            entrance_failures: 0,
            frozen: false,
            no_paths: false,
            walkable_fallback: false,
            jammed: HashSet::new(),
            pad_links: HashMap::new(),
            portal_links: HashMap::new(),
            town_portal_to: None,
        }
    }

    fn area(&self) -> &AreaState {
        &self.areas[&self.current]
    }

    fn area_mut(&mut self) -> &mut AreaState {
        self.areas
            .get_mut(&self.current)
            .expect("current area registered")
    }

    pub fn current_area(&self) -> AreaId {
        self.current
    }

    pub fn add_area(&mut self, area: AreaState) {
        self.areas.insert(area.data.area, area);
    }

    pub fn area_state_mut(&mut self, area: AreaId) -> &mut AreaState {
        self.areas.get_mut(&area).expect("area registered")
    }

    /// Make the current area a town.
    pub fn make_town(&mut self) {
        self.area_mut().data.is_town = true;
    }

    pub fn connect(&mut self, from: AreaId, to: AreaId, position: Position, is_entrance: bool) {
        self.area_state_mut(from).adjacent.push(AdjacentArea {
            area: to,
            position,
            is_entrance,
            landmarks: Vec::new(),
        });
    }

    pub fn add_object(&mut self, position: Position, kind: ObjectKind) -> ObjectId {
        let area = self.current;
        self.add_object_in(area, position, kind)
    }

    pub fn add_object_in(&mut self, area: AreaId, position: Position, kind: ObjectKind) -> ObjectId {
        let id = ObjectId(self.next_object);
        self.next_object += 1;
        self.area_state_mut(area).objects.push(Interactable {
            id,
            position,
            selectable: true,
            kind,
        });
        id
    }

    pub fn add_monster(&mut self, position: Position) {
        let id = u32::try_from(self.area().monsters.len()).unwrap_or(0) + 1;
        self.area_mut().monsters.push(Monster {
            id,
            position,
            hostile: true,
            elite: false,
        });
    }

    pub fn object(&self, id: ObjectId) -> Option<&Interactable> {
        self.area().objects.iter().find(|o| o.id == id)
    }

    /// The truth, without scripted view edits.
    pub fn view(&self) -> Snapshot {
        let area = self.area();
        Snapshot {
            actor: self.actor.clone(),
            area: area.data.clone(),
            adjacent: area.adjacent.clone(),
            objects: area.objects.clone(),
            monsters: area.monsters.clone(),
        }
    }

    pub fn die_on_refresh(&mut self, n: u32) {
        self.die_on_refresh = Some(n);
    }

    pub fn interrupt_at(&mut self, checkpoint: u32) {
        self.interrupt_at = Some(checkpoint);
    }

    /// Queue per-refresh edits of the reported snapshot; `None` entries
    /// report the truth.
    pub fn script_views(&mut self, hooks: Vec<Option<ViewHook>>) {
        self.views.extend(hooks);
    }

    pub fn fail_moves(&mut self, failures: impl IntoIterator<Item = MoveFailure>) {
        self.move_failures.extend(failures);
    }

    /// Reject the next `n` entrance interactions.
    pub fn fail_entrances(&mut self, n: u32) {
        self.entrance_failures = n;
    }

    /// Block column `x` of the current area between `from_y` and `to_y`.
    pub fn wall_column(&mut self, x: usize, from_y: usize, to_y: usize) {
        if let Some(grid) = self.area_mut().data.grid.as_mut() {
            for y in from_y..=to_y.min(grid.height - 1) {
                grid.cells[y * grid.width + x] = false;
            }
        }
    }

    pub fn set_landmarks(&mut self, from: AreaId, to: AreaId, landmarks: Vec<Position>) {
        if let Some(adjacent) = self
            .area_state_mut(from)
            .adjacent
            .iter_mut()
            .find(|a| a.area == to)
        {
            adjacent.landmarks = landmarks;
        }
    }

    /// Move the actor into `area` right away.
    pub fn place_in(&mut self, area: AreaId) {
        self.enter(area);
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn block_paths(&mut self) {
        self.no_paths = true;
    }

    pub fn allow_walkable_fallback(&mut self) {
        self.walkable_fallback = true;
    }

    pub fn jam(&mut self, id: ObjectId) {
        self.jammed.insert(id);
    }

    pub fn link_pad(&mut self, pad: ObjectId, destination: Position) {
        self.pad_links.insert(pad, destination);
    }

    pub fn link_portal(&mut self, portal: ObjectId, area: AreaId) {
        self.portal_links.insert(portal, area);
    }

    pub fn town_portal_to(&mut self, area: AreaId) {
        self.town_portal_to = Some(area);
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn moves(&self) -> Vec<Position> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Move(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    fn enter(&mut self, area: AreaId) -> bool {
        let Some(next) = self.areas.get(&area) else {
            return false;
        };
        self.actor.position = next.arrival;
        self.current = area;
        true
    }

    /// Open boundaries switch areas once the actor is within
    /// arrival range of the crossing point.
    fn cross_boundary(&mut self) {
        let me = self.actor.position;
        let crossing = self
            .area()
            .adjacent
            .iter()
            .find(|a| !a.is_entrance && a.position.distance_to(me) <= DEFAULT_FINISH_DISTANCE)
            .map(|a| a.area);
        if let Some(area) = crossing {
            self.enter(area);
        }
    }

    fn walkable(&self, pos: Position) -> bool {
        let data = &self.area().data;
        let Some(grid) = &data.grid else {
            return false;
        };
        grid.is_walkable(pos.x - data.offset.x, pos.y - data.offset.y)
    }

    fn line(from: Position, to: Position) -> Vec<Position> {
        let (mut x, mut y) = (from.x, from.y);
        let dx = (to.x - from.x).abs();
        let dy = -(to.y - from.y).abs();
        let sx = if from.x < to.x { 1 } else { -1 };
        let sy = if from.y < to.y { 1 } else { -1 };
        let mut err = dx + dy;
        let mut out = vec![Position::new(x, y)];
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
            out.push(Position::new(x, y));
        }
        out
    }
}

impl PathService for ScriptedWorld {
    fn get_path(&self, from: Position, to: Position) -> Option<Path> {
        if self.no_paths {
            return None;
        }
        let line = Self::line(from, to);
        if !line.iter().skip(1).all(|p| self.walkable(*p)) {
            return None;
        }
        let offset = self.area().data.offset;
        let local = line
            .iter()
            .map(|p| p.offset(-offset.x, -offset.y))
            .collect::<Vec<_>>();
        let len = i32::try_from(local.len()).unwrap_or(i32::MAX);
        Path::new(local, offset, len)
    }

    fn has_door_between(
        &self,
        from: Position,
        to: Position,
        objects: &[Interactable],
    ) -> Option<Interactable> {
        let line = Self::line(from, to);
        objects
            .iter()
            .find(|o| o.is_door() && o.selectable && line.contains(&o.position))
            .copied()
    }

    fn closest_walkable_path(&self, from: Position, to: Position) -> Option<Path> {
        if !self.walkable_fallback {
            return None;
        }
        let stop = Position::new(to.x - (to.x - from.x).signum(), to.y);
        Path::local(Self::line(from, stop))
    }

    fn line_of_sight(&self, _from: Position, _to: Position) -> bool {
        true
    }

    fn last_path_index_on_screen(&self, path: &Path) -> usize {
        path.last_index().min(25)
    }
}

#[async_trait]
impl Perception for ScriptedWorld {
    async fn refresh(&mut self) -> Snapshot {
        self.refreshes += 1;
        self.calls.push(Call::Refresh);
        if self.die_on_refresh.is_some_and(|n| self.refreshes >= n) {
            self.actor.hp_percent = 0;
        }
        let mut snapshot = self.view();
        if let Some(Some(hook)) = self.views.pop_front() {
            hook(&mut snapshot);
        }
        snapshot
    }
}

#[async_trait]
impl MovementInput for ScriptedWorld {
    async fn move_step(&mut self, to: Position, _options: &MoveOptions) -> Result<(), MoveFailure> {
        self.calls.push(Call::Move(to));
        if let Some(failure) = self.move_failures.pop_front() {
            return Err(failure);
        }
        if !self.frozen {
            self.actor.position = to;
            self.cross_boundary();
        }
        Ok(())
    }

    async fn random_movement(&mut self) {
        self.calls.push(Call::Nudge);
        let next = self.actor.position.offset(1, 0);
        if !self.frozen && self.walkable(next) {
            self.actor.position = next;
        }
    }

    async fn click_at(&mut self, position: Position) {
        self.calls.push(Call::Click(position));
    }

    async fn interact(&mut self, id: ObjectId) -> Result<(), ServiceError> {
        self.calls.push(Call::Interact(id));
        if self.jammed.contains(&id) {
            return Err(ServiceError::Rejected("jammed".into()));
        }
        if let Some(dest) = self.pad_links.get(&id).copied() {
            self.actor.position = dest;
            return Ok(());
        }
        if let Some(area) = self.portal_links.get(&id).copied() {
            self.enter(area);
            return Ok(());
        }
        let obj = self
            .area_mut()
            .objects
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(ServiceError::NotFound)?;
        obj.selectable = false;
        Ok(())
    }

    async fn interact_entrance(&mut self, area: AreaId) -> Result<(), ServiceError> {
        self.calls.push(Call::Entrance(area));
        if self.entrance_failures > 0 {
            self.entrance_failures -= 1;
            return Err(ServiceError::Rejected("entrance busy".into()));
        }
        let adjacent = self.area().adjacent.iter().any(|a| a.area == area);
        if adjacent && self.enter(area) {
            Ok(())
        } else {
            Err(ServiceError::NotFound)
        }
    }

    async fn use_town_portal(&mut self) -> Result<(), ServiceError> {
        self.calls.push(Call::TownPortal);
        let portal = self.town_portal_to;
        match portal {
            Some(area) if self.enter(area) => Ok(()),
            _ => Err(ServiceError::Unavailable("no portal".into())),
        }
    }
}

#[async_trait]
impl CombatService for ScriptedWorld {
    async fn clear_area_around(
        &mut self,
        center: Position,
        radius: i32,
        filters: &[MonsterFilter],
    ) -> Result<(), ServiceError> {
        self.calls.push(Call::Clear(center, radius));
        self.area_mut().monsters.retain(|m| {
            !(m.hostile
                && center.distance_to(m.position) <= radius
                && MonsterFilter::all_keep(filters, m))
        });
        Ok(())
    }
}

#[async_trait]
impl LootService for ScriptedWorld {
    async fn pick_up_items(&mut self, _radius: i32) -> Result<(), ServiceError> {
        self.calls.push(Call::Loot);
        Ok(())
    }
}

#[async_trait]
impl PriorityGate for ScriptedWorld {
    async fn checkpoint(&mut self) -> Turn {
        self.checkpoints += 1;
        self.calls.push(Call::Checkpoint);
        if self.interrupt_at.is_some_and(|n| self.checkpoints >= n) {
            Turn::Interrupted
        } else {
            Turn::Granted
        }
    }
}

/// Context with default configuration around a scripted world.
pub fn actor(world: ScriptedWorld) -> ActorContext<ScriptedWorld> {
    ActorContext::new("test-actor", NavConfig::default(), world)
}
