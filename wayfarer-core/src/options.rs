//! Per-call movement options.
use std::fmt;
use std::sync::Arc;

use crate::world::Monster;

/// Predicate that keeps a threat eligible for combat during clear passes.
#[derive(Clone)]
pub struct MonsterFilter {
    name: &'static str,
    keep: Arc<dyn Fn(&Monster) -> bool + Send + Sync>,
}

impl MonsterFilter {
    pub fn new(name: &'static str, keep: impl Fn(&Monster) -> bool + Send + Sync + 'static) -> Self {
        Self {
            name,
            keep: Arc::new(keep),
        }
    }

    /// Only elite/boss monsters.
    #[must_use]
    pub fn elites() -> Self {
        Self::new("elites", |m| m.elite)
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn keeps(&self, monster: &Monster) -> bool {
        (self.keep)(monster)
    }

    /// A monster is eligible when every filter keeps it.
    #[must_use]
    pub fn all_keep(filters: &[Self], monster: &Monster) -> bool {
        filters.iter().all(|f| f.keeps(monster))
    }
}

impl fmt::Debug for MonsterFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MonsterFilter").field(&self.name).finish()
    }
}

/// Immutable configuration for a single `move_to` call.
#[derive(Debug, Clone, Default)]
pub struct MoveOptions {
    /// Arrival threshold for the real target; `None` uses the default.
    pub finish_distance: Option<i32>,
    pub ignore_monsters: bool,
    pub ignore_items: bool,
    pub monster_filters: Vec<MonsterFilter>,
    /// Radius of the pre-emptive clear pass; `None` uses the configured one.
    pub clear_path_override: Option<i32>,
}

impl MoveOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_finish_distance(mut self, distance: i32) -> Self {
        self.finish_distance = Some(distance);
        self
    }

    #[must_use]
    pub const fn ignoring_monsters(mut self) -> Self {
        self.ignore_monsters = true;
        self
    }

    #[must_use]
    pub const fn ignoring_items(mut self) -> Self {
        self.ignore_items = true;
        self
    }

    #[must_use]
    pub fn with_monster_filter(mut self, filter: MonsterFilter) -> Self {
        self.monster_filters.push(filter);
        self
    }

    #[must_use]
    pub const fn with_clear_path_radius(mut self, radius: i32) -> Self {
        self.clear_path_override = Some(radius);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Position;

    #[test]
    fn filters_must_all_agree() {
        let elite = Monster {
            id: 1,
            position: Position::new(0, 0),
            hostile: true,
            elite: true,
        };
        let minion = Monster { elite: false, ..elite };
        let near = MonsterFilter::new("near", |m| m.position.x < 10);
        let filters = [MonsterFilter::elites(), near];
        assert!(MonsterFilter::all_keep(&filters, &elite));
        assert!(!MonsterFilter::all_keep(&filters, &minion));
        assert!(MonsterFilter::all_keep(&[], &minion));
    }

    #[test]
    fn builder_sets_overrides() {
        let opts = MoveOptions::new()
            .with_finish_distance(7)
            .ignoring_items()
            .with_clear_path_radius(20);
        assert_eq!(opts.finish_distance, Some(7));
        assert!(opts.ignore_items);
        assert!(!opts.ignore_monsters);
        assert_eq!(opts.clear_path_override, Some(20));
    }
}
