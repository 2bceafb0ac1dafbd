//! ASCII area maps.
//!
//! ```text
//! #  wall            .  floor           @  actor start / arrival
//! G  goal marker     E  exit marker     D  door
//! S  experience shrine                  R  refill shrine
//! A  armor shrine (breaks curses)       c  chest   C  super chest
//! P  teleport pad (paired in reading order)
//! m  monster         M  elite monster
//! ```
//!
//! Every marker except `#` sits on a walkable tile.
use thiserror::Error;
use wayfarer_core::{ObjectKind, Position, ShrineKind, WalkGrid};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MapError {
    #[error("map is empty")]
    Empty,
    #[error("row {row} is {width} wide, expected {expected}")]
    Ragged {
        row: usize,
        width: usize,
        expected: usize,
    },
    #[error("unknown glyph '{glyph}' at {x},{y}")]
    UnknownGlyph { glyph: char, x: usize, y: usize },
    #[error("map has an unpaired teleport pad")]
    UnpairedPad,
}

/// Parsed map content, in grid-local coordinates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMap {
    pub grid: WalkGrid,
    pub start: Option<Position>,
    pub goal: Option<Position>,
    pub objects: Vec<(Position, ObjectKind)>,
    /// Monster positions with their elite flag.
    pub monsters: Vec<(Position, bool)>,
    pub exits: Vec<Position>,
}

impl ParsedMap {
    /// Parse a map. Leading/trailing blank lines are ignored; rows keep
    /// their indentation-free width.
    ///
    /// # Errors
    ///
    /// Returns [`MapError`] for empty or ragged maps, unknown glyphs, and an
    /// odd number of pads.
    pub fn parse(text: &str) -> Result<Self, MapError> {
        let rows: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        let Some(first) = rows.first() else {
            return Err(MapError::Empty);
        };
        let width = first.chars().count();
        let mut parsed = Self {
            grid: WalkGrid {
                width,
                height: rows.len(),
                cells: Vec::with_capacity(width * rows.len()),
            },
            ..Self::default()
        };

        let mut pads = 0;
        for (y, row) in rows.iter().enumerate() {
            let row_width = row.chars().count();
            if row_width != width {
                return Err(MapError::Ragged {
                    row: y,
                    width: row_width,
                    expected: width,
                });
            }
            for (x, glyph) in row.chars().enumerate() {
                let pos = local(x, y);
                parsed.grid.cells.push(glyph != '#');
                match glyph {
                    '#' | '.' => {}
                    '@' => parsed.start = Some(pos),
                    'G' => parsed.goal = Some(pos),
                    'E' => parsed.exits.push(pos),
                    'm' => parsed.monsters.push((pos, false)),
                    'M' => parsed.monsters.push((pos, true)),
                    'P' => {
                        pads += 1;
                        parsed.objects.push((pos, ObjectKind::TeleportPad));
                    }
                    other => {
                        let kind = object_kind(other).ok_or(MapError::UnknownGlyph {
                            glyph: other,
                            x,
                            y,
                        })?;
                        parsed.objects.push((pos, kind));
                    }
                }
            }
        }
        if pads % 2 != 0 {
            return Err(MapError::UnpairedPad);
        }
        Ok(parsed)
    }
}

fn object_kind(glyph: char) -> Option<ObjectKind> {
    let shrine = |shrine| Some(ObjectKind::Shrine { shrine });
    match glyph {
        'S' => shrine(ShrineKind::Experience),
        'R' => shrine(ShrineKind::Refill),
        'A' => shrine(ShrineKind::Armor),
        'c' => Some(ObjectKind::Chest { super_chest: false }),
        'C' => Some(ObjectKind::Chest { super_chest: true }),
        'D' => Some(ObjectKind::Door),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
const fn local(x: usize, y: usize) -> Position {
    Position::new(x as i32, y as i32)
}
