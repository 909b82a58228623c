//! Level compiler: turns a loosely-typed level description into a `World`.
//!
//! Level files come from disk and from level editors, so nothing in here
//! rejects input. Every field goes through a pure normalization function that
//! clamps or defaults it, and the tile grid is resolved once into `TileKind`
//! values so the simulation never re-reads raw symbols.

use crate::physics::Rect;
use crate::world::{Axis, MovingPlatform, TilePoint, World};
use serde::Deserialize;
use serde_json::{json, Value};
use shared::lenient::numeric;

pub const DEFAULT_TILE_SIZE: u32 = 64;
pub const MIN_TILE_SIZE: u32 = 16;
pub const MAX_TILE_SIZE: u32 = 128;
pub const DEFAULT_WORLD_NAME: &str = "Level 1";

/// Every symbol the tile layer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileKind {
    Empty,
    Ground,
    Block,
    LiftHorizontal,
    LiftVertical,
    ShallowWater,
    DeepWater,
}

impl TileKind {
    /// Upper-case aliases are accepted; anything unknown is empty space.
    pub fn from_symbol(symbol: char) -> Self {
        match symbol {
            '#' => TileKind::Ground,
            'b' | 'B' => TileKind::Block,
            'h' | 'H' => TileKind::LiftHorizontal,
            'v' | 'V' => TileKind::LiftVertical,
            's' | 'S' => TileKind::ShallowWater,
            'w' | 'W' => TileKind::DeepWater,
            _ => TileKind::Empty,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            TileKind::Empty => '.',
            TileKind::Ground => '#',
            TileKind::Block => 'b',
            TileKind::LiftHorizontal => 'h',
            TileKind::LiftVertical => 'v',
            TileKind::ShallowWater => 's',
            TileKind::DeepWater => 'w',
        }
    }

    pub fn is_solid(self) -> bool {
        matches!(self, TileKind::Ground | TileKind::Block)
    }

    pub fn is_water(self) -> bool {
        matches!(self, TileKind::ShallowWater | TileKind::DeepWater)
    }

    pub fn lift_axis(self) -> Option<Axis> {
        match self {
            TileKind::LiftHorizontal => Some(Axis::X),
            TileKind::LiftVertical => Some(Axis::Y),
            _ => None,
        }
    }
}

/// Floor and ceiling for the compiled grid dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelLimits {
    pub min_rows: usize,
    pub max_rows: usize,
    pub min_columns: usize,
    pub max_columns: usize,
}

impl Default for LevelLimits {
    fn default() -> Self {
        Self {
            min_rows: 12,
            max_rows: 120,
            min_columns: 24,
            max_columns: 220,
        }
    }
}

/// A level description exactly as it was read, before normalization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawLevel {
    pub name: Value,
    pub tile_size: Value,
    pub tiles: Value,
    pub decor: Value,
    pub spawn_tiles: Value,
    pub goal_tile: Value,
}

impl RawLevel {
    /// Never fails: a non-object value yields an empty description.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }

    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::from_value(value))
    }
}

fn rounded_index(value: &Value, fallback: usize, upper: usize) -> usize {
    let index = match numeric(value) {
        Some(number) => number.round().max(0.0).min(upper as f64) as usize,
        None => fallback,
    };
    index.min(upper)
}

pub fn normalize_tile_size(value: &Value) -> u32 {
    numeric(value)
        .map(|size| size.round().clamp(MIN_TILE_SIZE as f64, MAX_TILE_SIZE as f64) as u32)
        .unwrap_or(DEFAULT_TILE_SIZE)
}

pub fn normalize_name(value: &Value, fallback: &str) -> String {
    value
        .as_str()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

fn string_rows(value: &Value) -> Vec<&str> {
    value
        .as_array()
        .map(|rows| rows.iter().map(|row| row.as_str().unwrap_or("")).collect())
        .unwrap_or_default()
}

/// Resolves the tile layer into a rectangular grid of `TileKind`.
pub fn normalize_tiles(value: &Value, limits: &LevelLimits) -> Vec<Vec<TileKind>> {
    let raw_rows = string_rows(value);
    let rows = raw_rows
        .len()
        .clamp(limits.min_rows, limits.max_rows.max(limits.min_rows));
    let widest = raw_rows
        .iter()
        .map(|row| row.chars().count())
        .max()
        .unwrap_or(0);
    let columns = widest.clamp(limits.min_columns, limits.max_columns.max(limits.min_columns));

    (0..rows)
        .map(|y| {
            let source = raw_rows.get(y).copied().unwrap_or("");
            let mut row: Vec<TileKind> = source
                .chars()
                .take(columns)
                .map(TileKind::from_symbol)
                .collect();
            row.resize(columns, TileKind::Empty);
            row
        })
        .collect()
}

/// Decor digits 1-6, erased wherever the tile layer is not empty.
pub fn normalize_decor(value: &Value, tiles: &[Vec<TileKind>]) -> Vec<String> {
    let raw_rows = string_rows(value);
    tiles
        .iter()
        .enumerate()
        .map(|(y, tile_row)| {
            let mut source = raw_rows.get(y).copied().unwrap_or("").chars();
            tile_row
                .iter()
                .map(|tile| {
                    let symbol = source.next().unwrap_or('.');
                    if *tile == TileKind::Empty && ('1'..='6').contains(&symbol) {
                        symbol
                    } else {
                        '.'
                    }
                })
                .collect()
        })
        .collect()
}

pub fn normalize_spawn_tiles(value: &Value, columns: usize, rows: usize) -> [TilePoint; 2] {
    let default_y = rows.saturating_sub(8);
    let defaults = [TilePoint { x: 2, y: default_y }, TilePoint { x: 4, y: default_y }];
    let entries = value.as_array();
    let max_x = columns.saturating_sub(1);
    let max_y = rows.saturating_sub(1);

    [0, 1].map(|index| {
        let fallback = defaults[index];
        match entries.and_then(|entries| entries.get(index)) {
            Some(entry) if !entry.is_null() => TilePoint {
                x: rounded_index(&entry["x"], fallback.x, max_x),
                y: rounded_index(&entry["y"], fallback.y, max_y),
            },
            _ => TilePoint {
                x: fallback.x.min(max_x),
                y: fallback.y.min(max_y),
            },
        }
    })
}

/// The goal is always a single tile regardless of the requested size.
pub fn normalize_goal_tile(value: &Value, columns: usize, rows: usize) -> TilePoint {
    let max_x = columns.saturating_sub(1);
    let max_y = rows.saturating_sub(1);
    TilePoint {
        x: rounded_index(&value["x"], columns.saturating_sub(4), max_x),
        y: rounded_index(&value["y"], rows.saturating_sub(9), max_y),
    }
}

pub fn compile(level: &RawLevel) -> World {
    compile_with_limits(level, &LevelLimits::default())
}

pub fn compile_with_limits(level: &RawLevel, limits: &LevelLimits) -> World {
    let tile_size = normalize_tile_size(&level.tile_size) as f32;
    let grid = normalize_tiles(&level.tiles, limits);
    let rows = grid.len();
    let columns = grid.first().map(Vec::len).unwrap_or(0);
    let decor = normalize_decor(&level.decor, &grid);
    let spawn_tiles = normalize_spawn_tiles(&level.spawn_tiles, columns, rows);
    let goal_tile = normalize_goal_tile(&level.goal_tile, columns, rows);

    let mut solids = Vec::new();
    let mut water = Vec::new();
    let mut platforms = Vec::new();

    for (y, row) in grid.iter().enumerate() {
        for (x, tile) in row.iter().enumerate() {
            let rect = Rect::new(
                x as f32 * tile_size,
                y as f32 * tile_size,
                tile_size,
                tile_size,
            );
            if tile.is_solid() {
                solids.push(rect);
            } else if tile.is_water() {
                water.push(rect);
            } else if let Some(axis) = tile.lift_axis() {
                platforms.push(MovingPlatform::lift(
                    platforms.len(),
                    axis,
                    x,
                    y,
                    tile_size,
                    columns,
                    rows,
                ));
            }
        }
    }

    let tiles = grid
        .iter()
        .map(|row| row.iter().map(|tile| tile.symbol()).collect())
        .collect();

    World::new(
        normalize_name(&level.name, DEFAULT_WORLD_NAME),
        tile_size,
        tiles,
        decor,
        spawn_tiles,
        goal_tile,
        solids,
        water,
        platforms,
    )
}

/// Built-in level used whenever a level file cannot be loaded.
pub fn default_level() -> RawLevel {
    RawLevel::from_value(json!({
        "name": "Forest Blocks",
        "tileSize": 64,
        "spawnTiles": [{ "x": 2, "y": 8 }, { "x": 4, "y": 8 }],
        "goalTile": { "x": 32, "y": 7, "width": 1, "height": 1 },
        "tiles": [
            "....................................",
            "....................................",
            "....................................",
            "..........h.............v...........",
            "..............................####..",
            "....................#####...........",
            ".............#####..................",
            "......#####.........................",
            ".................####...............",
            "####################################",
            "......................#####.........",
            "#######.......########.......#######",
            "####################################",
            "####################################",
            "####################################",
            "####################################"
        ],
        "decor": [
            "....................................",
            "....................................",
            "....................................",
            "....................................",
            "....................................",
            "....................................",
            "...........1...............3........",
            "....................................",
            "...1....2....3........5....6........",
            "....................................",
            "......4........5....................",
            "....................................",
            "....................................",
            "....................................",
            "....................................",
            "...................................."
        ]
    }))
}
