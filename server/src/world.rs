//! Compiled level geometry and the kinematic platform driver.

use crate::physics::{Rect, Vector2};
use shared::{
    round2, PlatformKind, PlatformSnapshot, Point, RectSnapshot, WorldPayload, LIFT_SPEED,
    LIFT_TRAVEL_TILES, PLATFORM_SIDE_INSET,
};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// A one-tile lift oscillating along a single axis between two bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct MovingPlatform {
    pub id: String,
    pub kind: PlatformKind,
    pub axis: Axis,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
    /// +1 or -1
    pub direction: f32,
    pub speed: f32,
    /// Displacement actually achieved during the last tick.
    pub dx: f32,
    pub dy: f32,
}

impl MovingPlatform {
    /// Builds the lift for the tile at (`tile_x`, `tile_y`).
    ///
    /// The travel window spans `LIFT_TRAVEL_TILES` in both directions along
    /// `axis`, clipped so the lift never leaves a `columns` x `rows` grid.
    pub fn lift(
        index: usize,
        axis: Axis,
        tile_x: usize,
        tile_y: usize,
        tile_size: f32,
        columns: usize,
        rows: usize,
    ) -> Self {
        let base_x = tile_x as f32 * tile_size;
        let base_y = tile_y as f32 * tile_size;
        let world_max_x = (columns as f32 * tile_size - tile_size).max(0.0);
        let world_max_y = (rows as f32 * tile_size - tile_size).max(0.0);
        let travel = LIFT_TRAVEL_TILES * tile_size;

        let (min_x, max_x) = match axis {
            Axis::X => ((base_x - travel).max(0.0), (base_x + travel).min(world_max_x)),
            Axis::Y => (base_x, base_x),
        };
        let (min_y, max_y) = match axis {
            Axis::Y => ((base_y - travel).max(0.0), (base_y + travel).min(world_max_y)),
            Axis::X => (base_y, base_y),
        };

        Self {
            id: format!("lift-{}", index),
            kind: match axis {
                Axis::X => PlatformKind::LiftHorizontal,
                Axis::Y => PlatformKind::LiftVertical,
            },
            axis,
            x: base_x,
            y: base_y,
            width: tile_size,
            height: tile_size,
            min_x,
            max_x,
            min_y,
            max_y,
            direction: 1.0,
            speed: LIFT_SPEED,
            dx: 0.0,
            dy: 0.0,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    /// Where the platform was before the last tick's displacement.
    pub fn previous_rect(&self) -> Rect {
        self.rect().translated(-self.dx, -self.dy)
    }

    pub fn is_stationary(&self) -> bool {
        match self.axis {
            Axis::X => self.max_x <= self.min_x,
            Axis::Y => self.max_y <= self.min_y,
        }
    }

    /// Moves one step along the axis, bouncing off the travel bounds.
    pub fn advance(&mut self, dt: f32) {
        self.dx = 0.0;
        self.dy = 0.0;
        if self.is_stationary() {
            return;
        }

        let (position, min, max) = match self.axis {
            Axis::X => (self.x, self.min_x, self.max_x),
            Axis::Y => (self.y, self.min_y, self.max_y),
        };

        let mut next = position + self.direction * self.speed * dt;
        if next >= max {
            next = max;
            self.direction = -1.0;
        } else if next <= min {
            next = min;
            self.direction = 1.0;
        }

        match self.axis {
            Axis::X => {
                self.dx = next - self.x;
                self.x = next;
            }
            Axis::Y => {
                self.dy = next - self.y;
                self.y = next;
            }
        }
    }

    pub fn snapshot(&self) -> PlatformSnapshot {
        PlatformSnapshot {
            id: self.id.clone(),
            kind: self.kind,
            x: round2(self.x),
            y: round2(self.y),
            width: self.width,
            height: self.height,
        }
    }
}

/// Tile coordinates inside the level grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilePoint {
    pub x: usize,
    pub y: usize,
}

/// Geometry of one room, built by the level compiler.
///
/// Everything except the moving platforms stays fixed after compilation.
#[derive(Debug, Clone)]
pub struct World {
    pub name: String,
    pub tile_size: f32,
    pub rows: usize,
    pub columns: usize,
    pub width: f32,
    pub height: f32,
    pub tiles: Vec<String>,
    pub decor: Vec<String>,
    pub player_size: f32,
    pub spawn_tiles: [TilePoint; 2],
    pub spawn: [Vector2; 2],
    pub goal_tile: TilePoint,
    pub goal: Rect,
    pub solids: Vec<Rect>,
    pub water: Vec<Rect>,
    pub platforms: Vec<MovingPlatform>,
    platform_index: HashMap<String, usize>,
}

impl World {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: String,
        tile_size: f32,
        tiles: Vec<String>,
        decor: Vec<String>,
        spawn_tiles: [TilePoint; 2],
        goal_tile: TilePoint,
        solids: Vec<Rect>,
        water: Vec<Rect>,
        platforms: Vec<MovingPlatform>,
    ) -> Self {
        let rows = tiles.len();
        let columns = tiles.first().map(|row| row.len()).unwrap_or(0);
        let player_size = tile_size;
        let spawn = spawn_tiles.map(|tile| {
            Vector2::new(
                tile.x as f32 * tile_size + (tile_size - player_size) * 0.5,
                tile.y as f32 * tile_size,
            )
        });
        let goal = Rect::new(
            goal_tile.x as f32 * tile_size,
            goal_tile.y as f32 * tile_size,
            tile_size,
            tile_size,
        );
        let platform_index = platforms
            .iter()
            .enumerate()
            .map(|(index, platform)| (platform.id.clone(), index))
            .collect();

        Self {
            name,
            tile_size,
            rows,
            columns,
            width: columns as f32 * tile_size,
            height: rows as f32 * tile_size,
            tiles,
            decor,
            player_size,
            spawn_tiles,
            spawn,
            goal_tile,
            goal,
            solids,
            water,
            platforms,
            platform_index,
        }
    }

    /// Advances every moving platform by one tick.
    pub fn advance_platforms(&mut self, dt: f32) {
        for platform in &mut self.platforms {
            platform.advance(dt);
        }
    }

    pub fn platform(&self, id: &str) -> Option<&MovingPlatform> {
        self.platform_index
            .get(id)
            .and_then(|index| self.platforms.get(*index))
    }

    pub fn spawn_point(&self, slot: usize) -> Vector2 {
        self.spawn.get(slot).copied().unwrap_or(self.spawn[0])
    }

    pub fn collides_with_solid(&self, rect: &Rect) -> bool {
        self.solids.iter().any(|solid| rect.intersects(solid))
    }

    pub fn is_in_water(&self, rect: &Rect) -> bool {
        self.water.iter().any(|zone| rect.intersects(zone))
    }

    /// Highest water top among water tiles under the inset horizontal extent of `rect`.
    pub fn water_surface_at(&self, rect: &Rect) -> Option<f32> {
        self.water
            .iter()
            .filter(|zone| rect.overlaps_horizontally(zone, PLATFORM_SIDE_INSET))
            .map(|zone| zone.y)
            .reduce(f32::min)
    }

    pub fn platform_snapshots(&self) -> Vec<PlatformSnapshot> {
        self.platforms.iter().map(MovingPlatform::snapshot).collect()
    }

    pub fn payload(&self) -> WorldPayload {
        WorldPayload {
            name: self.name.clone(),
            width: self.width,
            height: self.height,
            tile_size: self.tile_size as u32,
            rows: self.rows,
            columns: self.columns,
            tiles: self.tiles.clone(),
            decor: self.decor.clone(),
            spawn: self
                .spawn
                .iter()
                .map(|point| Point {
                    x: point.x,
                    y: point.y,
                })
                .collect(),
            goal: RectSnapshot {
                x: self.goal.x,
                y: self.goal.y,
                width: self.goal.width,
                height: self.goal.height,
            },
            moving_platforms: self.platform_snapshots(),
        }
    }
}
