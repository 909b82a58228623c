//! Per-player integrator and collision resolver.

use crate::physics::{Overlap, Rect, Vector2};
use crate::world::{MovingPlatform, World};
use log::debug;
use shared::{
    round2, ClientId, InputState, PlayerSnapshot, ACCEL, AIR_CONTROL, FRICTION, GRAVITY,
    JUMP_SPEED, MAX_FALL_SPEED, MAX_SHARED_TETHER_MID_AIR_JUMPS, MAX_SPEED, PIT_DEPTH,
    PLATFORM_CONTACT_EPSILON, PLATFORM_SIDE_INSET, WATER_FALL_SPEED_MULTIPLIER,
    WATER_GRAVITY_MULTIPLIER, WATER_JUMP_SPEED_MULTIPLIER, WATER_MOVE_SPEED_MULTIPLIER,
};

/// Mid-air tether jumps shared by both players of a room.
///
/// Refilled by the room whenever either player touches the ground.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TetherJumpBudget {
    used: u32,
}

impl TetherJumpBudget {
    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn remaining(&self) -> u32 {
        MAX_SHARED_TETHER_MID_AIR_JUMPS.saturating_sub(self.used)
    }

    pub fn has_remaining(&self) -> bool {
        self.used < MAX_SHARED_TETHER_MID_AIR_JUMPS
    }

    pub fn consume(&mut self) {
        self.used += 1;
    }

    pub fn reset(&mut self) {
        self.used = 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SolidPass {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: ClientId,
    pub slot: usize,
    pub profile: usize,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub width: f32,
    pub height: f32,
    pub on_ground: bool,
    pub jump_held: bool,
    pub tether_jump_eligible: bool,
    /// Lift the player is standing on, resolved by id every tick.
    pub support_platform_id: Option<String>,
    /// Lift ignored by semisolid landing until the end of the current tick.
    pub skip_semisolid_platform_id: Option<String>,
    pub in_water: bool,
    pub water_exit_jump_available: bool,
    pub water_exit_surface_y: Option<f32>,
    pub goal_locked: bool,
    pub goal_lock: Vector2,
    pub input: InputState,
}

impl Player {
    /// Creates a player at the spawn point of `slot`.
    pub fn new(id: ClientId, slot: usize, profile: usize, name: String, world: &World) -> Self {
        let spawn = world.spawn_point(slot);
        let mut player = Self {
            id,
            slot,
            profile,
            name,
            x: spawn.x,
            y: spawn.y,
            vx: 0.0,
            vy: 0.0,
            width: world.player_size,
            height: world.player_size,
            on_ground: false,
            jump_held: false,
            tether_jump_eligible: false,
            support_platform_id: None,
            skip_semisolid_platform_id: None,
            in_water: false,
            water_exit_jump_available: false,
            water_exit_surface_y: None,
            goal_locked: false,
            goal_lock: Vector2::default(),
            input: InputState::default(),
        };
        player.nudge_out_of_solids(world);
        player
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub fn center(&self) -> Vector2 {
        self.rect().center()
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Steps upward one tile at a time while the spawn overlaps a solid.
    fn nudge_out_of_solids(&mut self, world: &World) {
        let step = world.tile_size.max(1.0);
        let mut attempts = world.rows.max(2);
        while attempts > 0 && world.collides_with_solid(&self.rect()) {
            self.y = (self.y - step).max(0.0);
            attempts -= 1;
        }
    }

    /// Puts the player back on its spawn with every transient flag cleared.
    pub fn reset(&mut self, world: &World) {
        let spawn = world.spawn_point(self.slot);
        self.x = spawn.x;
        self.y = spawn.y;
        self.nudge_out_of_solids(world);
        self.vx = 0.0;
        self.vy = 0.0;
        self.on_ground = false;
        self.jump_held = false;
        self.tether_jump_eligible = false;
        self.support_platform_id = None;
        self.skip_semisolid_platform_id = None;
        self.clear_water_state();
        self.goal_locked = false;
        self.goal_lock = Vector2::default();
        self.input = InputState::default();
    }

    fn clear_water_state(&mut self) {
        self.in_water = false;
        self.water_exit_jump_available = false;
        self.water_exit_surface_y = None;
    }

    pub fn is_inside(&self, goal: &Rect) -> bool {
        goal.contains(self.center())
    }

    /// Freezes the player where it stands. Locking an already locked player
    /// keeps the original lock point.
    pub fn lock_at_goal(&mut self) {
        if self.goal_locked {
            return;
        }
        self.goal_locked = true;
        self.goal_lock = Vector2::new(self.x, self.y);
        self.vx = 0.0;
        self.vy = 0.0;
        self.input = InputState::default();
    }

    pub fn pin_to_goal_lock(&mut self) {
        self.x = self.goal_lock.x;
        self.y = self.goal_lock.y;
        self.vx = 0.0;
        self.vy = 0.0;
        // Also drops ground contact; locked players never run physics, so
        // nothing reads it until the round resets.
        self.on_ground = false;
        self.support_platform_id = None;
        self.clear_water_state();
    }

    /// Advances the player by one tick.
    ///
    /// A mid-air tether jump draws from `budget`.
    pub fn update(&mut self, dt: f32, world: &World, budget: &mut TetherJumpBudget) {
        if self.goal_locked {
            self.pin_to_goal_lock();
            return;
        }

        self.apply_platform_carry(world);
        self.refresh_water_state(world);

        let water_move = if self.in_water {
            WATER_MOVE_SPEED_MULTIPLIER
        } else {
            1.0
        };
        let accel = if self.on_ground {
            ACCEL
        } else {
            ACCEL * AIR_CONTROL
        } * water_move;

        match self.input.direction() {
            -1 => self.vx -= accel * dt,
            1 => self.vx += accel * dt,
            _ if self.on_ground => self.vx *= (1.0 - FRICTION * dt).max(0.0),
            _ => {}
        }

        let gravity = if self.in_water {
            GRAVITY * WATER_GRAVITY_MULTIPLIER
        } else {
            GRAVITY
        };
        let max_speed = MAX_SPEED * water_move;
        let max_fall = if self.in_water {
            MAX_FALL_SPEED * WATER_FALL_SPEED_MULTIPLIER
        } else {
            MAX_FALL_SPEED
        };
        self.vx = self.vx.clamp(-max_speed, max_speed);
        self.vy = (self.vy + gravity * dt).clamp(-MAX_FALL_SPEED, max_fall);

        self.try_jump(world, budget);

        self.x += self.vx * dt;
        self.resolve_solids(SolidPass::Horizontal, world);

        let previous_bottom = self.bottom();
        let previous_support = self.support_platform_id.clone();
        self.y += self.vy * dt;
        self.on_ground = false;
        self.support_platform_id = None;
        self.resolve_solids(SolidPass::Vertical, world);
        self.resolve_semisolid_landing(world, previous_bottom, previous_support.as_deref());

        self.keep_in_bounds(world);
        self.refresh_water_state(world);
    }

    fn try_jump(&mut self, world: &World, budget: &mut TetherJumpBudget) {
        let can_tether_jump = self.tether_jump_eligible && self.vy >= 0.0 && budget.has_remaining();
        let can_water_jump = self.in_water;
        let can_water_exit_jump = !self.on_ground
            && !self.in_water
            && self.water_exit_jump_available
            && self.is_within_water_exit_jump_height(world);

        let rising_edge = self.input.jump && !self.jump_held;
        if rising_edge
            && (self.on_ground || can_tether_jump || can_water_jump || can_water_exit_jump)
        {
            let used_tether_jump =
                !self.on_ground && !can_water_jump && !can_water_exit_jump && can_tether_jump;
            self.vy = if can_water_jump {
                -JUMP_SPEED * WATER_JUMP_SPEED_MULTIPLIER
            } else {
                -JUMP_SPEED
            };
            self.on_ground = false;
            self.support_platform_id = None;
            if can_water_exit_jump {
                self.water_exit_jump_available = false;
                self.water_exit_surface_y = None;
            }
            if used_tether_jump {
                budget.consume();
            }
        }
        self.jump_held = self.input.jump;
    }

    /// Rides the supporting lift, or falls off it when the ride would crush.
    pub fn apply_platform_carry(&mut self, world: &World) {
        let Some(support_id) = self.support_platform_id.as_deref() else {
            return;
        };
        let Some(platform) = world.platform(support_id) else {
            self.support_platform_id = None;
            return;
        };

        let previous = platform.previous_rect();
        let was_on_top = self
            .rect()
            .overlaps_horizontally(&previous, PLATFORM_SIDE_INSET)
            && (self.bottom() - previous.y).abs() <= PLATFORM_CONTACT_EPSILON;
        if !was_on_top {
            self.support_platform_id = None;
            return;
        }

        let carried = self.rect().translated(platform.dx, platform.dy);
        if world.collides_with_solid(&carried) {
            debug!("Player {} dropped off {} to avoid a crush", self.id, platform.id);
            self.on_ground = false;
            self.support_platform_id = None;
            self.skip_semisolid_platform_id = Some(platform.id.clone());
            self.push_below_overhead_solids(world);
            return;
        }

        self.x += platform.dx;
        self.y += platform.dy;
    }

    /// Moves the player straight down out of any solid it is wedged under.
    ///
    /// Never moves sideways. When the lowered rectangle would still be inside
    /// a solid the player stays where it is.
    fn push_below_overhead_solids(&mut self, world: &World) {
        let body = self.rect();
        let mut target_y = self.y;

        for solid in &world.solids {
            if !body.overlaps_horizontally(solid, PLATFORM_SIDE_INSET) {
                continue;
            }
            let embedded = body.y < solid.bottom() - PLATFORM_CONTACT_EPSILON
                && body.bottom() > solid.y + PLATFORM_CONTACT_EPSILON;
            if embedded && body.bottom() <= solid.bottom() + PLATFORM_CONTACT_EPSILON {
                target_y = target_y.max(solid.bottom() - PLATFORM_CONTACT_EPSILON);
            }
        }

        if target_y > self.y {
            let lowered = Rect::new(self.x, target_y, self.width, self.height);
            if world.collides_with_solid(&lowered) {
                return;
            }
            self.y = target_y;
            if self.vy < 0.0 {
                self.vy = 0.0;
            }
        }
    }

    fn resolve_solids(&mut self, pass: SolidPass, world: &World) {
        for solid in &world.solids {
            let Some(overlap) = Overlap::between(&self.rect(), solid) else {
                continue;
            };

            match pass {
                SolidPass::Horizontal => {
                    if self.vx > 0.0 {
                        self.x = solid.x - self.width;
                    } else if self.vx < 0.0 {
                        self.x = solid.right();
                    } else if overlap.min_vertical() < overlap.min_horizontal() {
                        // Mostly vertical overlap, leave it to the y pass
                        continue;
                    } else if overlap.left < overlap.right {
                        self.x = solid.x - self.width;
                    } else {
                        self.x = solid.right();
                    }
                    self.vx = 0.0;
                }
                SolidPass::Vertical => {
                    if self.vy > 0.0 {
                        self.y = solid.y - self.height;
                        self.vy = 0.0;
                        self.on_ground = true;
                        self.support_platform_id = None;
                    } else if self.vy < 0.0 {
                        self.y = solid.bottom();
                        self.vy = 0.0;
                    }
                }
            }
        }
    }

    /// Lands on the highest lift the player came down onto from above.
    pub fn resolve_semisolid_landing(
        &mut self,
        world: &World,
        previous_bottom: f32,
        previous_support: Option<&str>,
    ) {
        if self.vy < 0.0 {
            return;
        }

        let skip = self.skip_semisolid_platform_id.as_deref();
        let body = self.rect();
        let landed = world
            .platforms
            .iter()
            .filter(|platform| skip != Some(platform.id.as_str()))
            .filter(|platform| {
                let previous_top = platform.y - platform.dy;
                previous_support == Some(platform.id.as_str())
                    || previous_bottom <= previous_top + PLATFORM_CONTACT_EPSILON
            })
            .filter(|platform| body.bottom() >= platform.y - PLATFORM_CONTACT_EPSILON)
            .filter(|platform| body.overlaps_horizontally(&platform.rect(), PLATFORM_SIDE_INSET))
            .fold(None, |best: Option<&MovingPlatform>, platform| {
                match best {
                    Some(current) if current.y <= platform.y => Some(current),
                    _ => Some(platform),
                }
            });

        if let Some(platform) = landed {
            self.y = platform.y - self.height;
            self.vy = 0.0;
            self.on_ground = true;
            self.support_platform_id = Some(platform.id.clone());
        }
    }

    /// Pushes the player out of solids along the shallower axis, two passes.
    pub fn resolve_penetration(&mut self, world: &World) {
        for _ in 0..2 {
            let mut adjusted = false;
            for solid in &world.solids {
                let Some(overlap) = Overlap::between(&self.rect(), solid) else {
                    continue;
                };
                let move_x = overlap.push_x();
                let move_y = overlap.push_y();
                if move_x.abs() < move_y.abs() {
                    self.x += move_x;
                    self.vx = 0.0;
                } else {
                    self.y += move_y;
                    if move_y < 0.0 {
                        self.on_ground = true;
                        self.support_platform_id = None;
                    }
                    self.vy = 0.0;
                }
                adjusted = true;
            }
            if !adjusted {
                break;
            }
        }
    }

    /// Clamps into the world horizontally and respawns after a pit fall.
    pub fn keep_in_bounds(&mut self, world: &World) {
        self.x = self.x.max(0.0).min(world.width - self.width);
        if self.y < 0.0 {
            self.y = 0.0;
            self.vy = 0.0;
        }
        if self.y > world.height + PIT_DEPTH {
            debug!("Player {} fell out of the world, respawning", self.id);
            self.reset(world);
        }
    }

    fn is_within_water_exit_jump_height(&self, world: &World) -> bool {
        let Some(surface) = self.water_exit_surface_y else {
            return false;
        };
        let max_height = world.tile_size * 0.5;
        let distance_above_water = surface - self.bottom();
        distance_above_water >= -PLATFORM_CONTACT_EPSILON
            && distance_above_water <= max_height + PLATFORM_CONTACT_EPSILON
    }

    pub fn refresh_water_state(&mut self, world: &World) {
        let was_in_water = self.in_water;
        let body = self.rect();
        let in_water = world.is_in_water(&body);
        let surface = world.water_surface_at(&body);
        self.in_water = in_water;

        if in_water {
            self.water_exit_jump_available = false;
            self.water_exit_surface_y = surface;
            return;
        }

        if was_in_water && !self.on_ground {
            self.water_exit_surface_y = self.water_exit_surface_y.or(surface);
            self.water_exit_jump_available = self.is_within_water_exit_jump_height(world);
            if !self.water_exit_jump_available {
                self.water_exit_surface_y = None;
            }
            return;
        }

        if self.water_exit_jump_available && !self.is_within_water_exit_jump_height(world) {
            self.water_exit_jump_available = false;
            self.water_exit_surface_y = None;
        }

        if self.on_ground {
            self.water_exit_jump_available = false;
            self.water_exit_surface_y = None;
        }
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id,
            slot: self.slot,
            profile: self.profile,
            name: self.name.clone(),
            x: round2(self.x),
            y: round2(self.y),
            vx: round2(self.vx),
            vy: round2(self.vy),
            width: self.width,
            height: self.height,
            goal_locked: self.goal_locked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::{compile, RawLevel};
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use serde_json::json;
    use shared::{DT, LIFT_SPEED};

    const FLOOR: &str = "########################";

    fn world_from(tiles: Vec<&str>, spawn: (u32, u32)) -> World {
        compile(&RawLevel::from_value(json!({
            "tileSize": 64,
            "tiles": tiles,
            "spawnTiles": [{ "x": spawn.0, "y": spawn.1 }, { "x": spawn.0 + 2, "y": spawn.1 }],
        })))
    }

    fn flat_world() -> World {
        let mut tiles = vec![""; 11];
        tiles.push(FLOOR);
        world_from(tiles, (2, 4))
    }

    fn settle(player: &mut Player, world: &World) {
        let mut budget = TetherJumpBudget::default();
        for _ in 0..120 {
            player.update(DT, world, &mut budget);
        }
    }

    #[test]
    fn test_budget() {
        let mut budget = TetherJumpBudget::default();
        assert_eq!(budget.remaining(), 4);
        budget.consume();
        assert_eq!(budget.remaining(), 3);
        assert_eq!(budget.used(), 1);
        for _ in 0..3 {
            budget.consume();
        }
        assert!(!budget.has_remaining());
        budget.reset();
        assert!(budget.has_remaining());
    }

    #[test]
    fn test_player_spawns_at_slot() {
        let world = flat_world();
        let player = Player::new(7, 1, 1, "Leaf".to_string(), &world);
        assert_approx_eq!(player.x, 4.0 * 64.0);
        assert_approx_eq!(player.y, 4.0 * 64.0);
        assert_approx_eq!(player.width, 64.0);
    }

    #[test]
    fn test_spawn_inside_solid_is_nudged_up() {
        let mut tiles = vec![""; 11];
        tiles.push(FLOOR);
        let world = world_from(tiles, (2, 11));
        let player = Player::new(1, 0, 0, "Alan".to_string(), &world);
        assert_approx_eq!(player.y, 10.0 * 64.0);
        assert!(!world.collides_with_solid(&player.rect()));
    }

    #[test]
    fn test_falls_and_lands_on_floor() {
        let world = flat_world();
        let mut player = Player::new(1, 0, 0, "Alan".to_string(), &world);
        settle(&mut player, &world);

        assert!(player.on_ground);
        assert_approx_eq!(player.y, 11.0 * 64.0 - 64.0);
        assert_eq!(player.vy, 0.0);
        assert!(player.support_platform_id.is_none());
    }

    #[test]
    fn test_jump_requires_rising_edge() {
        let world = flat_world();
        let mut player = Player::new(1, 0, 0, "Alan".to_string(), &world);
        settle(&mut player, &world);

        let mut budget = TetherJumpBudget::default();
        player.input.jump = true;
        player.update(DT, &world, &mut budget);
        assert_approx_eq!(player.vy, -JUMP_SPEED);
        assert!(!player.on_ground);

        player.update(DT, &world, &mut budget);
        assert_approx_eq!(player.vy, -JUMP_SPEED + GRAVITY * DT, 1e-3);
        assert_eq!(budget.used(), 0);
    }

    #[test]
    fn test_horizontal_speed_is_capped() {
        let world = flat_world();
        let mut player = Player::new(1, 0, 0, "Alan".to_string(), &world);
        settle(&mut player, &world);

        let mut budget = TetherJumpBudget::default();
        player.input.right = true;
        for _ in 0..30 {
            player.update(DT, &world, &mut budget);
            assert!(player.vx <= MAX_SPEED);
        }
        assert_approx_eq!(player.vx, MAX_SPEED);

        player.input.right = false;
        player.update(DT, &world, &mut budget);
        assert_approx_eq!(player.vx, MAX_SPEED * (1.0 - FRICTION * DT), 1e-3);
    }

    #[test]
    fn test_wall_stops_horizontal_motion() {
        let mut tiles = vec![""; 10];
        tiles.push("......#");
        tiles.push(FLOOR);
        let world = world_from(tiles, (2, 10));
        let mut player = Player::new(1, 0, 0, "Alan".to_string(), &world);
        let mut budget = TetherJumpBudget::default();

        player.input.right = true;
        for _ in 0..120 {
            player.update(DT, &world, &mut budget);
        }
        assert_approx_eq!(player.x, 6.0 * 64.0 - 64.0);
        assert_eq!(player.vx, 0.0);
    }

    #[test]
    fn test_tether_jump_consumes_budget() {
        let world = flat_world();
        let mut player = Player::new(1, 0, 0, "Alan".to_string(), &world);
        player.tether_jump_eligible = true;
        player.input.jump = true;

        let mut budget = TetherJumpBudget::default();
        player.update(DT, &world, &mut budget);
        assert_approx_eq!(player.vy, -JUMP_SPEED);
        assert_eq!(budget.remaining(), 3);
    }

    #[test]
    fn test_tether_jump_needs_budget_and_descent() {
        let world = flat_world();
        let mut budget = TetherJumpBudget::default();
        for _ in 0..4 {
            budget.consume();
        }

        let mut player = Player::new(1, 0, 0, "Alan".to_string(), &world);
        player.tether_jump_eligible = true;
        player.input.jump = true;
        player.update(DT, &world, &mut budget);
        assert!(player.vy > 0.0);

        let mut rising = Player::new(2, 0, 0, "Alan".to_string(), &world);
        rising.vy = -400.0;
        rising.tether_jump_eligible = true;
        rising.input.jump = true;
        let mut fresh = TetherJumpBudget::default();
        rising.update(DT, &world, &mut fresh);
        assert_eq!(fresh.used(), 0);
        assert_approx_eq!(rising.vy, -400.0 + GRAVITY * DT, 1e-3);
    }

    #[test]
    fn test_pit_respawn_resets_to_spawn() {
        let world = world_from(vec![], (2, 4));
        let mut player = Player::new(1, 0, 0, "Alan".to_string(), &world);
        player.input.right = true;
        player.y = world.height + PIT_DEPTH - 1.0;
        player.vy = 600.0;

        let mut budget = TetherJumpBudget::default();
        player.update(DT, &world, &mut budget);

        assert_eq!(player.x, world.spawn[0].x);
        assert_eq!(player.y, world.spawn[0].y);
        assert_eq!(player.vx, 0.0);
        assert_eq!(player.vy, 0.0);
        assert_eq!(player.input, InputState::default());
    }

    #[test]
    fn test_rides_horizontal_lift() {
        let mut tiles = vec![""; 8];
        tiles.push(".....h");
        tiles.extend(["", ""]);
        tiles.push(FLOOR);
        let mut world = world_from(tiles, (5, 7));
        let mut player = Player::new(1, 0, 0, "Alan".to_string(), &world);
        let mut budget = TetherJumpBudget::default();

        for _ in 0..10 {
            world.advance_platforms(DT);
            player.update(DT, &world, &mut budget);
        }

        assert_eq!(player.support_platform_id.as_deref(), Some("lift-0"));
        assert!(player.on_ground);
        let lift = world.platform("lift-0").unwrap();
        assert_approx_eq!(player.x, lift.x - LIFT_SPEED * DT, 1e-3);
        assert_approx_eq!(player.bottom(), lift.y);
    }

    #[test]
    fn test_carry_into_solid_drops_support() {
        let mut tiles = vec![""; 6];
        tiles.push(".....#");
        tiles.push("");
        tiles.push(".....v");
        tiles.extend(["", ""]);
        tiles.push(FLOOR);
        let mut world = world_from(tiles, (5, 7));
        world.platforms[0].direction = -1.0;

        let mut player = Player::new(1, 0, 0, "Alan".to_string(), &world);
        assert_approx_eq!(player.y, 7.0 * 64.0);
        player.support_platform_id = Some("lift-0".to_string());
        player.on_ground = true;

        world.advance_platforms(DT);
        let mut budget = TetherJumpBudget::default();
        player.update(DT, &world, &mut budget);

        assert!(player.support_platform_id.is_none());
        assert!(!player.on_ground);
        assert_eq!(player.skip_semisolid_platform_id.as_deref(), Some("lift-0"));
        assert!(!world.collides_with_solid(&player.rect()));
    }

    #[test]
    fn test_crush_without_room_below_keeps_position() {
        let mut tiles = vec![""; 8];
        tiles.push(".....v");
        tiles.extend(["", ""]);
        tiles.push(FLOOR);
        let mut world = world_from(tiles, (5, 7));
        world.platforms[0].direction = -1.0;
        world.advance_platforms(DT);

        let lift = world.platform("lift-0").unwrap();
        assert!(lift.dy < 0.0);
        let (lift_x, lift_top) = (lift.x, lift.previous_rect().y);

        let mut player = Player::new(1, 0, 0, "Alan".to_string(), &world);
        player.x = lift_x;
        player.y = lift_top - player.height;
        player.vy = -20.0;
        player.support_platform_id = Some("lift-0".to_string());
        player.on_ground = true;

        // Ceiling reaching almost to the feet, floor just under the lowered spot
        let (x, y, size) = (player.x, player.y, player.width);
        world.solids.push(Rect::new(x, y - 148.0, size, 210.0));
        world.solids.push(Rect::new(x, y + 92.0, size, size));

        player.apply_platform_carry(&world);

        assert_eq!(player.x, x);
        assert_eq!(player.y, y);
        assert_eq!(player.vy, -20.0);
        assert!(player.support_platform_id.is_none());
        assert!(!player.on_ground);
        assert_eq!(player.skip_semisolid_platform_id.as_deref(), Some("lift-0"));
    }

    #[test]
    fn test_unknown_support_is_cleared() {
        let world = flat_world();
        let mut player = Player::new(1, 0, 0, "Alan".to_string(), &world);
        player.support_platform_id = Some("lift-42".to_string());
        player.apply_platform_carry(&world);
        assert!(player.support_platform_id.is_none());
    }

    #[test]
    fn test_water_jump_is_weaker() {
        let mut tiles = vec![""; 10];
        tiles.push("wwwwwwwwwwwwwwwwwwwwwwww");
        tiles.push(FLOOR);
        let world = world_from(tiles, (2, 10));
        let mut player = Player::new(1, 0, 0, "Alan".to_string(), &world);
        let mut budget = TetherJumpBudget::default();

        player.update(DT, &world, &mut budget);
        assert!(player.in_water);

        player.input.jump = true;
        player.update(DT, &world, &mut budget);
        assert_approx_eq!(player.vy, -JUMP_SPEED * WATER_JUMP_SPEED_MULTIPLIER);
        assert_eq!(budget.used(), 0);
    }

    #[test]
    fn test_water_exit_window() {
        let mut tiles = vec![""; 10];
        tiles.push("wwwwwwwwwwwwwwwwwwwwwwww");
        tiles.push(FLOOR);
        let world = world_from(tiles, (2, 10));
        let mut player = Player::new(1, 0, 0, "Alan".to_string(), &world);

        player.refresh_water_state(&world);
        assert!(player.in_water);
        assert_eq!(player.water_exit_surface_y, Some(640.0));

        // Just above the surface and airborne
        player.y = 640.0 - 64.0 - 10.0;
        player.refresh_water_state(&world);
        assert!(!player.in_water);
        assert!(player.water_exit_jump_available);

        // Drifted too high
        player.y = 640.0 - 64.0 - 60.0;
        player.refresh_water_state(&world);
        assert!(!player.water_exit_jump_available);
        assert!(player.water_exit_surface_y.is_none());
    }

    #[test]
    fn test_goal_lock_is_idempotent() {
        let world = flat_world();
        let mut player = Player::new(1, 0, 0, "Alan".to_string(), &world);
        player.vx = 120.0;
        player.input.right = true;
        player.lock_at_goal();
        let lock = player.goal_lock;

        player.x += 50.0;
        player.lock_at_goal();
        assert_eq!(player.goal_lock, lock);

        player.on_ground = true;
        player.support_platform_id = Some("lift-0".to_string());
        let mut budget = TetherJumpBudget::default();
        player.update(DT, &world, &mut budget);
        assert_eq!(player.x, lock.x);
        assert_eq!(player.y, lock.y);
        assert_eq!(player.vx, 0.0);
        assert!(!player.input.right);
        assert!(!player.on_ground);
        assert!(player.support_platform_id.is_none());
    }

    #[test]
    fn test_resolve_penetration_prefers_shallow_axis() {
        let world = flat_world();
        let mut player = Player::new(1, 0, 0, "Alan".to_string(), &world);
        player.x = 300.0;
        player.y = 11.0 * 64.0 - 60.0;
        player.vy = 50.0;
        player.resolve_penetration(&world);

        assert_approx_eq!(player.y, 11.0 * 64.0 - 64.0);
        assert!(player.on_ground);
        assert_eq!(player.vy, 0.0);
    }

    #[test]
    fn test_snapshot_rounds_values() {
        let world = flat_world();
        let mut player = Player::new(3, 1, 0, "Mossy".to_string(), &world);
        player.x = 10.126;
        player.vy = -3.333;
        let snapshot = player.snapshot();
        assert_approx_eq!(snapshot.x, 10.13, 1e-4);
        assert_approx_eq!(snapshot.vy, -3.33, 1e-4);
        assert_eq!(snapshot.slot, 1);
        assert_eq!(snapshot.name, "Mossy");
        assert!(!snapshot.goal_locked);
    }

    #[test]
    fn test_random_input_stays_in_bounds() {
        let mut tiles = vec![""; 5];
        tiles.push("..###.....h.....v....###");
        tiles.push("");
        tiles.push("......ss.......#........");
        tiles.extend(["", ""]);
        tiles.push("#######.....############");
        tiles.push("########....############");
        let mut world = world_from(tiles, (2, 4));
        let mut player = Player::new(1, 0, 0, "Alan".to_string(), &world);
        let mut budget = TetherJumpBudget::default();
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..5000 {
            if rng.gen_bool(0.1) {
                player.input = InputState {
                    left: rng.gen(),
                    right: rng.gen(),
                    jump: rng.gen(),
                };
            }
            if rng.gen_bool(0.02) {
                budget.reset();
            }
            player.tether_jump_eligible = rng.gen_bool(0.1);
            world.advance_platforms(DT);
            player.update(DT, &world, &mut budget);

            assert!(player.x >= 0.0 && player.x <= world.width - player.width);
            assert!(player.y >= 0.0 && player.y <= world.height + PIT_DEPTH);
            assert!(player.vy.abs() <= MAX_FALL_SPEED);
        }
    }
}
