//! Elastic tether between the two players of a room.

use crate::player::Player;
use crate::world::World;
use shared::{
    TETHER_DAMPING, TETHER_JUMP_MIN_VERTICAL_GAP_RATIO, TETHER_JUMP_TAUT_EPSILON,
    TETHER_STIFFNESS,
};

/// Whether `player` may jump off the taut tether this tick.
///
/// The player must be airborne, hanging below `other` by a clear margin, with
/// the tether pulled (almost) tight.
pub fn is_tether_jump_eligible(player: &Player, other: &Player, tether_length: f32) -> bool {
    if player.goal_locked || player.on_ground {
        return false;
    }

    let center = player.center();
    let other_center = other.center();
    let distance = other_center.sub(&center).magnitude();
    if !distance.is_finite() {
        return false;
    }

    let taut = distance >= tether_length - TETHER_JUMP_TAUT_EPSILON;
    let min_vertical_gap = (tether_length * TETHER_JUMP_MIN_VERTICAL_GAP_RATIO).max(10.0);
    let below_other = center.y > other_center.y + min_vertical_gap;
    taut && below_other
}

/// Pulls two over-stretched players back toward each other.
///
/// A goal-locked player acts as a fixed anchor. After the correction both
/// players are re-resolved against the world so the tether never drags
/// anyone into a solid.
pub fn apply_tether(
    first: &mut Player,
    second: &mut Player,
    tether_length: f32,
    world: &World,
    dt: f32,
) {
    let first_locked = first.goal_locked;
    let second_locked = second.goal_locked;
    if first_locked && second_locked {
        return;
    }

    let first_previous_bottom = first.bottom();
    let second_previous_bottom = second.bottom();
    let first_previous_support = first.support_platform_id.clone();
    let second_previous_support = second.support_platform_id.clone();

    let delta = second.center().sub(&first.center());
    let distance = delta.magnitude();
    if distance <= 0.001 || distance <= tether_length {
        return;
    }

    let normal = delta.scale(1.0 / distance);
    let stretch = distance - tether_length;
    let relative_velocity =
        (second.vx - first.vx) * normal.x + (second.vy - first.vy) * normal.y;
    let impulse = (stretch * TETHER_STIFFNESS + relative_velocity * TETHER_DAMPING) * dt;

    let (first_share, second_share) = match (first_locked, second_locked) {
        (true, _) => (0.0, 1.0),
        (_, true) => (1.0, 0.0),
        _ => (0.5, 0.5),
    };

    if !first_locked {
        first.vx += normal.x * impulse;
        first.vy += normal.y * impulse;
        first.x += normal.x * stretch * first_share;
        first.y += normal.y * stretch * first_share;
    }
    if !second_locked {
        second.vx -= normal.x * impulse;
        second.vy -= normal.y * impulse;
        second.x -= normal.x * stretch * second_share;
        second.y -= normal.y * stretch * second_share;
    }

    first.keep_in_bounds(world);
    second.keep_in_bounds(world);
    first.resolve_penetration(world);
    second.resolve_penetration(world);

    if !first.goal_locked {
        first.resolve_semisolid_landing(
            world,
            first_previous_bottom,
            first_previous_support.as_deref(),
        );
    }
    if !second.goal_locked {
        second.resolve_semisolid_landing(
            world,
            second_previous_bottom,
            second_previous_support.as_deref(),
        );
    }

    for player in [first, second] {
        if player.goal_locked {
            player.pin_to_goal_lock();
        } else {
            player.refresh_water_state(world);
        }
    }
}
