//! Types and tunables shared by the tethered server and its clients.
//!
//! Clients run a visual preview of the same movement model, so every physics
//! constant lives here rather than in the server crate.

pub mod codec;
pub mod lenient;
pub mod protocol;

pub use codec::{decode_binary, decode_text, encode, CodecError, EncodedFrame, WireFormat};
pub use protocol::*;

use serde::{Deserialize, Serialize};

pub const TICK_RATE: u32 = 60;
pub const DT: f32 = 1.0 / TICK_RATE as f32;

// Horizontal movement
pub const ACCEL: f32 = 2300.0;
pub const AIR_CONTROL: f32 = 0.62;
pub const FRICTION: f32 = 11.0;
pub const MAX_SPEED: f32 = 300.0;

// Vertical movement
pub const GRAVITY: f32 = 1800.0;
pub const MAX_FALL_SPEED: f32 = 1150.0;
pub const JUMP_SPEED: f32 = 860.0;

// Water
pub const WATER_GRAVITY_MULTIPLIER: f32 = 0.22;
pub const WATER_MOVE_SPEED_MULTIPLIER: f32 = 0.78;
pub const WATER_JUMP_SPEED_MULTIPLIER: f32 = 0.35;
pub const WATER_FALL_SPEED_MULTIPLIER: f32 = 0.42;

// Lifts
pub const LIFT_TRAVEL_TILES: f32 = 3.0;
pub const LIFT_SPEED: f32 = 100.0;
pub const PLATFORM_CONTACT_EPSILON: f32 = 5.0;
pub const PLATFORM_SIDE_INSET: f32 = 4.0;

/// Distance below the world floor at which a falling player respawns.
pub const PIT_DEPTH: f32 = 260.0;

// Tether
pub const DEFAULT_TETHER_LENGTH: u32 = 170;
pub const MIN_TETHER_LENGTH: u32 = 75;
pub const MAX_TETHER_LENGTH: u32 = 395;
pub const TETHER_STIFFNESS: f32 = 36.0;
pub const TETHER_DAMPING: f32 = 4.0;
pub const TETHER_JUMP_TAUT_EPSILON: f32 = 6.0;
pub const TETHER_JUMP_MIN_VERTICAL_GAP_RATIO: f32 = 0.25;
pub const MAX_SHARED_TETHER_MID_AIR_JUMPS: u32 = 4;

// Rooms
pub const ROOM_CODE_LENGTH: usize = 5;
pub const PROFILE_COUNT: usize = 2;
pub const MAX_PLAYER_NAME_LENGTH: usize = 20;
pub const DEFAULT_PROFILE_NAMES: [&str; PROFILE_COUNT] = ["Alan", "Leaf"];

/// Latched directional and jump input for one player.
///
/// Every inbound input message replaces the whole struct, there is no
/// per-field merging. Missing JSON flags read as `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputState {
    #[serde(deserialize_with = "lenient::flag")]
    pub left: bool,
    #[serde(deserialize_with = "lenient::flag")]
    pub right: bool,
    #[serde(deserialize_with = "lenient::flag")]
    pub jump: bool,
}

impl InputState {
    /// Horizontal intent: -1 for left only, 1 for right only, 0 otherwise.
    pub fn direction(&self) -> i8 {
        match (self.left, self.right) {
            (true, false) => -1,
            (false, true) => 1,
            _ => 0,
        }
    }
}

/// Clamps a requested tether length into the supported range.
///
/// Missing and non-finite values fall back to the default, everything else
/// is rounded to whole pixels.
pub fn sanitize_tether_length(value: Option<f64>) -> u32 {
    match value {
        Some(length) if length.is_finite() => {
            length
                .round()
                .clamp(MIN_TETHER_LENGTH as f64, MAX_TETHER_LENGTH as f64) as u32
        }
        _ => DEFAULT_TETHER_LENGTH,
    }
}

/// Rounds to two decimals the way snapshots publish positions.
pub fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}
