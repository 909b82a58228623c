//! Wire messages exchanged between clients and the authoritative server.
//!
//! Both enums are externally tagged so the same definitions work for JSON
//! text frames and bincode binary frames. Variant names are kebab-case and
//! fields camelCase on the JSON side.

use crate::{lenient, InputState};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Connection identifier assigned by the server on accept.
pub type ClientId = u32;

/// Requests a client may send.
///
/// JSON payloads are read leniently: numbers may arrive as strings, fields
/// may be missing or of the wrong type, and a payload that is not an object
/// counts as empty. Bincode frames stay strictly typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    remote = "Self",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    CreateRoom {
        #[serde(default, deserialize_with = "lenient::integer")]
        preferred_profile: Option<i64>,
        #[serde(default, deserialize_with = "lenient::optional_text")]
        custom_name: Option<String>,
        #[serde(default, deserialize_with = "lenient::number")]
        tether_length: Option<f64>,
        #[serde(default, deserialize_with = "lenient::strict_text")]
        level_file: Option<String>,
    },
    JoinRoom {
        #[serde(default, deserialize_with = "lenient::required_text")]
        code: String,
        #[serde(default, deserialize_with = "lenient::integer")]
        preferred_profile: Option<i64>,
        #[serde(default, deserialize_with = "lenient::optional_text")]
        custom_name: Option<String>,
    },
    LeaveRoom,
    Input(InputState),
    Restart,
    SetSettings {
        #[serde(default, deserialize_with = "lenient::number")]
        tether_length: Option<f64>,
    },
    ListLevels,
}

const PAYLOAD_REQUESTS: [&str; 4] = ["create-room", "join-room", "input", "set-settings"];
const BARE_REQUESTS: [&str; 3] = ["leave-room", "restart", "list-levels"];

impl Serialize for ClientMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ClientMessage::serialize(self, serializer)
    }
}

impl<'de> Deserialize<'de> for ClientMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if !deserializer.is_human_readable() {
            return ClientMessage::deserialize(deserializer);
        }
        let value = Value::deserialize(deserializer)?;
        let shaped = lenient::request_shape(value, &PAYLOAD_REQUESTS, &BARE_REQUESTS);
        ClientMessage::deserialize(shaped).map_err(<D::Error as de::Error>::custom)
    }
}

impl ClientMessage {
    /// Request name used when replying with a failure.
    pub fn request_name(&self) -> &'static str {
        match self {
            ClientMessage::CreateRoom { .. } => "create-room",
            ClientMessage::JoinRoom { .. } => "join-room",
            ClientMessage::LeaveRoom => "leave-room",
            ClientMessage::Input(_) => "input",
            ClientMessage::Restart => "restart",
            ClientMessage::SetSettings { .. } => "set-settings",
            ClientMessage::ListLevels => "list-levels",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    Welcome {
        id: ClientId,
        limits: TetherLimits,
    },
    RoomJoined(JoinPayload),
    RequestFailed {
        request: String,
        reason: String,
    },
    State(RoomSnapshot),
    Settings(RoomSettings),
    Levels {
        levels: Vec<LevelSummary>,
    },
    RoomClosed {
        room_code: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TetherLimits {
    pub min_tether_length: u32,
    pub max_tether_length: u32,
    pub default_tether_length: u32,
}

impl Default for TetherLimits {
    fn default() -> Self {
        Self {
            min_tether_length: crate::MIN_TETHER_LENGTH,
            max_tether_length: crate::MAX_TETHER_LENGTH,
            default_tether_length: crate::DEFAULT_TETHER_LENGTH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSettings {
    pub tether_length: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Won,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlatformKind {
    #[serde(rename = "lift-h")]
    LiftHorizontal,
    #[serde(rename = "lift-v")]
    LiftVertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RectSnapshot {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformSnapshot {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: PlatformKind,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
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
    pub goal_locked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartVotes {
    pub voted: usize,
    pub required: usize,
}

/// Authoritative per-tick state of one room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_code: String,
    pub host_id: Option<ClientId>,
    pub status: RoomStatus,
    pub winner_at: u64,
    pub players: Vec<PlayerSnapshot>,
    pub spectators: usize,
    pub settings: RoomSettings,
    pub restart_votes: RestartVotes,
    pub moving_platforms: Vec<PlatformSnapshot>,
    pub server_time: u64,
}

/// Static level geometry sent once when a connection enters a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldPayload {
    pub name: String,
    pub width: f32,
    pub height: f32,
    pub tile_size: u32,
    pub rows: usize,
    pub columns: usize,
    pub tiles: Vec<String>,
    pub decor: Vec<String>,
    pub spawn: Vec<Point>,
    pub goal: RectSnapshot,
    pub moving_platforms: Vec<PlatformSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    pub id: ClientId,
    /// `None` when the connection joined as a spectator.
    pub slot: Option<usize>,
    pub profile: Option<usize>,
    pub room_code: String,
    pub is_host: bool,
    pub world: WorldPayload,
    pub settings: RoomSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSummary {
    pub file: String,
    pub name: String,
    pub rows: usize,
    pub cols: usize,
}
