use shared::{DEFAULT_PROFILE_NAMES, MAX_PLAYER_NAME_LENGTH, PROFILE_COUNT, ROOM_CODE_LENGTH};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Get current timestamp in milliseconds
pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

// Upper-case, strip anything that is not alphanumeric, cap at the code length
pub fn normalize_room_code(code: &str) -> String {
    code.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .take(ROOM_CODE_LENGTH)
        .collect()
}

// Cap at the name length, trim and collapse inner whitespace
pub fn normalize_player_name(name: &str) -> String {
    let capped: String = name.chars().take(MAX_PLAYER_NAME_LENGTH).collect();
    capped.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn normalize_preferred_profile(value: Option<i64>) -> Option<usize> {
    match value {
        Some(profile) if (0..PROFILE_COUNT as i64).contains(&profile) => Some(profile as usize),
        _ => None,
    }
}

pub fn default_player_name(profile: usize) -> &'static str {
    DEFAULT_PROFILE_NAMES.get(profile).copied().unwrap_or("Player")
}
