use thiserror::Error;

/// Request faults reported back to the requesting connection only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("Room code not found.")]
    NotFound,
    #[error("Could not create room.")]
    CreateFailed,
    #[error("Only the host can change settings.")]
    NotHost,
    #[error("Join a room first.")]
    NotInRoom,
}
