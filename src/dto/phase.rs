use serde::Serialize;
use utoipa::ToSchema;

use crate::state::state_machine::RoomPhase;

/// Room phase exposed to clients (REST/SSE/WebSocket).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleRoomPhase {
    /// Waiting for players, joinable.
    Lobby,
    /// Resolving the playlist.
    Loading,
    /// Rounds are being played.
    Playing,
    /// Final scores are known.
    Ended,
}

impl From<RoomPhase> for VisibleRoomPhase {
    fn from(value: RoomPhase) -> Self {
        match value {
            RoomPhase::Lobby => VisibleRoomPhase::Lobby,
            RoomPhase::Loading => VisibleRoomPhase::Loading,
            RoomPhase::Playing => VisibleRoomPhase::Playing,
            RoomPhase::Ended => VisibleRoomPhase::Ended,
        }
    }
}
