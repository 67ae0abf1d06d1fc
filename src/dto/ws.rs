use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::{dto::sse::ServerEvent, providers::PlaylistCriteria};

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Messages accepted from player WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerInboundMessage {
    /// Open a room owned by this session.
    CreateRoom {
        name: String,
        #[serde(default)]
        rounds: Option<usize>,
    },
    /// Join a room in its lobby.
    JoinRoom { room_id: String, name: String },
    /// Owner only: resolve the playlist and start playing.
    StartGame {
        #[serde(default)]
        criteria: PlaylistCriteria,
    },
    /// Free-text answer for the open round.
    Guess { text: String },
    /// Leave the bound room; the socket stays open.
    LeaveRoom,
    #[serde(other)]
    Unknown,
}

impl PlayerInboundMessage {
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Whether the message binds the session to a room.
    pub fn binds_room(&self) -> bool {
        matches!(self, Self::CreateRoom { .. } | Self::JoinRoom { .. })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Frame pushed to players: the same named events SSE clients receive.
pub struct PlayerOutboundMessage {
    pub event: String,
    #[schema(value_type = Object)]
    pub data: Value,
}

impl From<&ServerEvent> for PlayerOutboundMessage {
    fn from(event: &ServerEvent) -> Self {
        Self {
            event: event.name().to_string(),
            data: serde_json::from_str(&event.data).unwrap_or(Value::String(event.data.clone())),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// First frame of every session: the identity the server assigned.
pub struct SessionInfo {
    pub player_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_messages() {
        let create = PlayerInboundMessage::from_json_str(r#"{"type": "create_room", "name": "Ann"}"#)
            .unwrap();
        assert!(matches!(
            create,
            PlayerInboundMessage::CreateRoom { ref name, rounds: None } if name == "Ann"
        ));
        assert!(create.binds_room());

        let guess =
            PlayerInboundMessage::from_json_str(r#"{"type": "guess", "text": "wonderwall"}"#)
                .unwrap();
        assert!(!guess.binds_room());

        let start = PlayerInboundMessage::from_json_str(r#"{"type": "start_game"}"#).unwrap();
        assert!(matches!(start, PlayerInboundMessage::StartGame { .. }));

        let other = PlayerInboundMessage::from_json_str(r#"{"type": "dance"}"#).unwrap();
        assert!(matches!(other, PlayerInboundMessage::Unknown));
    }

    #[test]
    fn outbound_frame_embeds_payload() {
        let event = ServerEvent::new(Some("round-won".to_string()), r#"{"round":2}"#.into());
        let frame = PlayerOutboundMessage::from(&event);
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            serde_json::json!({"event": "round-won", "data": {"round": 2}})
        );
    }
}
