use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::{
        format_system_time,
        phase::VisibleRoomPhase,
        validation::{validate_player_name, validate_room_id},
    },
    providers::PlaylistCriteria,
    services::game_service::GuessOutcome,
    state::room::{Player, RoomSnapshot},
};

/// Payload used to open a new room; the caller becomes its owner.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateRoomRequest {
    /// Connection-scoped identity of the caller.
    #[validate(length(min = 1, max = 64))]
    pub player_id: String,
    #[validate(custom(function = "validate_player_name"))]
    pub name: String,
    /// Rounds to play; clamped to the configured maximum.
    #[serde(default)]
    #[validate(range(min = 1, max = 100))]
    pub rounds: Option<usize>,
}

/// Payload used to join a room in its lobby.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinRoomRequest {
    #[validate(length(min = 1, max = 64))]
    pub player_id: String,
    #[validate(custom(function = "validate_player_name"))]
    pub name: String,
}

/// Payload used by the owner to start the game.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct StartGameRequest {
    #[validate(length(min = 1, max = 64))]
    pub player_id: String,
    #[serde(default)]
    #[validate(nested)]
    pub criteria: PlaylistCriteria,
}

/// Payload carrying a free-text answer.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct GuessRequest {
    #[validate(length(min = 1, max = 64))]
    pub player_id: String,
    #[validate(length(max = 200))]
    pub guess: String,
}

/// Payload used to leave a room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct LeaveRoomRequest {
    #[validate(length(min = 1, max = 64))]
    pub player_id: String,
}

/// Path parameter check shared by the room routes.
pub fn check_room_id(room_id: &str) -> Result<(), validator::ValidationErrors> {
    let mut errors = validator::ValidationErrors::new();
    if let Err(err) = validate_room_id(room_id) {
        errors.add("room_id", err);
        return Err(errors);
    }
    Ok(())
}

/// Public view of a player.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct PlayerSummary {
    pub id: String,
    pub name: String,
    pub score: u32,
    pub connected: bool,
}

impl From<&Player> for PlayerSummary {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id.clone(),
            name: player.name.clone(),
            score: player.score,
            connected: player.connected,
        }
    }
}

/// Public view of a room. Never carries the current answer.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomSummary {
    pub id: String,
    pub phase: VisibleRoomPhase,
    pub owner_id: Option<String>,
    pub players: Vec<PlayerSummary>,
    /// Rounds started so far.
    pub round: usize,
    pub total_rounds: usize,
    pub requested_rounds: usize,
    pub round_active: bool,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

impl From<&RoomSnapshot> for RoomSummary {
    fn from(snapshot: &RoomSnapshot) -> Self {
        Self {
            id: snapshot.id.clone(),
            phase: snapshot.phase.into(),
            owner_id: snapshot.owner_id.clone(),
            players: snapshot.players.iter().map(PlayerSummary::from).collect(),
            round: snapshot.round,
            total_rounds: snapshot.total_rounds,
            requested_rounds: snapshot.requested_rounds,
            round_active: snapshot.round_active,
            created_at: format_system_time(snapshot.created_at),
        }
    }
}

/// Result of a submitted guess as seen by its author.
#[derive(Debug, Clone, Copy, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GuessVerdict {
    /// The guess won the round.
    Correct,
    /// The matcher rejected the guess.
    Incorrect,
    /// No round was open to score.
    RoundClosed,
}

/// Response of the guess route.
#[derive(Debug, Serialize, ToSchema)]
pub struct GuessResponse {
    pub verdict: GuessVerdict,
}

impl From<GuessOutcome> for GuessResponse {
    fn from(outcome: GuessOutcome) -> Self {
        let verdict = match outcome {
            GuessOutcome::Correct => GuessVerdict::Correct,
            GuessOutcome::Incorrect => GuessVerdict::Incorrect,
            GuessOutcome::RoundClosed => GuessVerdict::RoundClosed,
        };
        Self { verdict }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_validates_name_and_rounds() {
        let ok: CreateRoomRequest =
            serde_json::from_str(r#"{"player_id": "p1", "name": "Ann", "rounds": 5}"#).unwrap();
        assert!(ok.validate().is_ok());

        let blank: CreateRoomRequest =
            serde_json::from_str(r#"{"player_id": "p1", "name": "  "}"#).unwrap();
        assert!(blank.validate().is_err());

        let zero: CreateRoomRequest =
            serde_json::from_str(r#"{"player_id": "p1", "name": "Ann", "rounds": 0}"#).unwrap();
        assert!(zero.validate().is_err());
    }

    #[test]
    fn start_request_defaults_criteria() {
        let request: StartGameRequest = serde_json::from_str(r#"{"player_id": "p1"}"#).unwrap();
        assert_eq!(request.criteria, PlaylistCriteria::default());
        assert!(request.validate().is_ok());

        let bad: StartGameRequest = serde_json::from_str(
            r#"{"player_id": "p1", "criteria": {"decade": 1850}}"#,
        )
        .unwrap();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn room_id_path_check() {
        assert!(check_room_id("QWE234").is_ok());
        assert!(check_room_id("nope").is_err());
    }
}
