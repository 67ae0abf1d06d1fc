use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::room::{PlayerSummary, RoomSummary},
    state::room::Song,
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE and WebSocket channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Wrap an already serialised payload.
    pub fn new<E>(event: E, data: String) -> Self
    where
        E: Into<Option<String>>,
    {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Convenience wrapper that serialises `payload` into the data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }

    /// Name of the event, empty for anonymous events.
    pub fn name(&self) -> &str {
        self.event.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Room the stream is bound to.
    pub room_id: String,
    /// Whether the backend is running without a history backend connection.
    pub degraded: bool,
    /// State of the room at subscription time.
    pub room: RoomSummary,
}

#[derive(Debug, Serialize, ToSchema)]
/// Sent to the creator (`room-created`) or a newcomer (`room-joined`).
pub struct RoomMembershipEvent {
    pub player_id: String,
    pub room: RoomSummary,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when someone joins the lobby.
pub struct PlayerJoinedEvent {
    pub player: PlayerSummary,
    pub players: Vec<PlayerSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a player leaves or drops out.
pub struct PlayerLeftEvent {
    pub player: PlayerSummary,
    /// Owner after the departure.
    pub owner_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when playlist resolution begins.
pub struct GameLoadingEvent {
    pub requested_rounds: usize,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast once the playlist is fixed.
pub struct GameStartedEvent {
    pub total_rounds: usize,
    pub players: Vec<PlayerSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast before each round opens.
pub struct RoundCountdownEvent {
    pub round: usize,
    pub total_rounds: usize,
    pub countdown_ms: u64,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a round opens. Carries the clip, never the answer.
pub struct RoundStartedEvent {
    pub round: usize,
    pub total_rounds: usize,
    pub media_url: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Answer revealed once a round is resolved.
pub struct SongReveal {
    pub title: String,
    pub artist: String,
    pub artwork_url: Option<String>,
}

impl From<&Song> for SongReveal {
    fn from(song: &Song) -> Self {
        Self {
            title: song.title.clone(),
            artist: song.artist.clone(),
            artwork_url: song.artwork_url.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a guess scores.
pub struct RoundWonEvent {
    pub round: usize,
    pub winner: PlayerSummary,
    pub song: SongReveal,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a round ends without a winner.
pub struct RoundTimeoutEvent {
    pub round: usize,
    pub song: SongReveal,
}

#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
/// Why a guess did not score.
pub enum WrongGuessReason {
    /// The matcher rejected the answer.
    Incorrect,
    /// No round was open.
    RoundClosed,
}

#[derive(Debug, Serialize, ToSchema)]
/// Private notice sent to the author of a non-scoring guess.
pub struct WrongGuessEvent {
    pub round: usize,
    pub guess: String,
    pub reason: WrongGuessReason,
}

#[derive(Debug, Serialize, ToSchema)]
/// Players ordered by score.
pub struct ScoreboardEvent {
    pub players: Vec<PlayerSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast once every round has been played.
pub struct GameOverEvent {
    pub scoreboard: Vec<PlayerSummary>,
    /// Best score holders; several on a tie, none when nobody scored.
    pub winners: Vec<PlayerSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Error surfaced to a room or a single player.
pub struct ErrorEvent {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}
