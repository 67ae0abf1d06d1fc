use std::time::SystemTime;

use indexmap::IndexMap;

use crate::{
    error::ServiceError,
    state::state_machine::{RoomEvent, RoomPhase, RoomStateMachine},
};

/// Connection-scoped identity of a player, supplied by the transport.
pub type PlayerId = String;
/// Short identifier of a live room.
pub type RoomId = String;

/// Metadata of a playable song.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    /// Canonical title players must guess.
    pub title: String,
    /// Performing artist.
    pub artist: String,
    /// URL of the preview clip.
    pub media_url: String,
    /// Cover art, revealed with the answer.
    pub artwork_url: Option<String>,
}

impl Song {
    /// A song can only be played when it has a clip.
    pub fn is_playable(&self) -> bool {
        !self.media_url.trim().is_empty()
    }
}

/// Player info tracked during a room's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Connection-scoped identifier.
    pub id: PlayerId,
    /// Display name chosen by the player.
    pub name: String,
    /// Rounds won so far.
    pub score: u32,
    /// Whether the player's connection is still open.
    pub connected: bool,
}

impl Player {
    /// Build a freshly joined player.
    pub fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            score: 0,
            connected: true,
        }
    }
}

/// The round currently bound to a song.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRound {
    /// 1-based round number, also the round's identity for timers.
    pub number: usize,
    /// Song to be guessed.
    pub song: Song,
}

/// Read-only copy of a room handed out of the room task.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub id: RoomId,
    pub phase: RoomPhase,
    pub version: usize,
    pub owner_id: Option<PlayerId>,
    pub players: Vec<Player>,
    /// Rounds started so far.
    pub round: usize,
    pub total_rounds: usize,
    pub requested_rounds: usize,
    pub round_active: bool,
    pub created_at: SystemTime,
}

/// Authoritative state of one room. Only the room task mutates it.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    created_at: SystemTime,
    requested_rounds: usize,
    machine: RoomStateMachine,
    players: IndexMap<PlayerId, Player>,
    playlist: Vec<Song>,
    round_index: usize,
    current_round: Option<ActiveRound>,
    round_active: bool,
}

impl Room {
    /// Open a room in the lobby with its owner as first player.
    pub fn new(id: RoomId, owner: Player, requested_rounds: usize) -> Self {
        let mut players = IndexMap::new();
        players.insert(owner.id.clone(), owner);

        Self {
            id,
            created_at: SystemTime::now(),
            requested_rounds,
            machine: RoomStateMachine::new(),
            players,
            playlist: Vec::new(),
            round_index: 0,
            current_round: None,
            round_active: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn requested_rounds(&self) -> usize {
        self.requested_rounds
    }

    pub fn phase(&self) -> RoomPhase {
        self.machine.phase()
    }

    /// The first player in join order owns the room.
    pub fn owner(&self) -> Option<&Player> {
        self.players.values().next()
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn round_index(&self) -> usize {
        self.round_index
    }

    pub fn total_rounds(&self) -> usize {
        self.playlist.len()
    }

    pub fn current_round(&self) -> Option<&ActiveRound> {
        self.current_round.as_ref()
    }

    pub fn is_round_active(&self) -> bool {
        self.round_active
    }

    pub fn has_remaining_rounds(&self) -> bool {
        self.round_index < self.playlist.len()
    }

    pub fn connected_players(&self) -> usize {
        self.players.values().filter(|player| player.connected).count()
    }

    /// Add a player while the room is in the lobby.
    pub fn add_player(&mut self, player: Player, capacity: usize) -> Result<&Player, ServiceError> {
        if self.phase() != RoomPhase::Lobby {
            return Err(ServiceError::NotJoinable(format!(
                "room `{}` already started",
                self.id
            )));
        }
        if self.players.contains_key(&player.id) {
            return Err(ServiceError::InvalidState(format!(
                "player `{}` already joined room `{}`",
                player.id, self.id
            )));
        }
        if self.players.len() >= capacity {
            return Err(ServiceError::NotJoinable(format!(
                "room `{}` is full",
                self.id
            )));
        }

        let id = player.id.clone();
        self.players.insert(id.clone(), player);
        self.players
            .get(&id)
            .ok_or_else(|| ServiceError::NotFound(format!("player `{id}` not found")))
    }

    /// Remove a player in the lobby, or mark them disconnected once the game
    /// started so their score stays on the scoreboard. Returns the player.
    pub fn leave(&mut self, player_id: &str) -> Option<Player> {
        if self.phase() == RoomPhase::Lobby {
            return self.players.shift_remove(player_id);
        }

        let player = self.players.get_mut(player_id)?;
        player.connected = false;
        Some(player.clone())
    }

    /// `LOBBY → LOADING`, only for the owner.
    pub fn begin_loading(&mut self, requested_by: &str) -> Result<(), ServiceError> {
        let Some(owner) = self.owner() else {
            return Err(ServiceError::InvalidState(format!(
                "room `{}` has no players",
                self.id
            )));
        };
        if owner.id != requested_by {
            return Err(ServiceError::Unauthorized(
                "only the room owner can start the game".into(),
            ));
        }

        self.machine.apply(RoomEvent::StartGame)?;
        Ok(())
    }

    /// `LOADING → PLAYING` with the resolved playlist.
    pub fn install_playlist(&mut self, playlist: Vec<Song>) -> Result<(), ServiceError> {
        if playlist.is_empty() {
            return Err(ServiceError::InvalidInput(
                "playlist must contain at least one song".into(),
            ));
        }

        self.machine.apply(RoomEvent::PlaylistReady)?;
        self.playlist = playlist;
        self.round_index = 0;
        self.current_round = None;
        self.round_active = false;
        Ok(())
    }

    /// `LOADING → LOBBY` after a failed resolution.
    pub fn rollback_loading(&mut self) -> Result<(), ServiceError> {
        self.machine.apply(RoomEvent::PlaylistFailed)?;
        Ok(())
    }

    /// Open the next round: bind it to the next song, consume the cursor and
    /// open the scoring window. Returns `None` when no round can start.
    pub fn start_next_round(&mut self) -> Option<ActiveRound> {
        if self.phase() != RoomPhase::Playing || self.round_active {
            return None;
        }

        let song = self.playlist.get(self.round_index)?.clone();
        self.round_index += 1;
        let round = ActiveRound {
            number: self.round_index,
            song,
        };
        self.current_round = Some(round.clone());
        self.round_active = true;
        Some(round)
    }

    /// Claim the scoring window of round `number`.
    ///
    /// This is the single gate for resolving a round: it succeeds at most once
    /// per round, and only while that very round is still open.
    pub fn claim_round(&mut self, number: usize) -> Option<ActiveRound> {
        let round = self.current_round.as_ref()?;
        if !self.round_active || round.number != number {
            return None;
        }

        self.round_active = false;
        Some(round.clone())
    }

    /// Award a point to a player, returning the new score.
    pub fn award_point(&mut self, player_id: &str) -> Option<u32> {
        let player = self.players.get_mut(player_id)?;
        player.score += 1;
        Some(player.score)
    }

    /// Record that a resolved round hands over to the next one.
    pub fn complete_round(&mut self) -> Result<(), ServiceError> {
        self.machine.apply(RoomEvent::RoundCompleted)?;
        Ok(())
    }

    /// `PLAYING → ENDED`.
    pub fn finish(&mut self) -> Result<(), ServiceError> {
        self.machine.apply(RoomEvent::Finish)?;
        self.current_round = None;
        self.round_active = false;
        Ok(())
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            id: self.id.clone(),
            phase: self.phase(),
            version: self.machine.snapshot().version,
            owner_id: self.owner().map(|owner| owner.id.clone()),
            players: self.players.values().cloned().collect(),
            round: self.round_index,
            total_rounds: self.total_rounds(),
            requested_rounds: self.requested_rounds,
            round_active: self.round_active,
            created_at: self.created_at,
        }
    }

    /// Players ordered by score, ties kept in join order.
    pub fn scoreboard(&self) -> Vec<Player> {
        let mut players: Vec<Player> = self.players.values().cloned().collect();
        players.sort_by(|a, b| b.score.cmp(&a.score));
        players
    }
}
