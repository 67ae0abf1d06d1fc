use thiserror::Error;

/// Lifecycle phases of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// Players are gathering; the owner can start the game.
    Lobby,
    /// The playlist is being generated and resolved.
    Loading,
    /// Rounds are being played.
    Playing,
    /// All rounds were played; the final scoreboard is frozen.
    Ended,
}

/// Events that can be applied to the room state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomEvent {
    /// The owner asked to start the game.
    StartGame,
    /// At least one playable song was resolved.
    PlaylistReady,
    /// Playlist resolution failed; go back to the lobby.
    PlaylistFailed,
    /// A round was resolved and more rounds remain.
    RoundCompleted,
    /// The last round was resolved.
    Finish,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: RoomPhase,
    /// The event that cannot be applied from this phase.
    pub event: RoomEvent,
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase of the state machine.
    pub phase: RoomPhase,
    /// Version number of the state machine (increments on each transition).
    pub version: usize,
}

/// Transition table of a room's lifecycle.
#[derive(Debug, Clone)]
pub struct RoomStateMachine {
    phase: RoomPhase,
    version: usize,
}

impl Default for RoomStateMachine {
    fn default() -> Self {
        Self {
            phase: RoomPhase::Lobby,
            version: 0,
        }
    }
}

impl RoomStateMachine {
    /// Create a new state machine initialised in the lobby.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            version: self.version,
        }
    }

    /// Apply an event, moving to the next phase. The phase is left untouched on error.
    pub fn apply(&mut self, event: RoomEvent) -> Result<RoomPhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.phase = next;
        self.version += 1;
        Ok(next)
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: RoomEvent) -> Result<RoomPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (RoomPhase::Lobby, RoomEvent::StartGame) => RoomPhase::Loading,
            (RoomPhase::Loading, RoomEvent::PlaylistReady) => RoomPhase::Playing,
            (RoomPhase::Loading, RoomEvent::PlaylistFailed) => RoomPhase::Lobby,
            (RoomPhase::Playing, RoomEvent::RoundCompleted) => RoomPhase::Playing,
            (RoomPhase::Playing, RoomEvent::Finish) => RoomPhase::Ended,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut RoomStateMachine, event: RoomEvent) -> RoomPhase {
        sm.apply(event).unwrap()
    }

    #[test]
    fn initial_state_is_lobby() {
        let sm = RoomStateMachine::new();
        assert_eq!(sm.phase(), RoomPhase::Lobby);
        assert_eq!(sm.snapshot().version, 0);
    }

    #[test]
    fn full_happy_path_through_game() {
        let mut sm = RoomStateMachine::new();

        assert_eq!(apply(&mut sm, RoomEvent::StartGame), RoomPhase::Loading);
        assert_eq!(apply(&mut sm, RoomEvent::PlaylistReady), RoomPhase::Playing);
        assert_eq!(apply(&mut sm, RoomEvent::RoundCompleted), RoomPhase::Playing);
        assert_eq!(apply(&mut sm, RoomEvent::RoundCompleted), RoomPhase::Playing);
        assert_eq!(apply(&mut sm, RoomEvent::Finish), RoomPhase::Ended);
        assert_eq!(sm.snapshot().version, 5);
    }

    #[test]
    fn failed_playlist_rolls_back_to_lobby() {
        let mut sm = RoomStateMachine::new();
        apply(&mut sm, RoomEvent::StartGame);

        assert_eq!(apply(&mut sm, RoomEvent::PlaylistFailed), RoomPhase::Lobby);
        assert_eq!(apply(&mut sm, RoomEvent::StartGame), RoomPhase::Loading);
    }

    #[test]
    fn start_is_rejected_once_past_lobby() {
        let mut sm = RoomStateMachine::new();
        apply(&mut sm, RoomEvent::StartGame);

        let err = sm.apply(RoomEvent::StartGame).unwrap_err();
        assert_eq!(err.from, RoomPhase::Loading);
        assert_eq!(err.event, RoomEvent::StartGame);
        assert_eq!(sm.phase(), RoomPhase::Loading);
    }

    #[test]
    fn ended_is_terminal() {
        let mut sm = RoomStateMachine::new();
        apply(&mut sm, RoomEvent::StartGame);
        apply(&mut sm, RoomEvent::PlaylistReady);
        apply(&mut sm, RoomEvent::Finish);

        for event in [
            RoomEvent::StartGame,
            RoomEvent::PlaylistReady,
            RoomEvent::PlaylistFailed,
            RoomEvent::RoundCompleted,
            RoomEvent::Finish,
        ] {
            assert!(sm.apply(event).is_err(), "{event:?} should be rejected");
        }
        assert_eq!(sm.phase(), RoomPhase::Ended);
    }

    #[test]
    fn invalid_transition_does_not_bump_version() {
        let mut sm = RoomStateMachine::new();
        let err = sm.apply(RoomEvent::Finish).unwrap_err();
        assert_eq!(err.from, RoomPhase::Lobby);
        assert_eq!(sm.snapshot().version, 0);
    }
}
