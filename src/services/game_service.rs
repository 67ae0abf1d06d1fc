use tracing::info;
use validator::Validate;

use crate::{
    dto::room::{
        CreateRoomRequest, GuessRequest, JoinRoomRequest, LeaveRoomRequest, RoomSummary,
        StartGameRequest, check_room_id,
    },
    error::ServiceError,
    state::{
        SharedState,
        actor::{RoomCommand, RoomHandle},
        room::Player,
    },
};

pub use crate::state::actor::GuessOutcome;

/// Open a room owned by the caller.
pub async fn create_room(
    state: &SharedState,
    request: CreateRoomRequest,
) -> Result<RoomSummary, ServiceError> {
    request.validate()?;
    let CreateRoomRequest {
        player_id,
        name,
        rounds,
    } = request;

    let rounds = state.config().rooms.clamp_rounds(rounds);
    let owner = Player::new(player_id, name.trim().to_string());
    let handle = state
        .rooms()
        .create(owner, rounds, state.room_context())?;
    info!(room_id = %handle.id(), rounds, "room created");

    let snapshot = handle.snapshot().await?;
    Ok(RoomSummary::from(&snapshot))
}

/// Add the caller to a room still in its lobby.
pub async fn join_room(
    state: &SharedState,
    room_id: &str,
    request: JoinRoomRequest,
) -> Result<RoomSummary, ServiceError> {
    request.validate()?;
    let handle = find_room(state, room_id)?;
    let player = Player::new(request.player_id, request.name.trim().to_string());

    let snapshot = handle
        .request(|reply| RoomCommand::Join { player, reply })
        .await?;
    Ok(RoomSummary::from(&snapshot))
}

/// Start the game on behalf of the room owner. Returns once loading began;
/// the outcome of playlist resolution is published as events.
pub async fn start_game(
    state: &SharedState,
    room_id: &str,
    request: StartGameRequest,
) -> Result<RoomSummary, ServiceError> {
    request.validate()?;
    let handle = find_room(state, room_id)?;
    let StartGameRequest {
        player_id,
        criteria,
    } = request;

    let snapshot = handle
        .request(|reply| RoomCommand::StartGame {
            player_id,
            criteria,
            reply,
        })
        .await?;
    Ok(RoomSummary::from(&snapshot))
}

/// Submit a free-text answer for the open round.
pub async fn submit_guess(
    state: &SharedState,
    room_id: &str,
    request: GuessRequest,
) -> Result<GuessOutcome, ServiceError> {
    request.validate()?;
    let handle = find_room(state, room_id)?;
    let GuessRequest { player_id, guess } = request;

    handle
        .request(|reply| RoomCommand::Guess {
            player_id,
            text: guess,
            reply,
        })
        .await
}

/// Remove the caller from a room (or mark them disconnected once the game
/// started). The room is torn down when nobody connected is left.
pub async fn leave_room(
    state: &SharedState,
    room_id: &str,
    request: LeaveRoomRequest,
) -> Result<(), ServiceError> {
    request.validate()?;
    disconnect(state, room_id, &request.player_id).await
}

/// Transport-level disconnect; same semantics as [`leave_room`].
pub async fn disconnect(
    state: &SharedState,
    room_id: &str,
    player_id: &str,
) -> Result<(), ServiceError> {
    let handle = find_room(state, room_id)?;
    let player_id = player_id.to_string();
    handle
        .request(|reply| RoomCommand::Leave { player_id, reply })
        .await
}

/// Current public view of a room.
pub async fn room_summary(state: &SharedState, room_id: &str) -> Result<RoomSummary, ServiceError> {
    let handle = find_room(state, room_id)?;
    let snapshot = handle.snapshot().await?;
    Ok(RoomSummary::from(&snapshot))
}

fn find_room(state: &SharedState, room_id: &str) -> Result<RoomHandle, ServiceError> {
    check_room_id(room_id)?;
    state.rooms().find(room_id)
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use futures::future::join_all;

    use super::*;
    use crate::{
        config::{AppConfig, PlaylistSettings, RoundTimings},
        dao::history::{HistoryStore, memory::MemoryHistoryStore},
        dao::models::RoomStatusEntity,
        dto::phase::VisibleRoomPhase,
        providers::{CandidateTrack, PlaylistCriteria},
        state::{
            AppState, Collaborators, EventHub,
            testing::{RecordingBroadcaster, ScriptedLookup, ScriptedProvider, candidate},
        },
    };

    struct Harness {
        state: SharedState,
        events: Arc<RecordingBroadcaster>,
    }

    fn config() -> AppConfig {
        AppConfig {
            timings: RoundTimings {
                countdown: Duration::from_secs(1),
                round: Duration::from_secs(10),
                win_delay: Duration::from_secs(1),
                timeout_delay: Duration::from_secs(2),
            },
            playlist: PlaylistSettings {
                shuffle_seed: Some(3),
                ..PlaylistSettings::default()
            },
            ..AppConfig::default()
        }
    }

    fn harness(tracks: Vec<CandidateTrack>) -> Harness {
        harness_with(ScriptedProvider::returning(tracks))
    }

    fn harness_with(provider: ScriptedProvider) -> Harness {
        let events = Arc::new(RecordingBroadcaster::default());
        let collaborators = Collaborators {
            playlist: Arc::new(provider),
            media: Arc::new(ScriptedLookup::default()),
        };
        let state = AppState::with_broadcaster(
            Arc::new(config()),
            collaborators,
            Arc::new(EventHub::new(16)),
            events.clone(),
        );
        Harness { state, events }
    }

    impl Harness {
        async fn open(&self, players: &[&str]) -> String {
            let summary = create_room(
                &self.state,
                CreateRoomRequest {
                    player_id: players[0].into(),
                    name: players[0].to_uppercase(),
                    rounds: None,
                },
            )
            .await
            .unwrap();

            for player in &players[1..] {
                join_room(
                    &self.state,
                    &summary.id,
                    JoinRoomRequest {
                        player_id: (*player).into(),
                        name: player.to_uppercase(),
                    },
                )
                .await
                .unwrap();
            }
            summary.id
        }

        async fn start(&self, room_id: &str, owner: &str, rounds: usize) {
            start_game(
                &self.state,
                room_id,
                StartGameRequest {
                    player_id: owner.into(),
                    criteria: PlaylistCriteria {
                        rounds: Some(rounds),
                        ..PlaylistCriteria::default()
                    },
                },
            )
            .await
            .unwrap();
        }

        async fn guess(&self, room_id: &str, player: &str, text: &str) -> GuessOutcome {
            submit_guess(
                &self.state,
                room_id,
                GuessRequest {
                    player_id: player.into(),
                    guess: text.into(),
                },
            )
            .await
            .unwrap()
        }

        /// Let virtual time run until `name` was emitted `count` times.
        async fn wait_for(&self, name: &str, count: usize) {
            for _ in 0..10_000 {
                if self.events.count(name) >= count {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            panic!("`{name}` was not emitted {count} times");
        }
    }

    fn tracks() -> Vec<CandidateTrack> {
        vec![
            candidate("Oasis", "Wonderwall"),
            candidate("Queen", "Bohemian Rhapsody"),
            candidate("ABBA", "Dancing Queen"),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn create_and_join_publish_membership() {
        let h = harness(tracks());
        let room_id = h.open(&["p1", "p2"]).await;

        let summary = room_summary(&h.state, &room_id).await.unwrap();
        assert_eq!(summary.phase, VisibleRoomPhase::Lobby);
        assert_eq!(summary.owner_id.as_deref(), Some("p1"));
        assert_eq!(summary.players.len(), 2);

        assert_eq!(h.events.notified("p1", "room-created").len(), 1);
        assert_eq!(h.events.notified("p2", "room-joined").len(), 1);
        assert_eq!(h.events.count("player-joined"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn only_the_owner_starts_and_late_joins_are_refused() {
        let h = harness(tracks());
        let room_id = h.open(&["p1", "p2"]).await;

        let err = start_game(
            &h.state,
            &room_id,
            StartGameRequest {
                player_id: "p2".into(),
                criteria: PlaylistCriteria::default(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        h.start(&room_id, "p1", 1).await;
        let late = join_room(
            &h.state,
            &room_id,
            JoinRoomRequest {
                player_id: "p3".into(),
                name: "Cid".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(late, ServiceError::NotJoinable(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn full_game_reaches_game_over() {
        let h = harness(tracks());
        let room_id = h.open(&["p1", "p2"]).await;
        h.start(&room_id, "p1", 2).await;

        for round in 1..=2 {
            h.wait_for("round-started", round).await;
            let mut won = false;
            for track in tracks() {
                if h.guess(&room_id, "p2", &track.title).await == GuessOutcome::Correct {
                    won = true;
                    break;
                }
            }
            assert!(won, "round {round} could not be won");

            if round == 1 {
                let summary = room_summary(&h.state, &room_id).await.unwrap();
                assert_eq!(summary.phase, VisibleRoomPhase::Playing);
                assert_eq!(summary.round, 1);
                assert!(!summary.round_active);
            }
        }

        h.wait_for("game-over", 1).await;
        assert_eq!(h.events.count("round-won"), 2);
        assert_eq!(h.events.count("round-timeout"), 0);

        // nothing is left scheduled once the game ended
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(h.events.count("round-countdown"), 2);
        assert_eq!(h.events.count("round-started"), 2);
        assert_eq!(h.events.count("round-timeout"), 0);
        assert_eq!(h.events.count("game-over"), 1);

        let over = &h.events.named("game-over")[0].data;
        assert_eq!(over["winners"][0]["id"], "p2");
        assert_eq!(over["scoreboard"][0]["score"], 2);

        let summary = room_summary(&h.state, &room_id).await.unwrap();
        assert_eq!(summary.phase, VisibleRoomPhase::Ended);
        assert_eq!(summary.round, summary.total_rounds);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_correct_guesses_score_once() {
        let h = harness(vec![candidate("Oasis", "Wonderwall")]);
        let players = ["p1", "p2", "p3", "p4", "p5", "p6", "p7", "p8"];
        let room_id = h.open(&players).await;
        h.start(&room_id, "p1", 1).await;
        h.wait_for("round-started", 1).await;

        let outcomes = join_all(
            players
                .iter()
                .map(|player| h.guess(&room_id, player, "wonderwall")),
        )
        .await;

        let correct = outcomes
            .iter()
            .filter(|outcome| **outcome == GuessOutcome::Correct)
            .count();
        assert_eq!(correct, 1);
        assert!(
            outcomes
                .iter()
                .all(|o| matches!(o, GuessOutcome::Correct | GuessOutcome::RoundClosed))
        );

        h.wait_for("game-over", 1).await;
        assert_eq!(h.events.count("round-won"), 1);
        assert_eq!(h.events.count("round-timeout"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_round_times_out_once() {
        let h = harness(vec![candidate("Oasis", "Wonderwall")]);
        let room_id = h.open(&["p1", "p2"]).await;
        h.start(&room_id, "p1", 1).await;

        h.wait_for("game-over", 1).await;
        assert_eq!(h.events.count("round-timeout"), 1);
        assert_eq!(h.events.count("round-won"), 0);

        let timeout = &h.events.named("round-timeout")[0].data;
        assert_eq!(timeout["song"]["title"], "Wonderwall");
        let over = &h.events.named("game-over")[0].data;
        assert_eq!(over["winners"].as_array().map(Vec::len), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn late_guess_is_told_the_round_closed() {
        let h = harness(vec![candidate("Oasis", "Wonderwall"), candidate("Queen", "Bohemian Rhapsody")]);
        let room_id = h.open(&["p1", "p2"]).await;
        h.start(&room_id, "p1", 2).await;
        h.wait_for("round-started", 1).await;

        let mut winner_title = None;
        for title in ["Wonderwall", "Bohemian Rhapsody"] {
            if h.guess(&room_id, "p1", title).await == GuessOutcome::Correct {
                winner_title = Some(title);
                break;
            }
        }
        let title = winner_title.unwrap();

        assert_eq!(h.guess(&room_id, "p2", title).await, GuessOutcome::RoundClosed);
        let notices = h.events.notified("p2", "wrong-guess");
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].data["reason"], "round_closed");
        assert_eq!(h.events.count("round-won"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_guess_is_private_and_leaves_the_round_open() {
        let h = harness(vec![candidate("Oasis", "Wonderwall")]);
        let room_id = h.open(&["p1", "p2"]).await;
        h.start(&room_id, "p1", 1).await;
        h.wait_for("round-started", 1).await;

        assert_eq!(h.guess(&room_id, "p2", "yellow submarine").await, GuessOutcome::Incorrect);
        let notices = h.events.notified("p2", "wrong-guess");
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].data["reason"], "incorrect");

        let summary = room_summary(&h.state, &room_id).await.unwrap();
        assert!(summary.round_active);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_playlist_rolls_back_to_lobby() {
        let h = harness(Vec::new());
        let room_id = h.open(&["p1"]).await;
        h.start(&room_id, "p1", 3).await;

        h.wait_for("error", 1).await;
        let summary = room_summary(&h.state, &room_id).await.unwrap();
        assert_eq!(summary.phase, VisibleRoomPhase::Lobby);
        assert_eq!(h.events.count("error"), 1);
        assert_eq!(h.events.count("game-started"), 0);
        assert_eq!(h.events.named("error")[0].data["code"], "playlist_unavailable");

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(h.events.count("round-countdown"), 0);
        assert_eq!(h.events.count("round-started"), 0);
        assert_eq!(h.events.count("round-timeout"), 0);

        // the owner may retry from the lobby
        h.start(&room_id, "p1", 3).await;
        h.wait_for("error", 2).await;
    }

    #[tokio::test(start_paused = true)]
    async fn guess_outside_a_game_is_refused() {
        let h = harness(tracks());
        let room_id = h.open(&["p1"]).await;

        let err = submit_guess(
            &h.state,
            &room_id,
            GuessRequest {
                player_id: "p1".into(),
                guess: "wonderwall".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn room_is_torn_down_when_everyone_left() {
        let h = harness(tracks());
        let room_id = h.open(&["p1", "p2"]).await;
        h.start(&room_id, "p1", 3).await;
        h.wait_for("round-started", 1).await;

        disconnect(&h.state, &room_id, "p1").await.unwrap();
        assert_eq!(h.state.rooms().len(), 1);
        disconnect(&h.state, &room_id, "p2").await.unwrap();

        for _ in 0..100 {
            if h.state.rooms().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(h.state.rooms().is_empty());
        assert_eq!(h.events.closed_rooms(), vec![room_id.clone()]);

        let err = room_summary(&h.state, &room_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        // no timer outlives the room
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(h.events.count("round-timeout"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnected_player_keeps_score() {
        let h = harness(vec![candidate("Oasis", "Wonderwall"), candidate("Queen", "Bohemian Rhapsody")]);
        let room_id = h.open(&["p1", "p2"]).await;
        h.start(&room_id, "p1", 2).await;
        h.wait_for("round-started", 1).await;

        for title in ["Wonderwall", "Bohemian Rhapsody"] {
            if h.guess(&room_id, "p2", title).await == GuessOutcome::Correct {
                break;
            }
        }
        disconnect(&h.state, &room_id, "p2").await.unwrap();

        let summary = room_summary(&h.state, &room_id).await.unwrap();
        let p2 = summary.players.iter().find(|p| p.id == "p2").unwrap();
        assert_eq!(p2.score, 1);
        assert!(!p2.connected);

        let err = submit_guess(
            &h.state,
            &room_id,
            GuessRequest {
                player_id: "p2".into(),
                guess: "anything".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn history_records_the_final_results() {
        let h = harness(vec![candidate("Oasis", "Wonderwall")]);
        let store = MemoryHistoryStore::new();
        h.state.history().install(Arc::new(store.clone())).await;

        let room_id = h.open(&["p1", "p2"]).await;
        let record_id = h.state.rooms().get(&room_id).unwrap().instance();
        h.start(&room_id, "p1", 1).await;
        h.wait_for("round-started", 1).await;
        assert_eq!(h.guess(&room_id, "p2", "Wonderwall").await, GuessOutcome::Correct);
        h.wait_for("game-over", 1).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let record = store.find_room(record_id).await.unwrap().unwrap();
        assert_eq!(record.status, RoomStatusEntity::Ended);
        assert_eq!(record.results[0].player_id, "p2");
        assert_eq!(record.results[0].rank, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_requests_are_rejected_before_reaching_a_room() {
        let h = harness_with(ScriptedProvider::failing());

        let err = create_room(
            &h.state,
            CreateRoomRequest {
                player_id: "p1".into(),
                name: " ".into(),
                rounds: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        let err = room_summary(&h.state, "bad id").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        let err = room_summary(&h.state, "ZZZZ22").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
