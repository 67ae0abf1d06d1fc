//! Names and builders of the events emitted by rooms.

use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        room::{PlayerSummary, RoomSummary},
        sse::{
            ErrorEvent, GameLoadingEvent, GameOverEvent, GameStartedEvent, PlayerJoinedEvent,
            PlayerLeftEvent, RoomMembershipEvent, RoundCountdownEvent, RoundStartedEvent,
            RoundTimeoutEvent, RoundWonEvent, ScoreboardEvent, ServerEvent, SongReveal,
            WrongGuessEvent, WrongGuessReason,
        },
    },
    state::{
        hub::Broadcaster,
        room::{ActiveRound, Player, Room},
    },
};

pub const EVENT_ROOM_CREATED: &str = "room-created";
pub const EVENT_ROOM_JOINED: &str = "room-joined";
pub const EVENT_PLAYER_JOINED: &str = "player-joined";
pub const EVENT_PLAYER_LEFT: &str = "player-left";
pub const EVENT_GAME_LOADING: &str = "game-loading";
pub const EVENT_GAME_STARTED: &str = "game-started";
pub const EVENT_ROUND_COUNTDOWN: &str = "round-countdown";
pub const EVENT_ROUND_STARTED: &str = "round-started";
pub const EVENT_ROUND_WON: &str = "round-won";
pub const EVENT_ROUND_TIMEOUT: &str = "round-timeout";
pub const EVENT_WRONG_GUESS: &str = "wrong-guess";
pub const EVENT_SCOREBOARD_UPDATED: &str = "scoreboard-updated";
pub const EVENT_GAME_OVER: &str = "game-over";
pub const EVENT_ERROR: &str = "error";
pub const EVENT_HANDSHAKE: &str = "handshake";
pub const EVENT_SYSTEM_STATUS: &str = "system-status";
pub const EVENT_SESSION: &str = "session";

/// Serialise `payload` into a named event.
pub fn build_event<T>(name: &str, payload: &T) -> Option<ServerEvent>
where
    T: Serialize,
{
    match ServerEvent::json(Some(name.to_string()), payload) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(event = name, error = %err, "failed to serialise event payload");
            None
        }
    }
}

fn publish<T: Serialize>(broadcaster: &dyn Broadcaster, room_id: &str, name: &str, payload: &T) {
    if let Some(event) = build_event(name, payload) {
        broadcaster.publish(room_id, event);
    }
}

fn notify<T: Serialize>(broadcaster: &dyn Broadcaster, player_id: &str, name: &str, payload: &T) {
    if let Some(event) = build_event(name, payload) {
        broadcaster.notify(player_id, event);
    }
}

fn summaries<'a>(players: impl Iterator<Item = &'a Player>) -> Vec<PlayerSummary> {
    players.map(PlayerSummary::from).collect()
}

/// Tell a player which room they are now part of (`room-created` or `room-joined`).
pub fn notify_membership(broadcaster: &dyn Broadcaster, name: &str, player_id: &str, room: &Room) {
    let payload = RoomMembershipEvent {
        player_id: player_id.to_string(),
        room: RoomSummary::from(&room.snapshot()),
    };
    notify(broadcaster, player_id, name, &payload);
}

pub fn publish_player_joined(broadcaster: &dyn Broadcaster, room: &Room, player: &Player) {
    let payload = PlayerJoinedEvent {
        player: player.into(),
        players: summaries(room.players()),
    };
    publish(broadcaster, room.id(), EVENT_PLAYER_JOINED, &payload);
}

pub fn publish_player_left(broadcaster: &dyn Broadcaster, room: &Room, player: &Player) {
    let payload = PlayerLeftEvent {
        player: player.into(),
        owner_id: room.owner().map(|owner| owner.id.clone()),
    };
    publish(broadcaster, room.id(), EVENT_PLAYER_LEFT, &payload);
}

pub fn publish_game_loading(broadcaster: &dyn Broadcaster, room_id: &str, requested_rounds: usize) {
    publish(
        broadcaster,
        room_id,
        EVENT_GAME_LOADING,
        &GameLoadingEvent { requested_rounds },
    );
}

pub fn publish_game_started(broadcaster: &dyn Broadcaster, room: &Room) {
    let payload = GameStartedEvent {
        total_rounds: room.total_rounds(),
        players: summaries(room.players()),
    };
    publish(broadcaster, room.id(), EVENT_GAME_STARTED, &payload);
}

pub fn publish_round_countdown(
    broadcaster: &dyn Broadcaster,
    room: &Room,
    round: usize,
    countdown: Duration,
) {
    let payload = RoundCountdownEvent {
        round,
        total_rounds: room.total_rounds(),
        countdown_ms: whole_millis(countdown),
    };
    publish(broadcaster, room.id(), EVENT_ROUND_COUNTDOWN, &payload);
}

/// Announce an open round with its clip only.
pub fn publish_round_started(
    broadcaster: &dyn Broadcaster,
    room: &Room,
    round: &ActiveRound,
    duration: Duration,
) {
    let payload = RoundStartedEvent {
        round: round.number,
        total_rounds: room.total_rounds(),
        media_url: round.song.media_url.clone(),
        duration_ms: whole_millis(duration),
    };
    publish(broadcaster, room.id(), EVENT_ROUND_STARTED, &payload);
}

pub fn publish_round_won(
    broadcaster: &dyn Broadcaster,
    room_id: &str,
    round: &ActiveRound,
    winner: &Player,
) {
    let payload = RoundWonEvent {
        round: round.number,
        winner: winner.into(),
        song: SongReveal::from(&round.song),
    };
    publish(broadcaster, room_id, EVENT_ROUND_WON, &payload);
}

pub fn publish_round_timeout(broadcaster: &dyn Broadcaster, room_id: &str, round: &ActiveRound) {
    let payload = RoundTimeoutEvent {
        round: round.number,
        song: SongReveal::from(&round.song),
    };
    publish(broadcaster, room_id, EVENT_ROUND_TIMEOUT, &payload);
}

pub fn publish_scoreboard(broadcaster: &dyn Broadcaster, room: &Room) {
    let payload = ScoreboardEvent {
        players: summaries(room.scoreboard().iter()),
    };
    publish(broadcaster, room.id(), EVENT_SCOREBOARD_UPDATED, &payload);
}

pub fn publish_game_over(broadcaster: &dyn Broadcaster, room: &Room) {
    let scoreboard = room.scoreboard();
    let best = scoreboard.first().map(|player| player.score).unwrap_or(0);
    let winners = scoreboard
        .iter()
        .filter(|player| best > 0 && player.score == best)
        .map(PlayerSummary::from)
        .collect();

    let payload = GameOverEvent {
        scoreboard: summaries(scoreboard.iter()),
        winners,
    };
    publish(broadcaster, room.id(), EVENT_GAME_OVER, &payload);
}

/// Private notice to the author of a guess that did not score.
pub fn notify_wrong_guess(
    broadcaster: &dyn Broadcaster,
    player_id: &str,
    round: usize,
    guess: &str,
    reason: WrongGuessReason,
) {
    let payload = WrongGuessEvent {
        round,
        guess: guess.to_string(),
        reason,
    };
    notify(broadcaster, player_id, EVENT_WRONG_GUESS, &payload);
}

pub fn error_payload(code: &str, message: impl Into<String>) -> ErrorEvent {
    ErrorEvent {
        code: code.to_string(),
        message: message.into(),
    }
}

pub fn publish_error(broadcaster: &dyn Broadcaster, room_id: &str, code: &str, message: &str) {
    publish(
        broadcaster,
        room_id,
        EVENT_ERROR,
        &error_payload(code, message),
    );
}

/// Milliseconds of `duration`, saturating at `u64::MAX`.
fn whole_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{room::Song, testing::RecordingBroadcaster};

    fn song(title: &str) -> Song {
        Song {
            title: title.into(),
            artist: "Artist".into(),
            media_url: format!("https://cdn.test/{title}.m4a"),
            artwork_url: None,
        }
    }

    fn playing_room() -> Room {
        let mut room = Room::new("ROOM23".into(), Player::new("p1".into(), "Ann".into()), 2);
        room.add_player(Player::new("p2".into(), "Bob".into()), 8)
            .unwrap();
        room.add_player(Player::new("p3".into(), "Cid".into()), 8)
            .unwrap();
        room.begin_loading("p1").unwrap();
        room.install_playlist(vec![song("One"), song("Two")]).unwrap();
        room
    }

    #[test]
    fn round_started_never_reveals_the_answer() {
        let events = RecordingBroadcaster::default();
        let mut room = playing_room();
        let round = room.start_next_round().unwrap();

        publish_round_started(&events, &room, &round, Duration::from_secs(30));

        let started = &events.named(EVENT_ROUND_STARTED)[0];
        assert_eq!(started.data["duration_ms"], 30_000);
        assert_eq!(started.data["media_url"], "https://cdn.test/One.m4a");
        assert!(started.data.get("title").is_none());
        assert!(!started.data.to_string().contains("\"One\""));
    }

    #[test]
    fn durations_beyond_u64_millis_saturate() {
        assert_eq!(whole_millis(Duration::from_millis(1_500)), 1_500);
        assert_eq!(whole_millis(Duration::MAX), u64::MAX);

        let events = RecordingBroadcaster::default();
        let room = playing_room();
        publish_round_countdown(&events, &room, 1, Duration::MAX);
        let countdown = &events.named(EVENT_ROUND_COUNTDOWN)[0];
        assert_eq!(countdown.data["countdown_ms"], u64::MAX);
    }

    #[test]
    fn tied_best_scores_all_win() {
        let events = RecordingBroadcaster::default();
        let mut room = playing_room();
        room.award_point("p2");
        room.award_point("p3");

        publish_game_over(&events, &room);

        let over = &events.named(EVENT_GAME_OVER)[0].data;
        let winners: Vec<&str> = over["winners"]
            .as_array()
            .unwrap()
            .iter()
            .map(|w| w["id"].as_str().unwrap())
            .collect();
        assert_eq!(winners, vec!["p2", "p3"]);
        assert_eq!(over["scoreboard"][2]["id"], "p1");
    }

    #[test]
    fn nobody_wins_a_scoreless_game() {
        let events = RecordingBroadcaster::default();
        publish_game_over(&events, &playing_room());

        let over = &events.named(EVENT_GAME_OVER)[0].data;
        assert_eq!(over["winners"], serde_json::json!([]));
    }

    #[test]
    fn wrong_guess_goes_to_its_author() {
        let events = RecordingBroadcaster::default();
        notify_wrong_guess(&events, "p2", 1, "nope", WrongGuessReason::Incorrect);

        let notices = events.notified("p2", EVENT_WRONG_GUESS);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].data["guess"], "nope");
        assert!(events.notified("p1", EVENT_WRONG_GUESS).is_empty());
    }
}
