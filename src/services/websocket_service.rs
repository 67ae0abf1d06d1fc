use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{
    sync::{
        broadcast::{self, error::RecvError},
        mpsc,
    },
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        room::{CreateRoomRequest, GuessRequest, JoinRoomRequest, StartGameRequest},
        sse::ServerEvent,
        ws::{PlayerInboundMessage, PlayerOutboundMessage, SessionInfo},
    },
    error::ServiceError,
    services::{
        game_service,
        room_events::{self, EVENT_ERROR, EVENT_SESSION},
        sse_service,
    },
    state::SharedState,
};

/// Time a fresh (or unbound) session gets to create or join a room.
const IDENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors raised while handling one inbound player message.
///
/// Distinct from `ServiceError`, which is also reported to HTTP callers.
#[derive(Debug, Error)]
enum SessionError {
    /// Writer channel closed - connection should be terminated immediately.
    #[error("connection closed")]
    ConnectionClosed,
    /// The session is already bound to a room.
    #[error("session already bound to room `{0}`")]
    AlreadyInRoom(String),
    /// The message needs a room and the session has none.
    #[error("create or join a room first")]
    NoRoom,
    /// The payload could not be understood.
    #[error("unsupported message")]
    Unsupported,
    /// Error from the room or its collaborators.
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl SessionError {
    fn code(&self) -> &'static str {
        match self {
            SessionError::ConnectionClosed => "connection_closed",
            SessionError::AlreadyInRoom(_) => "already_in_room",
            SessionError::NoRoom => "no_room",
            SessionError::Unsupported => "invalid_message",
            SessionError::Service(err) => err.code(),
        }
    }
}

/// The room a session is currently bound to, with the task forwarding its
/// broadcast channel to the socket.
struct RoomBinding {
    room_id: String,
    forwarder: JoinHandle<()>,
}

/// One connected player: a server-assigned identity, at most one room.
struct PlayerSession {
    state: SharedState,
    player_id: String,
    outbound: mpsc::UnboundedSender<Message>,
    room: Option<RoomBinding>,
}

/// Handle the full lifecycle of a player WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let player_id = Uuid::new_v4().simple().to_string();
    let private = state.hub().register_player(&player_id);
    let private_task = tokio::spawn(forward_private(private, outbound_tx.clone()));
    info!(player_id = %player_id, "player connected");

    let mut session = PlayerSession {
        state: state.clone(),
        player_id: player_id.clone(),
        outbound: outbound_tx.clone(),
        room: None,
    };

    let welcome = room_events::build_event(
        EVENT_SESSION,
        &SessionInfo {
            player_id: player_id.clone(),
        },
    );
    let greeted = welcome.map_or(Ok(()), |welcome| session.send(&welcome));
    if greeted.is_err() {
        session.close().await;
        private_task.abort();
        finalize(writer_task, outbound_tx).await;
        return;
    }

    loop {
        let next = if session.room.is_some() {
            receiver.next().await
        } else {
            match tokio::time::timeout(IDENT_TIMEOUT, receiver.next()).await {
                Ok(next) => next,
                Err(_) => {
                    warn!(player_id = %player_id, "no room joined in time, closing");
                    let _ = outbound_tx.send(Message::Close(None));
                    break;
                }
            }
        };
        let Some(message) = next else {
            break;
        };

        match message {
            Ok(Message::Text(text)) => {
                debug!(player_id = %player_id, payload = %text, "received player message");

                let result = match PlayerInboundMessage::from_json_str(&text) {
                    Ok(inbound) => session.handle(inbound).await,
                    Err(err) => {
                        warn!(player_id = %player_id, error = %err, "failed to parse player message");
                        Err(SessionError::Unsupported)
                    }
                };

                match result {
                    Ok(()) => {}
                    Err(SessionError::ConnectionClosed) => {
                        info!(player_id = %player_id, "connection closed while handling message");
                        break;
                    }
                    Err(err) => {
                        debug!(player_id = %player_id, error = %err, "player message refused");
                        if session.send_error(&err).is_err() {
                            break;
                        }
                    }
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(player_id = %player_id, "player closed the socket");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(player_id = %player_id, error = %err, "websocket error");
                break;
            }
        }
    }

    session.close().await;
    private_task.abort();
    info!(player_id = %player_id, "player disconnected");

    finalize(writer_task, outbound_tx).await;
}

impl PlayerSession {
    async fn handle(&mut self, message: PlayerInboundMessage) -> Result<(), SessionError> {
        if message.binds_room() {
            if let Some(binding) = &self.room {
                return Err(SessionError::AlreadyInRoom(binding.room_id.clone()));
            }
        }

        match message {
            PlayerInboundMessage::CreateRoom { name, rounds } => {
                let room = game_service::create_room(
                    &self.state,
                    CreateRoomRequest {
                        player_id: self.player_id.clone(),
                        name,
                        rounds,
                    },
                )
                .await?;
                let receiver = self.state.hub().subscribe_room(&room.id);
                self.bind(room.id, receiver);
                Ok(())
            }
            PlayerInboundMessage::JoinRoom { room_id, name } => {
                // subscribe first so our own `player-joined` is not missed
                let subscription = sse_service::subscribe_room(&self.state, &room_id).await?;
                game_service::join_room(
                    &self.state,
                    &room_id,
                    JoinRoomRequest {
                        player_id: self.player_id.clone(),
                        name,
                    },
                )
                .await?;
                self.bind(subscription.room_id, subscription.receiver);
                Ok(())
            }
            PlayerInboundMessage::StartGame { criteria } => {
                let room_id = self.room_id()?;
                game_service::start_game(
                    &self.state,
                    &room_id,
                    StartGameRequest {
                        player_id: self.player_id.clone(),
                        criteria,
                    },
                )
                .await?;
                Ok(())
            }
            PlayerInboundMessage::Guess { text } => {
                let room_id = self.room_id()?;
                // the verdict reaches the player as `round-won` or `wrong-guess`
                game_service::submit_guess(
                    &self.state,
                    &room_id,
                    GuessRequest {
                        player_id: self.player_id.clone(),
                        guess: text,
                    },
                )
                .await?;
                Ok(())
            }
            PlayerInboundMessage::LeaveRoom => {
                let room_id = self.room_id()?;
                self.unbind();
                game_service::disconnect(&self.state, &room_id, &self.player_id).await?;
                Ok(())
            }
            PlayerInboundMessage::Unknown => Err(SessionError::Unsupported),
        }
    }

    fn room_id(&self) -> Result<String, SessionError> {
        self.room
            .as_ref()
            .map(|binding| binding.room_id.clone())
            .ok_or(SessionError::NoRoom)
    }

    fn bind(&mut self, room_id: String, receiver: broadcast::Receiver<ServerEvent>) {
        info!(player_id = %self.player_id, room_id = %room_id, "session bound to room");
        let forwarder = tokio::spawn(forward_room(
            room_id.clone(),
            receiver,
            self.outbound.clone(),
        ));
        self.room = Some(RoomBinding { room_id, forwarder });
    }

    fn unbind(&mut self) -> Option<String> {
        let binding = self.room.take()?;
        binding.forwarder.abort();
        Some(binding.room_id)
    }

    fn send(&self, event: &ServerEvent) -> Result<(), SessionError> {
        send_event(&self.outbound, event)
    }

    fn send_error(&self, err: &SessionError) -> Result<(), SessionError> {
        let payload = room_events::error_payload(err.code(), err.to_string());
        match room_events::build_event(EVENT_ERROR, &payload) {
            Some(event) => self.send(&event),
            None => Ok(()),
        }
    }

    /// Leave the bound room, if any, and release the unicast channel.
    async fn close(mut self) {
        if let Some(room_id) = self.unbind() {
            match game_service::disconnect(&self.state, &room_id, &self.player_id).await {
                Ok(()) => {}
                // the room may already be gone
                Err(ServiceError::NotFound(_) | ServiceError::RoomClosed(_)) => {}
                Err(err) => {
                    warn!(player_id = %self.player_id, room_id = %room_id, error = %err, "disconnect failed")
                }
            }
        }
        self.state.hub().unregister_player(&self.player_id);
    }
}

/// Serialize an event and push it onto the provided WebSocket sender.
///
/// Serialization failures are logged and swallowed; only a closed writer is an error.
fn send_event(
    tx: &mpsc::UnboundedSender<Message>,
    event: &ServerEvent,
) -> Result<(), SessionError> {
    let payload = match serde_json::to_string(&PlayerOutboundMessage::from(event)) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(event = event.name(), error = %err, "failed to serialize outbound frame");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into()))
        .map_err(|_| SessionError::ConnectionClosed)
}

async fn forward_room(
    room_id: String,
    mut receiver: broadcast::Receiver<ServerEvent>,
    tx: mpsc::UnboundedSender<Message>,
) {
    loop {
        match receiver.recv().await {
            Ok(event) => {
                if send_event(&tx, &event).is_err() {
                    break;
                }
            }
            Err(RecvError::Closed) => {
                debug!(room_id = %room_id, "room channel closed");
                break;
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(room_id = %room_id, skipped, "player session lagging behind room events");
            }
        }
    }
}

async fn forward_private(
    mut receiver: mpsc::UnboundedReceiver<ServerEvent>,
    tx: mpsc::UnboundedSender<Message>,
) {
    while let Some(event) = receiver.recv().await {
        if send_event(&tx, &event).is_err() {
            break;
        }
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_tagged_with_the_event_name() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let event = ServerEvent::new(Some("scoreboard-updated".to_string()), "{\"players\":[]}".into());

        send_event(&tx, &event).unwrap();
        let Some(Message::Text(text)) = rx.try_recv().ok() else {
            panic!("expected a text frame");
        };
        let frame: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(frame["event"], "scoreboard-updated");
        assert_eq!(frame["data"]["players"], serde_json::json!([]));
    }

    #[test]
    fn closed_writer_is_reported() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let event = ServerEvent::new(Some("error".to_string()), "{}".into());
        assert!(matches!(
            send_event(&tx, &event),
            Err(SessionError::ConnectionClosed)
        ));
    }

    #[test]
    fn service_errors_keep_their_code() {
        let err = SessionError::from(ServiceError::NotJoinable("full".into()));
        assert_eq!(err.code(), "not_joinable");
        assert_eq!(SessionError::NoRoom.code(), "no_room");
    }

    #[tokio::test]
    async fn room_forwarder_ends_with_the_room() {
        let (room_tx, room_rx) = broadcast::channel(4);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(forward_room("ABCDEF".into(), room_rx, tx));

        room_tx
            .send(ServerEvent::new(Some("game-over".to_string()), "{}".into()))
            .unwrap();
        drop(room_tx);
        task.await.unwrap();

        assert!(matches!(rx.recv().await, Some(Message::Text(_))));
        assert!(rx.recv().await.is_none());
    }
}
