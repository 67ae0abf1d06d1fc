use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc, watch,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::{
    dto::{
        room::{RoomSummary, check_room_id},
        sse::{Handshake, ServerEvent, SystemStatus},
    },
    error::ServiceError,
    services::room_events::{self, EVENT_HANDSHAKE, EVENT_SYSTEM_STATUS},
    state::{Broadcaster, SharedState},
};

/// Subscription to a room's event stream, starting with a handshake that
/// carries the room state at subscription time.
pub struct RoomSubscription {
    pub room_id: String,
    pub receiver: broadcast::Receiver<ServerEvent>,
    pub handshake: Option<ServerEvent>,
}

/// Subscribe to the events of a live room.
///
/// The channel is subscribed before the snapshot is taken so nothing
/// published in between is lost.
pub async fn subscribe_room(
    state: &SharedState,
    room_id: &str,
) -> Result<RoomSubscription, ServiceError> {
    check_room_id(room_id)?;
    let handle = state.rooms().find(room_id)?;
    let receiver = state.hub().subscribe_room(room_id);

    let snapshot = match handle.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(err) => {
            // the room closed after lookup; drop the channel we just created
            state.hub().room_closed(room_id);
            return Err(err);
        }
    };

    let handshake = room_events::build_event(
        EVENT_HANDSHAKE,
        &Handshake {
            room_id: room_id.to_string(),
            degraded: state.is_degraded(),
            room: RoomSummary::from(&snapshot),
        },
    );

    Ok(RoomSubscription {
        room_id: room_id.to_string(),
        receiver,
        handshake,
    })
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}

/// Convert a room subscription into an SSE response, forwarding events and
/// degraded-mode changes until the client disconnects or the room closes.
pub fn to_sse_stream(
    subscription: RoomSubscription,
    mut degraded: watch::Receiver<bool>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let RoomSubscription {
        room_id,
        mut receiver,
        handshake,
    } = subscription;

    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    // forwarder task: reads from broadcast and pushes into mpsc
    tokio::spawn(async move {
        if let Some(handshake) = handshake {
            if tx.send(Ok(to_event(handshake))).await.is_err() {
                return;
            }
        }

        let mut watching = true;
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(room_id = %room_id, skipped, "SSE subscriber lagging");
                            continue;
                        }
                    }
                }
                changed = degraded.changed(), if watching => {
                    if changed.is_err() {
                        watching = false;
                        continue;
                    }
                    let status = SystemStatus { degraded: *degraded.borrow_and_update() };
                    if let Some(event) = room_events::build_event(EVENT_SYSTEM_STATUS, &status) {
                        if tx.send(Ok(to_event(event))).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        info!(room_id = %room_id, "room SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
