//! Outbound event fan-out: one broadcast channel per room (SSE streams and
//! WebSocket sessions subscribe to it) plus one unicast channel per connected
//! WebSocket player.

use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use crate::dto::sse::ServerEvent;

/// Delivers room events to clients.
pub trait Broadcaster: Send + Sync {
    /// Fan out to everyone watching `room_id`.
    fn publish(&self, room_id: &str, event: ServerEvent);

    /// Deliver to a single player.
    fn notify(&self, player_id: &str, event: ServerEvent);

    /// The room was torn down; release its channels.
    fn room_closed(&self, _room_id: &str) {}
}

/// Simple broadcast hub wrapper used by the SSE services.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }
}

/// [`Broadcaster`] backed by Tokio channels.
pub struct EventHub {
    capacity: usize,
    rooms: DashMap<String, SseHub>,
    players: DashMap<String, mpsc::UnboundedSender<ServerEvent>>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            rooms: DashMap::new(),
            players: DashMap::new(),
        }
    }

    /// Subscribe to a room's broadcast channel, creating it on first use.
    pub fn subscribe_room(&self, room_id: &str) -> broadcast::Receiver<ServerEvent> {
        self.rooms
            .entry(room_id.to_string())
            .or_insert_with(|| SseHub::new(self.capacity))
            .subscribe()
    }

    /// Register the unicast channel of a player, replacing any previous one.
    pub fn register_player(&self, player_id: &str) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.players.insert(player_id.to_string(), tx);
        rx
    }

    pub fn unregister_player(&self, player_id: &str) {
        self.players.remove(player_id);
    }
}

impl Broadcaster for EventHub {
    fn publish(&self, room_id: &str, event: ServerEvent) {
        // no hub yet means nobody is listening
        if let Some(hub) = self.rooms.get(room_id) {
            hub.broadcast(event);
        }
    }

    fn notify(&self, player_id: &str, event: ServerEvent) {
        let Some(tx) = self.players.get(player_id).map(|entry| entry.clone()) else {
            debug!(player_id, event = event.name(), "no unicast channel for player");
            return;
        };

        if tx.send(event).is_err() {
            self.players.remove(player_id);
        }
    }

    fn room_closed(&self, room_id: &str) {
        // dropping the sender ends every subscribed stream
        self.rooms.remove(room_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::RecvError;

    fn event(name: &str) -> ServerEvent {
        ServerEvent::new(Some(name.to_string()), "{}".into())
    }

    #[tokio::test]
    async fn publish_reaches_room_subscribers_only() {
        let hub = EventHub::new(8);
        let mut a = hub.subscribe_room("AAAAAA");
        let mut b = hub.subscribe_room("BBBBBB");

        hub.publish("AAAAAA", event("round-started"));

        assert_eq!(a.recv().await.unwrap().name(), "round-started");
        assert!(b.try_recv().is_err());
    }

    #[tokio::test]
    async fn notify_targets_one_player() {
        let hub = EventHub::new(8);
        let mut ann = hub.register_player("ann");
        let mut bob = hub.register_player("bob");

        hub.notify("ann", event("wrong-guess"));

        assert_eq!(ann.recv().await.unwrap().name(), "wrong-guess");
        assert!(bob.try_recv().is_err());

        hub.unregister_player("ann");
        hub.notify("ann", event("wrong-guess"));
        assert!(ann.recv().await.is_none());
    }

    #[tokio::test]
    async fn closing_a_room_ends_its_streams() {
        let hub = EventHub::new(8);
        let mut rx = hub.subscribe_room("AAAAAA");

        hub.room_closed("AAAAAA");

        assert!(matches!(rx.recv().await, Err(RecvError::Closed)));
    }
}
