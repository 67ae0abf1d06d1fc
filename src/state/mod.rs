pub mod actor;
pub mod hub;
pub mod registry;
pub mod room;
pub mod scheduler;
pub mod state_machine;
#[cfg(test)]
pub mod testing;

use std::sync::Arc;

use tokio::sync::watch;

use crate::{
    config::AppConfig,
    dao::history::HistorySink,
    providers::{MediaLookup, PlaylistProvider},
    services::playlist_service::PlaylistResolver,
};

pub use self::hub::{Broadcaster, EventHub, SseHub};
pub use self::state_machine::InvalidTransition;
use self::{actor::RoomContext, registry::RoomRegistry};

pub type SharedState = Arc<AppState>;

/// External collaborators selected at startup.
pub struct Collaborators {
    pub playlist: Arc<dyn PlaylistProvider>,
    pub media: Arc<dyn MediaLookup>,
}

/// Central application state: live rooms, event fan-out and the history sink.
pub struct AppState {
    config: Arc<AppConfig>,
    rooms: RoomRegistry,
    hub: Arc<EventHub>,
    history: HistorySink,
    context: RoomContext,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The history sink starts in degraded mode until a backend is installed.
    pub fn new(config: AppConfig, collaborators: Collaborators) -> SharedState {
        let config = Arc::new(config);
        let hub = Arc::new(EventHub::new(config.rooms.event_capacity));
        Self::with_broadcaster(config, collaborators, hub.clone(), hub)
    }

    /// Build the state with a custom broadcaster (the hub still serves subscriptions).
    pub fn with_broadcaster(
        config: Arc<AppConfig>,
        collaborators: Collaborators,
        hub: Arc<EventHub>,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> SharedState {
        let history = HistorySink::new();
        let resolver = PlaylistResolver::new(
            collaborators.playlist,
            collaborators.media,
            config.playlist.clone(),
        );
        let context = RoomContext {
            config: config.clone(),
            broadcaster,
            resolver,
            history: history.clone(),
        };

        Arc::new(Self {
            config,
            rooms: RoomRegistry::new(),
            hub,
            history,
            context,
        })
    }

    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// Registry of live rooms.
    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// Channels used by SSE streams and WebSocket sessions.
    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    /// Collaborators handed to every new room.
    pub fn room_context(&self) -> RoomContext {
        self.context.clone()
    }

    pub fn history(&self) -> &HistorySink {
        &self.history
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        self.history.is_degraded()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.history.degraded_watcher()
    }
}
