//! Test doubles for the room engine: a broadcaster recording every event and
//! scripted playlist collaborators.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use futures::future::BoxFuture;
use serde_json::Value;

use crate::{
    dto::sse::ServerEvent,
    providers::{CandidateTrack, MediaLookup, PlaylistCriteria, PlaylistProvider, ProviderError},
    state::{hub::Broadcaster, room::Song},
};

pub fn candidate(artist: &str, title: &str) -> CandidateTrack {
    CandidateTrack {
        artist: artist.into(),
        title: title.into(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Room(String),
    Player(String),
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub target: Target,
    pub name: String,
    pub data: Value,
}

/// Keeps every published and notified event, in order.
#[derive(Default)]
pub struct RecordingBroadcaster {
    events: Mutex<Vec<Recorded>>,
    closed: Mutex<Vec<String>>,
}

impl RecordingBroadcaster {
    fn push(&self, target: Target, event: ServerEvent) {
        let data = serde_json::from_str(&event.data).unwrap_or(Value::Null);
        self.events.lock().unwrap().push(Recorded {
            target,
            name: event.name().to_string(),
            data,
        });
    }

    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }

    pub fn named(&self, name: &str) -> Vec<Recorded> {
        self.events()
            .into_iter()
            .filter(|event| event.name == name)
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.named(name).len()
    }

    /// Events sent privately to `player_id`.
    pub fn notified(&self, player_id: &str, name: &str) -> Vec<Recorded> {
        self.named(name)
            .into_iter()
            .filter(|event| event.target == Target::Player(player_id.to_string()))
            .collect()
    }

    pub fn closed_rooms(&self) -> Vec<String> {
        self.closed.lock().unwrap().clone()
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn publish(&self, room_id: &str, event: ServerEvent) {
        self.push(Target::Room(room_id.to_string()), event);
    }

    fn notify(&self, player_id: &str, event: ServerEvent) {
        self.push(Target::Player(player_id.to_string()), event);
    }

    fn room_closed(&self, room_id: &str) {
        self.closed.lock().unwrap().push(room_id.to_string());
    }
}

/// Playlist provider answering with a fixed script.
#[derive(Clone)]
pub struct ScriptedProvider {
    tracks: Option<Vec<CandidateTrack>>,
    delay: Option<Duration>,
    requested: Arc<Mutex<Vec<usize>>>,
}

impl ScriptedProvider {
    pub fn returning(tracks: Vec<CandidateTrack>) -> Self {
        Self {
            tracks: Some(tracks),
            delay: None,
            requested: Arc::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            tracks: None,
            delay: None,
            requested: Arc::default(),
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Candidate counts asked for so far.
    pub fn requested(&self) -> Vec<usize> {
        self.requested.lock().unwrap().clone()
    }
}

impl PlaylistProvider for ScriptedProvider {
    fn generate(
        &self,
        _criteria: PlaylistCriteria,
        count: usize,
    ) -> BoxFuture<'static, Result<Vec<CandidateTrack>, ProviderError>> {
        self.requested.lock().unwrap().push(count);
        let tracks = self.tracks.clone();
        let delay = self.delay;
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let mut tracks = tracks.ok_or(ProviderError::InvalidResponse("scripted failure".into()))?;
            tracks.truncate(count);
            Ok(tracks)
        })
    }
}

/// Media lookup resolving every candidate unless told otherwise.
#[derive(Clone, Default)]
pub struct ScriptedLookup {
    silent: HashSet<String>,
    delays: HashMap<String, Duration>,
}

impl ScriptedLookup {
    /// Resolve `title` without a clip.
    pub fn without_clip(mut self, title: &str) -> Self {
        self.silent.insert(title.to_string());
        self
    }

    pub fn delayed(mut self, title: &str, delay: Duration) -> Self {
        self.delays.insert(title.to_string(), delay);
        self
    }
}

impl MediaLookup for ScriptedLookup {
    fn resolve(
        &self,
        candidate: CandidateTrack,
    ) -> BoxFuture<'static, Result<Option<Song>, ProviderError>> {
        let delay = self.delays.get(&candidate.title).copied();
        let silent = self.silent.contains(&candidate.title);
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if silent {
                return Ok(None);
            }
            let slug = candidate.title.to_lowercase().replace(' ', "-");
            Ok(Some(Song {
                media_url: format!("https://cdn.test/{slug}.m4a"),
                title: candidate.title,
                artist: candidate.artist,
                artwork_url: None,
            }))
        })
    }
}
