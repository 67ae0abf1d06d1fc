//! External collaborators producing the songs of a game: a playlist provider
//! suggesting candidate tracks and a media lookup resolving them to clips.

pub mod catalog;
pub mod chat;
pub mod itunes;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use validator::Validate;

use crate::state::room::Song;

/// Failures reported by playlist providers and media lookups.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The remote service could not be reached.
    #[error("provider request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The remote service answered with something we cannot use.
    #[error("unexpected provider response: {0}")]
    InvalidResponse(String),
    /// The provider is not configured for this deployment.
    #[error("provider not configured: {0}")]
    NotConfigured(&'static str),
    /// The provider did not answer in time.
    #[error("provider timed out")]
    Timeout,
}

/// Difficulty hint forwarded to the playlist provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    /// Chart hits everybody knows.
    Easy,
    /// Well-known songs.
    Medium,
    /// Deep cuts.
    Hard,
}

/// Selection criteria supplied by the room owner when starting a game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema, Validate)]
pub struct PlaylistCriteria {
    /// Wanted genres; empty means any.
    #[serde(default)]
    #[validate(length(max = 10))]
    pub genres: Vec<String>,
    /// Decade as its first year (e.g. 1990).
    #[serde(default)]
    #[validate(range(min = 1900, max = 2090))]
    pub decade: Option<u16>,
    /// ISO 639-1 language code.
    #[serde(default)]
    #[validate(length(min = 2, max = 8))]
    pub language: Option<String>,
    /// Difficulty hint.
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    /// Rounds to play; overrides the room's requested rounds.
    #[serde(default)]
    #[validate(range(min = 1, max = 100))]
    pub rounds: Option<usize>,
}

/// A suggested track, not yet known to be playable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateTrack {
    /// Performing artist.
    pub artist: String,
    /// Track title.
    pub title: String,
}

/// Generates candidate tracks from criteria.
pub trait PlaylistProvider: Send + Sync {
    /// Suggest up to `count` candidates. Fewer may be returned.
    fn generate(
        &self,
        criteria: PlaylistCriteria,
        count: usize,
    ) -> BoxFuture<'static, Result<Vec<CandidateTrack>, ProviderError>>;
}

/// Resolves a candidate to a playable clip.
pub trait MediaLookup: Send + Sync {
    /// `Ok(None)` means the candidate has no usable clip.
    fn resolve(
        &self,
        candidate: CandidateTrack,
    ) -> BoxFuture<'static, Result<Option<Song>, ProviderError>>;
}
