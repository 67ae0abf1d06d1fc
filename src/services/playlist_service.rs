//! Turns playlist criteria into an ordered list of playable songs.

use std::{collections::HashSet, sync::Arc};

use futures::future::join_all;
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::{
    config::PlaylistSettings,
    error::ServiceError,
    matcher::clean,
    providers::{CandidateTrack, MediaLookup, PlaylistCriteria, PlaylistProvider},
    state::room::Song,
};

/// Asks the provider for candidates, resolves them concurrently and keeps at
/// most `rounds` playable, distinct songs in shuffled order.
#[derive(Clone)]
pub struct PlaylistResolver {
    provider: Arc<dyn PlaylistProvider>,
    lookup: Arc<dyn MediaLookup>,
    settings: PlaylistSettings,
}

impl PlaylistResolver {
    pub fn new(
        provider: Arc<dyn PlaylistProvider>,
        lookup: Arc<dyn MediaLookup>,
        settings: PlaylistSettings,
    ) -> Self {
        Self {
            provider,
            lookup,
            settings,
        }
    }

    /// Resolve a playlist, bounded by the overall resolution timeout.
    pub async fn resolve(
        &self,
        criteria: PlaylistCriteria,
        rounds: usize,
    ) -> Result<Vec<Song>, ServiceError> {
        match timeout(
            self.settings.resolution_timeout,
            self.resolve_unbounded(criteria, rounds),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(rounds, "playlist resolution timed out");
                Err(ServiceError::Timeout)
            }
        }
    }

    async fn resolve_unbounded(
        &self,
        criteria: PlaylistCriteria,
        rounds: usize,
    ) -> Result<Vec<Song>, ServiceError> {
        let count = self.settings.candidates_for(rounds);
        let candidates = self.provider.generate(criteria, count).await?;
        let candidates = dedupe_candidates(candidates);
        if candidates.is_empty() {
            return Err(ServiceError::Unavailable(
                "playlist provider returned no candidates".into(),
            ));
        }
        debug!(candidates = candidates.len(), rounds, "resolving playlist candidates");

        let lookups = candidates.into_iter().map(|candidate| self.lookup_one(candidate));
        let mut seen = HashSet::new();
        let mut songs: Vec<Song> = join_all(lookups)
            .await
            .into_iter()
            .flatten()
            .filter(|song| seen.insert(clean(&song.title)))
            .collect();

        if songs.is_empty() {
            return Err(ServiceError::Unavailable(
                "no playable song found for these criteria".into(),
            ));
        }

        let mut rng = match self.settings.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        songs.shuffle(&mut rng);
        songs.truncate(rounds);

        info!(songs = songs.len(), rounds, "playlist resolved");
        Ok(songs)
    }

    /// Resolve a single candidate; failures and timeouts count as unresolved,
    /// and so does a title no guess could ever match.
    async fn lookup_one(&self, candidate: CandidateTrack) -> Option<Song> {
        let label = format!("{} - {}", candidate.artist, candidate.title);
        match timeout(self.settings.lookup_timeout, self.lookup.resolve(candidate)).await {
            Ok(Ok(Some(song))) if song.is_playable() => {
                if clean(&song.title).is_empty() {
                    debug!(candidate = %label, "title is empty once cleaned");
                    None
                } else {
                    Some(song)
                }
            }
            Ok(Ok(_)) => {
                debug!(candidate = %label, "candidate has no playable clip");
                None
            }
            Ok(Err(err)) => {
                warn!(candidate = %label, error = %err, "media lookup failed");
                None
            }
            Err(_) => {
                warn!(candidate = %label, "media lookup timed out");
                None
            }
        }
    }
}

fn dedupe_candidates(candidates: Vec<CandidateTrack>) -> Vec<CandidateTrack> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|candidate| seen.insert((clean(&candidate.artist), clean(&candidate.title))))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::state::testing::{ScriptedLookup, ScriptedProvider, candidate};

    fn settings() -> PlaylistSettings {
        PlaylistSettings {
            candidate_multiplier: 2,
            lookup_timeout: Duration::from_millis(500),
            resolution_timeout: Duration::from_secs(5),
            shuffle_seed: Some(7),
        }
    }

    fn resolver(provider: ScriptedProvider, lookup: ScriptedLookup) -> PlaylistResolver {
        PlaylistResolver::new(Arc::new(provider), Arc::new(lookup), settings())
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_playable_distinct_songs_up_to_rounds() {
        let provider = ScriptedProvider::returning(vec![
            candidate("A", "One"),
            candidate("A", "One"),
            candidate("B", "Two"),
            candidate("C", "Three"),
            candidate("D", "Silent"),
        ]);
        let lookup = ScriptedLookup::default().without_clip("Silent");

        let songs = resolver(provider.clone(), lookup)
            .resolve(PlaylistCriteria::default(), 2)
            .await
            .unwrap();

        assert_eq!(songs.len(), 2);
        assert!(songs.iter().all(|song| song.title != "Silent"));
        assert_ne!(songs[0].title, songs[1].title);
        // rounds × multiplier candidates were requested
        assert_eq!(provider.requested(), vec![4]);
    }

    #[tokio::test(start_paused = true)]
    async fn fewer_songs_than_rounds_is_accepted() {
        let provider = ScriptedProvider::returning(vec![candidate("A", "One")]);
        let songs = resolver(provider, ScriptedLookup::default())
            .resolve(PlaylistCriteria::default(), 5)
            .await
            .unwrap();
        assert_eq!(songs.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn same_seed_gives_same_order() {
        let tracks: Vec<CandidateTrack> = (0..8)
            .map(|n| candidate("Band", &format!("Song {n}")))
            .collect();

        let first = resolver(
            ScriptedProvider::returning(tracks.clone()),
            ScriptedLookup::default(),
        )
        .resolve(PlaylistCriteria::default(), 8)
        .await
        .unwrap();
        let second = resolver(ScriptedProvider::returning(tracks), ScriptedLookup::default())
            .resolve(PlaylistCriteria::default(), 8)
            .await
            .unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_provider_is_unavailable() {
        let err = resolver(ScriptedProvider::returning(Vec::new()), ScriptedLookup::default())
            .resolve(PlaylistCriteria::default(), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn provider_failure_is_reported() {
        let err = resolver(ScriptedProvider::failing(), ScriptedLookup::default())
            .resolve(PlaylistCriteria::default(), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_lookups_are_dropped() {
        let provider =
            ScriptedProvider::returning(vec![candidate("A", "Fast"), candidate("B", "Slow")]);
        let lookup = ScriptedLookup::default().delayed("Slow", Duration::from_secs(2));

        let songs = resolver(provider, lookup)
            .resolve(PlaylistCriteria::default(), 2)
            .await
            .unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].title, "Fast");
    }

    #[tokio::test(start_paused = true)]
    async fn unguessable_titles_are_dropped() {
        let provider = ScriptedProvider::returning(vec![
            candidate("Sigur Ros", "( )"),
            candidate("Band", "?!"),
            candidate("Oasis", "Wonderwall"),
        ]);

        let songs = resolver(provider, ScriptedLookup::default())
            .resolve(PlaylistCriteria::default(), 3)
            .await
            .unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].title, "Wonderwall");
    }

    #[tokio::test(start_paused = true)]
    async fn only_unguessable_titles_is_unavailable() {
        let provider = ScriptedProvider::returning(vec![candidate("Sigur Ros", "(Untitled)")]);
        let err = resolver(provider, ScriptedLookup::default())
            .resolve(PlaylistCriteria::default(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn every_lookup_unresolved_is_unavailable() {
        let provider = ScriptedProvider::returning(vec![candidate("A", "Silent")]);
        let lookup = ScriptedLookup::default().without_clip("Silent");

        let err = resolver(provider, lookup)
            .resolve(PlaylistCriteria::default(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
    }
}
