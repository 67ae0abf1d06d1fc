//! Static catalog acting as both playlist provider and media lookup.

use std::sync::Arc;

use futures::future::BoxFuture;
use rand::seq::IndexedRandom;

use crate::{
    config::CatalogTrack,
    matcher::clean,
    providers::{CandidateTrack, MediaLookup, PlaylistCriteria, PlaylistProvider, ProviderError},
    state::room::Song,
};

/// Serves candidates from the configured catalog and resolves the tracks that
/// ship their own clip.
#[derive(Clone)]
pub struct CatalogProvider {
    tracks: Arc<[CatalogTrack]>,
}

impl CatalogProvider {
    pub fn new(tracks: Vec<CatalogTrack>) -> Self {
        Self {
            tracks: tracks.into(),
        }
    }

    fn matching(&self, criteria: &PlaylistCriteria) -> Vec<&CatalogTrack> {
        self.tracks
            .iter()
            .filter(|track| matches_criteria(track, criteria))
            .collect()
    }

    fn find(&self, candidate: &CandidateTrack) -> Option<&CatalogTrack> {
        let title = clean(&candidate.title);
        let artist = clean(&candidate.artist);
        self.tracks
            .iter()
            .find(|track| clean(&track.title) == title && clean(&track.artist) == artist)
    }
}

fn matches_criteria(track: &CatalogTrack, criteria: &PlaylistCriteria) -> bool {
    let genre_ok = criteria.genres.is_empty()
        || criteria.genres.iter().any(|wanted| {
            track
                .genres
                .iter()
                .any(|genre| genre.eq_ignore_ascii_case(wanted.trim()))
        });

    let decade_ok = match (criteria.decade, track.year) {
        (Some(decade), Some(year)) => year >= decade && year < decade + 10,
        (Some(_), None) => false,
        (None, _) => true,
    };

    let language_ok = match (&criteria.language, &track.language) {
        (Some(wanted), Some(language)) => language.eq_ignore_ascii_case(wanted),
        (Some(_), None) => false,
        (None, _) => true,
    };

    genre_ok && decade_ok && language_ok
}

impl PlaylistProvider for CatalogProvider {
    fn generate(
        &self,
        criteria: PlaylistCriteria,
        count: usize,
    ) -> BoxFuture<'static, Result<Vec<CandidateTrack>, ProviderError>> {
        let candidates: Vec<CandidateTrack> = self
            .matching(&criteria)
            .choose_multiple(&mut rand::rng(), count)
            .map(|track| CandidateTrack {
                artist: track.artist.clone(),
                title: track.title.clone(),
            })
            .collect();

        Box::pin(async move { Ok(candidates) })
    }
}

impl MediaLookup for CatalogProvider {
    fn resolve(
        &self,
        candidate: CandidateTrack,
    ) -> BoxFuture<'static, Result<Option<Song>, ProviderError>> {
        let song = self.find(&candidate).and_then(|track| {
            let media_url = track.media_url.clone()?;
            Some(Song {
                title: track.title.clone(),
                artist: track.artist.clone(),
                media_url,
                artwork_url: track.artwork_url.clone(),
            })
        });

        Box::pin(async move { Ok(song) })
    }
}
