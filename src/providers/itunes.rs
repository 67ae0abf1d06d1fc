//! Media lookup backed by the public iTunes Search API.

use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::{
    matcher::{self, clean},
    providers::{CandidateTrack, MediaLookup, ProviderError},
    state::room::Song,
};

const DEFAULT_BASE_URL: &str = "https://itunes.apple.com";
const SEARCH_LIMIT: &str = "5";

/// Resolves candidates to 30-second previews through `/search`.
#[derive(Clone)]
pub struct ItunesMediaLookup {
    client: Client,
    base_url: Arc<str>,
    country: Arc<str>,
}

impl ItunesMediaLookup {
    pub fn new(client: Client, country: impl Into<String>) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL, country)
    }

    pub fn with_base_url(
        client: Client,
        base_url: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            country: Arc::from(country.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResult {
    track_name: Option<String>,
    artist_name: Option<String>,
    preview_url: Option<String>,
    artwork_url100: Option<String>,
}

/// Pick the first result that has a preview and plausibly is the candidate.
fn best_match(candidate: &CandidateTrack, results: Vec<SearchResult>) -> Option<Song> {
    let wanted_artist = clean(&candidate.artist);

    results.into_iter().find_map(|result| {
        let title = result.track_name?;
        let artist = result.artist_name?;
        let media_url = result.preview_url.filter(|url| !url.trim().is_empty())?;

        let same_title = matcher::accept(&title, &candidate.title)
            || matcher::accept(&candidate.title, &title);
        let same_artist = wanted_artist.is_empty()
            || clean(&artist).contains(&wanted_artist)
            || wanted_artist.contains(&clean(&artist));

        (same_title && same_artist).then(|| Song {
            title,
            artist,
            media_url,
            artwork_url: result.artwork_url100,
        })
    })
}

impl MediaLookup for ItunesMediaLookup {
    fn resolve(
        &self,
        candidate: CandidateTrack,
    ) -> BoxFuture<'static, Result<Option<Song>, ProviderError>> {
        let lookup = self.clone();
        Box::pin(async move {
            let term = format!("{} {}", candidate.artist, candidate.title);
            let url = format!("{}/search", lookup.base_url);
            let response: SearchResponse = lookup
                .client
                .get(url)
                .query(&[
                    ("term", term.as_str()),
                    ("media", "music"),
                    ("entity", "song"),
                    ("limit", SEARCH_LIMIT),
                    ("country", lookup.country.as_ref()),
                ])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            let song = best_match(&candidate, response.results);
            if song.is_none() {
                debug!(artist = %candidate.artist, title = %candidate.title, "no preview found");
            }
            Ok(song)
        })
    }
}
