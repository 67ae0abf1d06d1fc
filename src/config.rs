//! Application-level configuration loading: round timings, room limits, playlist
//! resolution settings and the built-in track catalog.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, serde_as};
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TUNE_RACE_CONFIG_PATH";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Durations of the round phases.
    pub timings: RoundTimings,
    /// Room sizing limits.
    pub rooms: RoomLimits,
    /// Playlist resolution settings.
    pub playlist: PlaylistSettings,
    /// Tracks served by the catalog playlist provider.
    pub catalog: Vec<CatalogTrack>,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
/// Durations of the four phases of a round, in milliseconds on disk.
pub struct RoundTimings {
    /// Informational countdown before the guessing window opens.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub countdown: Duration,
    /// Length of the window during which a guess can score.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub round: Duration,
    /// Pause after a round was won.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub win_delay: Duration,
    /// Pause after a round timed out; longer so the answer can be read.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub timeout_delay: Duration,
}

impl Default for RoundTimings {
    fn default() -> Self {
        Self {
            countdown: Duration::from_secs(3),
            round: Duration::from_secs(30),
            win_delay: Duration::from_secs(3),
            timeout_delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
/// Limits applied to rooms and their players.
pub struct RoomLimits {
    /// Rounds played when neither the room nor the start request specify it.
    pub default_rounds: usize,
    /// Upper bound on the number of rounds of a game.
    pub max_rounds: usize,
    /// Maximum number of players in a room.
    pub max_players: usize,
    /// Capacity of each room's command queue.
    pub command_capacity: usize,
    /// Capacity of each room's event fan-out channel.
    pub event_capacity: usize,
}

impl Default for RoomLimits {
    fn default() -> Self {
        Self {
            default_rounds: 10,
            max_rounds: 30,
            max_players: 16,
            command_capacity: 256,
            event_capacity: 64,
        }
    }
}

impl RoomLimits {
    /// Clamp a requested number of rounds into the allowed range.
    pub fn clamp_rounds(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_rounds)
            .clamp(1, self.max_rounds.max(1))
    }
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
/// Settings driving playlist generation and media lookups.
pub struct PlaylistSettings {
    /// Candidates requested per round, since some will not resolve to a clip.
    pub candidate_multiplier: usize,
    /// Upper bound for a single media lookup.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub lookup_timeout: Duration,
    /// Upper bound for the whole resolution (generation and lookups).
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub resolution_timeout: Duration,
    /// Fixed shuffle seed; random when absent.
    pub shuffle_seed: Option<u64>,
}

impl Default for PlaylistSettings {
    fn default() -> Self {
        Self {
            candidate_multiplier: 2,
            lookup_timeout: Duration::from_secs(5),
            resolution_timeout: Duration::from_secs(45),
            shuffle_seed: None,
        }
    }
}

impl PlaylistSettings {
    /// Number of candidates to ask the playlist provider for.
    pub fn candidates_for(&self, rounds: usize) -> usize {
        rounds.saturating_mul(self.candidate_multiplier.max(1)).max(rounds + 1)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
/// Entry of the static track catalog.
pub struct CatalogTrack {
    /// Performing artist.
    pub artist: String,
    /// Canonical title players must guess.
    pub title: String,
    /// Preview clip; tracks without one must be resolved by a media lookup.
    #[serde(default)]
    pub media_url: Option<String>,
    /// Cover art.
    #[serde(default)]
    pub artwork_url: Option<String>,
    /// Lowercase genre tags.
    #[serde(default)]
    pub genres: Vec<String>,
    /// Release year.
    #[serde(default)]
    pub year: Option<u16>,
    /// ISO 639-1 language of the lyrics.
    #[serde(default)]
    pub language: Option<String>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<AppConfig>(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        catalog = config.catalog.len(),
                        "loaded configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        if config.catalog.is_empty() {
            config.catalog = default_catalog();
        }
        config
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn track(artist: &str, title: &str, genres: &[&str], year: u16, language: &str) -> CatalogTrack {
    CatalogTrack {
        artist: artist.into(),
        title: title.into(),
        media_url: None,
        artwork_url: None,
        genres: genres.iter().map(|genre| genre.to_string()).collect(),
        year: Some(year),
        language: Some(language.into()),
    }
}

/// Built-in catalog shipped with the binary. Clips are resolved at game start.
fn default_catalog() -> Vec<CatalogTrack> {
    vec![
        track("Oasis", "Wonderwall", &["rock", "britpop"], 1995, "en"),
        track("Nirvana", "Smells Like Teen Spirit", &["rock", "grunge"], 1991, "en"),
        track("Queen", "Bohemian Rhapsody", &["rock"], 1975, "en"),
        track("The Beatles", "Hey Jude", &["rock", "pop"], 1968, "en"),
        track("Michael Jackson", "Billie Jean", &["pop"], 1982, "en"),
        track("Madonna", "Like a Prayer", &["pop"], 1989, "en"),
        track("ABBA", "Dancing Queen", &["pop", "disco"], 1976, "en"),
        track("Daft Punk", "One More Time", &["electronic", "house"], 2000, "en"),
        track("Adele", "Rolling in the Deep", &["pop", "soul"], 2010, "en"),
        track("Outkast", "Hey Ya!", &["hip-hop", "pop"], 2003, "en"),
        track("Eminem", "Lose Yourself", &["hip-hop"], 2002, "en"),
        track("Whitney Houston", "I Wanna Dance with Somebody", &["pop"], 1987, "en"),
        track("Bee Gees", "Stayin' Alive", &["disco"], 1977, "en"),
        track("Gloria Gaynor", "I Will Survive", &["disco"], 1978, "en"),
        track("Édith Piaf", "La Vie en rose", &["chanson"], 1947, "fr"),
        track("Stromae", "Alors on danse", &["electronic", "pop"], 2009, "fr"),
        track("Indochine", "L'aventurier", &["rock", "new wave"], 1982, "fr"),
        track("Christine and the Queens", "Tilted", &["pop"], 2014, "fr"),
        track("Los del Río", "Macarena", &["latin", "dance"], 1993, "es"),
        track("Luis Fonsi", "Despacito", &["latin", "pop"], 2017, "es"),
        track("Shakira", "Hips Don't Lie", &["latin", "pop"], 2006, "en"),
        track("Nena", "99 Luftballons", &["pop", "new wave"], 1983, "de"),
        track("Rammstein", "Du hast", &["metal"], 1997, "de"),
        track("Måneskin", "Zitti e buoni", &["rock"], 2021, "it"),
    ]
}
