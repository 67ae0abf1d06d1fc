//! Playlist provider asking an OpenAI-compatible chat-completions endpoint for
//! songs matching the criteria.

use std::{env, sync::Arc};

use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::providers::{CandidateTrack, Difficulty, PlaylistCriteria, PlaylistProvider, ProviderError};

const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Connection settings for the chat-completions provider.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
}

impl ChatConfig {
    /// Read `PLAYLIST_API_URL`, `PLAYLIST_API_KEY` and `PLAYLIST_MODEL`.
    pub fn from_env() -> Result<Self, ProviderError> {
        let endpoint = env::var("PLAYLIST_API_URL")
            .map_err(|_| ProviderError::NotConfigured("PLAYLIST_API_URL"))?;
        let api_key = env::var("PLAYLIST_API_KEY")
            .map_err(|_| ProviderError::NotConfigured("PLAYLIST_API_KEY"))?;
        let model = env::var("PLAYLIST_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());

        Ok(Self {
            endpoint,
            api_key,
            model,
        })
    }
}

#[derive(Clone)]
pub struct ChatPlaylistProvider {
    client: Client,
    config: Arc<ChatConfig>,
}

impl ChatPlaylistProvider {
    pub fn new(client: Client, config: ChatConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

fn build_prompt(criteria: &PlaylistCriteria, count: usize) -> String {
    let mut constraints = Vec::new();
    if !criteria.genres.is_empty() {
        constraints.push(format!("genres: {}", criteria.genres.join(", ")));
    }
    if let Some(decade) = criteria.decade {
        constraints.push(format!("released in the {decade}s"));
    }
    if let Some(language) = &criteria.language {
        constraints.push(format!("sung in language `{language}`"));
    }
    constraints.push(
        match criteria.difficulty.unwrap_or(Difficulty::Medium) {
            Difficulty::Easy => "worldwide chart hits",
            Difficulty::Medium => "well-known songs",
            Difficulty::Hard => "lesser-known album tracks",
        }
        .to_string(),
    );

    format!(
        "Suggest {count} distinct songs for a music quiz ({}). \
         Answer with a JSON array only, each item being {{\"artist\": string, \"title\": string}}.",
        constraints.join("; ")
    )
}

/// Extract the JSON array from the model reply, tolerating surrounding prose or fences.
fn parse_candidates(content: &str) -> Result<Vec<CandidateTrack>, ProviderError> {
    let start = content.find('[');
    let end = content.rfind(']');
    let (Some(start), Some(end)) = (start, end) else {
        return Err(ProviderError::InvalidResponse(
            "reply does not contain a JSON array".into(),
        ));
    };
    if end < start {
        return Err(ProviderError::InvalidResponse(
            "reply does not contain a JSON array".into(),
        ));
    }

    let items: Vec<CandidateTrack> = serde_json::from_str(&content[start..=end])
        .map_err(|err| ProviderError::InvalidResponse(err.to_string()))?;

    Ok(items
        .into_iter()
        .filter(|item| !item.artist.trim().is_empty() && !item.title.trim().is_empty())
        .collect())
}

impl PlaylistProvider for ChatPlaylistProvider {
    fn generate(
        &self,
        criteria: PlaylistCriteria,
        count: usize,
    ) -> BoxFuture<'static, Result<Vec<CandidateTrack>, ProviderError>> {
        let provider = self.clone();
        Box::pin(async move {
            let request = ChatRequest {
                model: &provider.config.model,
                messages: vec![
                    ChatMessage {
                        role: "system".into(),
                        content: "You are a music expert building quiz playlists.".into(),
                    },
                    ChatMessage {
                        role: "user".into(),
                        content: build_prompt(&criteria, count),
                    },
                ],
                temperature: 0.9,
            };

            let response: ChatResponse = provider
                .client
                .post(&provider.config.endpoint)
                .bearer_auth(&provider.config.api_key)
                .json(&json!(request))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            let Some(choice) = response.choices.into_iter().next() else {
                warn!("playlist provider returned no choices");
                return Ok(Vec::new());
            };

            let mut candidates = parse_candidates(&choice.message.content)?;
            candidates.truncate(count);
            debug!(count = candidates.len(), "playlist candidates generated");
            Ok(candidates)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_lists_constraints() {
        let prompt = build_prompt(
            &PlaylistCriteria {
                genres: vec!["rock".into(), "pop".into()],
                decade: Some(1980),
                language: Some("fr".into()),
                difficulty: Some(Difficulty::Hard),
                rounds: Some(5),
            },
            10,
        );

        assert!(prompt.starts_with("Suggest 10 distinct songs"));
        assert!(prompt.contains("genres: rock, pop"));
        assert!(prompt.contains("1980s"));
        assert!(prompt.contains("`fr`"));
        assert!(prompt.contains("lesser-known"));
    }

    #[test]
    fn parses_fenced_reply() {
        let reply = "Here you go:\n```json\n[{\"artist\": \"Oasis\", \"title\": \"Wonderwall\"}, \
                     {\"artist\": \"\", \"title\": \"Nameless\"}]\n```";
        let candidates = parse_candidates(reply).unwrap();

        assert_eq!(
            candidates,
            vec![CandidateTrack {
                artist: "Oasis".into(),
                title: "Wonderwall".into(),
            }]
        );
    }

    #[test]
    fn rejects_reply_without_array() {
        assert!(matches!(
            parse_candidates("sorry, I cannot help"),
            Err(ProviderError::InvalidResponse(_))
        ));
        assert!(parse_candidates("] oops [").is_err());
    }
}
