use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status recorded for a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatusEntity {
    Lobby,
    Loading,
    Playing,
    Ended,
    /// The room was torn down.
    Closed,
}

/// Final standing of one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantResultEntity {
    pub player_id: String,
    pub name: String,
    pub score: u32,
    /// 1-based rank; tied scores share a rank.
    pub rank: u32,
}

/// History of one room instance. Room ids are reused once a room closes, so
/// records are keyed by their own id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRecordEntity {
    pub id: Uuid,
    pub room_id: String,
    pub owner_name: String,
    pub requested_rounds: usize,
    pub status: RoomStatusEntity,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
    #[serde(default)]
    pub results: Vec<ParticipantResultEntity>,
}

/// Rank `(player_id, name, score)` triples already sorted by descending score.
pub fn rank_results<I>(ordered: I) -> Vec<ParticipantResultEntity>
where
    I: IntoIterator<Item = (String, String, u32)>,
{
    let mut results: Vec<ParticipantResultEntity> = Vec::new();
    for (index, (player_id, name, score)) in ordered.into_iter().enumerate() {
        let rank = match results.last() {
            Some(previous) if previous.score == score => previous.rank,
            _ => index as u32 + 1,
        };
        results.push(ParticipantResultEntity {
            player_id,
            name,
            score,
            rank,
        });
    }
    results
}
