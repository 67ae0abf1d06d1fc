use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{ParticipantResultEntity, RoomRecordEntity, RoomStatusEntity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoomDocument {
    /// Record id as its hyphenated string.
    #[serde(rename = "_id")]
    id: String,
    room_id: String,
    owner_name: String,
    requested_rounds: u32,
    status: RoomStatusEntity,
    created_at: DateTime,
    updated_at: DateTime,
    #[serde(default)]
    results: Vec<ParticipantResultEntity>,
}

impl From<RoomRecordEntity> for MongoRoomDocument {
    fn from(value: RoomRecordEntity) -> Self {
        Self {
            id: value.id.to_string(),
            room_id: value.room_id,
            owner_name: value.owner_name,
            requested_rounds: u32::try_from(value.requested_rounds).unwrap_or(u32::MAX),
            status: value.status,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
            results: value.results,
        }
    }
}

impl MongoRoomDocument {
    pub fn into_entity(self) -> Option<RoomRecordEntity> {
        Some(RoomRecordEntity {
            id: Uuid::parse_str(&self.id).ok()?,
            room_id: self.room_id,
            owner_name: self.owner_name,
            requested_rounds: self.requested_rounds as usize,
            status: self.status,
            created_at: self.created_at.to_system_time(),
            updated_at: self.updated_at.to_system_time(),
            results: self.results,
        })
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}
