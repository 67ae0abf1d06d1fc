use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{ParticipantResultEntity, RoomRecordEntity, RoomStatusEntity};

pub const ROOM_PREFIX: &str = "room::";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchRoomDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub room: RoomBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomBody {
    pub record_id: Uuid,
    pub room_id: String,
    pub owner_name: String,
    pub requested_rounds: usize,
    pub status: RoomStatusEntity,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
    #[serde(default)]
    pub results: Vec<ParticipantResultEntity>,
}

impl From<(RoomRecordEntity, Option<String>)> for CouchRoomDocument {
    fn from((record, rev): (RoomRecordEntity, Option<String>)) -> Self {
        Self {
            id: room_doc_id(record.id),
            rev,
            room: RoomBody {
                record_id: record.id,
                room_id: record.room_id,
                owner_name: record.owner_name,
                requested_rounds: record.requested_rounds,
                status: record.status,
                created_at: record.created_at,
                updated_at: record.updated_at,
                results: record.results,
            },
        }
    }
}

impl From<CouchRoomDocument> for RoomRecordEntity {
    fn from(doc: CouchRoomDocument) -> Self {
        RoomRecordEntity {
            id: doc.room.record_id,
            room_id: doc.room.room_id,
            owner_name: doc.room.owner_name,
            requested_rounds: doc.room.requested_rounds,
            status: doc.room.status,
            created_at: doc.room.created_at,
            updated_at: doc.room.updated_at,
            results: doc.room.results,
        }
    }
}

pub fn room_doc_id(id: Uuid) -> String {
    format!("{}{}", ROOM_PREFIX, id)
}
