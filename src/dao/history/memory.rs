//! Process-local history store, used when no database is configured.

use std::{sync::Arc, time::SystemTime};

use dashmap::DashMap;
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    history::HistoryStore,
    models::{ParticipantResultEntity, RoomRecordEntity, RoomStatusEntity},
    storage::{StorageError, StorageResult},
};

#[derive(Clone, Default)]
pub struct MemoryHistoryStore {
    records: Arc<DashMap<Uuid, RoomRecordEntity>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<F>(&self, id: Uuid, at: SystemTime, change: F) -> StorageResult<()>
    where
        F: FnOnce(&mut RoomRecordEntity),
    {
        let mut record = self
            .records
            .get_mut(&id)
            .ok_or_else(|| StorageError::Missing(id.to_string()))?;
        change(&mut record);
        record.updated_at = at;
        Ok(())
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn save_room(&self, record: RoomRecordEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.records.insert(record.id, record);
        Box::pin(async { Ok(()) })
    }

    fn update_status(
        &self,
        id: Uuid,
        status: RoomStatusEntity,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.update(id, at, |record| record.status = status);
        Box::pin(async move { result })
    }

    fn save_results(
        &self,
        id: Uuid,
        results: Vec<ParticipantResultEntity>,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.update(id, at, |record| record.results = results);
        Box::pin(async move { result })
    }

    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomRecordEntity>>> {
        let found = self.records.get(&id).map(|entry| entry.clone());
        Box::pin(async move { Ok(found) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
