use std::{sync::Arc, time::SystemTime};

use futures::future::BoxFuture;
use mongodb::{
    Collection, Database,
    bson::doc,
    options::IndexOptions,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoRoomDocument, doc_id},
};
use crate::dao::{
    history::HistoryStore,
    models::{ParticipantResultEntity, RoomRecordEntity, RoomStatusEntity},
    storage::StorageResult,
};

const ROOM_COLLECTION_NAME: &str = "rooms";

#[derive(Clone)]
pub struct MongoHistoryStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (_client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        self.state.write().await.database = database;
        Ok(())
    }
}

impl MongoHistoryStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (_client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.collection().await;
        let index = mongodb::IndexModel::builder()
            .keys(doc! {"room_id": 1, "created_at": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("room_created_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ROOM_COLLECTION_NAME,
                index: "room_id,created_at",
                source,
            })?;

        Ok(())
    }

    async fn collection(&self) -> Collection<MongoRoomDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoRoomDocument>(ROOM_COLLECTION_NAME)
    }

    async fn load(&self, id: Uuid) -> MongoResult<Option<RoomRecordEntity>> {
        let document = self
            .collection()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadRoom { id, source })?;
        Ok(document.and_then(MongoRoomDocument::into_entity))
    }

    async fn save(&self, record: RoomRecordEntity) -> MongoResult<()> {
        let id = record.id;
        self.collection()
            .await
            .replace_one(doc_id(id), MongoRoomDocument::from(record))
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveRoom { id, source })?;
        Ok(())
    }

    async fn modify<F>(&self, id: Uuid, at: SystemTime, change: F) -> MongoResult<()>
    where
        F: FnOnce(&mut RoomRecordEntity),
    {
        let mut record = self
            .load(id)
            .await?
            .ok_or(MongoDaoError::MissingRoom { id })?;
        change(&mut record);
        record.updated_at = at;

        let id = record.id;
        self.collection()
            .await
            .replace_one(doc_id(id), MongoRoomDocument::from(record))
            .await
            .map_err(|source| MongoDaoError::UpdateRoom { id, source })?;
        Ok(())
    }
}

impl HistoryStore for MongoHistoryStore {
    fn save_room(&self, record: RoomRecordEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save(record).await.map_err(Into::into) })
    }

    fn update_status(
        &self,
        id: Uuid,
        status: RoomStatusEntity,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .modify(id, at, |record| record.status = status)
                .await
                .map_err(Into::into)
        })
    }

    fn save_results(
        &self,
        id: Uuid,
        results: Vec<ParticipantResultEntity>,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .modify(id, at, |record| record.results = results)
                .await
                .map_err(Into::into)
        })
    }

    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomRecordEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.load(id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
