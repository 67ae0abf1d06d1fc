//! Room history persistence: a backend-agnostic store trait and the
//! best-effort sink the rooms write through.

#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::{sync::Arc, time::SystemTime};

use futures::future::BoxFuture;
use tokio::sync::{RwLock, mpsc, watch};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::dao::{
    models::{ParticipantResultEntity, RoomRecordEntity, RoomStatusEntity},
    storage::StorageResult,
};

/// Abstraction over the persistence layer for room history.
pub trait HistoryStore: Send + Sync {
    fn save_room(&self, record: RoomRecordEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn update_status(
        &self,
        id: Uuid,
        status: RoomStatusEntity,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn save_results(
        &self,
        id: Uuid,
        results: Vec<ParticipantResultEntity>,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomRecordEntity>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// One write queued on the sink.
#[derive(Debug, Clone)]
pub enum HistoryRecord {
    Opened(RoomRecordEntity),
    Status {
        id: Uuid,
        status: RoomStatusEntity,
        at: SystemTime,
    },
    Results {
        id: Uuid,
        results: Vec<ParticipantResultEntity>,
        at: SystemTime,
    },
}

impl HistoryRecord {
    fn id(&self) -> Uuid {
        match self {
            HistoryRecord::Opened(record) => record.id,
            HistoryRecord::Status { id, .. } | HistoryRecord::Results { id, .. } => *id,
        }
    }

    async fn apply(self, store: Arc<dyn HistoryStore>) -> StorageResult<()> {
        match self {
            HistoryRecord::Opened(record) => store.save_room(record).await,
            HistoryRecord::Status { id, status, at } => store.update_status(id, status, at).await,
            HistoryRecord::Results { id, results, at } => {
                store.save_results(id, results, at).await
            }
        }
    }
}

struct SinkInner {
    store: RwLock<Option<Arc<dyn HistoryStore>>>,
    degraded: watch::Sender<bool>,
}

/// Queue of history writes drained by a single writer task, so writes of one
/// room land in order. Recording never blocks nor fails the caller; records
/// are dropped while no backend is installed.
#[derive(Clone)]
pub struct HistorySink {
    inner: Arc<SinkInner>,
    queue: mpsc::UnboundedSender<HistoryRecord>,
}

impl HistorySink {
    /// Create the sink in degraded mode and spawn its writer task.
    pub fn new() -> Self {
        let (degraded, _rx) = watch::channel(true);
        let inner = Arc::new(SinkInner {
            store: RwLock::new(None),
            degraded,
        });
        let (queue, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(Arc::downgrade(&inner), receiver));
        Self { inner, queue }
    }

    /// Queue a write.
    pub fn record(&self, record: HistoryRecord) {
        if self.queue.send(record).is_err() {
            warn!("history writer stopped, dropping record");
        }
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn HistoryStore>> {
        self.inner.store.read().await.clone()
    }

    /// Install a new store implementation and leave degraded mode.
    pub async fn install(&self, store: Arc<dyn HistoryStore>) {
        *self.inner.store.write().await = Some(store);
        self.update_degraded(false);
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear(&self) {
        self.inner.store.write().await.take();
        self.update_degraded(true);
    }

    pub fn is_degraded(&self) -> bool {
        *self.inner.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.inner.degraded.subscribe()
    }

    fn update_degraded(&self, value: bool) {
        self.inner.degraded.send_if_modified(|current| {
            let changed = *current != value;
            *current = value;
            changed
        });
    }
}

async fn run_writer(
    inner: std::sync::Weak<SinkInner>,
    mut receiver: mpsc::UnboundedReceiver<HistoryRecord>,
) {
    while let Some(record) = receiver.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let store = inner.store.read().await.clone();
        drop(inner);

        let Some(store) = store else {
            debug!(record_id = %record.id(), "history backend unavailable, dropping record");
            continue;
        };

        let record_id = record.id();
        if let Err(err) = record.apply(store).await {
            warn!(record_id = %record_id, error = %err, "failed to persist room history");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::dao::history::memory::MemoryHistoryStore;

    fn record(id: Uuid) -> RoomRecordEntity {
        RoomRecordEntity {
            id,
            room_id: "ABC234".into(),
            owner_name: "Ann".into(),
            requested_rounds: 3,
            status: RoomStatusEntity::Lobby,
            created_at: SystemTime::UNIX_EPOCH,
            updated_at: SystemTime::UNIX_EPOCH,
            results: Vec::new(),
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test]
    async fn writes_land_in_order_once_installed() {
        let sink = HistorySink::new();
        assert!(sink.is_degraded());

        let store = MemoryHistoryStore::new();
        sink.install(Arc::new(store.clone())).await;
        assert!(!sink.is_degraded());

        let id = Uuid::new_v4();
        sink.record(HistoryRecord::Opened(record(id)));
        sink.record(HistoryRecord::Status {
            id,
            status: RoomStatusEntity::Closed,
            at: SystemTime::now(),
        });
        settle().await;

        let saved = store.find_room(id).await.unwrap().unwrap();
        assert_eq!(saved.status, RoomStatusEntity::Closed);
    }

    #[tokio::test]
    async fn records_are_dropped_while_degraded() {
        let sink = HistorySink::new();
        let id = Uuid::new_v4();
        sink.record(HistoryRecord::Opened(record(id)));
        settle().await;

        let store = MemoryHistoryStore::new();
        sink.install(Arc::new(store.clone())).await;
        assert!(store.find_room(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn degraded_watcher_sees_changes() {
        let sink = HistorySink::new();
        let mut watcher = sink.degraded_watcher();

        sink.install(Arc::new(MemoryHistoryStore::new())).await;
        watcher.changed().await.unwrap();
        assert!(!*watcher.borrow());

        sink.clear().await;
        watcher.changed().await.unwrap();
        assert!(*watcher.borrow());
    }
}
