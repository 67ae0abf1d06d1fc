use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::dao::{
    history::{HistorySink, HistoryStore},
    storage::StorageError,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect the history backend and keep the sink in degraded mode while it is unavailable.
pub async fn run<F, Fut>(sink: HistorySink, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn HistoryStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                sink.install(store.clone()).await;
                info!("history storage connected; leaving degraded mode");
                delay = INITIAL_DELAY;

                loop {
                    if store.health_check().await.is_ok() {
                        sleep(HEALTH_POLL_INTERVAL).await;
                        continue;
                    }

                    let mut attempt = 0;
                    let mut reconnect_delay = INITIAL_DELAY;
                    let mut reconnected = false;

                    while attempt < MAX_RECONNECT_ATTEMPTS {
                        match store.try_reconnect().await {
                            Ok(()) => {
                                info!("history storage reconnected after health check failure");
                                reconnected = true;
                                break;
                            }
                            Err(reconnect_err) => {
                                if attempt == 0 {
                                    warn!(
                                        attempt, error = %reconnect_err,
                                        "history storage reconnect first attempt failed; entering degraded mode"
                                    );
                                    sink.clear().await;
                                } else {
                                    warn!(attempt, error = %reconnect_err, "history storage reconnect attempt failed");
                                }
                                attempt += 1;
                                sleep(reconnect_delay).await;
                                reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
                            }
                        }
                    }

                    if reconnected {
                        sink.install(store.clone()).await;
                        sleep(HEALTH_POLL_INTERVAL).await;
                    } else {
                        warn!("exhausted history storage reconnect attempts; staying in degraded mode");
                        break;
                    }
                }

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "history storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::atomic::{AtomicBool, AtomicU32, Ordering},
        time::SystemTime,
    };

    use futures::future::BoxFuture;
    use uuid::Uuid;

    use super::*;
    use crate::dao::{
        models::{ParticipantResultEntity, RoomRecordEntity, RoomStatusEntity},
        storage::StorageResult,
    };

    #[derive(Default)]
    struct FlakyStore {
        healthy: AtomicBool,
        reconnects: AtomicU32,
    }

    fn down() -> StorageError {
        StorageError::unavailable("down".into(), io::Error::other("down"))
    }

    impl HistoryStore for FlakyStore {
        fn save_room(&self, _: RoomRecordEntity) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async { Ok(()) })
        }
        fn update_status(
            &self,
            _: Uuid,
            _: RoomStatusEntity,
            _: SystemTime,
        ) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async { Ok(()) })
        }
        fn save_results(
            &self,
            _: Uuid,
            _: Vec<ParticipantResultEntity>,
            _: SystemTime,
        ) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async { Ok(()) })
        }
        fn find_room(&self, _: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomRecordEntity>>> {
            Box::pin(async { Ok(None) })
        }
        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            let healthy = self.healthy.load(Ordering::SeqCst);
            Box::pin(async move { if healthy { Ok(()) } else { Err(down()) } })
        }
        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.reconnects.fetch_add(1, Ordering::SeqCst);
            let healthy = self.healthy.load(Ordering::SeqCst);
            Box::pin(async move { if healthy { Ok(()) } else { Err(down()) } })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn toggles_degraded_mode_with_backend_health() {
        let sink = HistorySink::new();
        let store = Arc::new(FlakyStore::default());
        store.healthy.store(true, Ordering::SeqCst);

        let connect_store = store.clone();
        let supervisor = tokio::spawn(run(sink.clone(), move || {
            let store: Arc<dyn HistoryStore> = connect_store.clone();
            async move { Ok(store) }
        }));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!sink.is_degraded());

        store.healthy.store(false, Ordering::SeqCst);
        tokio::time::sleep(HEALTH_POLL_INTERVAL + Duration::from_millis(100)).await;
        assert!(sink.is_degraded());
        assert!(store.reconnects.load(Ordering::SeqCst) >= 1);

        store.healthy.store(true, Ordering::SeqCst);
        tokio::time::sleep(MAX_DELAY * 4).await;
        assert!(!sink.is_degraded());

        supervisor.abort();
    }
}
