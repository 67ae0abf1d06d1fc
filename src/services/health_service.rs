use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report liveness, pinging the history backend and logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.history().store().await {
        Some(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "history storage health check failed");
            }
        }
        None => warn!("history storage unavailable (degraded mode)"),
    }

    let rooms = state.rooms().len();
    if state.is_degraded() {
        HealthResponse::degraded(rooms)
    } else {
        HealthResponse::ok(rooms)
    }
}
