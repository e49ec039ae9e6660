use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Ping storage and report whether the service is degraded.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let reachable = match state.require_vote_store().await {
        Ok(store) => match state.bounded(store.health_check()).await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                false
            }
        },
        Err(_) => {
            warn!("storage unavailable (degraded mode)");
            false
        }
    };

    HealthResponse::new(state.is_degraded().await, reachable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dto::health::HealthStatus,
        state::{AppState, testing::memory_state},
    };

    #[tokio::test]
    async fn reports_degraded_without_storage() {
        let state = AppState::new(AppConfig::default());
        let health = health_status(&state).await;
        assert_eq!(health.status, HealthStatus::Degraded);
        assert!(!health.storage_reachable);
    }

    #[tokio::test]
    async fn reports_ok_with_memory_storage() {
        let (state, _) = memory_state().await;
        let health = health_status(&state).await;
        assert_eq!(health.status, HealthStatus::Ok);
        assert!(health.storage_reachable);
    }
}
