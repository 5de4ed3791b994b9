use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report whether the gateway is reachable, logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.gateway().await {
        Some(gateway) => {
            if let Err(err) = gateway.health_check().await {
                warn!(error = %err, "gateway health check failed");
            }
        }
        None => warn!("gateway unavailable (degraded mode)"),
    }

    HealthResponse::new(state.is_degraded(), state.engines().len())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{memory::MemoryGateway, object_store::MemoryObjectStore},
        state::AppState,
    };

    #[tokio::test]
    async fn status_reflects_degraded_mode() {
        let store = Arc::new(MemoryObjectStore::new("http://localhost"));
        let degraded = AppState::new(AppConfig::default(), store.clone());
        assert_eq!(health_status(&degraded).await.status, "degraded");

        let healthy =
            AppState::with_gateway(AppConfig::default(), Arc::new(MemoryGateway::seeded()), store);
        let status = health_status(&healthy).await;
        assert_eq!(status.status, "ok");
        assert_eq!(status.engines, 0);
    }
}
