use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{gateway::Gateway, storage::StorageError},
    services::session_controller,
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECHECK_ATTEMPTS: u32 = 3;

/// Connect to the gateway and keep the shared state in degraded mode while it is unreachable.
///
/// Degraded flips reach the facilitator stream through the admin feed's watcher.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn Gateway>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(gateway) => {
                state.set_gateway(gateway.clone()).await;
                session_controller::spawn_admin_feed(&state).await;
                info!("gateway connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                loop {
                    match gateway.health_check().await {
                        Ok(()) => {
                            if state.is_degraded() {
                                info!("gateway healthy again; leaving degraded mode");
                                state.update_degraded(false);
                            }
                            sleep(HEALTH_POLL_INTERVAL).await;
                        }
                        Err(err) => {
                            warn!(error = %err, "gateway health check failed; entering degraded mode");
                            state.update_degraded(true);

                            if recheck(gateway.as_ref()).await {
                                info!("gateway recovered after health check failure");
                                state.update_degraded(false);
                                sleep(HEALTH_POLL_INTERVAL).await;
                                continue;
                            }
                            warn!("exhausted gateway health retries; reconnecting");
                            break;
                        }
                    }
                }

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "gateway connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Retry the health check with exponential backoff; true once it passes.
async fn recheck(gateway: &dyn Gateway) -> bool {
    let mut retry_delay = INITIAL_DELAY;
    for attempt in 1..=MAX_RECHECK_ATTEMPTS {
        sleep(retry_delay).await;
        match gateway.health_check().await {
            Ok(()) => return true,
            Err(err) => {
                warn!(attempt, error = %err, "gateway health retry failed");
                retry_delay = (retry_delay * 2).min(MAX_DELAY);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::{memory::MemoryGateway, object_store::MemoryObjectStore},
        state::AppState,
    };

    #[tokio::test(start_paused = true)]
    async fn degraded_mode_follows_gateway_health() {
        let state = AppState::new(
            AppConfig::default(),
            Arc::new(MemoryObjectStore::new("http://localhost")),
        );
        assert!(state.is_degraded());

        let memory = Arc::new(MemoryGateway::seeded());
        let gateway: Arc<dyn Gateway> = memory.clone();
        let task = tokio::spawn(run(state.clone(), move || {
            let gateway = gateway.clone();
            async move { Ok::<_, StorageError>(gateway) }
        }));

        sleep(Duration::from_millis(100)).await;
        assert!(!state.is_degraded());

        memory.set_online(false);
        sleep(HEALTH_POLL_INTERVAL + Duration::from_millis(100)).await;
        assert!(state.is_degraded());

        memory.set_online(true);
        sleep(INITIAL_DELAY * 2).await;
        assert!(!state.is_degraded());

        task.abort();
    }
}
