//! Phase Puzzle Back binary entrypoint wiring REST, SSE and the persistence gateway.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use phase_puzzle_back::{
    config::AppConfig,
    dao::{
        gateway::Gateway, memory::MemoryGateway, object_store::MemoryObjectStore,
        storage::StorageError,
    },
    routes,
    services::storage_supervisor,
    state::{AppState, SharedState},
};

/// Storage backends selectable through `STORE_BACKEND`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreBackend {
    Memory,
    #[cfg(feature = "rest-store")]
    Rest,
}

impl StoreBackend {
    fn from_env() -> Self {
        match env::var("STORE_BACKEND").ok().as_deref() {
            None | Some("memory") => StoreBackend::Memory,
            #[cfg(feature = "rest-store")]
            Some("rest") => StoreBackend::Rest,
            Some(other) => {
                warn!(backend = other, "unknown STORE_BACKEND; using the in-memory store");
                StoreBackend::Memory
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let public_base =
        env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| format!("http://localhost:{port}"));

    let config = AppConfig::load();
    let object_store = Arc::new(MemoryObjectStore::new(public_base));
    let app_state = AppState::new(config, object_store);

    let backend = StoreBackend::from_env();
    info!(?backend, "starting storage supervisor");
    spawn_supervisor(app_state.clone(), backend);

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Run the gateway supervisor for `backend` in the background.
fn spawn_supervisor(state: SharedState, backend: StoreBackend) {
    match backend {
        StoreBackend::Memory => {
            // One store for the process lifetime: reconnects must not lose rows.
            let gateway: Arc<dyn Gateway> = Arc::new(MemoryGateway::seeded());
            tokio::spawn(storage_supervisor::run(state, move || {
                let gateway = gateway.clone();
                async move { Ok::<_, StorageError>(gateway) }
            }));
        }
        #[cfg(feature = "rest-store")]
        StoreBackend::Rest => {
            use phase_puzzle_back::dao::rest::{RestConfig, RestGateway};

            tokio::spawn(storage_supervisor::run(state, || async {
                let config = RestConfig::from_env().map_err(StorageError::from)?;
                let gateway = RestGateway::connect(config)
                    .await
                    .map_err(StorageError::from)?;
                Ok::<_, StorageError>(Arc::new(gateway) as Arc<dyn Gateway>)
            }));
        }
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
