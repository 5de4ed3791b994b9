//! Shared application state and the domain model of the puzzle.

/// Per-player puzzle board.
pub mod board;
/// Domain model of sessions, players and quotes.
pub mod model;
/// Player device lifecycle.
pub mod player_phase;
/// Point rules.
pub mod scoring;
mod sse;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::{
    sync::{Mutex, RwLock, watch},
    task::JoinHandle,
};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{gateway::Gateway, object_store::ObjectStore},
    error::ServiceError,
    services::player_engine::PlayerEngine,
};

pub use self::sse::SseHub;
use self::sse::AdminSseState;

/// Handle to [`AppState`] shared by handlers and background tasks.
pub type SharedState = Arc<AppState>;

/// Bookkeeping of broadcast hints: the latest issuance token and the clear
/// task scheduled for it.
#[derive(Debug, Default)]
pub struct HintSlot {
    /// Token of the most recent hint.
    pub issued: u64,
    /// Clear task scheduled for that hint.
    pub pending: Option<JoinHandle<()>>,
}

/// Central application state: gateway handle, hosted player engines and SSE hubs.
pub struct AppState {
    gateway: RwLock<Option<Arc<dyn Gateway>>>,
    object_store: Arc<dyn ObjectStore>,
    config: AppConfig,
    admin: AdminSseState,
    engines: DashMap<Uuid, Arc<PlayerEngine>>,
    hints: Mutex<HintSlot>,
    admin_feed: Mutex<Option<JoinHandle<()>>>,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a gateway is installed.
    pub fn new(config: AppConfig, object_store: Arc<dyn ObjectStore>) -> SharedState {
        Self::build(config, object_store, None)
    }

    /// State with `gateway` already installed, out of degraded mode.
    pub fn with_gateway(
        config: AppConfig,
        gateway: Arc<dyn Gateway>,
        object_store: Arc<dyn ObjectStore>,
    ) -> SharedState {
        Self::build(config, object_store, Some(gateway))
    }

    fn build(
        config: AppConfig,
        object_store: Arc<dyn ObjectStore>,
        gateway: Option<Arc<dyn Gateway>>,
    ) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(gateway.is_none());
        Arc::new(Self {
            gateway: RwLock::new(gateway),
            object_store,
            config,
            admin: AdminSseState::new(64),
            engines: DashMap::new(),
            hints: Mutex::new(HintSlot::default()),
            admin_feed: Mutex::new(None),
            degraded: degraded_tx,
        })
    }

    /// Obtain a handle to the current gateway, if one is installed.
    pub async fn gateway(&self) -> Option<Arc<dyn Gateway>> {
        let guard = self.gateway.read().await;
        guard.as_ref().cloned()
    }

    /// Gateway handle, or [`ServiceError::Degraded`] while storage is unreachable.
    pub async fn require_gateway(&self) -> Result<Arc<dyn Gateway>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.gateway().await.ok_or(ServiceError::Degraded)
    }

    /// Install a gateway implementation and leave degraded mode.
    pub async fn set_gateway(&self, gateway: Arc<dyn Gateway>) {
        {
            let mut guard = self.gateway.write().await;
            *guard = Some(gateway);
        }
        self.update_degraded(false);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Blob store holding uploaded avatars.
    pub fn object_store(&self) -> &Arc<dyn ObjectStore> {
        &self.object_store
    }

    /// Configuration loaded at startup.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Broadcast hub used for the facilitator SSE stream.
    pub fn admin_sse(&self) -> &SseHub {
        self.admin.hub()
    }

    /// Token guard that ensures a single facilitator SSE subscriber at a time.
    pub fn admin_token(&self) -> &Mutex<Option<String>> {
        self.admin.token()
    }

    /// Player engines hosted by this process, keyed by engine id.
    pub fn engines(&self) -> &DashMap<Uuid, Arc<PlayerEngine>> {
        &self.engines
    }

    /// Look up a hosted engine.
    pub fn engine(&self, id: Uuid) -> Result<Arc<PlayerEngine>, ServiceError> {
        self.engines
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServiceError::NotFound(format!("player engine {id}")))
    }

    /// Hint issuance bookkeeping.
    pub fn hints(&self) -> &Mutex<HintSlot> {
        &self.hints
    }

    /// Task forwarding gateway changes to the facilitator stream.
    pub fn admin_feed(&self) -> &Mutex<Option<JoinHandle<()>>> {
        &self.admin_feed
    }
}

impl Drop for AppState {
    fn drop(&mut self) {
        if let Some(pending) = self.hints.get_mut().pending.take() {
            pending.abort();
        }
        if let Some(feed) = self.admin_feed.get_mut().take() {
            feed.abort();
        }
    }
}
