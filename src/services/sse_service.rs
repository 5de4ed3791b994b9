use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::{
    dto::sse::{AdminHandshake, Handshake, ServerEvent},
    error::ServiceError,
    services::player_engine,
    state::{SharedState, SseHub},
};

/// Subscribe to the facilitator-only SSE stream.
pub async fn subscribe_admin(
    state: &SharedState,
) -> Result<(broadcast::Receiver<ServerEvent>, String), ServiceError> {
    let token = claim_admin_token(state).await?;
    let receiver = state.admin_sse().subscribe();
    Ok((receiver, token))
}

/// Subscribe to the notifications of one hosted player engine.
pub fn subscribe_player(
    state: &SharedState,
    engine_id: Uuid,
) -> Result<(broadcast::Receiver<ServerEvent>, SseHub), ServiceError> {
    let engine = state.engine(engine_id)?;
    let hub = engine.events().clone();
    Ok((hub.subscribe(), hub))
}

/// Identifies the target SSE stream so we can perform stream-specific
/// bookkeeping when the connection is torn down.
#[derive(Clone)]
pub enum StreamKind {
    /// A device stream; the engine is evicted if no stream reattaches in time.
    Player {
        /// Shared state holding the hosted engines.
        state: SharedState,
        /// Engine whose notifications are streamed.
        engine_id: Uuid,
    },
    /// Carries a clone of the shared application state so teardown logic can
    /// reset the admin token after the spawned task completes.
    Admin(SharedState),
}

/// Convert a broadcast receiver into an SSE response, forwarding events and
/// cleaning up once the client disconnects.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    kind: StreamKind,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        let mut engine_gone = false;
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            let mut event = Event::default().data(payload.data);
                            if let Some(name) = payload.event {
                                event = event.event(name);
                            }

                            if tx.send(Ok(event)).await.is_err() {
                                break;
                            }
                        }
                        // Engine dropped (player left): end the stream.
                        Err(RecvError::Closed) => {
                            engine_gone = true;
                            break;
                        }
                        Err(RecvError::Lagged(_)) => continue,
                    }
                }
            }
        }

        drop(receiver);
        match kind {
            StreamKind::Player { state, engine_id } => {
                tracing::info!(%engine_id, "Player SSE stream disconnected");
                if !engine_gone && player_engine::evict_when_idle(&state, engine_id).await {
                    tracing::info!(%engine_id, "Idle player engine evicted");
                }
            }
            StreamKind::Admin(state) => {
                reset_admin_token(state).await;
                tracing::info!("Admin SSE stream disconnected")
            }
        }
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Reserve the admin token for a new stream, generating one when none exists
/// and failing if another connection already holds it.
async fn claim_admin_token(state: &SharedState) -> Result<String, ServiceError> {
    let mut guard = state.admin_token().lock().await;
    match &mut *guard {
        slot @ None => {
            let token = Uuid::new_v4().simple().to_string();
            slot.replace(token.clone());
            Ok(token)
        }
        Some(_) => Err(ServiceError::Unauthorized(
            "Another admin SSE stream is already active".into(),
        )),
    }
}

/// Broadcast a token refresh event to the admin stream.
pub fn broadcast_admin_handshake(hub: &SseHub, token: &str) {
    if let Ok(event) = ServerEvent::json(
        Some("admin_token".to_string()),
        &AdminHandshake {
            token: token.to_string(),
        },
    ) {
        hub.broadcast(event);
    }
}

/// Greet a freshly connected stream with its identity and the degraded flag.
pub fn broadcast_handshake(hub: &SseHub, stream: &str, degraded: bool) {
    let handshake = Handshake {
        stream: stream.to_string(),
        message: format!("{stream} stream connected"),
        degraded,
    };
    if let Ok(event) = ServerEvent::json(Some("handshake".to_string()), &handshake) {
        hub.broadcast(event);
    }
}

/// Clear any stored admin token so the next admin connection negotiates a
/// fresh credential.
async fn reset_admin_token(state: SharedState) {
    let mut guard = state.admin_token().lock().await;
    guard.take();
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{config::AppConfig, dao::object_store::MemoryObjectStore, state::AppState};

    #[tokio::test]
    async fn only_one_admin_stream_holds_the_token() {
        let state = AppState::new(
            AppConfig::default(),
            Arc::new(MemoryObjectStore::new("http://localhost")),
        );
        let (_rx, token) = subscribe_admin(&state).await.unwrap();
        assert_eq!(token.len(), 32);
        assert!(matches!(
            subscribe_admin(&state).await,
            Err(ServiceError::Unauthorized(_))
        ));

        reset_admin_token(state.clone()).await;
        let (_rx, fresh) = subscribe_admin(&state).await.unwrap();
        assert_ne!(fresh, token);
    }
}
