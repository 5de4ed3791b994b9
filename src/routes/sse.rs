use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::Sse,
    routing::get,
};
use futures::Stream;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::AppError,
    services::sse_service::{self, StreamKind},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sse/play/{engine}",
    tag = "sse",
    params(("engine" = String, Path, description = "Engine id returned by /play/join")),
    responses(
        (status = 200, description = "Player SSE stream", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown engine")
    )
)]
/// Stream hints, double points, session activity, scores and the reveal to one device.
pub async fn player_stream(
    State(state): State<SharedState>,
    Path(engine): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let (receiver, hub) = sse_service::subscribe_player(&state, engine)?;
    info!(%engine, "New player SSE connection");
    sse_service::broadcast_handshake(&hub, "player", state.is_degraded());
    Ok(sse_service::to_sse_stream(
        receiver,
        StreamKind::Player {
            state,
            engine_id: engine,
        },
    ))
}

#[utoipa::path(
    get,
    path = "/sse/admin",
    tag = "sse",
    responses(
        (status = 200, description = "Admin SSE stream", content_type = "text/event-stream", body = String),
        (status = 401, description = "Another admin stream is already connected")
    )
)]
/// Stream facilitator events, handing out the admin token first.
pub async fn admin_stream(
    State(state): State<SharedState>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let (receiver, token) = sse_service::subscribe_admin(&state).await?;
    info!("New admin SSE connection");
    sse_service::broadcast_admin_handshake(state.admin_sse(), &token);
    sse_service::broadcast_handshake(state.admin_sse(), "admin", state.is_degraded());
    Ok(sse_service::to_sse_stream(
        receiver,
        StreamKind::Admin(state),
    ))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sse/play/{engine}", get(player_stream))
        .route("/sse/admin", get(admin_stream))
}
