use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::{delete, get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::{
        player::{
            AvatarUploadResponse, DropRequest, DropResponse, JoinRequest, PlayerStateView,
            PlayerSummary, ReflectionView, RemoveRequest, item_ref,
        },
        session::SessionView,
    },
    error::AppError,
    services::{avatar_service, player_engine, session_controller},
    state::{SharedState, model::AvatarKind},
};

const AVATAR_BODY_LIMIT: usize = 4 * 1024 * 1024;

/// Player-device endpoints: joining, dragging cards and the end-of-round screens.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/play/session", get(session))
        .route("/play/join", post(join))
        .route(
            "/play/avatar",
            post(upload_avatar).layer(DefaultBodyLimit::max(AVATAR_BODY_LIMIT)),
        )
        .route("/play/{engine}", delete(leave))
        .route("/play/{engine}/state", get(engine_state))
        .route("/play/{engine}/drop", post(drop_item))
        .route("/play/{engine}/remove", post(remove_item))
        .route("/play/{engine}/time-up", post(time_up))
        .route("/play/{engine}/leaderboard", get(leaderboard))
        .route("/play/{engine}/reflection", get(reflection))
        .route("/avatars/{key}", get(avatar))
}

/// Public view of the current session; players never create one.
#[utoipa::path(
    get,
    path = "/play/session",
    tag = "play",
    responses(
        (status = 200, description = "Current session", body = SessionView),
        (status = 404, description = "No session yet")
    )
)]
pub async fn session(State(state): State<SharedState>) -> Result<Json<SessionView>, AppError> {
    let session = session_controller::lookup(&state).await?;
    Ok(Json(SessionView::from(&session)))
}

/// Bind this device to a player of the current session, resuming a previous
/// row with the same name.
#[utoipa::path(
    post,
    path = "/play/join",
    tag = "play",
    request_body = JoinRequest,
    responses(
        (status = 200, description = "Player engine started", body = PlayerStateView),
        (status = 400, description = "Invalid name or avatar"),
        (status = 404, description = "No session to join")
    )
)]
pub async fn join(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<JoinRequest>>,
) -> Result<Json<PlayerStateView>, AppError> {
    let engine = player_engine::join(&state, payload).await?;
    Ok(Json(engine.view().await))
}

/// Store a custom avatar image sent as the raw request body.
#[utoipa::path(
    post,
    path = "/play/avatar",
    tag = "play",
    request_body(content = Vec<u8>, content_type = "image/*"),
    responses(
        (status = 200, description = "Avatar stored", body = AvatarUploadResponse),
        (status = 400, description = "Not an image, empty or too large")
    )
)]
pub async fn upload_avatar(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AvatarUploadResponse>, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());
    let url = avatar_service::upload_avatar(&state, content_type, body.to_vec()).await?;
    Ok(Json(AvatarUploadResponse {
        avatar_type: AvatarKind::Custom,
        avatar_value: url,
    }))
}

#[utoipa::path(
    get,
    path = "/avatars/{key}",
    tag = "play",
    params(("key" = String, Path, description = "Key returned in the avatar URL")),
    responses(
        (status = 200, description = "Avatar image", content_type = "image/*", body = Vec<u8>),
        (status = 404, description = "Unknown avatar")
    )
)]
/// Serve an uploaded avatar, sandboxed so it cannot run script.
pub async fn avatar(
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let object = avatar_service::fetch_avatar(&state, &key).await?;
    let headers = [
        (header::CONTENT_TYPE, object.content_type),
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff".to_owned()),
        (header::CONTENT_SECURITY_POLICY, "sandbox".to_owned()),
    ];
    Ok((headers, object.bytes))
}

/// Stop hosting the engine.
#[utoipa::path(
    delete,
    path = "/play/{engine}",
    tag = "play",
    params(("engine" = String, Path, description = "Engine id returned by /play/join")),
    responses(
        (status = 204, description = "Engine stopped"),
        (status = 404, description = "Unknown engine")
    )
)]
pub async fn leave(
    State(state): State<SharedState>,
    Path(engine): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    player_engine::leave(&state, engine).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/play/{engine}/state",
    tag = "play",
    params(("engine" = String, Path, description = "Engine id returned by /play/join")),
    responses((status = 200, description = "Device state", body = PlayerStateView))
)]
/// Current state of the device's engine.
pub async fn engine_state(
    State(state): State<SharedState>,
    Path(engine): Path<Uuid>,
) -> Result<Json<PlayerStateView>, AppError> {
    let engine = state.engine(engine)?;
    Ok(Json(engine.view().await))
}

/// Drop a card onto a phase zone and score it.
#[utoipa::path(
    post,
    path = "/play/{engine}/drop",
    tag = "play",
    params(("engine" = String, Path, description = "Engine id returned by /play/join")),
    request_body = DropRequest,
    responses(
        (status = 200, description = "Drop scored", body = DropResponse),
        (status = 409, description = "Puzzle not accepting drops or card unavailable")
    )
)]
pub async fn drop_item(
    State(state): State<SharedState>,
    Path(engine): Path<Uuid>,
    Json(payload): Json<DropRequest>,
) -> Result<Json<DropResponse>, AppError> {
    let engine = state.engine(engine)?;
    let item = item_ref(payload.item_kind, &payload.item_id)?;
    Ok(Json(engine.drop_item(item, payload.phase).await?))
}

/// Move a placed card back to its pool.
#[utoipa::path(
    post,
    path = "/play/{engine}/remove",
    tag = "play",
    params(("engine" = String, Path, description = "Engine id returned by /play/join")),
    request_body = RemoveRequest,
    responses(
        (status = 200, description = "Card removed", body = PlayerStateView),
        (status = 409, description = "Card is not placed in that zone")
    )
)]
pub async fn remove_item(
    State(state): State<SharedState>,
    Path(engine): Path<Uuid>,
    Json(payload): Json<RemoveRequest>,
) -> Result<Json<PlayerStateView>, AppError> {
    let engine = state.engine(engine)?;
    let item = item_ref(payload.item_kind, &payload.item_id)?;
    engine.remove_item(item, payload.phase).await?;
    Ok(Json(engine.view().await))
}

/// The device's countdown reached zero.
#[utoipa::path(
    post,
    path = "/play/{engine}/time-up",
    tag = "play",
    params(("engine" = String, Path, description = "Engine id returned by /play/join")),
    responses((status = 200, description = "Puzzle completed without time bonus", body = PlayerStateView))
)]
pub async fn time_up(
    State(state): State<SharedState>,
    Path(engine): Path<Uuid>,
) -> Result<Json<PlayerStateView>, AppError> {
    let engine = state.engine(engine)?;
    engine.handle_time_up().await;
    Ok(Json(engine.view().await))
}

#[utoipa::path(
    get,
    path = "/play/{engine}/leaderboard",
    tag = "play",
    params(("engine" = String, Path, description = "Engine id returned by /play/join")),
    responses((status = 200, description = "Top players of the session", body = [PlayerSummary]))
)]
/// Top players of the engine's session.
pub async fn leaderboard(
    State(state): State<SharedState>,
    Path(engine): Path<Uuid>,
) -> Result<Json<Vec<PlayerSummary>>, AppError> {
    let engine = state.engine(engine)?;
    let players = engine.leaderboard().await?;
    Ok(Json(players.iter().map(PlayerSummary::from).collect()))
}

/// Reflection prompts shown after the puzzle.
#[utoipa::path(
    get,
    path = "/play/{engine}/reflection",
    tag = "play",
    params(("engine" = String, Path, description = "Engine id returned by /play/join")),
    responses(
        (status = 200, description = "Reflection prompts", body = ReflectionView),
        (status = 409, description = "Puzzle not completed yet")
    )
)]
pub async fn reflection(
    State(state): State<SharedState>,
    Path(engine): Path<Uuid>,
) -> Result<Json<ReflectionView>, AppError> {
    let engine = state.engine(engine)?;
    Ok(Json(engine.reflection().await?))
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
    async fn avatars_are_served_sandboxed() {
        let state = AppState::with_gateway(
            AppConfig::default(),
            Arc::new(MemoryGateway::seeded()),
            Arc::new(MemoryObjectStore::new("http://localhost:8080")),
        );
        let url = avatar_service::upload_avatar(&state, Some("image/png"), vec![1, 2, 3])
            .await
            .unwrap();
        let key = url.rsplit('/').next().unwrap().to_owned();

        let response = avatar(State(state), Path(key))
            .await
            .unwrap()
            .into_response();
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "image/png");
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers[header::CONTENT_SECURITY_POLICY], "sandbox");
    }
}
