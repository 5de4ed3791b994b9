use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
};
use axum_valid::Valid;

use crate::{
    dto::{
        leaderboard::SavedLeaderboardView,
        player::PlayerSummary,
        session::{
            CustomSettingsRequest, DifficultyRequest, HintRequest, QuoteView,
            SaveLeaderboardRequest, SessionView, TimerRequest,
        },
    },
    error::AppError,
    services::session_controller,
    state::SharedState,
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Facilitator endpoints driving the shared session.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/session", get(current_session))
        .route("/admin/session/start", post(start_session))
        .route("/admin/session/pause", post(pause_session))
        .route("/admin/session/end", post(end_session))
        .route("/admin/session/timer", put(set_timer))
        .route("/admin/session/difficulty", put(set_difficulty))
        .route("/admin/session/custom", put(set_custom_settings))
        .route("/admin/session/double-points", post(toggle_double_points))
        .route("/admin/session/hint", post(send_hint))
        .route("/admin/players", get(roster).delete(clear_players))
        .route("/admin/leaderboard/reset", post(reset_leaderboard))
        .route(
            "/admin/leaderboards/saved",
            get(saved_leaderboards).post(save_leaderboard),
        )
        .route("/admin/quotes", get(list_quotes))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

/// Latest session, created idle when none exists yet.
#[utoipa::path(
    get,
    path = "/admin/session",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Current session", body = SessionView))
)]
pub async fn current_session(
    State(state): State<SharedState>,
) -> Result<Json<SessionView>, AppError> {
    let session = session_controller::current(&state).await?;
    Ok(Json(SessionView::from(&session)))
}

/// Start (or resume) the countdown.
#[utoipa::path(
    post,
    path = "/admin/session/start",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Session started", body = SessionView))
)]
pub async fn start_session(
    State(state): State<SharedState>,
) -> Result<Json<SessionView>, AppError> {
    let session = session_controller::start(&state).await?;
    Ok(Json(SessionView::from(&session)))
}

#[utoipa::path(
    post,
    path = "/admin/session/pause",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Session paused", body = SessionView))
)]
/// Stop the countdown without ending the round.
pub async fn pause_session(
    State(state): State<SharedState>,
) -> Result<Json<SessionView>, AppError> {
    let session = session_controller::pause(&state).await?;
    Ok(Json(SessionView::from(&session)))
}

/// End the round; every connected player completes and the reveal starts.
#[utoipa::path(
    post,
    path = "/admin/session/end",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Session ended", body = SessionView))
)]
pub async fn end_session(State(state): State<SharedState>) -> Result<Json<SessionView>, AppError> {
    let session = session_controller::end(&state).await?;
    Ok(Json(SessionView::from(&session)))
}

#[utoipa::path(
    put,
    path = "/admin/session/timer",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = TimerRequest,
    responses(
        (status = 200, description = "Timer updated", body = SessionView),
        (status = 400, description = "Duration out of range")
    )
)]
/// Change the round duration.
pub async fn set_timer(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<TimerRequest>>,
) -> Result<Json<SessionView>, AppError> {
    let session = session_controller::set_timer(&state, payload.seconds).await?;
    Ok(Json(SessionView::from(&session)))
}

/// Apply a difficulty preset (timer and quote count).
#[utoipa::path(
    put,
    path = "/admin/session/difficulty",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = DifficultyRequest,
    responses((status = 200, description = "Difficulty updated", body = SessionView))
)]
pub async fn set_difficulty(
    State(state): State<SharedState>,
    Json(payload): Json<DifficultyRequest>,
) -> Result<Json<SessionView>, AppError> {
    let session = session_controller::set_difficulty(&state, payload.difficulty).await?;
    Ok(Json(SessionView::from(&session)))
}

#[utoipa::path(
    put,
    path = "/admin/session/custom",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = CustomSettingsRequest,
    responses(
        (status = 200, description = "Custom settings applied", body = SessionView),
        (status = 400, description = "Quote count or minutes out of range")
    )
)]
/// Apply an explicit quote count and duration.
pub async fn set_custom_settings(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CustomSettingsRequest>>,
) -> Result<Json<SessionView>, AppError> {
    let session =
        session_controller::set_custom_settings(&state, payload.quote_count, payload.minutes)
            .await?;
    Ok(Json(SessionView::from(&session)))
}

#[utoipa::path(
    post,
    path = "/admin/session/double-points",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Double points toggled", body = SessionView))
)]
/// Switch double points on or off.
pub async fn toggle_double_points(
    State(state): State<SharedState>,
) -> Result<Json<SessionView>, AppError> {
    let session = session_controller::toggle_double_points(&state).await?;
    Ok(Json(SessionView::from(&session)))
}

/// Broadcast a hint; it is cleared automatically unless superseded.
#[utoipa::path(
    post,
    path = "/admin/session/hint",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = HintRequest,
    responses(
        (status = 200, description = "Hint sent", body = SessionView),
        (status = 400, description = "Empty or oversized hint")
    )
)]
pub async fn send_hint(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<HintRequest>>,
) -> Result<Json<SessionView>, AppError> {
    let session = session_controller::send_hint(&state, &payload.text).await?;
    Ok(Json(SessionView::from(&session)))
}

/// Players of the current session, highest score first.
#[utoipa::path(
    get,
    path = "/admin/players",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Roster", body = [PlayerSummary]))
)]
pub async fn roster(
    State(state): State<SharedState>,
) -> Result<Json<Vec<PlayerSummary>>, AppError> {
    let players = session_controller::roster(&state).await?;
    Ok(Json(players.iter().map(PlayerSummary::from).collect()))
}

#[utoipa::path(
    delete,
    path = "/admin/players",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 204, description = "Players removed"))
)]
/// Delete every player of the current session.
pub async fn clear_players(State(state): State<SharedState>) -> Result<StatusCode, AppError> {
    session_controller::clear_players(&state).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Remove every player and reopen the session for a new round.
#[utoipa::path(
    post,
    path = "/admin/leaderboard/reset",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Leaderboard reset", body = SessionView))
)]
pub async fn reset_leaderboard(
    State(state): State<SharedState>,
) -> Result<Json<SessionView>, AppError> {
    let session = session_controller::reset_leaderboard(&state).await?;
    Ok(Json(SessionView::from(&session)))
}

#[utoipa::path(
    get,
    path = "/admin/leaderboards/saved",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Archived leaderboards, newest first", body = [SavedLeaderboardView]))
)]
/// Archived leaderboards, newest first.
pub async fn saved_leaderboards(
    State(state): State<SharedState>,
) -> Result<Json<Vec<SavedLeaderboardView>>, AppError> {
    let boards = session_controller::saved_leaderboards(&state).await?;
    Ok(Json(boards.iter().map(SavedLeaderboardView::from).collect()))
}

/// Archive the current roster under a name, then reset the leaderboard.
#[utoipa::path(
    post,
    path = "/admin/leaderboards/saved",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = SaveLeaderboardRequest,
    responses(
        (status = 200, description = "Leaderboard saved", body = SavedLeaderboardView),
        (status = 400, description = "Blank game name"),
        (status = 409, description = "No players to save")
    )
)]
pub async fn save_leaderboard(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<SaveLeaderboardRequest>>,
) -> Result<Json<SavedLeaderboardView>, AppError> {
    let saved = session_controller::save_leaderboard(&state, &payload.game_name).await?;
    Ok(Json(SavedLeaderboardView::from(&saved)))
}

#[utoipa::path(
    get,
    path = "/admin/quotes",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Active quote catalog", body = [QuoteView]))
)]
/// Active quote catalog.
pub async fn list_quotes(
    State(state): State<SharedState>,
) -> Result<Json<Vec<QuoteView>>, AppError> {
    let quotes = session_controller::quotes(&state).await?;
    Ok(Json(quotes.iter().map(QuoteView::from).collect()))
}

/// Ensure the incoming request bears the admin token currently handed to the admin SSE stream.
async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_owned())
        .ok_or_else(|| {
            AppError::Unauthorized("missing admin token header `X-Admin-Token`".into())
        })?;

    let expected = {
        let guard = state.admin_token().lock().await;
        guard.clone()
    };

    match expected {
        Some(token) if token == provided => Ok(next.run(req).await),
        Some(_) => Err(AppError::Unauthorized("invalid admin token".into())),
        None => Err(AppError::Unauthorized(
            "admin SSE stream not initialised yet".into(),
        )),
    }
}
