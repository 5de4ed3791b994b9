use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Phase Puzzle Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::player_stream,
        crate::routes::sse::admin_stream,
        crate::routes::admin::current_session,
        crate::routes::admin::start_session,
        crate::routes::admin::pause_session,
        crate::routes::admin::end_session,
        crate::routes::admin::set_timer,
        crate::routes::admin::set_difficulty,
        crate::routes::admin::set_custom_settings,
        crate::routes::admin::toggle_double_points,
        crate::routes::admin::send_hint,
        crate::routes::admin::roster,
        crate::routes::admin::clear_players,
        crate::routes::admin::reset_leaderboard,
        crate::routes::admin::saved_leaderboards,
        crate::routes::admin::save_leaderboard,
        crate::routes::admin::list_quotes,
        crate::routes::play::session,
        crate::routes::play::join,
        crate::routes::play::upload_avatar,
        crate::routes::play::avatar,
        crate::routes::play::leave,
        crate::routes::play::engine_state,
        crate::routes::play::drop_item,
        crate::routes::play::remove_item,
        crate::routes::play::time_up,
        crate::routes::play::leaderboard,
        crate::routes::play::reflection,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::session::SessionView,
            crate::dto::session::TimerRequest,
            crate::dto::session::DifficultyRequest,
            crate::dto::session::CustomSettingsRequest,
            crate::dto::session::HintRequest,
            crate::dto::session::SaveLeaderboardRequest,
            crate::dto::session::QuoteView,
            crate::dto::player::JoinRequest,
            crate::dto::player::ItemKind,
            crate::dto::player::DropRequest,
            crate::dto::player::RemoveRequest,
            crate::dto::player::DropResponse,
            crate::dto::player::PlayerSummary,
            crate::dto::player::GameStateView,
            crate::dto::player::BoardView,
            crate::dto::player::PlayerStateView,
            crate::dto::player::ReflectionView,
            crate::dto::player::AvatarUploadResponse,
            crate::dto::leaderboard::SavedLeaderboardView,
            crate::dto::leaderboard::RevealStage,
            crate::dto::leaderboard::RevealStep,
            crate::dto::leaderboard::RevealView,
            crate::dto::sse::Handshake,
            crate::dto::sse::AdminHandshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::GatewayFailureEvent,
            crate::dto::sse::SessionChangedEvent,
            crate::dto::sse::RosterEvent,
            crate::dto::sse::HintEvent,
            crate::dto::sse::DoublePointsEvent,
            crate::dto::sse::HintZoneEvent,
            crate::dto::sse::CompletedEvent,
            crate::state::model::Phase,
            crate::state::model::Difficulty,
            crate::state::model::AvatarKind,
            crate::state::player_phase::PlayerPhase,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "admin", description = "Facilitator controls of the shared session"),
        (name = "play", description = "Player device operations"),
    )
)]
/// OpenAPI document of every route the server exposes.
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_admin_and_player_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|path| path.as_str() == "/admin/session/hint"));
        assert!(paths.iter().any(|path| path.as_str() == "/play/{engine}/drop"));
        assert!(paths.iter().any(|path| path.as_str() == "/sse/play/{engine}"));
    }
}
