use axum::Router;

use crate::state::SharedState;

/// Facilitator routes behind the admin token.
pub mod admin;
/// Swagger UI and the OpenAPI document.
pub mod docs;
/// Health check route.
pub mod health;
/// Player device routes.
pub mod play;
/// Server-sent event streams.
pub mod sse;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(play::router())
        .merge(admin::router(state.clone()))
        .merge(docs::router());

    api_router.with_state(state)
}
