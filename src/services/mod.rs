/// Custom avatar uploads.
pub mod avatar_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Podium reveal schedule and final standings.
pub mod leaderboard_service;
/// Per-device puzzle engine bound to one player row.
pub mod player_engine;
/// Post-game reflection prompts.
pub mod reflection;
/// Facilitator operations on the shared session.
pub mod session_controller;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Gateway connection supervisor driving degraded mode.
pub mod storage_supervisor;
