//! Request and response payloads of the HTTP surface.

use crate::dao::timestamp::Timestamp;

/// Health check payload.
pub mod health;
/// Saved leaderboards and the reveal schedule.
pub mod leaderboard;
/// Player device requests and views.
pub mod player;
/// Session views and facilitator requests.
pub mod session;
/// Server-sent event payloads.
pub mod sse;
/// Shared request validators.
pub mod validation;

fn format_optional(time: Option<Timestamp>) -> Option<String> {
    time.as_ref().map(Timestamp::to_rfc3339)
}
