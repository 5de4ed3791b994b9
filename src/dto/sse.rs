//! Server-sent event payloads shared by the admin and player streams.

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::{
        leaderboard::RevealView,
        player::{DropResponse, PlayerSummary},
        session::SessionView,
    },
    state::model::Phase,
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// SSE event name; `None` sends an unnamed message.
    pub event: Option<String>,
    /// Serialised payload.
    pub data: String,
}

impl ServerEvent {
    /// Create an event with an already serialised data field.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier of the SSE stream (`admin` or `player`).
    pub stream: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Token handed to the facilitator stream; required on every `/admin` call.
pub struct AdminHandshake {
    /// Value expected in the `X-Admin-Token` header.
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    /// Whether the storage backend is unreachable.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// A gateway call failed; local state was kept as is.
pub struct GatewayFailureEvent {
    /// Gateway operation that failed.
    pub operation: String,
    /// Error reported by the gateway.
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Session row changed (facilitator stream) or started/paused (player stream).
pub struct SessionChangedEvent {
    /// Session after the change.
    pub session: SessionView,
}

#[derive(Debug, Serialize, ToSchema)]
/// Roster of the current session after a players change.
pub struct RosterEvent {
    /// Players, highest score first.
    pub players: Vec<PlayerSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Facilitator hint shown to players.
pub struct HintEvent {
    /// Hint text.
    pub text: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Double points was switched on.
pub struct DoublePointsEvent {
    /// Always `true`; switching off is silent.
    pub active: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Zone highlighted after repeated misses, or `null` once it expires.
pub struct HintZoneEvent {
    /// Highlighted zone.
    pub phase: Option<Phase>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Score update after a drop.
pub struct ScoreEvent(pub DropResponse);

#[derive(Debug, Serialize, ToSchema)]
/// The puzzle was finished and the final score recorded.
pub struct CompletedEvent {
    /// Final score, bonus included.
    pub score: i32,
    /// Score before the time bonus.
    pub base_score: i32,
    /// Bonus earned from the remaining time.
    pub time_bonus: i32,
    /// Seconds spent on the puzzle.
    pub elapsed_time: u64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// The round is over; plays the podium animation.
pub struct RevealEvent(pub RevealView);
