use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        leaderboard::RevealView,
        player::{DropResponse, PlayerSummary},
        session::SessionView,
        sse::{
            CompletedEvent, DoublePointsEvent, GatewayFailureEvent, HintEvent, HintZoneEvent,
            RevealEvent, RosterEvent, ScoreEvent, ServerEvent, SessionChangedEvent, SystemStatus,
        },
    },
    error::ServiceError,
    state::{
        AppState, SseHub,
        model::{ActivePlayer, GameSession, GameState, Phase},
    },
};

/// Session row changed; facilitator stream.
pub const EVENT_SESSION_CHANGED: &str = "session.changed";
/// Roster changed; facilitator stream.
pub const EVENT_ROSTER: &str = "players.updated";
/// A gateway call failed; both streams.
pub const EVENT_GATEWAY_FAILURE: &str = "gateway_failure";
/// Degraded mode changed; facilitator stream.
pub const EVENT_SYSTEM_STATUS: &str = "system_status";
/// New facilitator hint.
pub const EVENT_HINT: &str = "hint";
/// Double points switched on.
pub const EVENT_DOUBLE_POINTS: &str = "double_points";
/// Countdown started or resumed.
pub const EVENT_SESSION_STARTED: &str = "session.started";
/// Countdown paused.
pub const EVENT_SESSION_PAUSED: &str = "session.paused";
/// Zone highlight set or cleared.
pub const EVENT_HINT_ZONE: &str = "hint_zone";
/// Drop scored.
pub const EVENT_SCORE: &str = "score";
/// Puzzle completed.
pub const EVENT_COMPLETED: &str = "completed";
/// Leaderboard refreshed.
pub const EVENT_LEADERBOARD: &str = "leaderboard";
/// Round over; start the podium animation.
pub const EVENT_REVEAL: &str = "reveal";

/// Push the refreshed session row to the facilitator.
pub fn broadcast_session_changed(state: &AppState, session: &GameSession) {
    let payload = SessionChangedEvent {
        session: SessionView::from(session),
    };
    send_admin_event(state, EVENT_SESSION_CHANGED, &payload);
}

/// Push the refreshed roster to the facilitator.
pub fn broadcast_roster(state: &AppState, players: &[ActivePlayer]) {
    send_admin_event(state, EVENT_ROSTER, &roster_event(players));
}

/// Report a failed gateway call on the facilitator stream.
pub fn broadcast_admin_failure(state: &AppState, operation: &str, err: &ServiceError) {
    send_admin_event(state, EVENT_GATEWAY_FAILURE, &failure_event(operation, err));
}

/// Announce a degraded mode change to the facilitator.
pub fn broadcast_system_status(state: &AppState, degraded: bool) {
    send_admin_event(state, EVENT_SYSTEM_STATUS, &SystemStatus { degraded });
}

/// Report a failed gateway call on a player stream.
pub fn notify_failure(hub: &SseHub, operation: &str, err: &ServiceError) {
    send_event(hub, EVENT_GATEWAY_FAILURE, &failure_event(operation, err));
}

/// Show a new hint on the device.
pub fn notify_hint(hub: &SseHub, text: &str) {
    send_event(
        hub,
        EVENT_HINT,
        &HintEvent {
            text: text.to_owned(),
        },
    );
}

/// Announce that double points started.
pub fn notify_double_points(hub: &SseHub) {
    send_event(hub, EVENT_DOUBLE_POINTS, &DoublePointsEvent { active: true });
}

/// The session went from inactive to active (`started`) or back (`paused`).
pub fn notify_session_activity(hub: &SseHub, session: &GameSession) {
    let event = if session.is_active {
        EVENT_SESSION_STARTED
    } else {
        EVENT_SESSION_PAUSED
    };
    let payload = SessionChangedEvent {
        session: SessionView::from(session),
    };
    send_event(hub, event, &payload);
}

/// Highlight `phase`, or clear the highlight with `None`.
pub fn notify_hint_zone(hub: &SseHub, phase: Option<Phase>) {
    send_event(hub, EVENT_HINT_ZONE, &HintZoneEvent { phase });
}

/// Push the outcome of a drop.
pub fn notify_score(hub: &SseHub, drop: &DropResponse) {
    send_event(hub, EVENT_SCORE, &ScoreEvent(drop.clone()));
}

/// Push the final score breakdown.
pub fn notify_completed(hub: &SseHub, game: &GameState) {
    let payload = CompletedEvent {
        score: game.score,
        base_score: game.base_score,
        time_bonus: game.time_bonus,
        elapsed_time: game.elapsed_time,
    };
    send_event(hub, EVENT_COMPLETED, &payload);
}

/// Push the refreshed top players.
pub fn notify_leaderboard(hub: &SseHub, players: &[ActivePlayer]) {
    send_event(hub, EVENT_LEADERBOARD, &roster_event(players));
}

/// Start the reveal with the final standings.
pub fn notify_reveal(hub: &SseHub, reveal: RevealView) {
    send_event(hub, EVENT_REVEAL, &RevealEvent(reveal));
}

fn roster_event(players: &[ActivePlayer]) -> RosterEvent {
    RosterEvent {
        players: players.iter().map(PlayerSummary::from).collect(),
    }
}

fn failure_event(operation: &str, err: &ServiceError) -> GatewayFailureEvent {
    GatewayFailureEvent {
        operation: operation.to_owned(),
        message: err.to_string(),
    }
}

fn send_admin_event(state: &AppState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.admin_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize admin SSE payload"),
    }
}

fn send_event(hub: &SseHub, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => hub.broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize player SSE payload"),
    }
}
