//! Facilitator-side mutations of the shared session row.
//!
//! Every operation re-resolves the current session from the gateway; nothing
//! here keeps a copy of the row between calls.

use std::{
    future::Future,
    sync::{Arc, Weak},
};

use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        gateway::{ChangeFilter, Collection, Gateway},
        models::{SessionEntity, SessionPatch},
        timestamp::Timestamp,
    },
    error::ServiceError,
    services::{player_engine, sse_events},
    state::{
        AppState, SharedState,
        model::{
            ActivePlayer, CLASSIC_THEME, Difficulty, GameSession, Quote, SavedLeaderboard,
        },
    },
};

/// Resolve the current session, creating an idle medium session when none exists.
pub async fn current(state: &SharedState) -> Result<GameSession, ServiceError> {
    reported(state, "current", async {
        let gateway = state.require_gateway().await?;
        if let Some(session) = gateway.latest_session().await? {
            return Ok(session.into());
        }
        let preset = state.config().preset(Difficulty::Medium);
        let created = gateway
            .insert_session(SessionEntity::idle(Difficulty::Medium, preset.timer_seconds))
            .await?;
        info!(session_id = %created.id, "created idle game session");
        Ok(created.into())
    })
    .await
}

/// Read the current session without creating one.
pub async fn lookup(state: &SharedState) -> Result<GameSession, ServiceError> {
    resolve(state).await.map(|(_, session)| session)
}

/// Activate the session and start the timer now.
pub async fn start(state: &SharedState) -> Result<GameSession, ServiceError> {
    let patch = SessionPatch {
        is_active: Some(true),
        timer_started_at: Some(Some(Timestamp::now())),
        game_ended_at: Some(None),
        ..SessionPatch::default()
    };
    let session = reported(state, "start", update_current(state, patch)).await?;
    info!(session_id = %session.id, "game session started");
    Ok(session)
}

/// Deactivate the session and stop the timer, keeping `game_ended_at`.
pub async fn pause(state: &SharedState) -> Result<GameSession, ServiceError> {
    let patch = SessionPatch {
        is_active: Some(false),
        timer_started_at: Some(None),
        ..SessionPatch::default()
    };
    let session = reported(state, "pause", update_current(state, patch)).await?;
    info!(session_id = %session.id, "game session paused");
    Ok(session)
}

/// Conclude the round; every player engine completes and reveals the leaderboard.
pub async fn end(state: &SharedState) -> Result<GameSession, ServiceError> {
    let patch = SessionPatch {
        is_active: Some(false),
        timer_started_at: Some(None),
        game_ended_at: Some(Some(Timestamp::now())),
        ..SessionPatch::default()
    };
    let session = reported(state, "end", update_current(state, patch)).await?;
    info!(session_id = %session.id, "game session ended");
    Ok(session)
}

/// Change the round duration, in seconds.
pub async fn set_timer(state: &SharedState, seconds: u32) -> Result<GameSession, ServiceError> {
    if seconds == 0 {
        return Err(ServiceError::Validation("timer must be positive".into()));
    }
    let patch = SessionPatch {
        timer_seconds: Some(seconds),
        ..SessionPatch::default()
    };
    reported(state, "set_timer", update_current(state, patch)).await
}

/// Apply a difficulty preset: its timer and its quote count.
pub async fn set_difficulty(
    state: &SharedState,
    difficulty: Difficulty,
) -> Result<GameSession, ServiceError> {
    let preset = state.config().preset(difficulty);
    let patch = SessionPatch {
        difficulty: Some(difficulty),
        timer_seconds: Some(preset.timer_seconds),
        quote_count: Some(Some(preset.quote_count)),
        ..SessionPatch::default()
    };
    let session = reported(state, "set_difficulty", update_current(state, patch)).await?;
    info!(session_id = %session.id, difficulty = difficulty.label(), "difficulty changed");
    Ok(session)
}

/// Explicit quote count and duration; the difficulty label falls back to medium.
pub async fn set_custom_settings(
    state: &SharedState,
    quote_count: usize,
    minutes: u32,
) -> Result<GameSession, ServiceError> {
    if quote_count == 0 || minutes == 0 {
        return Err(ServiceError::Validation(
            "quote count and minutes must be positive".into(),
        ));
    }
    let patch = SessionPatch {
        difficulty: Some(Difficulty::Medium),
        timer_seconds: Some(minutes.saturating_mul(60)),
        quote_count: Some(Some(quote_count)),
        ..SessionPatch::default()
    };
    reported(state, "set_custom_settings", update_current(state, patch)).await
}

/// Flip double points.
pub async fn toggle_double_points(state: &SharedState) -> Result<GameSession, ServiceError> {
    reported(state, "toggle_double_points", async {
        let (gateway, session) = resolve(state).await?;
        let patch = SessionPatch {
            double_points_active: Some(!session.double_points_active),
            ..SessionPatch::default()
        };
        apply(&gateway, session.id, patch).await
    })
    .await
}

/// Broadcast `text` as the current hint and schedule its clear.
///
/// Each hint gets a new issuance token and supersedes the pending clear of
/// the previous one; the clear only runs if its token is still the latest and
/// the row still shows its text.
pub async fn send_hint(state: &SharedState, text: &str) -> Result<GameSession, ServiceError> {
    let text = text.trim().to_owned();
    if text.is_empty() {
        return Err(ServiceError::Validation("hint must not be blank".into()));
    }

    let mut slot = state.hints().lock().await;
    let (gateway, session) = reported(state, "send_hint", resolve(state)).await?;
    let patch = SessionPatch {
        current_hint: Some(Some(text.clone())),
        ..SessionPatch::default()
    };
    let updated = reported(state, "send_hint", apply(&gateway, session.id, patch)).await?;

    slot.issued += 1;
    if let Some(previous) = slot.pending.take() {
        previous.abort();
    }
    slot.pending = Some(tokio::spawn(clear_hint_later(
        Arc::downgrade(state),
        session.id,
        slot.issued,
        text,
    )));
    info!(session_id = %session.id, token = slot.issued, "hint broadcast");
    Ok(updated)
}

async fn clear_hint_later(state: Weak<AppState>, session_id: Uuid, token: u64, text: String) {
    let Some(delay) = state.upgrade().map(|state| state.config().hint_clear) else {
        return;
    };
    sleep(delay).await;

    let Some(state) = state.upgrade() else {
        return;
    };
    let mut slot = state.hints().lock().await;
    if slot.issued != token {
        return;
    }
    slot.pending = None;

    let Some(gateway) = state.gateway().await else {
        return;
    };
    let result = async {
        let Some(row) = gateway.find_session(session_id).await? else {
            return Ok(false);
        };
        if row.current_hint.as_deref() != Some(text.as_str()) {
            return Ok(false);
        }
        let patch = SessionPatch {
            current_hint: Some(None),
            ..SessionPatch::default()
        };
        gateway.update_session(session_id, patch).await?;
        Ok::<_, ServiceError>(true)
    }
    .await;

    match result {
        Ok(true) => debug!(%session_id, token, "hint cleared"),
        Ok(false) => debug!(%session_id, token, "hint changed before its clear; skipped"),
        Err(err) => {
            warn!(%session_id, error = %err, "failed to clear hint");
            sse_events::broadcast_admin_failure(&state, "clear_hint", &err);
        }
    }
}

/// Remove every player row of the current session.
pub async fn clear_players(state: &SharedState) -> Result<(), ServiceError> {
    reported(state, "clear_players", async {
        let (gateway, session) = resolve(state).await?;
        gateway.delete_players(session.id).await?;
        let stopped = player_engine::shutdown_session(state, session.id).await;
        info!(session_id = %session.id, stopped, "players cleared");
        Ok(())
    })
    .await
}

/// Clear the roster and return the session to its idle state.
///
/// Historical leaderboard rows are kept.
pub async fn reset_leaderboard(state: &SharedState) -> Result<GameSession, ServiceError> {
    clear_players(state).await?;
    let patch = SessionPatch {
        is_active: Some(false),
        timer_started_at: Some(None),
        game_ended_at: Some(None),
        ..SessionPatch::default()
    };
    reported(state, "reset_leaderboard", update_current(state, patch)).await
}

/// Players of the current session, highest score first.
pub async fn roster(state: &SharedState) -> Result<Vec<ActivePlayer>, ServiceError> {
    reported(state, "roster", async {
        let (gateway, session) = resolve(state).await?;
        load_roster(&gateway, session.id).await
    })
    .await
}

/// Archive the current roster under `game_name`, then reset the leaderboard.
pub async fn save_leaderboard(
    state: &SharedState,
    game_name: &str,
) -> Result<SavedLeaderboard, ServiceError> {
    let game_name = game_name.trim();
    if game_name.is_empty() {
        return Err(ServiceError::Validation("game name must not be blank".into()));
    }

    let saved = reported(state, "save_leaderboard", async {
        let (gateway, session) = resolve(state).await?;
        let players = load_roster(&gateway, session.id).await?;
        if players.is_empty() {
            return Err(ServiceError::InvalidState(
                "no players to save in the current session".into(),
            ));
        }
        let snapshot = SavedLeaderboard::from_roster(game_name.to_owned(), Some(session.id), players);
        let stored = gateway.insert_saved_leaderboard(snapshot.into()).await?;
        Ok(SavedLeaderboard::from(stored))
    })
    .await?;

    info!(
        game_name = %saved.game_name,
        winner = saved.winner_name.as_deref().unwrap_or("-"),
        "leaderboard saved"
    );
    reset_leaderboard(state).await?;
    Ok(saved)
}

/// Most recent archived rosters first.
pub async fn saved_leaderboards(state: &SharedState) -> Result<Vec<SavedLeaderboard>, ServiceError> {
    reported(state, "saved_leaderboards", async {
        let gateway = state.require_gateway().await?;
        let boards = gateway
            .list_saved_leaderboards(state.config().saved_leaderboards_limit)
            .await?;
        Ok(boards.into_iter().map(Into::into).collect())
    })
    .await
}

/// Active catalog served to players.
pub async fn quotes(state: &SharedState) -> Result<Vec<Quote>, ServiceError> {
    reported(state, "quotes", async {
        let gateway = state.require_gateway().await?;
        let rows = gateway.list_active_quotes(CLASSIC_THEME.to_owned()).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    })
    .await
}

/// Forward session and roster changes to the facilitator stream.
///
/// Replaces any previous feed; called whenever a gateway is installed.
pub async fn spawn_admin_feed(state: &SharedState) {
    let Some(gateway) = state.gateway().await else {
        return;
    };
    let mut feed = state.admin_feed().lock().await;
    if let Some(previous) = feed.take() {
        previous.abort();
    }
    *feed = Some(tokio::spawn(run_admin_feed(Arc::downgrade(state), gateway)));
}

async fn run_admin_feed(state: Weak<AppState>, gateway: Arc<dyn Gateway>) {
    let mut sessions = gateway.subscribe(Collection::GameSessions, ChangeFilter::All);
    let mut players = gateway.subscribe(Collection::ActivePlayers, ChangeFilter::All);
    let mut degraded = match state.upgrade() {
        Some(state) => state.degraded_watcher(),
        None => return,
    };

    loop {
        tokio::select! {
            Some(_) = sessions.next() => {
                let Some(state) = state.upgrade() else { break };
                match gateway.latest_session().await {
                    Ok(Some(session)) => {
                        sse_events::broadcast_session_changed(&state, &session.into());
                    }
                    Ok(None) => {}
                    Err(err) => warn!(error = %err, "failed to refresh session for facilitator"),
                }
            }
            Some(_) = players.next() => {
                let Some(state) = state.upgrade() else { break };
                let roster = async {
                    let Some(session) = gateway.latest_session().await? else {
                        return Ok(Vec::new());
                    };
                    load_roster(&gateway, session.id).await
                };
                match roster.await {
                    Ok(players) => sse_events::broadcast_roster(&state, &players),
                    Err(err) => warn!(error = %err, "failed to refresh roster for facilitator"),
                }
            }
            Ok(()) = degraded.changed() => {
                let Some(state) = state.upgrade() else { break };
                let flag = *degraded.borrow_and_update();
                sse_events::broadcast_system_status(&state, flag);
            }
            else => break,
        }
    }
    debug!("facilitator feed stopped");
}

async fn load_roster(
    gateway: &Arc<dyn Gateway>,
    session_id: Uuid,
) -> Result<Vec<ActivePlayer>, ServiceError> {
    let rows = gateway.list_players(session_id, None).await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

async fn resolve(state: &SharedState) -> Result<(Arc<dyn Gateway>, GameSession), ServiceError> {
    let gateway = state.require_gateway().await?;
    let session = gateway
        .latest_session()
        .await?
        .ok_or_else(|| ServiceError::Resolution("no game session".into()))?;
    Ok((gateway, session.into()))
}

async fn update_current(state: &SharedState, patch: SessionPatch) -> Result<GameSession, ServiceError> {
    let (gateway, session) = resolve(state).await?;
    apply(&gateway, session.id, patch).await
}

/// Write `patch` and return the refetched row.
async fn apply(
    gateway: &Arc<dyn Gateway>,
    session_id: Uuid,
    patch: SessionPatch,
) -> Result<GameSession, ServiceError> {
    gateway.update_session(session_id, patch).await?;
    gateway
        .find_session(session_id)
        .await?
        .map(GameSession::from)
        .ok_or_else(|| ServiceError::Resolution(format!("session {session_id} vanished")))
}

/// Log and publish gateway-side failures before handing them back to the caller.
async fn reported<T>(
    state: &AppState,
    operation: &'static str,
    work: impl Future<Output = Result<T, ServiceError>>,
) -> Result<T, ServiceError> {
    let result = work.await;
    if let Err(err) = &result {
        if matches!(
            err,
            ServiceError::Gateway(_) | ServiceError::Resolution(_) | ServiceError::Degraded
        ) {
            warn!(operation, error = %err, "session operation failed");
            sse_events::broadcast_admin_failure(state, operation, err);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{memory::MemoryGateway, object_store::MemoryObjectStore},
        state::AppState,
    };

    fn state() -> SharedState {
        AppState::with_gateway(
            AppConfig::default(),
            Arc::new(MemoryGateway::seeded()),
            Arc::new(MemoryObjectStore::new("http://localhost/avatars")),
        )
    }

    #[tokio::test]
    async fn current_creates_an_idle_session_once() {
        let state = state();
        let first = current(&state).await.unwrap();
        assert!(!first.is_active);
        assert_eq!(first.timer_seconds, 600);
        assert_eq!(first.difficulty, Difficulty::Medium);
        let second = current(&state).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn lifecycle_mutations_follow_the_session_rules() {
        let state = state();
        current(&state).await.unwrap();

        let started = start(&state).await.unwrap();
        assert!(started.is_active);
        assert!(started.timer_started_at.is_some());

        let paused = pause(&state).await.unwrap();
        assert!(!paused.is_active);
        assert!(paused.timer_started_at.is_none());
        assert!(paused.game_ended_at.is_none());

        let ended = end(&state).await.unwrap();
        assert!(ended.game_ended_at.is_some());

        let reset = reset_leaderboard(&state).await.unwrap();
        assert!(reset.game_ended_at.is_none());
        assert!(!reset.is_active);
    }

    #[tokio::test]
    async fn difficulty_and_custom_settings_set_quote_count() {
        let state = state();
        current(&state).await.unwrap();

        let hard = set_difficulty(&state, Difficulty::Hard).await.unwrap();
        assert_eq!(hard.timer_seconds, 300);
        assert_eq!(hard.quote_count, Some(24));

        let custom = set_custom_settings(&state, 6, 4).await.unwrap();
        assert_eq!(custom.difficulty, Difficulty::Medium);
        assert_eq!(custom.timer_seconds, 240);
        assert_eq!(custom.quote_count, Some(6));
    }

    #[tokio::test]
    async fn missing_session_is_a_resolution_failure() {
        let state = state();
        assert!(matches!(
            start(&state).await,
            Err(ServiceError::Resolution(_))
        ));
    }

    #[tokio::test]
    async fn lookup_never_creates_a_session() {
        let state = state();
        assert!(matches!(
            lookup(&state).await,
            Err(ServiceError::Resolution(_))
        ));
        let gateway = state.require_gateway().await.unwrap();
        assert!(gateway.latest_session().await.unwrap().is_none());

        let created = current(&state).await.unwrap();
        assert_eq!(lookup(&state).await.unwrap().id, created.id);
    }

    #[tokio::test(start_paused = true)]
    async fn hint_is_cleared_after_the_delay() {
        let state = state();
        current(&state).await.unwrap();
        send_hint(&state, "Think about sleep").await.unwrap();

        tokio::time::sleep(Duration::from_secs(11)).await;
        let session = current(&state).await.unwrap();
        assert_eq!(session.current_hint, None);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_hint_survives_the_clear_of_the_older_one() {
        let state = state();
        current(&state).await.unwrap();
        send_hint(&state, "first").await.unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;
        send_hint(&state, "second").await.unwrap();

        tokio::time::sleep(Duration::from_secs(6)).await;
        let session = current(&state).await.unwrap();
        assert_eq!(session.current_hint.as_deref(), Some("second"));

        tokio::time::sleep(Duration::from_secs(5)).await;
        let session = current(&state).await.unwrap();
        assert_eq!(session.current_hint, None);
    }

    #[tokio::test]
    async fn saving_an_empty_roster_is_rejected() {
        let state = state();
        current(&state).await.unwrap();
        assert!(matches!(
            save_leaderboard(&state, "Period 2").await,
            Err(ServiceError::InvalidState(_))
        ));
        assert!(matches!(
            save_leaderboard(&state, "   ").await,
            Err(ServiceError::Validation(_))
        ));
    }
}
