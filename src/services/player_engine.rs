//! One hosted player device: join, placement scoring, completion and the
//! reaction to session broadcasts.
//!
//! Local state is authoritative. Every mutation happens under the engine lock
//! and the matching gateway write is issued after the lock is released; a
//! failed write is reported but never rolled back.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use futures::StreamExt;
use indexmap::IndexMap;
use tokio::{sync::Mutex, task::JoinHandle, time::sleep};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{
        gateway::{ChangeFilter, ChangeStream, Collection, Gateway},
        models::{LeaderboardEntity, PlayerEntity, PlayerPatch},
        timestamp::Timestamp,
    },
    dto::{
        player::{
            BoardView, DropResponse, GameStateView, JoinRequest, PlayerStateView, PlayerSummary,
            ReflectionView,
        },
        session::SessionView,
        validation::validate_player_name,
    },
    error::ServiceError,
    services::{leaderboard_service, reflection, sse_events},
    state::{
        SharedState, SseHub,
        board::{DragSession, ItemRef, PuzzleBoard, deal},
        model::{ActivePlayer, Avatar, AvatarKind, CLASSIC_THEME, GameSession, GameState, Phase, Quote},
        player_phase::{PhaseEvent, PlayerPhase, PlayerStateMachine},
        scoring::{score_quote, score_title, time_bonus},
    },
};

/// Player engine hosted on behalf of one device.
pub struct PlayerEngine {
    id: Uuid,
    session_id: Uuid,
    gateway: Arc<dyn Gateway>,
    events: SseHub,
    leaderboard_limit: usize,
    hint_zone_duration: Duration,
    inner: Mutex<EngineInner>,
}

struct EngineInner {
    machine: PlayerStateMachine,
    session: GameSession,
    player: ActivePlayer,
    game: GameState,
    board: PuzzleBoard,
    show_reveal: bool,
    leaderboard: Vec<ActivePlayer>,
    feeds: Vec<JoinHandle<()>>,
    countdown: Option<JoinHandle<()>>,
    hint_zone_clear: Option<JoinHandle<()>>,
}

/// Gateway writes owed after a completion, issued once the lock is released.
struct CompletionWrite {
    player_id: Uuid,
    session_id: Uuid,
    player_name: String,
    score: i32,
    time_ms: u64,
}

/// Bind a device to a player row of the current session and host its engine.
///
/// Rejoining under an existing name resumes that row instead of inserting a
/// second one.
pub async fn join(state: &SharedState, request: JoinRequest) -> Result<Arc<PlayerEngine>, ServiceError> {
    let name = request.player_name.trim().to_owned();
    validate_player_name(&name)
        .map_err(|_| ServiceError::Validation(format!("invalid player name `{name}`")))?;
    let avatar = resolve_avatar(state.config(), request.avatar_type, request.avatar_value)?;

    let gateway = state.require_gateway().await?;
    let session: GameSession = gateway
        .latest_session()
        .await?
        .ok_or_else(|| ServiceError::Resolution("no game session to join".into()))?
        .into();

    let existing = gateway
        .find_player_by_name(session.id, name.clone())
        .await?
        .map(ActivePlayer::from);

    let catalog: Vec<Quote> = gateway
        .list_active_quotes(CLASSIC_THEME.to_owned())
        .await?
        .into_iter()
        .map(Quote::from)
        .collect();
    let no_placements = IndexMap::new();
    let placed = existing
        .as_ref()
        .map_or(&no_placements, |player| &player.placements);
    let quotes = deal(catalog, session.quote_count, placed, &mut rand::rng());
    let mut board = PuzzleBoard::new(quotes, state.config().board_settings());

    let now = Timestamp::now();
    let (player, game) = match existing {
        Some(mut player) => {
            let patch = PlayerPatch {
                avatar_type: Some(avatar.kind()),
                avatar_value: Some(avatar.value().map(str::to_owned)),
                ..PlayerPatch::default()
            };
            gateway.update_player(player.id, patch).await?;
            player.avatar = avatar;
            let restored = board.restore(&player.placements);
            info!(
                session_id = %session.id,
                player = %player.player_name,
                restored,
                completed = player.is_completed,
                "player rejoined"
            );
            let game = GameState::resumed(&player, now);
            (player, game)
        }
        None => {
            let row = gateway
                .insert_player(PlayerEntity::joining(
                    session.id,
                    name,
                    avatar.kind(),
                    avatar.value().map(str::to_owned),
                ))
                .await?;
            info!(session_id = %session.id, player = %row.player_name, "player joined");
            (ActivePlayer::from(row), GameState::started(now))
        }
    };

    let mut machine = PlayerStateMachine::new();
    machine.apply(PhaseEvent::Joined {
        session_active: session.is_active,
    })?;
    // Completion is recorded once per row; a finished player never re-enters play.
    if game.is_completed {
        machine.apply(PhaseEvent::Completed)?;
    }

    let leaderboard = match gateway
        .list_players(session.id, Some(state.config().leaderboard_limit))
        .await
    {
        Ok(rows) => rows.into_iter().map(Into::into).collect(),
        Err(err) => {
            warn!(session_id = %session.id, error = %err, "failed to load leaderboard on join");
            Vec::new()
        }
    };

    let session_id = session.id;
    let engine = Arc::new(PlayerEngine {
        id: Uuid::new_v4(),
        session_id,
        gateway: gateway.clone(),
        events: SseHub::new(64),
        leaderboard_limit: state.config().leaderboard_limit,
        hint_zone_duration: state.config().hint_zone,
        inner: Mutex::new(EngineInner {
            machine,
            session,
            player,
            game,
            board,
            show_reveal: false,
            leaderboard,
            feeds: Vec::new(),
            countdown: None,
            hint_zone_clear: None,
        }),
    });

    let sessions = gateway.subscribe(Collection::GameSessions, ChangeFilter::Id(session_id));
    let players = gateway.subscribe(Collection::ActivePlayers, ChangeFilter::SessionId(session_id));
    {
        let weak = Arc::downgrade(&engine);
        let mut inner = engine.inner.lock().await;
        inner
            .feeds
            .push(tokio::spawn(run_session_feed(weak.clone(), sessions)));
        inner.feeds.push(tokio::spawn(run_players_feed(weak, players)));
        engine.arm_countdown(&mut inner);
    }

    state.engines().insert(engine.id, engine.clone());
    Ok(engine)
}

/// Stop hosting `engine_id`: unsubscribe from the change-feeds and cancel its timers.
pub async fn leave(state: &SharedState, engine_id: Uuid) -> Result<(), ServiceError> {
    let (_, engine) = state
        .engines()
        .remove(&engine_id)
        .ok_or_else(|| ServiceError::NotFound(format!("player engine {engine_id}")))?;
    engine.shutdown().await;
    Ok(())
}

/// Shut down the engine once the grace period elapsed with no device stream open.
///
/// Returns whether the engine was evicted.
pub async fn evict_when_idle(state: &SharedState, engine_id: Uuid) -> bool {
    sleep(state.config().engine_idle_grace).await;
    let Some((_, engine)) = state
        .engines()
        .remove_if(&engine_id, |_, engine| engine.events.subscriber_count() == 0)
    else {
        return false;
    };
    engine.shutdown().await;
    true
}

/// Shut down every engine hosted for `session_id`, returning how many stopped.
pub async fn shutdown_session(state: &SharedState, session_id: Uuid) -> usize {
    let ids: Vec<Uuid> = state
        .engines()
        .iter()
        .filter(|entry| entry.value().session_id == session_id)
        .map(|entry| *entry.key())
        .collect();
    let mut stopped = 0;
    for id in ids {
        if let Some((_, engine)) = state.engines().remove(&id) {
            engine.shutdown().await;
            stopped += 1;
        }
    }
    stopped
}

fn resolve_avatar(
    config: &AppConfig,
    kind: Option<AvatarKind>,
    value: Option<String>,
) -> Result<Avatar, ServiceError> {
    let value = value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
    match (kind.unwrap_or(AvatarKind::Initial), value) {
        (AvatarKind::Initial, _) => Ok(Avatar::Initial),
        (AvatarKind::Preset, Some(id)) if config.is_preset_avatar(&id) => Ok(Avatar::Preset(id)),
        (AvatarKind::Preset, id) => Err(ServiceError::Validation(format!(
            "unknown preset avatar `{}`",
            id.unwrap_or_default()
        ))),
        (AvatarKind::Custom, Some(url)) => Ok(Avatar::Custom(url)),
        (AvatarKind::Custom, None) => Err(ServiceError::Validation(
            "custom avatar requires an image URL".into(),
        )),
    }
}

impl PlayerEngine {
    /// Identifier handed to the device by `/play/join`.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Session this engine was joined to.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Notifications for this device.
    pub fn events(&self) -> &SseHub {
        &self.events
    }

    /// Current phase of the device.
    pub async fn phase(&self) -> PlayerPhase {
        self.inner.lock().await.machine.phase()
    }

    /// Snapshot of everything the device renders.
    pub async fn view(&self) -> PlayerStateView {
        let inner = self.inner.lock().await;
        let now = tokio::time::Instant::now().into_std();
        PlayerStateView {
            engine_id: self.id,
            phase: inner.machine.phase(),
            phase_version: inner.machine.version(),
            show_leaderboard_reveal: inner.show_reveal,
            player: PlayerSummary::from(&inner.player),
            session: SessionView::from(&inner.session),
            game: GameStateView::from(&inner.game),
            board: BoardView::new(&inner.board, inner.board.hint_zone(now)),
        }
    }

    /// Drop a card on `target`, score it and persist the player row.
    ///
    /// Quotes earn the streak bonus, titles a flat amount. Wrong drops are
    /// recorded in the placements too.
    pub async fn drop_item(
        self: &Arc<Self>,
        item: ItemRef,
        target: Phase,
    ) -> Result<DropResponse, ServiceError> {
        let (response, player_id, patch, completion) = {
            let mut inner = self.inner.lock().await;
            let inner = &mut *inner;
            if !inner.machine.phase().accepts_drops() {
                return Err(ServiceError::InvalidState(format!(
                    "drops are not accepted while {:?}",
                    inner.machine.phase()
                )));
            }

            let now = tokio::time::Instant::now().into_std();
            let had_zone = inner.board.hint_zone(now).is_some();
            let outcome = inner
                .board
                .attempt_drop(DragSession::pick_up(item.clone()), target, now)?;

            let multiplier = inner.session.multiplier();
            let scored = match &item {
                ItemRef::Quote(_) => score_quote(&mut inner.game, outcome.correct, multiplier),
                ItemRef::Title(_) => score_title(&mut inner.game, outcome.correct, multiplier),
            };
            match &item {
                ItemRef::Quote(_) => inner.game.placements.insert(item.key(), target),
                ItemRef::Title(_) => inner.game.title_placements.insert(item.key(), target),
            };
            debug!(
                player = %inner.player.player_name,
                item = %item.key(),
                %target,
                correct = outcome.correct,
                delta = scored.delta,
                score = inner.game.score,
                "placement scored"
            );

            let placements = inner.game.persisted_placements();
            inner.player.score = inner.game.score;
            inner.player.streak = inner.game.streak;
            inner.player.wrong_attempts = inner.game.wrong_attempts;
            inner.player.placements = placements.clone();
            let patch = PlayerPatch {
                score: Some(inner.game.score),
                streak: Some(inner.game.streak),
                wrong_attempts: Some(inner.game.wrong_attempts),
                placements: Some(placements),
                ..PlayerPatch::default()
            };

            match outcome.hint_zone {
                Some(phase) => self.highlight_zone(inner, phase),
                None if had_zone => {
                    if let Some(pending) = inner.hint_zone_clear.take() {
                        pending.abort();
                    }
                    sse_events::notify_hint_zone(&self.events, None);
                }
                None => {}
            }

            let completion = if outcome.completed {
                let remaining = inner.session.remaining_seconds(Timestamp::now());
                self.begin_completion(inner, remaining)
            } else {
                None
            };

            let response = DropResponse {
                correct: outcome.correct,
                delta: scored.delta,
                score: inner.game.score,
                streak: inner.game.streak,
                streak_bonus: scored.streak_bonus,
                combo: scored.combo,
                item_misses: outcome.item_misses,
                hint_zone: outcome.hint_zone,
                completed: outcome.completed,
            };
            sse_events::notify_score(&self.events, &response);
            (response, inner.player.id, patch, completion)
        };

        if let Err(err) = self.gateway.update_player(player_id, patch).await {
            self.report("update_player", err.into());
        }
        if let Some(write) = completion {
            self.persist_completion(write).await;
        }
        Ok(response)
    }

    /// Move a placed card back to its pool. The score is not reverted.
    pub async fn remove_item(&self, item: ItemRef, from: Phase) -> Result<(), ServiceError> {
        let mut inner = self.inner.lock().await;
        if !inner.machine.phase().accepts_drops() {
            return Err(ServiceError::InvalidState(format!(
                "cards cannot be moved while {:?}",
                inner.machine.phase()
            )));
        }
        inner.board.remove_item(&item, from)?;
        Ok(())
    }

    /// Finish the puzzle once; later calls are no-ops returning `false`.
    ///
    /// A positive `remaining` grants a tenth of it as time bonus.
    pub async fn complete_game(self: &Arc<Self>, remaining: Option<u64>) -> bool {
        let write = {
            let mut inner = self.inner.lock().await;
            self.begin_completion(&mut inner, remaining)
        };
        match write {
            Some(write) => {
                self.persist_completion(write).await;
                true
            }
            None => false,
        }
    }

    /// The countdown ran out: complete without bonus and show the reveal.
    pub async fn handle_time_up(self: &Arc<Self>) -> bool {
        let write = {
            let mut inner = self.inner.lock().await;
            if inner.game.is_completed {
                return false;
            }
            inner.show_reveal = true;
            self.begin_completion(&mut inner, None)
        };
        if let Some(write) = write {
            self.persist_completion(write).await;
        }
        self.reveal().await;
        true
    }

    /// Top players of the session, refreshed from the gateway.
    pub async fn leaderboard(&self) -> Result<Vec<ActivePlayer>, ServiceError> {
        let session_id = self.inner.lock().await.session.id;
        let rows = self
            .gateway
            .list_players(session_id, Some(self.leaderboard_limit))
            .await
            .map_err(|err| self.report("leaderboard", err.into()))?;
        let players: Vec<ActivePlayer> = rows.into_iter().map(Into::into).collect();
        self.inner.lock().await.leaderboard = players.clone();
        Ok(players)
    }

    /// Reflection prompts, focused on the phase this player missed most.
    pub async fn reflection(&self) -> Result<ReflectionView, ServiceError> {
        let inner = self.inner.lock().await;
        if !inner.game.is_completed {
            return Err(ServiceError::InvalidState(
                "reflection is available once the puzzle is completed".into(),
            ));
        }
        let picked = reflection::reflect(inner.board.most_missed_phase(), &mut rand::rng());
        Ok(ReflectionView {
            player_name: inner.player.player_name.clone(),
            score: inner.game.score,
            streak: inner.game.streak,
            wrong_attempts: inner.game.wrong_attempts,
            focus_phase: picked.phase,
            focus_title: picked.phase.title().to_owned(),
            from_misses: picked.from_misses,
            phase_prompt: picked.phase_prompt.to_owned(),
            general_prompt: picked.general_prompt.to_owned(),
        })
    }

    /// Refetch the session row and react to what changed.
    pub async fn refresh_session(self: &Arc<Self>) {
        let session_id = self.inner.lock().await.session.id;
        match self.gateway.find_session(session_id).await {
            Ok(Some(row)) => self.observe_session(row.into()).await,
            Ok(None) => debug!(%session_id, "session row disappeared"),
            Err(err) => {
                self.report("refresh_session", err.into());
            }
        }
    }

    /// Apply a fresh session snapshot; notifications are edge-triggered.
    async fn observe_session(self: &Arc<Self>, next: GameSession) {
        let (write, ended) = {
            let mut inner = self.inner.lock().await;
            let inner = &mut *inner;
            let previous = std::mem::replace(&mut inner.session, next);
            let current = &inner.session;

            if let Some(text) = &current.current_hint {
                if previous.current_hint.as_ref() != Some(text) {
                    sse_events::notify_hint(&self.events, text);
                }
            }
            if current.double_points_active && !previous.double_points_active {
                sse_events::notify_double_points(&self.events);
            }
            if current.is_active != previous.is_active {
                sse_events::notify_session_activity(&self.events, current);
            }
            if let Err(err) = inner.machine.apply(PhaseEvent::SessionObserved {
                active: current.is_active,
            }) {
                debug!(error = %err, "session observation ignored");
            }

            let ended = current.has_ended() && !previous.has_ended();
            let write = if ended {
                inner.show_reveal = true;
                self.begin_completion(inner, None)
            } else {
                None
            };
            self.arm_countdown(inner);
            (write, ended)
        };

        if let Some(write) = write {
            self.persist_completion(write).await;
        }
        if ended {
            self.reveal().await;
        }
    }

    /// Refresh the leaderboard and push it to the device.
    async fn refresh_leaderboard(&self) {
        if let Ok(players) = self.leaderboard().await {
            sse_events::notify_leaderboard(&self.events, &players);
        }
    }

    /// Move to the reveal and push the final standings.
    async fn reveal(&self) {
        {
            let mut inner = self.inner.lock().await;
            inner.show_reveal = true;
            if let Err(err) = inner.machine.apply(PhaseEvent::Revealed) {
                debug!(error = %err, "reveal ignored");
            }
        }
        let players = match self.leaderboard().await {
            Ok(players) => players,
            Err(_) => self.inner.lock().await.leaderboard.clone(),
        };
        sse_events::notify_reveal(&self.events, leaderboard_service::reveal_view(&players));
    }

    fn begin_completion(&self, inner: &mut EngineInner, remaining: Option<u64>) -> Option<CompletionWrite> {
        if inner.game.is_completed {
            return None;
        }
        let now = Timestamp::now();
        let elapsed = inner
            .game
            .start_time
            .map(|start| now.saturating_since(start))
            .unwrap_or_default();
        let bonus = time_bonus(remaining);

        let game = &mut inner.game;
        game.base_score = game.score;
        game.time_bonus = bonus;
        game.score += bonus;
        game.is_completed = true;
        game.end_time = Some(now);
        game.elapsed_time = elapsed.as_secs();

        inner.player.is_completed = true;
        inner.player.score = inner.game.score;
        if let Err(err) = inner.machine.apply(PhaseEvent::Completed) {
            debug!(error = %err, "completion transition ignored");
        }
        if let Some(countdown) = inner.countdown.take() {
            countdown.abort();
        }

        info!(
            player = %inner.player.player_name,
            score = inner.game.score,
            time_bonus = bonus,
            "puzzle completed"
        );
        sse_events::notify_completed(&self.events, &inner.game);

        Some(CompletionWrite {
            player_id: inner.player.id,
            session_id: inner.session.id,
            player_name: inner.player.player_name.clone(),
            score: inner.game.score,
            time_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        })
    }

    async fn persist_completion(&self, write: CompletionWrite) {
        let patch = PlayerPatch {
            is_completed: Some(true),
            score: Some(write.score),
            ..PlayerPatch::default()
        };
        if let Err(err) = self.gateway.update_player(write.player_id, patch).await {
            self.report("complete_player", err.into());
        }
        let entry = LeaderboardEntity::completion(
            write.session_id,
            write.player_name,
            write.score,
            write.time_ms,
        );
        if let Err(err) = self.gateway.insert_leaderboard_entry(entry).await {
            self.report("insert_leaderboard_entry", err.into());
        }
    }

    /// (Re)arm the countdown for a running, unfinished round.
    fn arm_countdown(self: &Arc<Self>, inner: &mut EngineInner) {
        if let Some(previous) = inner.countdown.take() {
            previous.abort();
        }
        if inner.game.is_completed || !inner.session.is_active {
            return;
        }
        let Some(remaining) = inner.session.remaining_at(Timestamp::now()) else {
            return;
        };
        let engine = Arc::downgrade(self);
        inner.countdown = Some(tokio::spawn(async move {
            sleep(remaining).await;
            // Completion runs on its own task: it cancels this countdown.
            if let Some(engine) = engine.upgrade() {
                tokio::spawn(async move {
                    engine.handle_time_up().await;
                });
            }
        }));
    }

    fn highlight_zone(self: &Arc<Self>, inner: &mut EngineInner, phase: Phase) {
        if let Some(previous) = inner.hint_zone_clear.take() {
            previous.abort();
        }
        sse_events::notify_hint_zone(&self.events, Some(phase));
        let engine = Arc::downgrade(self);
        let duration = self.hint_zone_duration;
        inner.hint_zone_clear = Some(tokio::spawn(async move {
            sleep(duration).await;
            if let Some(engine) = engine.upgrade() {
                sse_events::notify_hint_zone(&engine.events, None);
            }
        }));
    }

    fn report(&self, operation: &str, err: ServiceError) -> ServiceError {
        warn!(engine_id = %self.id, operation, error = %err, "player gateway call failed");
        sse_events::notify_failure(&self.events, operation, &err);
        err
    }

    async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        inner.abort_tasks();
        info!(engine_id = %self.id, player = %inner.player.player_name, "player left");
    }
}

impl EngineInner {
    fn abort_tasks(&mut self) {
        for feed in self.feeds.drain(..) {
            feed.abort();
        }
        for task in [self.countdown.take(), self.hint_zone_clear.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
    }
}

impl Drop for PlayerEngine {
    fn drop(&mut self) {
        self.inner.get_mut().abort_tasks();
    }
}

async fn run_session_feed(engine: Weak<PlayerEngine>, mut changes: ChangeStream) {
    while changes.next().await.is_some() {
        let Some(engine) = engine.upgrade() else {
            break;
        };
        engine.refresh_session().await;
    }
}

async fn run_players_feed(engine: Weak<PlayerEngine>, mut changes: ChangeStream) {
    while changes.next().await.is_some() {
        let Some(engine) = engine.upgrade() else {
            break;
        };
        engine.refresh_leaderboard().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avatars_are_checked_against_presets() {
        let config = AppConfig::default();
        assert_eq!(resolve_avatar(&config, None, None).unwrap(), Avatar::Initial);
        assert_eq!(
            resolve_avatar(&config, Some(AvatarKind::Preset), Some("owl".into())).unwrap(),
            Avatar::Preset("owl".into())
        );
        assert!(matches!(
            resolve_avatar(&config, Some(AvatarKind::Preset), Some("kraken".into())),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            resolve_avatar(&config, Some(AvatarKind::Custom), Some("  ".into())),
            Err(ServiceError::Validation(_))
        ));
    }
}
