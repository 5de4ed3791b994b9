use std::{sync::Arc, time::Duration};

use tokio::time::sleep;
use uuid::Uuid;

use phase_puzzle_back::{
    config::AppConfig,
    dao::{
        gateway::Gateway, memory::MemoryGateway, models::QuoteEntity,
        object_store::MemoryObjectStore, timestamp::Timestamp,
    },
    dto::{player::JoinRequest, session::QuoteView},
    error::ServiceError,
    services::{
        player_engine::{self, PlayerEngine},
        session_controller,
        sse_events::EVENT_GATEWAY_FAILURE,
        sse_service::{self, StreamKind},
    },
    state::{
        AppState, SharedState,
        board::ItemRef,
        model::{CLASSIC_THEME, PHASE_TITLES, Phase},
        player_phase::PlayerPhase,
    },
};

/// Two quotes per phase.
fn catalog() -> Vec<QuoteEntity> {
    Phase::ALL
        .iter()
        .flat_map(|phase| {
            (0..2).map(move |n| QuoteEntity {
                id: Uuid::new_v4(),
                theme: CLASSIC_THEME.into(),
                phase: *phase,
                text: format!("{phase} quote {n}"),
                author: "Anon".into(),
                is_active: true,
                created_at: Timestamp::now(),
            })
        })
        .collect()
}

fn setup() -> (SharedState, MemoryGateway) {
    let memory = MemoryGateway::with_catalog(catalog());
    let state = AppState::with_gateway(
        AppConfig::default(),
        Arc::new(memory.clone()),
        Arc::new(MemoryObjectStore::new("http://localhost:8080")),
    );
    (state, memory)
}

async fn join(state: &SharedState, name: &str) -> Arc<PlayerEngine> {
    player_engine::join(
        state,
        JoinRequest {
            player_name: name.into(),
            avatar_type: None,
            avatar_value: None,
        },
    )
    .await
    .unwrap()
}

async fn open_quotes(engine: &PlayerEngine) -> Vec<QuoteView> {
    engine.view().await.board.available_quotes
}

fn wrong_phase(phase: Phase) -> Phase {
    match phase {
        Phase::Preparation => Phase::Verification,
        _ => Phase::Preparation,
    }
}

async fn wait_for_phase(engine: &PlayerEngine, expected: PlayerPhase) {
    for _ in 0..500 {
        if engine.phase().await == expected {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("engine never reached {expected:?}");
}

async fn leaderboard_len(memory: &MemoryGateway, session_id: Uuid) -> usize {
    memory.list_leaderboard(session_id).await.unwrap().len()
}

/// Place every remaining card on its correct zone.
async fn solve(engine: &Arc<PlayerEngine>) -> bool {
    let mut completed = false;
    for quote in open_quotes(engine).await {
        completed = engine
            .drop_item(ItemRef::Quote(quote.id), quote.phase)
            .await
            .unwrap()
            .completed;
    }
    for title in engine.view().await.board.available_titles {
        completed = engine
            .drop_item(ItemRef::Title(title.id), title.phase)
            .await
            .unwrap()
            .completed;
    }
    completed
}

#[tokio::test]
async fn join_without_a_session_is_unresolved() {
    let (state, _memory) = setup();
    let result = player_engine::join(
        &state,
        JoinRequest {
            player_name: "ada".into(),
            avatar_type: None,
            avatar_value: None,
        },
    )
    .await;
    assert!(matches!(result, Err(ServiceError::Resolution(_))));
}

#[tokio::test]
async fn players_wait_until_the_facilitator_starts() {
    let (state, _memory) = setup();
    session_controller::current(&state).await.unwrap();
    let engine = join(&state, "ada").await;
    assert_eq!(engine.phase().await, PlayerPhase::Waiting);

    let quote = open_quotes(&engine).await.remove(0);
    assert!(matches!(
        engine.drop_item(ItemRef::Quote(quote.id), quote.phase).await,
        Err(ServiceError::InvalidState(_))
    ));

    session_controller::start(&state).await.unwrap();
    wait_for_phase(&engine, PlayerPhase::Playing).await;
    let response = engine
        .drop_item(ItemRef::Quote(quote.id), quote.phase)
        .await
        .unwrap();
    assert!(response.correct);
    assert_eq!(response.score, 10);
}

#[tokio::test]
async fn rejoining_resumes_the_same_row() {
    let (state, memory) = setup();
    let session = session_controller::current(&state).await.unwrap();
    session_controller::start(&state).await.unwrap();

    let first = join(&state, "ada").await;
    let quote = open_quotes(&first).await.remove(0);
    first
        .drop_item(ItemRef::Quote(quote.id), quote.phase)
        .await
        .unwrap();
    player_engine::leave(&state, first.id()).await.unwrap();
    assert!(matches!(
        state.engine(first.id()),
        Err(ServiceError::NotFound(_))
    ));

    let second = join(&state, " ada ").await;
    let view = second.view().await;
    assert_eq!(view.game.score, 10);
    assert_eq!(view.board.placed_count, 1);
    assert_eq!(view.phase, PlayerPhase::Playing);

    let rows = memory.list_players(session.id, None).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].player_name, "ada");
}

#[tokio::test]
async fn rejoining_under_a_short_deal_keeps_placed_cards() {
    let (state, _memory) = setup();
    session_controller::current(&state).await.unwrap();
    session_controller::set_custom_settings(&state, 4, 10)
        .await
        .unwrap();
    session_controller::start(&state).await.unwrap();

    let first = join(&state, "ada").await;
    for quote in open_quotes(&first).await.into_iter().take(3) {
        first
            .drop_item(ItemRef::Quote(quote.id), quote.phase)
            .await
            .unwrap();
    }
    assert_eq!(first.view().await.game.score, 35);
    player_engine::leave(&state, first.id()).await.unwrap();

    // Every rejoin reshuffles the eight-quote catalog.
    for _ in 0..5 {
        let again = join(&state, "ada").await;
        let view = again.view().await;
        assert_eq!(view.board.placed_count, 3);
        assert_eq!(view.board.available_quotes.len(), 1);
        assert_eq!(view.game.score, 35);
        player_engine::leave(&state, again.id()).await.unwrap();
    }
}

#[tokio::test]
async fn rejoining_after_completion_never_scores_twice() {
    let (state, memory) = setup();
    let session = session_controller::current(&state).await.unwrap();
    session_controller::set_custom_settings(&state, 2, 10)
        .await
        .unwrap();
    session_controller::start(&state).await.unwrap();

    let first = join(&state, "ada").await;
    assert!(solve(&first).await);
    let score = first.view().await.game.score;
    player_engine::leave(&state, first.id()).await.unwrap();

    let second = join(&state, "ada").await;
    let view = second.view().await;
    assert_eq!(view.phase, PlayerPhase::Completed);
    assert_eq!(view.phase_version, 2);
    assert!(view.game.is_completed);
    assert_eq!(view.game.score, score);
    assert!(!second.handle_time_up().await);

    session_controller::end(&state).await.unwrap();
    wait_for_phase(&second, PlayerPhase::Revealed).await;
    assert_eq!(leaderboard_len(&memory, session.id).await, 1);
}

#[tokio::test(start_paused = true)]
async fn closed_device_streams_evict_the_engine_after_the_grace_period() {
    let (state, _memory) = setup();
    session_controller::current(&state).await.unwrap();
    let engine = join(&state, "ida").await;
    let engine_id = engine.id();
    drop(engine);

    let receiver = state.engine(engine_id).unwrap().events().subscribe();
    let stream = sse_service::to_sse_stream(
        receiver,
        StreamKind::Player {
            state: state.clone(),
            engine_id,
        },
    );
    sleep(Duration::from_secs(60)).await;
    assert!(state.engine(engine_id).is_ok(), "an open stream keeps the engine");

    drop(stream);
    sleep(Duration::from_secs(10)).await;
    assert!(state.engine(engine_id).is_ok(), "still within the grace period");
    sleep(Duration::from_secs(25)).await;
    assert!(matches!(
        state.engine(engine_id),
        Err(ServiceError::NotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn a_reattached_stream_cancels_the_eviction() {
    let (state, _memory) = setup();
    session_controller::current(&state).await.unwrap();
    let engine = join(&state, "jo").await;

    let reattached = engine.events().subscribe();
    assert!(!player_engine::evict_when_idle(&state, engine.id()).await);
    assert!(state.engine(engine.id()).is_ok());

    drop(reattached);
    assert!(player_engine::evict_when_idle(&state, engine.id()).await);
    assert!(state.engine(engine.id()).is_err());
}

#[tokio::test]
async fn streaks_and_penalties_follow_the_point_rules() {
    let (state, _memory) = setup();
    session_controller::current(&state).await.unwrap();
    session_controller::start(&state).await.unwrap();
    let engine = join(&state, "bo").await;

    let quotes = open_quotes(&engine).await;
    let wrong = &quotes[0];
    let first = engine
        .drop_item(ItemRef::Quote(wrong.id), wrong_phase(wrong.phase))
        .await
        .unwrap();
    assert!(!first.correct);
    assert_eq!(first.score, 0, "score never drops below zero");

    let mut last = None;
    for quote in &quotes[..3] {
        last = Some(
            engine
                .drop_item(ItemRef::Quote(quote.id), quote.phase)
                .await
                .unwrap(),
        );
    }
    let third = last.unwrap();
    assert_eq!(third.streak, 3);
    assert_eq!(third.streak_bonus, 5);
    assert!(third.combo);
    assert_eq!(third.score, 35);

    let view = engine.view().await;
    assert_eq!(view.game.wrong_attempts, 1);
    assert_eq!(view.player.score, 35);
}

#[tokio::test]
async fn double_points_doubles_title_placements() {
    let (state, _memory) = setup();
    session_controller::current(&state).await.unwrap();
    session_controller::start(&state).await.unwrap();
    let engine = join(&state, "cy").await;

    let quote = open_quotes(&engine).await.remove(0);
    engine
        .drop_item(ItemRef::Quote(quote.id), quote.phase)
        .await
        .unwrap();

    session_controller::toggle_double_points(&state)
        .await
        .unwrap();
    for _ in 0..500 {
        if engine.view().await.session.double_points_active {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }

    let title = PHASE_TITLES[0];
    let response = engine
        .drop_item(ItemRef::Title(title.id.to_owned()), title.phase)
        .await
        .unwrap();
    assert_eq!(response.delta, 20);
    assert_eq!(response.score, 30);
}

#[tokio::test(start_paused = true)]
async fn repeated_misses_highlight_the_zone_for_a_while() {
    let (state, _memory) = setup();
    session_controller::current(&state).await.unwrap();
    session_controller::start(&state).await.unwrap();
    let engine = join(&state, "di").await;

    let quote = open_quotes(&engine).await.remove(0);
    let item = ItemRef::Quote(quote.id);
    let first = engine
        .drop_item(item.clone(), wrong_phase(quote.phase))
        .await
        .unwrap();
    assert_eq!(first.hint_zone, None);
    let second = engine
        .drop_item(item, wrong_phase(quote.phase))
        .await
        .unwrap();
    assert_eq!(second.item_misses, 2);
    assert_eq!(second.hint_zone, Some(quote.phase));
    assert_eq!(engine.view().await.board.hint_zone, Some(quote.phase));

    sleep(Duration::from_millis(3_100)).await;
    assert_eq!(engine.view().await.board.hint_zone, None);
}

#[tokio::test]
async fn custom_quote_count_limits_the_board_and_completion_scores_once() {
    let (state, memory) = setup();
    let session = session_controller::current(&state).await.unwrap();
    session_controller::set_custom_settings(&state, 4, 10)
        .await
        .unwrap();
    session_controller::start(&state).await.unwrap();

    let engine = join(&state, "eve").await;
    let view = engine.view().await;
    assert_eq!(view.board.available_quotes.len(), 4);
    assert_eq!(view.board.total_items, 8);

    assert!(solve(&engine).await);
    let view = engine.view().await;
    assert_eq!(view.phase, PlayerPhase::Completed);
    assert!(view.game.is_completed);
    assert!(view.game.time_bonus > 0, "a running timer grants a bonus");
    assert_eq!(view.game.score, view.game.base_score + view.game.time_bonus);
    assert_eq!(leaderboard_len(&memory, session.id).await, 1);

    assert!(!engine.complete_game(Some(100)).await);
    session_controller::end(&state).await.unwrap();
    wait_for_phase(&engine, PlayerPhase::Revealed).await;
    assert_eq!(leaderboard_len(&memory, session.id).await, 1);

    let row = memory
        .find_player_by_name(session.id, "eve".into())
        .await
        .unwrap()
        .unwrap();
    assert!(row.is_completed);
    assert_eq!(row.score, view.game.score);
}

#[tokio::test]
async fn ending_the_session_completes_every_engine_once() {
    let (state, memory) = setup();
    let session = session_controller::current(&state).await.unwrap();
    session_controller::start(&state).await.unwrap();
    let ada = join(&state, "ada").await;
    let bo = join(&state, "bo").await;

    session_controller::end(&state).await.unwrap();
    wait_for_phase(&ada, PlayerPhase::Revealed).await;
    wait_for_phase(&bo, PlayerPhase::Revealed).await;
    assert!(ada.view().await.show_leaderboard_reveal);
    assert_eq!(ada.view().await.game.time_bonus, 0);

    // Later session changes must not complete anyone again.
    session_controller::toggle_double_points(&state)
        .await
        .unwrap();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(leaderboard_len(&memory, session.id).await, 2);

    let quote = open_quotes(&ada).await.remove(0);
    assert!(matches!(
        ada.drop_item(ItemRef::Quote(quote.id), quote.phase).await,
        Err(ServiceError::InvalidState(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn countdown_expiry_completes_without_bonus() {
    let (state, memory) = setup();
    let session = session_controller::current(&state).await.unwrap();
    session_controller::set_timer(&state, 60).await.unwrap();
    session_controller::start(&state).await.unwrap();
    let engine = join(&state, "fay").await;
    assert_eq!(engine.phase().await, PlayerPhase::Playing);

    sleep(Duration::from_secs(61)).await;
    wait_for_phase(&engine, PlayerPhase::Revealed).await;
    let view = engine.view().await;
    assert!(view.game.is_completed);
    assert_eq!(view.game.time_bonus, 0);
    assert!(!engine.handle_time_up().await);
    assert_eq!(leaderboard_len(&memory, session.id).await, 1);
}

#[tokio::test]
async fn reflection_is_offered_after_completion() {
    let (state, _memory) = setup();
    session_controller::current(&state).await.unwrap();
    session_controller::start(&state).await.unwrap();
    let engine = join(&state, "gus").await;
    assert!(matches!(
        engine.reflection().await,
        Err(ServiceError::InvalidState(_))
    ));

    let quote = open_quotes(&engine).await.remove(0);
    engine
        .drop_item(ItemRef::Quote(quote.id), wrong_phase(quote.phase))
        .await
        .unwrap();
    assert!(engine.handle_time_up().await);

    let reflection = engine.reflection().await.unwrap();
    assert!(reflection.from_misses);
    assert_eq!(reflection.focus_phase, quote.phase);
    assert!(!reflection.phase_prompt.is_empty());
}

#[tokio::test]
async fn saving_archives_the_roster_and_resets_the_session() {
    let (state, memory) = setup();
    let session = session_controller::current(&state).await.unwrap();
    session_controller::start(&state).await.unwrap();
    let ada = join(&state, "ada").await;
    let _bo = join(&state, "bo").await;
    let quote = open_quotes(&ada).await.remove(0);
    ada.drop_item(ItemRef::Quote(quote.id), quote.phase)
        .await
        .unwrap();

    let saved = session_controller::save_leaderboard(&state, "Period 3")
        .await
        .unwrap();
    assert_eq!(saved.game_name, "Period 3");
    assert_eq!(saved.winner_name.as_deref(), Some("ada"));
    assert_eq!(saved.players.len(), 2);

    assert!(session_controller::roster(&state).await.unwrap().is_empty());
    let reset = session_controller::current(&state).await.unwrap();
    assert_eq!(reset.id, session.id);
    assert!(!reset.is_active);
    assert!(reset.game_ended_at.is_none());
    assert_eq!(
        session_controller::saved_leaderboards(&state)
            .await
            .unwrap()
            .len(),
        1
    );
    assert_eq!(memory.list_players(session.id, None).await.unwrap().len(), 0);
    assert!(state.engines().is_empty(), "cleared players stop their engines");
}

#[tokio::test]
async fn gateway_failures_keep_local_state_and_notify_the_device() {
    let (state, memory) = setup();
    session_controller::current(&state).await.unwrap();
    session_controller::start(&state).await.unwrap();
    let engine = join(&state, "hal").await;
    let mut events = engine.events().subscribe();

    memory.set_online(false);
    let quote = open_quotes(&engine).await.remove(0);
    let response = engine
        .drop_item(ItemRef::Quote(quote.id), quote.phase)
        .await
        .unwrap();
    assert_eq!(response.score, 10);
    assert_eq!(engine.view().await.game.score, 10);

    let mut saw_failure = false;
    while let Ok(event) = events.try_recv() {
        if event.event.as_deref() == Some(EVENT_GATEWAY_FAILURE) {
            saw_failure = true;
        }
    }
    assert!(saw_failure);
}
