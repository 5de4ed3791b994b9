use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use futures::{StreamExt, future, future::BoxFuture};
use indexmap::IndexMap;
use serde::Serialize;
use tokio::sync::{RwLock, broadcast};
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};
use tracing::warn;
use uuid::Uuid;

use crate::dao::{
    gateway::{ChangeEvent, ChangeFilter, ChangeKind, ChangeStream, Collection, Gateway},
    models::{
        LeaderboardEntity, PlayerEntity, PlayerPatch, QuoteEntity, SavedLeaderboardEntity,
        SessionEntity, SessionPatch,
    },
    storage::{StorageError, StorageResult},
};

use super::{MemoryStoreError, seed::classic_catalog};

const CHANGE_FEED_CAPACITY: usize = 256;

#[derive(Default)]
struct Tables {
    sessions: IndexMap<Uuid, SessionEntity>,
    players: IndexMap<Uuid, PlayerEntity>,
    quotes: IndexMap<Uuid, QuoteEntity>,
    leaderboard: Vec<LeaderboardEntity>,
    saved_leaderboards: Vec<SavedLeaderboardEntity>,
}

struct Inner {
    tables: RwLock<Tables>,
    changes: broadcast::Sender<ChangeEvent>,
    online: AtomicBool,
}

/// Process-local gateway backed by in-memory tables and a broadcast change-feed.
#[derive(Clone)]
pub struct MemoryGateway {
    inner: Arc<Inner>,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::with_catalog(Vec::new())
    }
}

impl MemoryGateway {
    /// Empty store holding the provided quote catalog.
    pub fn with_catalog(quotes: Vec<QuoteEntity>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        let tables = Tables {
            quotes: quotes.into_iter().map(|quote| (quote.id, quote)).collect(),
            ..Tables::default()
        };
        Self {
            inner: Arc::new(Inner {
                tables: RwLock::new(tables),
                changes,
                online: AtomicBool::new(true),
            }),
        }
    }

    /// Store seeded with the built-in classic catalog.
    pub fn seeded() -> Self {
        Self::with_catalog(classic_catalog())
    }

    /// Toggle availability; while offline every call fails with `Unavailable`.
    pub fn set_online(&self, online: bool) {
        self.inner.online.store(online, Ordering::SeqCst);
    }

    /// Add or replace a catalog row.
    pub async fn upsert_quote(&self, quote: QuoteEntity) {
        let id = quote.id;
        let mut tables = self.inner.tables.write().await;
        let kind = if tables.quotes.insert(id, quote.clone()).is_some() {
            ChangeKind::Update
        } else {
            ChangeKind::Insert
        };
        drop(tables);
        self.publish(Collection::CustomQuotes, kind, Some(id), None, Some(&quote));
    }

    fn ensure_online(&self) -> StorageResult<()> {
        if self.inner.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(MemoryStoreError::Offline.into())
        }
    }

    fn publish<T: Serialize>(
        &self,
        collection: Collection,
        kind: ChangeKind,
        row_id: Option<Uuid>,
        session_id: Option<Uuid>,
        row: Option<&T>,
    ) {
        let event = ChangeEvent {
            collection,
            kind,
            row_id,
            session_id,
            new_row: row.and_then(|row| serde_json::to_value(row).ok()),
        };
        // No receivers is not an error: nobody is listening yet.
        let _ = self.inner.changes.send(event);
    }
}

impl Gateway for MemoryGateway {
    fn latest_session(&self) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let tables = store.inner.tables.read().await;
            Ok(tables
                .sessions
                .values()
                .max_by_key(|session| session.created_at)
                .cloned())
        })
    }

    fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let tables = store.inner.tables.read().await;
            Ok(tables.sessions.get(&id).cloned())
        })
    }

    fn insert_session(
        &self,
        session: SessionEntity,
    ) -> BoxFuture<'static, StorageResult<SessionEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let mut tables = store.inner.tables.write().await;
            if tables.sessions.contains_key(&session.id) {
                return Err(StorageError::rejected(
                    Collection::GameSessions.table(),
                    format!("duplicate id {}", session.id),
                ));
            }
            tables.sessions.insert(session.id, session.clone());
            drop(tables);
            store.publish(
                Collection::GameSessions,
                ChangeKind::Insert,
                Some(session.id),
                None,
                Some(&session),
            );
            Ok(session)
        })
    }

    fn update_session(
        &self,
        id: Uuid,
        patch: SessionPatch,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let mut tables = store.inner.tables.write().await;
            let Some(session) = tables.sessions.get_mut(&id) else {
                return Err(StorageError::rejected(
                    Collection::GameSessions.table(),
                    format!("no session {id}"),
                ));
            };
            session.apply(&patch);
            let updated = session.clone();
            drop(tables);
            store.publish(
                Collection::GameSessions,
                ChangeKind::Update,
                Some(id),
                None,
                Some(&updated),
            );
            Ok(())
        })
    }

    fn list_players(
        &self,
        session_id: Uuid,
        limit: Option<usize>,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let tables = store.inner.tables.read().await;
            let mut players: Vec<PlayerEntity> = tables
                .players
                .values()
                .filter(|player| player.session_id == session_id)
                .cloned()
                .collect();
            players.sort_by(|a, b| b.score.cmp(&a.score));
            if let Some(limit) = limit {
                players.truncate(limit);
            }
            Ok(players)
        })
    }

    fn find_player_by_name(
        &self,
        session_id: Uuid,
        player_name: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let tables = store.inner.tables.read().await;
            Ok(tables
                .players
                .values()
                .find(|player| player.session_id == session_id && player.player_name == player_name)
                .cloned())
        })
    }

    fn insert_player(
        &self,
        player: PlayerEntity,
    ) -> BoxFuture<'static, StorageResult<PlayerEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let mut tables = store.inner.tables.write().await;
            let taken = tables.players.values().any(|existing| {
                existing.session_id == player.session_id
                    && existing.player_name == player.player_name
            });
            if taken {
                return Err(StorageError::rejected(
                    Collection::ActivePlayers.table(),
                    format!("player `{}` already joined", player.player_name),
                ));
            }
            tables.players.insert(player.id, player.clone());
            drop(tables);
            store.publish(
                Collection::ActivePlayers,
                ChangeKind::Insert,
                Some(player.id),
                Some(player.session_id),
                Some(&player),
            );
            Ok(player)
        })
    }

    fn update_player(
        &self,
        id: Uuid,
        patch: PlayerPatch,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let mut tables = store.inner.tables.write().await;
            let Some(player) = tables.players.get_mut(&id) else {
                return Err(StorageError::rejected(
                    Collection::ActivePlayers.table(),
                    format!("no player {id}"),
                ));
            };
            player.apply(&patch);
            let updated = player.clone();
            drop(tables);
            store.publish(
                Collection::ActivePlayers,
                ChangeKind::Update,
                Some(id),
                Some(updated.session_id),
                Some(&updated),
            );
            Ok(())
        })
    }

    fn delete_players(&self, session_id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let mut tables = store.inner.tables.write().await;
            let removed: Vec<Uuid> = tables
                .players
                .values()
                .filter(|player| player.session_id == session_id)
                .map(|player| player.id)
                .collect();
            tables
                .players
                .retain(|_, player| player.session_id != session_id);
            drop(tables);
            for id in removed {
                store.publish::<PlayerEntity>(
                    Collection::ActivePlayers,
                    ChangeKind::Delete,
                    Some(id),
                    Some(session_id),
                    None,
                );
            }
            Ok(())
        })
    }

    fn list_active_quotes(
        &self,
        theme: String,
    ) -> BoxFuture<'static, StorageResult<Vec<QuoteEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let tables = store.inner.tables.read().await;
            Ok(tables
                .quotes
                .values()
                .filter(|quote| quote.is_active && quote.theme == theme)
                .cloned()
                .collect())
        })
    }

    fn insert_leaderboard_entry(
        &self,
        entry: LeaderboardEntity,
    ) -> BoxFuture<'static, StorageResult<LeaderboardEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let mut tables = store.inner.tables.write().await;
            tables.leaderboard.push(entry.clone());
            drop(tables);
            store.publish(
                Collection::Leaderboard,
                ChangeKind::Insert,
                Some(entry.id),
                entry.session_id,
                Some(&entry),
            );
            Ok(entry)
        })
    }

    fn list_leaderboard(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<LeaderboardEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let tables = store.inner.tables.read().await;
            let mut entries: Vec<LeaderboardEntity> = tables
                .leaderboard
                .iter()
                .filter(|entry| entry.session_id == Some(session_id))
                .cloned()
                .collect();
            entries.sort_by(|a, b| b.score.cmp(&a.score));
            Ok(entries)
        })
    }

    fn insert_saved_leaderboard(
        &self,
        board: SavedLeaderboardEntity,
    ) -> BoxFuture<'static, StorageResult<SavedLeaderboardEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let mut tables = store.inner.tables.write().await;
            tables.saved_leaderboards.push(board.clone());
            drop(tables);
            store.publish::<SavedLeaderboardEntity>(
                Collection::SavedLeaderboards,
                ChangeKind::Insert,
                Some(board.id),
                board.session_id,
                None,
            );
            Ok(board)
        })
    }

    fn list_saved_leaderboards(
        &self,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<SavedLeaderboardEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let tables = store.inner.tables.read().await;
            let mut boards = tables.saved_leaderboards.clone();
            boards.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
            boards.truncate(limit);
            Ok(boards)
        })
    }

    fn subscribe(&self, collection: Collection, filter: ChangeFilter) -> ChangeStream {
        BroadcastStream::new(self.inner.changes.subscribe())
            .filter_map(move |item| {
                let event = match item {
                    Ok(event) => {
                        (event.collection == collection && event.matches(&filter)).then_some(event)
                    }
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(%collection, skipped, "change-feed subscriber lagged");
                        // Force a refetch: the dropped events are unknown.
                        Some(ChangeEvent {
                            collection,
                            kind: ChangeKind::Update,
                            row_id: None,
                            session_id: None,
                            new_row: None,
                        })
                    }
                };
                future::ready(event)
            })
            .boxed()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_online() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::model::{AvatarKind, CLASSIC_THEME, Difficulty};

    #[tokio::test]
    async fn latest_session_is_the_most_recently_created() {
        let store = MemoryGateway::default();
        let older = SessionEntity::idle(Difficulty::Easy, 900);
        let mut newer = SessionEntity::idle(Difficulty::Hard, 300);
        newer.created_at = older.created_at.plus(std::time::Duration::from_millis(5));
        store.insert_session(newer.clone()).await.unwrap();
        store.insert_session(older).await.unwrap();

        let latest = store.latest_session().await.unwrap().unwrap();
        assert_eq!(latest.id, newer.id);
    }

    #[tokio::test]
    async fn players_are_unique_per_session_and_listed_by_score() {
        let store = MemoryGateway::default();
        let session = Uuid::new_v4();
        let ada = PlayerEntity::joining(session, "ada".into(), AvatarKind::Initial, None);
        let bob = PlayerEntity::joining(session, "bob".into(), AvatarKind::Initial, None);
        store.insert_player(ada.clone()).await.unwrap();
        store.insert_player(bob.clone()).await.unwrap();
        store
            .update_player(
                bob.id,
                PlayerPatch {
                    score: Some(30),
                    ..PlayerPatch::default()
                },
            )
            .await
            .unwrap();

        let duplicate = PlayerEntity::joining(session, "ada".into(), AvatarKind::Initial, None);
        assert!(matches!(
            store.insert_player(duplicate).await,
            Err(StorageError::Rejected { .. })
        ));

        let roster = store.list_players(session, None).await.unwrap();
        assert_eq!(roster[0].player_name, "bob");
        assert_eq!(roster.len(), 2);
        assert_eq!(store.list_players(session, Some(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn session_subscription_only_sees_matching_rows() {
        let store = MemoryGateway::default();
        let watched = store
            .insert_session(SessionEntity::idle(Difficulty::Medium, 600))
            .await
            .unwrap();
        let other = store
            .insert_session(SessionEntity::idle(Difficulty::Medium, 600))
            .await
            .unwrap();
        let mut feed = store.subscribe(Collection::GameSessions, ChangeFilter::Id(watched.id));

        let start = SessionPatch {
            is_active: Some(true),
            ..SessionPatch::default()
        };
        store.update_session(other.id, start.clone()).await.unwrap();
        store.update_session(watched.id, start).await.unwrap();

        let event = feed.next().await.unwrap();
        assert_eq!(event.row_id, Some(watched.id));
        assert_eq!(event.kind, ChangeKind::Update);
    }

    #[tokio::test]
    async fn offline_store_reports_unavailable() {
        let store = MemoryGateway::seeded();
        store.set_online(false);
        assert!(matches!(
            store.list_active_quotes(CLASSIC_THEME.into()).await,
            Err(StorageError::Unavailable { .. })
        ));
        store.set_online(true);
        assert_eq!(
            store
                .list_active_quotes(CLASSIC_THEME.into())
                .await
                .unwrap()
                .len(),
            24
        );
    }
}
