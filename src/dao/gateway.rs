use std::fmt;

use futures::{future::BoxFuture, stream::BoxStream};
use serde::Serialize;
use uuid::Uuid;

use crate::dao::{
    models::{
        LeaderboardEntity, PlayerEntity, PlayerPatch, QuoteEntity, SavedLeaderboardEntity,
        SessionEntity, SessionPatch,
    },
    storage::StorageResult,
};

/// Logical collections exposed by the persistence gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// `game_sessions` table.
    GameSessions,
    /// `active_players` table.
    ActivePlayers,
    /// `custom_quotes` table.
    CustomQuotes,
    /// `leaderboard` table.
    Leaderboard,
    /// `saved_leaderboards` table.
    SavedLeaderboards,
}

impl Collection {
    /// Table name on the backing service.
    pub fn table(&self) -> &'static str {
        match self {
            Collection::GameSessions => "game_sessions",
            Collection::ActivePlayers => "active_players",
            Collection::CustomQuotes => "custom_quotes",
            Collection::Leaderboard => "leaderboard",
            Collection::SavedLeaderboards => "saved_leaderboards",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Kind of mutation carried by a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// A row was inserted.
    Insert,
    /// A row was updated.
    Update,
    /// A row was deleted.
    Delete,
}

/// Row filter attached to a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeFilter {
    /// Every row of the collection.
    All,
    /// A single row by primary key.
    Id(Uuid),
    /// Rows owned by the given session.
    SessionId(Uuid),
}

/// Notification that something changed in a subscribed collection.
///
/// Subscribers treat events as invalidations and refetch; `new_row` is only
/// informative and may be absent (e.g. after a delete or a lagged feed).
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// Collection the row belongs to.
    pub collection: Collection,
    /// Kind of mutation.
    pub kind: ChangeKind,
    /// Primary key of the affected row, when known.
    pub row_id: Option<Uuid>,
    /// Session the row belongs to, when it carries one.
    pub session_id: Option<Uuid>,
    /// Row after the mutation; absent for deletes.
    pub new_row: Option<serde_json::Value>,
}

impl ChangeEvent {
    /// Whether this event is selected by `filter`.
    pub fn matches(&self, filter: &ChangeFilter) -> bool {
        match filter {
            ChangeFilter::All => true,
            // Events without row identity are invalidations of the whole feed.
            ChangeFilter::Id(id) => self.row_id.is_none_or(|row| row == *id),
            ChangeFilter::SessionId(id) => self.session_id.is_none_or(|session| session == *id),
        }
    }
}

/// Stream of change events; dropping it unsubscribes.
pub type ChangeStream = BoxStream<'static, ChangeEvent>;

/// Abstraction over the hosted backend holding every durable row of the game.
///
/// Writes are last-write-wins per row; no method offers compare-and-swap.
pub trait Gateway: Send + Sync {
    /// Most recently created session, if any.
    fn latest_session(&self) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;
    /// Session row by id.
    fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;
    /// Insert a session row and return it as stored.
    fn insert_session(
        &self,
        session: SessionEntity,
    ) -> BoxFuture<'static, StorageResult<SessionEntity>>;
    /// Apply `patch` to the session row.
    fn update_session(
        &self,
        id: Uuid,
        patch: SessionPatch,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Players of a session ordered by score, highest first.
    fn list_players(
        &self,
        session_id: Uuid,
        limit: Option<usize>,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>>;
    /// Player of `session_id` registered as `player_name`.
    fn find_player_by_name(
        &self,
        session_id: Uuid,
        player_name: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    /// Insert a player row and return it as stored.
    fn insert_player(&self, player: PlayerEntity)
    -> BoxFuture<'static, StorageResult<PlayerEntity>>;
    /// Apply `patch` to the player row.
    fn update_player(&self, id: Uuid, patch: PlayerPatch)
    -> BoxFuture<'static, StorageResult<()>>;
    /// Remove every player row of the session.
    fn delete_players(&self, session_id: Uuid) -> BoxFuture<'static, StorageResult<()>>;

    /// Active catalog rows of `theme`.
    fn list_active_quotes(
        &self,
        theme: String,
    ) -> BoxFuture<'static, StorageResult<Vec<QuoteEntity>>>;

    /// Append a completion to the leaderboard.
    fn insert_leaderboard_entry(
        &self,
        entry: LeaderboardEntity,
    ) -> BoxFuture<'static, StorageResult<LeaderboardEntity>>;
    /// Completion records of a session, highest score first.
    fn list_leaderboard(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<LeaderboardEntity>>>;

    /// Archive a roster snapshot.
    fn insert_saved_leaderboard(
        &self,
        board: SavedLeaderboardEntity,
    ) -> BoxFuture<'static, StorageResult<SavedLeaderboardEntity>>;
    /// Most recent snapshots first.
    fn list_saved_leaderboards(
        &self,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<SavedLeaderboardEntity>>>;

    /// Subscribe to changes of `collection` restricted by `filter`.
    fn subscribe(&self, collection: Collection, filter: ChangeFilter) -> ChangeStream;

    /// Cheap round-trip proving the backend is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
