use std::{sync::Arc, time::Duration};

use async_stream::stream;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::time::MissedTickBehavior;
use tracing::warn;
use uuid::Uuid;

use crate::dao::{
    gateway::{ChangeEvent, ChangeFilter, ChangeKind, ChangeStream, Collection, Gateway},
    models::{
        LeaderboardEntity, PlayerEntity, PlayerPatch, QuoteEntity, SavedLeaderboardEntity,
        SessionEntity, SessionPatch,
    },
    storage::StorageResult,
    timestamp::Timestamp,
};

use super::{
    config::RestConfig,
    error::{RestDaoError, RestResult},
};

type Query = Vec<(&'static str, String)>;

fn eq(value: impl ToString) -> String {
    format!("eq.{}", value.to_string())
}

fn filter_query(filter: ChangeFilter) -> Query {
    match filter {
        ChangeFilter::All => Vec::new(),
        ChangeFilter::Id(id) => vec![("id", eq(id))],
        ChangeFilter::SessionId(id) => vec![("session_id", eq(id))],
    }
}

fn uuid_field(row: &Value, field: &str) -> Option<Uuid> {
    row.get(field)?.as_str()?.parse().ok()
}

/// Compare two polled snapshots and emit one event per row that appeared,
/// changed or vanished.
fn diff_snapshots(
    collection: Collection,
    previous: &IndexMap<Uuid, Value>,
    current: &IndexMap<Uuid, Value>,
) -> Vec<ChangeEvent> {
    let mut events = Vec::new();
    for (id, row) in current {
        let kind = match previous.get(id) {
            None => ChangeKind::Insert,
            Some(old) if old != row => ChangeKind::Update,
            Some(_) => continue,
        };
        events.push(ChangeEvent {
            collection,
            kind,
            row_id: Some(*id),
            session_id: uuid_field(row, "session_id"),
            new_row: Some(row.clone()),
        });
    }
    for (id, row) in previous {
        if !current.contains_key(id) {
            events.push(ChangeEvent {
                collection,
                kind: ChangeKind::Delete,
                row_id: Some(*id),
                session_id: uuid_field(row, "session_id"),
                new_row: None,
            });
        }
    }
    events
}

/// Gateway speaking the PostgREST dialect (`/rest/v1/<table>`).
#[derive(Clone)]
pub struct RestGateway {
    client: Client,
    base_url: Arc<str>,
    api_key: Option<Arc<str>>,
    poll_interval: Duration,
}

impl RestGateway {
    /// Build the client and make sure the endpoint answers.
    pub async fn connect(config: RestConfig) -> RestResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| RestDaoError::ClientBuilder { source })?;

        let store = Self {
            client,
            base_url: Arc::from(config.base_url.trim_end_matches('/')),
            api_key: config.api_key.map(Arc::from),
            poll_interval: config.poll_interval,
        };

        store.ping().await?;
        Ok(store)
    }

    fn request(&self, method: Method, collection: Collection) -> RequestBuilder {
        let url = format!("{}/rest/v1/{}", self.base_url, collection.table());
        let builder = self.client.request(method, url);
        if let Some(ref key) = self.api_key {
            builder
                .header("apikey", key.as_ref())
                .bearer_auth(key.as_ref())
        } else {
            builder
        }
    }

    async fn send(collection: Collection, builder: RequestBuilder) -> RestResult<Response> {
        let table = collection.table();
        let response = builder
            .send()
            .await
            .map_err(|source| RestDaoError::RequestSend { table, source })?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(RestDaoError::RequestStatus {
                table,
                status: response.status(),
            })
        }
    }

    async fn decode<T: DeserializeOwned>(
        collection: Collection,
        response: Response,
    ) -> RestResult<Vec<T>> {
        response
            .json::<Vec<T>>()
            .await
            .map_err(|source| RestDaoError::DecodeResponse {
                table: collection.table(),
                source,
            })
    }

    async fn select<T: DeserializeOwned>(
        &self,
        collection: Collection,
        mut query: Query,
    ) -> RestResult<Vec<T>> {
        query.insert(0, ("select", "*".into()));
        let builder = self.request(Method::GET, collection).query(&query);
        let response = Self::send(collection, builder).await?;
        Self::decode(collection, response).await
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        collection: Collection,
        mut query: Query,
    ) -> RestResult<Option<T>> {
        query.push(("limit", "1".into()));
        Ok(self.select(collection, query).await?.into_iter().next())
    }

    async fn insert<T: Serialize + DeserializeOwned>(
        &self,
        collection: Collection,
        row: &T,
    ) -> RestResult<T> {
        let builder = self
            .request(Method::POST, collection)
            .header("Prefer", "return=representation")
            .json(row);
        let response = Self::send(collection, builder).await?;
        Self::decode(collection, response)
            .await?
            .into_iter()
            .next()
            .ok_or(RestDaoError::NoRowMatched {
                table: collection.table(),
            })
    }

    async fn update<P: Serialize>(
        &self,
        collection: Collection,
        id: Uuid,
        patch: &P,
    ) -> RestResult<()> {
        let mut body = serde_json::to_value(patch).unwrap_or_else(|_| Value::Object(Default::default()));
        if let Value::Object(fields) = &mut body {
            fields.insert("updated_at".into(), Value::String(Timestamp::now().to_rfc3339()));
        }
        let builder = self
            .request(Method::PATCH, collection)
            .query(&[("id", eq(id))])
            .header("Prefer", "return=representation")
            .json(&body);
        let response = Self::send(collection, builder).await?;
        let rows: Vec<Value> = Self::decode(collection, response).await?;
        if rows.is_empty() {
            Err(RestDaoError::NoRowMatched {
                table: collection.table(),
            })
        } else {
            Ok(())
        }
    }

    async fn delete(&self, collection: Collection, query: Query) -> RestResult<()> {
        let builder = self.request(Method::DELETE, collection).query(&query);
        Self::send(collection, builder).await.map(|_| ())
    }

    async fn ping(&self) -> RestResult<()> {
        self.select_one::<Value>(Collection::GameSessions, Vec::new())
            .await
            .map(|_| ())
    }
}

impl Gateway for RestGateway {
    fn latest_session(&self) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let query = vec![("order", "created_at.desc".to_string())];
            Ok(store.select_one(Collection::GameSessions, query).await?)
        })
    }

    fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .select_one(Collection::GameSessions, vec![("id", eq(id))])
                .await?)
        })
    }

    fn insert_session(
        &self,
        session: SessionEntity,
    ) -> BoxFuture<'static, StorageResult<SessionEntity>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.insert(Collection::GameSessions, &session).await?) })
    }

    fn update_session(
        &self,
        id: Uuid,
        patch: SessionPatch,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.update(Collection::GameSessions, id, &patch).await?) })
    }

    fn list_players(
        &self,
        session_id: Uuid,
        limit: Option<usize>,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut query = vec![
                ("session_id", eq(session_id)),
                ("order", "score.desc".to_string()),
            ];
            if let Some(limit) = limit {
                query.push(("limit", limit.to_string()));
            }
            Ok(store.select(Collection::ActivePlayers, query).await?)
        })
    }

    fn find_player_by_name(
        &self,
        session_id: Uuid,
        player_name: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let query = vec![
                ("session_id", eq(session_id)),
                ("player_name", eq(player_name)),
            ];
            Ok(store.select_one(Collection::ActivePlayers, query).await?)
        })
    }

    fn insert_player(
        &self,
        player: PlayerEntity,
    ) -> BoxFuture<'static, StorageResult<PlayerEntity>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.insert(Collection::ActivePlayers, &player).await?) })
    }

    fn update_player(
        &self,
        id: Uuid,
        patch: PlayerPatch,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.update(Collection::ActivePlayers, id, &patch).await?) })
    }

    fn delete_players(&self, session_id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .delete(Collection::ActivePlayers, vec![("session_id", eq(session_id))])
                .await?)
        })
    }

    fn list_active_quotes(
        &self,
        theme: String,
    ) -> BoxFuture<'static, StorageResult<Vec<QuoteEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let query = vec![("theme", eq(theme)), ("is_active", eq(true))];
            Ok(store.select(Collection::CustomQuotes, query).await?)
        })
    }

    fn insert_leaderboard_entry(
        &self,
        entry: LeaderboardEntity,
    ) -> BoxFuture<'static, StorageResult<LeaderboardEntity>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.insert(Collection::Leaderboard, &entry).await?) })
    }

    fn list_leaderboard(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<LeaderboardEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let query = vec![
                ("session_id", eq(session_id)),
                ("order", "score.desc".to_string()),
            ];
            Ok(store.select(Collection::Leaderboard, query).await?)
        })
    }

    fn insert_saved_leaderboard(
        &self,
        board: SavedLeaderboardEntity,
    ) -> BoxFuture<'static, StorageResult<SavedLeaderboardEntity>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.insert(Collection::SavedLeaderboards, &board).await?) })
    }

    fn list_saved_leaderboards(
        &self,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<SavedLeaderboardEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let query = vec![
                ("order", "saved_at.desc".to_string()),
                ("limit", limit.to_string()),
            ];
            Ok(store.select(Collection::SavedLeaderboards, query).await?)
        })
    }

    fn subscribe(&self, collection: Collection, filter: ChangeFilter) -> ChangeStream {
        let store = self.clone();
        Box::pin(stream! {
            let mut ticker = tokio::time::interval(store.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut previous: Option<IndexMap<Uuid, Value>> = None;
            loop {
                ticker.tick().await;
                let rows = match store.select::<Value>(collection, filter_query(filter)).await {
                    Ok(rows) => rows,
                    Err(err) => {
                        warn!(%collection, error = %err, "change-feed poll failed");
                        continue;
                    }
                };
                let current: IndexMap<Uuid, Value> = rows
                    .into_iter()
                    .filter_map(|row| uuid_field(&row, "id").map(|id| (id, row)))
                    .collect();
                if let Some(previous) = previous.as_ref() {
                    for event in diff_snapshots(collection, previous, &current) {
                        yield event;
                    }
                }
                previous = Some(current);
            }
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.ping().await?) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snapshot_diff_reports_inserts_updates_and_deletes() {
        let session = Uuid::new_v4();
        let kept = Uuid::new_v4();
        let changed = Uuid::new_v4();
        let gone = Uuid::new_v4();
        let added = Uuid::new_v4();

        let row = |id: Uuid, score: i32| json!({ "id": id, "session_id": session, "score": score });
        let previous: IndexMap<Uuid, Value> = [
            (kept, row(kept, 1)),
            (changed, row(changed, 2)),
            (gone, row(gone, 3)),
        ]
        .into_iter()
        .collect();
        let current: IndexMap<Uuid, Value> = [
            (kept, row(kept, 1)),
            (changed, row(changed, 12)),
            (added, row(added, 0)),
        ]
        .into_iter()
        .collect();

        let events = diff_snapshots(Collection::ActivePlayers, &previous, &current);
        let kinds: Vec<(Option<Uuid>, ChangeKind)> =
            events.iter().map(|event| (event.row_id, event.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (Some(changed), ChangeKind::Update),
                (Some(added), ChangeKind::Insert),
                (Some(gone), ChangeKind::Delete),
            ]
        );
        assert!(events.iter().all(|event| event.session_id == Some(session)));
    }

    #[test]
    fn filters_translate_to_postgrest_equality() {
        let id = Uuid::nil();
        assert_eq!(
            filter_query(ChangeFilter::SessionId(id)),
            vec![("session_id", format!("eq.{id}"))]
        );
        assert!(filter_query(ChangeFilter::All).is_empty());
    }
}
