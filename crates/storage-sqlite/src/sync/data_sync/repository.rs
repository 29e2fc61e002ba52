//! Repository for the snapshot cache and pending-change queue tables.

use std::sync::Arc;

use async_trait::async_trait;
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::debug;

use pocketledger_core::errors::Result;
use pocketledger_core::sync::{
    sync_timestamp, FinancialDataSnapshot, FinancialDocument, PendingChange,
    PendingChangeStoreTrait, SnapshotCacheTrait, FINANCIAL_DATA_SNAPSHOT_ID,
};

use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::{financial_data_cache, pending_changes};

use super::model::{FinancialDataCacheDB, NewPendingChangeDB, PendingChangeDB};

fn enum_to_db<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?.trim_matches('"').to_string())
}

fn enum_from_db<T: serde::de::DeserializeOwned>(value: &str) -> Result<T> {
    Ok(serde_json::from_str(&format!("\"{}\"", value))?)
}

fn to_snapshot(row: FinancialDataCacheDB) -> Result<FinancialDataSnapshot> {
    Ok(FinancialDataSnapshot {
        id: row.id,
        data: serde_json::from_str(&row.data)?,
        updated_at: row.updated_at,
    })
}

fn to_pending_change(row: PendingChangeDB) -> Result<PendingChange> {
    Ok(PendingChange {
        id: Some(row.id),
        entity: enum_from_db(&row.entity)?,
        op: enum_from_db(&row.op)?,
        payload: serde_json::from_str(&row.payload)?,
        created_at: row.created_at,
        auth_token: row.auth_token,
        attempt_count: row.attempt_count,
        last_error: row.last_error,
        last_attempt_at: row.last_attempt_at,
    })
}

fn to_new_pending_change(change: &PendingChange) -> Result<NewPendingChangeDB> {
    Ok(NewPendingChangeDB {
        entity: enum_to_db(&change.entity)?,
        op: enum_to_db(&change.op)?,
        payload: serde_json::to_string(&change.payload)?,
        created_at: change.created_at.clone(),
        auth_token: change.auth_token.clone(),
        attempt_count: 0,
    })
}

fn upsert_snapshot(conn: &mut SqliteConnection, data: &str) -> Result<()> {
    let now = sync_timestamp();
    let row = FinancialDataCacheDB {
        id: FINANCIAL_DATA_SNAPSHOT_ID.to_string(),
        data: data.to_string(),
        updated_at: now.clone(),
    };

    diesel::insert_into(financial_data_cache::table)
        .values(&row)
        .on_conflict(financial_data_cache::id)
        .do_update()
        .set((
            financial_data_cache::data.eq(data),
            financial_data_cache::updated_at.eq(now),
        ))
        .execute(conn)
        .map_err(StorageError::from)?;
    Ok(())
}

/// SQLite-backed local store: one singleton snapshot row and an
/// autoincrementing queue of pending changes.
///
/// Reads use the pool; writes go through the single writer, one transaction
/// per call. No call touches both tables.
pub struct SyncStoreRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl SyncStoreRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl SnapshotCacheTrait for SyncStoreRepository {
    async fn cache_snapshot(&self, data: FinancialDocument) -> Result<()> {
        let serialized = serde_json::to_string(&data)?;
        self.writer
            .exec(move |conn| upsert_snapshot(conn, &serialized))
            .await
    }

    fn read_cached_snapshot(&self) -> Result<Option<FinancialDataSnapshot>> {
        let mut conn = get_connection(&self.pool)?;
        let row = financial_data_cache::table
            .find(FINANCIAL_DATA_SNAPSHOT_ID)
            .first::<FinancialDataCacheDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        row.map(to_snapshot).transpose()
    }
}

#[async_trait]
impl PendingChangeStoreTrait for SyncStoreRepository {
    async fn enqueue_pending_change(&self, change: PendingChange) -> Result<i64> {
        let row = to_new_pending_change(&change)?;
        let id = self
            .writer
            .exec(move |conn| {
                let id = diesel::insert_into(pending_changes::table)
                    .values(&row)
                    .returning(pending_changes::id)
                    .get_result::<i64>(conn)
                    .map_err(StorageError::from)?;
                Ok(id)
            })
            .await?;
        debug!("Queued pending change {}", id);
        Ok(id)
    }

    fn list_pending_changes(&self) -> Result<Vec<PendingChange>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = pending_changes::table
            .order((pending_changes::created_at.asc(), pending_changes::id.asc()))
            .load::<PendingChangeDB>(&mut conn)
            .map_err(StorageError::from)?;

        rows.into_iter().map(to_pending_change).collect()
    }

    async fn remove_pending_change(&self, id: i64) -> Result<()> {
        self.writer
            .exec(move |conn| {
                diesel::delete(pending_changes::table.find(id))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn clear_pending_changes(&self) -> Result<()> {
        let removed = self
            .writer
            .exec(|conn| {
                let removed = diesel::delete(pending_changes::table)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(removed)
            })
            .await?;
        debug!("Cleared {} pending change(s)", removed);
        Ok(())
    }

    async fn record_replay_failure(&self, id: i64, error: String) -> Result<()> {
        self.writer
            .exec(move |conn| {
                diesel::update(pending_changes::table.find(id))
                    .set((
                        pending_changes::attempt_count.eq(pending_changes::attempt_count + 1),
                        pending_changes::last_error.eq(Some(error)),
                        pending_changes::last_attempt_at.eq(Some(sync_timestamp())),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    fn pending_change_count(&self) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        let count = pending_changes::table
            .select(count_star())
            .first::<i64>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    use pocketledger_core::sync::{SyncEntity, SyncOperation};

    use crate::db::{create_pool, init, run_migrations, spawn_writer};

    fn setup_repo() -> (tempfile::TempDir, Arc<DbPool>, SyncStoreRepository) {
        let dir = tempdir().expect("tempdir");
        let db_path = init(&dir.path().to_string_lossy()).expect("init db");
        run_migrations(&db_path).expect("migrate db");
        let pool = create_pool(&db_path).expect("create pool");
        let writer = spawn_writer(pool.as_ref().clone()).expect("spawn writer");
        let repo = SyncStoreRepository::new(Arc::clone(&pool), writer);
        (dir, pool, repo)
    }

    fn change_at(created_at: &str, payload: serde_json::Value) -> PendingChange {
        let mut change = PendingChange::financial_data_update(payload, Some("token".to_string()));
        change.created_at = created_at.to_string();
        change
    }

    #[tokio::test]
    async fn creates_sync_store_tables() {
        let (_dir, pool, _repo) = setup_repo();
        let mut conn = get_connection(&pool).expect("conn");
        for table in ["financial_data_cache", "pending_changes", "secrets"] {
            #[derive(diesel::QueryableByName)]
            struct CountRow {
                #[diesel(sql_type = diesel::sql_types::BigInt)]
                c: i64,
            }
            let row = diesel::sql_query(format!(
                "SELECT COUNT(*) as c FROM sqlite_master WHERE type='table' AND name='{}'",
                table
            ))
            .get_result::<CountRow>(&mut conn)
            .expect("table exists");
            assert_eq!(row.c, 1, "missing table {table}");
        }
    }

    #[tokio::test]
    async fn empty_cache_reads_as_none() {
        let (_dir, _pool, repo) = setup_repo();
        assert_eq!(repo.read_cached_snapshot().expect("read"), None);
    }

    #[tokio::test]
    async fn cache_snapshot_keeps_a_single_row() {
        let (_dir, pool, repo) = setup_repo();
        repo.cache_snapshot(json!({"v": 1})).await.expect("first");
        let first = repo.read_cached_snapshot().expect("read").expect("cached");
        repo.cache_snapshot(json!({"v": 2})).await.expect("second");
        let second = repo.read_cached_snapshot().expect("read").expect("cached");

        assert_eq!(second.id, FINANCIAL_DATA_SNAPSHOT_ID);
        assert_eq!(second.data, json!({"v": 2}));
        assert!(second.updated_at >= first.updated_at);

        let mut conn = get_connection(&pool).expect("conn");
        let rows: i64 = financial_data_cache::table
            .select(count_star())
            .first(&mut conn)
            .expect("count");
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn enqueue_assigns_increasing_ids() {
        let (_dir, _pool, repo) = setup_repo();
        let first = repo
            .enqueue_pending_change(PendingChange::financial_data_update(json!({"n": 1}), None))
            .await
            .expect("enqueue");
        let second = repo
            .enqueue_pending_change(PendingChange::financial_data_update(json!({"n": 2}), None))
            .await
            .expect("enqueue");
        assert!(second > first);

        // Ids are not reused after removal.
        repo.remove_pending_change(second).await.expect("remove");
        let third = repo
            .enqueue_pending_change(PendingChange::financial_data_update(json!({"n": 3}), None))
            .await
            .expect("enqueue");
        assert!(third > second);
    }

    #[tokio::test]
    async fn list_orders_by_creation_timestamp() {
        let (_dir, _pool, repo) = setup_repo();
        repo.enqueue_pending_change(change_at("2026-01-01T00:00:02.000000Z", json!({"c": 2})))
            .await
            .expect("enqueue");
        repo.enqueue_pending_change(change_at("2026-01-01T00:00:01.000000Z", json!({"c": 1})))
            .await
            .expect("enqueue");
        repo.enqueue_pending_change(change_at("2026-01-01T00:00:03.000000Z", json!({"c": 3})))
            .await
            .expect("enqueue");

        let payloads = repo
            .list_pending_changes()
            .expect("list")
            .into_iter()
            .map(|c| c.payload)
            .collect::<Vec<_>>();
        assert_eq!(payloads, vec![json!({"c": 1}), json!({"c": 2}), json!({"c": 3})]);
    }

    #[tokio::test]
    async fn queued_change_round_trips_all_fields() {
        let (_dir, _pool, repo) = setup_repo();
        let mut change = PendingChange::financial_data_update(
            json!({"accounts": [{"id": "a1"}]}),
            Some("captured".to_string()),
        );
        change.id = Some(999);
        let id = repo.enqueue_pending_change(change.clone()).await.expect("enqueue");

        let stored = repo.list_pending_changes().expect("list").remove(0);
        assert_eq!(stored.id, Some(id));
        assert_ne!(stored.id, Some(999));
        assert_eq!(stored.entity, SyncEntity::FinancialData);
        assert_eq!(stored.op, SyncOperation::Update);
        assert_eq!(stored.payload, change.payload);
        assert_eq!(stored.created_at, change.created_at);
        assert_eq!(stored.auth_token.as_deref(), Some("captured"));
        assert_eq!(stored.attempt_count, 0);
    }

    #[tokio::test]
    async fn remove_missing_change_is_a_noop() {
        let (_dir, _pool, repo) = setup_repo();
        let id = repo
            .enqueue_pending_change(PendingChange::financial_data_update(json!({}), None))
            .await
            .expect("enqueue");
        repo.remove_pending_change(id + 100).await.expect("remove missing");
        assert_eq!(repo.pending_change_count().expect("count"), 1);

        repo.remove_pending_change(id).await.expect("remove");
        repo.remove_pending_change(id).await.expect("remove again");
        assert_eq!(repo.pending_change_count().expect("count"), 0);
    }

    #[tokio::test]
    async fn clear_empties_the_queue() {
        let (_dir, _pool, repo) = setup_repo();
        for n in 0..3 {
            repo.enqueue_pending_change(PendingChange::financial_data_update(json!({"n": n}), None))
                .await
                .expect("enqueue");
        }
        repo.clear_pending_changes().await.expect("clear");
        assert!(repo.list_pending_changes().expect("list").is_empty());
    }

    #[tokio::test]
    async fn replay_failure_updates_diagnostics_only() {
        let (_dir, _pool, repo) = setup_repo();
        let id = repo
            .enqueue_pending_change(PendingChange::financial_data_update(
                json!({"keep": true}),
                None,
            ))
            .await
            .expect("enqueue");

        repo.record_replay_failure(id, "rejected with status 500".to_string())
            .await
            .expect("record");
        repo.record_replay_failure(id, "transport failure: timeout".to_string())
            .await
            .expect("record");
        repo.record_replay_failure(id + 1, "missing".to_string())
            .await
            .expect("record missing");

        let stored = repo.list_pending_changes().expect("list").remove(0);
        assert_eq!(stored.attempt_count, 2);
        assert_eq!(stored.last_error.as_deref(), Some("transport failure: timeout"));
        assert!(stored.last_attempt_at.is_some());
        assert_eq!(stored.payload, json!({"keep": true}));
    }
}
