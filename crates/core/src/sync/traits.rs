//! Persistence contracts for the snapshot cache and the pending-change queue.

use async_trait::async_trait;

use super::model::{FinancialDataSnapshot, FinancialDocument, PendingChange};
use crate::errors::Result;

/// Storage for the single cached financial-data snapshot.
#[async_trait]
pub trait SnapshotCacheTrait: Send + Sync {
    /// Replace the cached snapshot and refresh its timestamp.
    async fn cache_snapshot(&self, data: FinancialDocument) -> Result<()>;

    /// The cached snapshot, or `None` when nothing has been cached yet.
    fn read_cached_snapshot(&self) -> Result<Option<FinancialDataSnapshot>>;
}

/// Ordered queue of changes awaiting remote delivery.
#[async_trait]
pub trait PendingChangeStoreTrait: Send + Sync {
    /// Persist a change and return its assigned id. Any id already set on
    /// `change` is ignored.
    async fn enqueue_pending_change(&self, change: PendingChange) -> Result<i64>;

    /// Full queue, oldest first.
    fn list_pending_changes(&self) -> Result<Vec<PendingChange>>;

    /// Delete one change. Missing ids are ignored.
    async fn remove_pending_change(&self, id: i64) -> Result<()>;

    async fn clear_pending_changes(&self) -> Result<()>;

    /// Note a failed replay attempt. The payload is left untouched.
    async fn record_replay_failure(&self, id: i64, error: String) -> Result<()>;

    fn pending_change_count(&self) -> Result<i64>;
}

/// Both halves of the local store.
pub trait SyncStoreTrait: SnapshotCacheTrait + PendingChangeStoreTrait {}

impl<T: SnapshotCacheTrait + PendingChangeStoreTrait> SyncStoreTrait for T {}
