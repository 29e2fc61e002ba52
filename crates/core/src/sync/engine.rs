//! Cache-first reads, write-through-or-queue writes and queue replay.

use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::Mutex;

use super::connectivity::NetworkStatus;
use super::model::{
    DrainReport, DrainStatus, FinancialDataSnapshot, FinancialDocument, PendingChange,
    SyncEntity, WriteOptions,
};
use super::remote::{FetchOutcome, RemoteDataApi, SendOptions, SendOutcome};
use super::retry::classify_http_status;
use super::traits::SyncStoreTrait;
use crate::errors::{Error, Result};
use crate::secrets::CredentialStore;

/// Outcome of replaying a single queued change.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ReplayResult {
    Delivered,
    NoCredential,
    Failed(SendOutcome),
}

impl ReplayResult {
    fn failure_reason(&self) -> String {
        match self {
            Self::Delivered => String::new(),
            Self::NoCredential => "no credential available".to_string(),
            Self::Failed(outcome) => describe_send_failure(outcome),
        }
    }
}

fn describe_send_failure(outcome: &SendOutcome) -> String {
    match outcome {
        SendOutcome::Delivered => "delivered".to_string(),
        SendOutcome::Rejected { status } => format!(
            "rejected with status {} ({:?})",
            status,
            classify_http_status(*status)
        ),
        SendOutcome::TransportFailure(reason) => format!("transport failure: {}", reason),
    }
}

fn usable_token(token: Option<&str>) -> Option<&str> {
    token.filter(|value| !value.trim().is_empty())
}

/// Single entry point for reading and writing the financial snapshot under
/// uncertain connectivity and credentials.
///
/// The local cache is updated on every write and is the fallback for every
/// failed read. Writes that cannot reach the remote are queued and replayed
/// in creation order by [`SyncEngine::drain_queue`].
pub struct SyncEngine {
    store: Arc<dyn SyncStoreTrait>,
    remote: Arc<dyn RemoteDataApi>,
    network: NetworkStatus,
    credentials: CredentialStore,
    drain_lock: Mutex<()>,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn SyncStoreTrait>,
        remote: Arc<dyn RemoteDataApi>,
        network: NetworkStatus,
        credentials: CredentialStore,
    ) -> Self {
        Self {
            store,
            remote,
            network,
            credentials,
            drain_lock: Mutex::new(()),
        }
    }

    pub fn network(&self) -> &NetworkStatus {
        &self.network
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Read the financial document.
    ///
    /// Without a credential or network the cache is returned directly.
    /// Otherwise the remote copy is fetched and cached; any remote failure
    /// falls back to the cache.
    pub async fn read(&self, token: Option<&str>) -> Result<Option<FinancialDocument>> {
        let Some(token) = usable_token(token) else {
            debug!("[DataSync] No credential, serving cached snapshot");
            return self.cached_document();
        };
        if !self.network.is_online() {
            debug!("[DataSync] Offline, serving cached snapshot");
            return self.cached_document();
        }

        match self.remote.fetch_data(token).await {
            FetchOutcome::Fetched(data) => {
                self.store.cache_snapshot(data.clone()).await?;
                Ok(Some(data))
            }
            other => {
                debug!(
                    "[DataSync] Remote read unavailable ({:?}), serving cached snapshot",
                    other
                );
                self.cached_document()
            }
        }
    }

    /// Write the financial document.
    ///
    /// The cache is always updated first. Returns whether the remote write
    /// succeeded; queueing is a side effect and is not reflected in the
    /// return value.
    pub async fn write(
        &self,
        data: FinancialDocument,
        token: Option<&str>,
        options: WriteOptions,
    ) -> Result<bool> {
        self.store.cache_snapshot(data.clone()).await?;

        let token = usable_token(token);
        let active_token = match token {
            Some(value) if self.network.is_online() => value,
            _ => {
                debug!(
                    "[DataSync] Write deferred (online={}, has_credential={})",
                    self.network.is_online(),
                    token.is_some()
                );
                self.enqueue(data, token.map(str::to_string)).await?;
                return Ok(false);
            }
        };

        let outcome = self
            .remote
            .send_data(
                &data,
                active_token,
                SendOptions {
                    keepalive: options.keepalive,
                    suppress_errors: false,
                },
            )
            .await;
        if outcome.is_success() {
            return Ok(true);
        }

        if options.enqueue_on_fail {
            info!(
                "[DataSync] Remote write failed ({}), queueing change",
                describe_send_failure(&outcome)
            );
            self.enqueue(data, Some(active_token.to_string())).await?;
        } else {
            debug!(
                "[DataSync] Remote write failed ({}), caller opted out of queueing",
                describe_send_failure(&outcome)
            );
        }
        Ok(false)
    }

    /// Replay one queued change.
    ///
    /// The credential is resolved as `token_override`, then the token captured
    /// on the change, then the stored credential. Without one no request is
    /// made. A successful replay refreshes the cache with the change payload.
    pub async fn replay_one(
        &self,
        change: &PendingChange,
        token_override: Option<&str>,
    ) -> Result<bool> {
        Ok(self.replay(change, token_override).await? == ReplayResult::Delivered)
    }

    async fn replay(
        &self,
        change: &PendingChange,
        token_override: Option<&str>,
    ) -> Result<ReplayResult> {
        let token = usable_token(token_override)
            .map(str::to_string)
            .or_else(|| usable_token(change.auth_token.as_deref()).map(str::to_string))
            .or_else(|| self.credentials.load());
        let Some(token) = token else {
            debug!(
                "[DataSync] Skipping replay of change {:?}: no credential",
                change.id
            );
            return Ok(ReplayResult::NoCredential);
        };

        // Every operation is a full-document overwrite of its resource.
        let outcome = match change.entity {
            SyncEntity::FinancialData => {
                self.remote
                    .send_data(
                        &change.payload,
                        &token,
                        SendOptions {
                            keepalive: false,
                            suppress_errors: true,
                        },
                    )
                    .await
            }
        };
        if !outcome.is_success() {
            return Ok(ReplayResult::Failed(outcome));
        }

        self.store.cache_snapshot(change.payload.clone()).await?;
        Ok(ReplayResult::Delivered)
    }

    /// Replay the queue oldest first, stopping at the first failure.
    ///
    /// Delivered changes are removed as they succeed; the failing change and
    /// everything after it stay queued for the next drain. A drain requested
    /// while another one is running returns [`DrainStatus::AlreadyRunning`].
    /// Storage errors are logged and reported as [`DrainStatus::Failed`].
    pub async fn drain_queue(&self, token: Option<&str>) -> DrainReport {
        let Ok(_guard) = self.drain_lock.try_lock() else {
            debug!("[DataSync] Drain already in progress, skipping");
            return DrainReport::already_running();
        };

        let mut replayed = 0usize;
        let status = match self.replay_pending(token, &mut replayed).await {
            Ok(status) => status,
            Err(err) => {
                error!("[DataSync] Queue drain failed: {}", err);
                DrainStatus::Failed
            }
        };

        let remaining = match self.store.pending_change_count() {
            Ok(count) => usize::try_from(count).unwrap_or(0),
            Err(err) => {
                warn!("[DataSync] Failed to count pending changes: {}", err);
                0
            }
        };

        debug!(
            "[DataSync] Drain finished status={:?} replayed={} remaining={}",
            status, replayed, remaining
        );
        DrainReport {
            status,
            replayed,
            remaining,
        }
    }

    async fn replay_pending(
        &self,
        token: Option<&str>,
        replayed: &mut usize,
    ) -> Result<DrainStatus> {
        let pending = self.store.list_pending_changes()?;
        if pending.is_empty() {
            return Ok(DrainStatus::Completed);
        }
        info!("[DataSync] Draining {} pending change(s)", pending.len());

        for change in pending {
            let id = change
                .id
                .ok_or_else(|| Error::Unexpected("Queued change has no id".to_string()))?;
            let result = self.replay(&change, token).await?;
            if result != ReplayResult::Delivered {
                let reason = result.failure_reason();
                info!(
                    "[DataSync] Replay of change {} failed ({}); halting drain",
                    id, reason
                );
                self.store.record_replay_failure(id, reason).await?;
                return Ok(DrainStatus::Halted);
            }

            self.store.remove_pending_change(id).await?;
            *replayed += 1;
        }

        Ok(DrainStatus::Completed)
    }

    pub fn cached_snapshot(&self) -> Result<Option<FinancialDataSnapshot>> {
        self.store.read_cached_snapshot()
    }

    pub fn pending_changes(&self) -> Result<Vec<PendingChange>> {
        self.store.list_pending_changes()
    }

    pub fn pending_change_count(&self) -> Result<i64> {
        self.store.pending_change_count()
    }

    pub async fn clear_pending_changes(&self) -> Result<()> {
        self.store.clear_pending_changes().await
    }

    fn cached_document(&self) -> Result<Option<FinancialDocument>> {
        Ok(self.store.read_cached_snapshot()?.map(|snapshot| snapshot.data))
    }

    async fn enqueue(&self, data: FinancialDocument, auth_token: Option<String>) -> Result<i64> {
        let id = self
            .store
            .enqueue_pending_change(PendingChange::financial_data_update(data, auth_token))
            .await?;
        debug!("[DataSync] Queued change {}", id);
        Ok(id)
    }
}
