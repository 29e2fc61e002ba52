//! Wires the local store, the data API client and the sync engine together.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use pocketledger_core::sync::{
    ConnectivityTrigger, DrainReport, NetworkStatus, PendingChangeStoreTrait, SnapshotCacheTrait,
    SyncEngine, TriggerConfig, DRAIN_RETRY_JITTER_SECS,
};
use pocketledger_data_api::DataApiClient;
use pocketledger_storage_sqlite::{open_local_store, LocalStore};

use crate::config::AgentConfig;

/// Long-lived sync services for one data directory.
pub struct AgentRuntime {
    store: Arc<LocalStore>,
    client: Arc<DataApiClient>,
    network: NetworkStatus,
    engine: Arc<SyncEngine>,
    trigger: ConnectivityTrigger,
    probe_interval: Duration,
    probe_task: Mutex<Option<JoinHandle<()>>>,
}

impl AgentRuntime {
    /// Open the process-wide store for `config.data_dir` and build the
    /// runtime on top of it.
    pub fn initialize(config: &AgentConfig) -> Result<Self> {
        let store = open_local_store(&config.data_dir_str())
            .with_context(|| format!("Failed to open local store in {}", config.data_dir_str()))?;
        Self::with_store(config, store)
    }

    pub fn with_store(config: &AgentConfig, store: Arc<LocalStore>) -> Result<Self> {
        let api_url = config.api_url.as_deref().ok_or_else(|| {
            anyhow!("DATA_API_URL not configured. Network sync is disabled.")
        })?;
        let client = Arc::new(
            DataApiClient::new(api_url).context("Failed to build data API client")?,
        );

        // Unknown until the first probe answers.
        let network = NetworkStatus::new(false);
        let engine = Arc::new(SyncEngine::new(
            store.sync_repository(),
            client.clone(),
            network.clone(),
            store.credentials(),
        ));
        let trigger = ConnectivityTrigger::new(
            Arc::clone(&engine),
            TriggerConfig {
                retry_while_pending: config.retry_while_pending,
                max_jitter: Duration::from_secs(DRAIN_RETRY_JITTER_SECS),
            },
        );

        Ok(Self {
            store,
            client,
            network,
            engine,
            trigger,
            probe_interval: config.probe_interval,
            probe_task: Mutex::new(None),
        })
    }

    pub fn store(&self) -> Arc<LocalStore> {
        Arc::clone(&self.store)
    }

    pub fn engine(&self) -> Arc<SyncEngine> {
        Arc::clone(&self.engine)
    }

    pub fn network(&self) -> &NetworkStatus {
        &self.network
    }

    /// Probe the API once and publish the result.
    pub async fn probe_once(&self) -> bool {
        let online = self.client.probe().await;
        self.network.set_online(online);
        online
    }

    /// Start the connectivity trigger and the probe loop.
    pub async fn start(&self) {
        self.trigger.start().await;

        let mut guard = self.probe_task.lock().await;
        if guard.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        *guard = Some(spawn_probe_loop(
            Arc::clone(&self.client),
            self.network.clone(),
            self.probe_interval,
        ));
        info!(
            "Sync agent started (probe every {}s)",
            self.probe_interval.as_secs()
        );
    }

    pub async fn stop(&self) {
        if let Some(handle) = self.probe_task.lock().await.take() {
            handle.abort();
        }
        self.trigger.stop().await;
        info!("Sync agent stopped");
    }

    /// Probe, then drain the queue once with the stored credential.
    pub async fn drain_now(&self) -> DrainReport {
        if !self.probe_once().await {
            info!("Data API unreachable; queued changes stay pending");
        }
        let token = self.engine.credentials().load();
        self.engine.drain_queue(token.as_deref()).await
    }
}

fn spawn_probe_loop(
    client: Arc<DataApiClient>,
    network: NetworkStatus,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let online = client.probe().await;
            debug!("Connectivity probe: online={}", online);
            network.set_online(online);
        }
    })
}

/// Snapshot of local sync state, printed by the `status` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalStatus {
    pub db_path: String,
    pub signed_in: bool,
    pub snapshot_updated_at: Option<String>,
    pub pending_changes: i64,
    pub oldest_pending_at: Option<String>,
    pub last_error: Option<String>,
}

/// Read local sync state without touching the network.
pub fn local_status(store: &LocalStore) -> Result<LocalStatus> {
    let repository = store.sync_repository();
    let snapshot = repository.read_cached_snapshot()?;
    let pending = repository.list_pending_changes()?;
    let oldest = pending.first();

    Ok(LocalStatus {
        db_path: store.db_path().to_string(),
        signed_in: store.credentials().load().is_some(),
        snapshot_updated_at: snapshot.map(|s| s.updated_at),
        pending_changes: i64::try_from(pending.len()).unwrap_or(i64::MAX),
        oldest_pending_at: oldest.map(|c| c.created_at.clone()),
        last_error: oldest.and_then(|c| c.last_error.clone()),
    })
}
