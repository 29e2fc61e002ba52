//! Connectivity-driven drain scheduling.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::connectivity::NetworkStatus;
use super::engine::SyncEngine;
use super::model::{DrainReport, DrainStatus};
use super::retry::backoff_with_jitter;

/// Maximum jitter added to periodic retry delays.
pub const DRAIN_RETRY_JITTER_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerConfig {
    /// Retry draining with backoff while online and the queue is non-empty.
    pub retry_while_pending: bool,
    pub max_jitter: Duration,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            retry_while_pending: true,
            max_jitter: Duration::from_secs(DRAIN_RETRY_JITTER_SECS),
        }
    }
}

/// Runs a drain at startup when online and once per transition to online.
///
/// The stored credential is read here, at the outermost layer, and passed to
/// the engine explicitly.
pub struct ConnectivityTrigger {
    engine: Arc<SyncEngine>,
    config: TriggerConfig,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectivityTrigger {
    pub fn new(engine: Arc<SyncEngine>, config: TriggerConfig) -> Self {
        Self {
            engine,
            config,
            task: Mutex::new(None),
        }
    }

    /// Spawn the trigger loop. No-op while a loop is already running.
    pub async fn start(&self) {
        let mut guard = self.task.lock().await;
        if let Some(handle) = guard.as_ref() {
            if !handle.is_finished() {
                return;
            }
            guard.take();
        }

        let engine = Arc::clone(&self.engine);
        let config = self.config;
        *guard = Some(tokio::spawn(run_trigger_loop(engine, config)));
    }

    pub async fn stop(&self) {
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
        }
    }

    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

async fn drain_with_stored_credential(engine: &SyncEngine) -> DrainReport {
    let token = engine.credentials().load();
    engine.drain_queue(token.as_deref()).await
}

fn has_pending(engine: &SyncEngine) -> bool {
    match engine.pending_change_count() {
        Ok(count) => count > 0,
        Err(err) => {
            warn!("[DataSync] Failed to count pending changes: {}", err);
            false
        }
    }
}

async fn run_trigger_loop(engine: Arc<SyncEngine>, config: TriggerConfig) {
    let network: NetworkStatus = engine.network().clone();
    let mut online_rx = network.subscribe();
    let mut was_online = *online_rx.borrow_and_update();
    let mut consecutive_failures: i32 = 0;

    if was_online {
        debug!("[DataSync] Online at startup, draining queue");
        let report = drain_with_stored_credential(&engine).await;
        consecutive_failures = next_failure_count(consecutive_failures, &report);
    }

    loop {
        let retry_delay = if config.retry_while_pending && was_online && has_pending(&engine) {
            Some(backoff_with_jitter(consecutive_failures, config.max_jitter))
        } else {
            None
        };

        tokio::select! {
            changed = online_rx.changed() => {
                if changed.is_err() {
                    debug!("[DataSync] Network status dropped, stopping trigger");
                    break;
                }
                let online = *online_rx.borrow_and_update();
                if online && !was_online {
                    info!("[DataSync] Became online, draining queue");
                    consecutive_failures = 0;
                    let report = drain_with_stored_credential(&engine).await;
                    consecutive_failures = next_failure_count(consecutive_failures, &report);
                }
                was_online = online;
            }
            _ = sleep_for(retry_delay) => {
                debug!(
                    "[DataSync] Retrying drain after {} consecutive failure(s)",
                    consecutive_failures
                );
                let report = drain_with_stored_credential(&engine).await;
                consecutive_failures = next_failure_count(consecutive_failures, &report);
            }
        }
    }
}

async fn sleep_for(delay: Option<Duration>) {
    match delay {
        Some(delay) => tokio::time::sleep(delay).await,
        None => std::future::pending::<()>().await,
    }
}

fn next_failure_count(current: i32, report: &DrainReport) -> i32 {
    match report.status {
        DrainStatus::Completed => 0,
        DrainStatus::Halted | DrainStatus::Failed => current.saturating_add(1),
        DrainStatus::AlreadyRunning => current,
    }
}
