//! Data-sync domain models.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Logical id of the single cached financial-data snapshot.
pub const FINANCIAL_DATA_SNAPSHOT_ID: &str = "primary";

/// Application-defined financial document (accounts, transactions, ...).
/// The sync core never looks inside it.
pub type FinancialDocument = serde_json::Value;

/// Remote resources a pending change can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncEntity {
    FinancialData,
}

/// Supported mutation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    Create,
    Update,
    Delete,
}

/// The cached copy of the financial document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialDataSnapshot {
    pub id: String,
    pub data: FinancialDocument,
    pub updated_at: String,
}

/// A mutation waiting for remote delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingChange {
    /// Assigned by the store on insertion.
    pub id: Option<i64>,
    pub entity: SyncEntity,
    pub op: SyncOperation,
    pub payload: FinancialDocument,
    pub created_at: String,
    /// Credential in effect when the change was queued.
    pub auth_token: Option<String>,
    pub attempt_count: i32,
    pub last_error: Option<String>,
    pub last_attempt_at: Option<String>,
}

impl PendingChange {
    pub fn new(
        entity: SyncEntity,
        op: SyncOperation,
        payload: FinancialDocument,
        auth_token: Option<String>,
    ) -> Self {
        Self {
            id: None,
            entity,
            op,
            payload,
            created_at: sync_timestamp(),
            auth_token,
            attempt_count: 0,
            last_error: None,
            last_attempt_at: None,
        }
    }

    /// Full-document overwrite of the financial data resource.
    pub fn financial_data_update(payload: FinancialDocument, auth_token: Option<String>) -> Self {
        Self::new(
            SyncEntity::FinancialData,
            SyncOperation::Update,
            payload,
            auth_token,
        )
    }
}

/// Caller options for [`crate::sync::SyncEngine::write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Queue the change when the remote write fails.
    pub enqueue_on_fail: bool,
    /// Ask the transport to let the request outlive the caller.
    pub keepalive: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            enqueue_on_fail: true,
            keepalive: false,
        }
    }
}

/// How a drain invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainStatus {
    /// Every queued change was delivered.
    Completed,
    /// A replay failed; it and everything after it stay queued.
    Halted,
    /// Another drain of the same engine was in progress.
    AlreadyRunning,
    /// Local storage failed while draining.
    Failed,
}

/// Summary of one drain invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    pub status: DrainStatus,
    pub replayed: usize,
    pub remaining: usize,
}

impl DrainReport {
    pub fn already_running() -> Self {
        Self {
            status: DrainStatus::AlreadyRunning,
            replayed: 0,
            remaining: 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == DrainStatus::Completed
    }
}

/// UTC timestamp used for cache and queue rows.
///
/// Fixed-width RFC 3339 with microseconds so lexical order matches time order.
pub fn sync_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
