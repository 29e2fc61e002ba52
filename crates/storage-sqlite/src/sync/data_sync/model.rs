//! Database models for the sync store tables.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = crate::schema::financial_data_cache)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct FinancialDataCacheDB {
    pub id: String,
    pub data: String,
    pub updated_at: String,
}

#[derive(Queryable, Identifiable, Selectable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::pending_changes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PendingChangeDB {
    pub id: i64,
    pub entity: String,
    pub op: String,
    pub payload: String,
    pub created_at: String,
    pub auth_token: Option<String>,
    pub attempt_count: i32,
    pub last_error: Option<String>,
    pub last_attempt_at: Option<String>,
}

/// Row inserted into the queue; the id is assigned by SQLite.
#[derive(Insertable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::pending_changes)]
pub struct NewPendingChangeDB {
    pub entity: String,
    pub op: String,
    pub payload: String,
    pub created_at: String,
    pub auth_token: Option<String>,
    pub attempt_count: i32,
}
