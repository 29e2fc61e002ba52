//! Secret store backed by the local database.

use std::sync::Arc;

use diesel::prelude::*;

use pocketledger_core::errors::Result;
use pocketledger_core::secrets::SecretStore;
use pocketledger_core::sync::sync_timestamp;

use crate::db::{get_connection, DbPool};
use crate::errors::StorageError;
use crate::schema::secrets;

/// Stores secrets in the `secrets` table.
///
/// `SecretStore` is synchronous, so writes use a pooled connection directly
/// instead of the writer actor; SQLite's busy timeout serialises them.
pub struct SqliteSecretStore {
    pool: Arc<DbPool>,
}

impl SqliteSecretStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

impl SecretStore for SqliteSecretStore {
    fn get_secret(&self, key: &str) -> Result<Option<String>> {
        let mut conn = get_connection(&self.pool)?;
        let value = secrets::table
            .find(key)
            .select(secrets::value)
            .first::<String>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(value)
    }

    fn set_secret(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = get_connection(&self.pool)?;
        let now = sync_timestamp();
        diesel::insert_into(secrets::table)
            .values((
                secrets::key.eq(key),
                secrets::value.eq(value),
                secrets::updated_at.eq(now.as_str()),
            ))
            .on_conflict(secrets::key)
            .do_update()
            .set((secrets::value.eq(value), secrets::updated_at.eq(now.as_str())))
            .execute(&mut conn)
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn delete_secret(&self, key: &str) -> Result<()> {
        let mut conn = get_connection(&self.pool)?;
        diesel::delete(secrets::table.find(key))
            .execute(&mut conn)
            .map_err(StorageError::from)?;
        Ok(())
    }
}
