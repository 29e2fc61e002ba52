//! Process-wide local store handle.
//!
//! The database is opened once per process. Concurrent first callers of
//! [`open_local_store`] all receive the same handle; [`close_local_store`]
//! releases it so the next open starts fresh.

use std::sync::{Arc, Mutex};

use log::info;

use pocketledger_core::errors::{DatabaseError, Error, Result};
use pocketledger_core::secrets::CredentialStore;

use crate::db::{self, WriteHandle};
use crate::secrets::SqliteSecretStore;
use crate::sync::SyncStoreRepository;

static LOCAL_STORE: Mutex<Option<Arc<LocalStore>>> = Mutex::new(None);

/// Everything backed by the local database file.
pub struct LocalStore {
    db_path: String,
    sync_repository: Arc<SyncStoreRepository>,
    secret_store: Arc<SqliteSecretStore>,
}

impl LocalStore {
    /// Open (creating and migrating if needed) the database under
    /// `app_data_dir`. Prefer [`open_local_store`] outside tests.
    pub fn open(app_data_dir: &str) -> Result<Self> {
        let db_path = db::init(app_data_dir)?;
        db::run_migrations(&db_path)?;
        let pool = db::create_pool(&db_path)?;
        let writer: WriteHandle = db::spawn_writer(pool.as_ref().clone())?;

        Ok(Self {
            sync_repository: Arc::new(SyncStoreRepository::new(Arc::clone(&pool), writer)),
            secret_store: Arc::new(SqliteSecretStore::new(Arc::clone(&pool))),
            db_path,
        })
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    pub fn sync_repository(&self) -> Arc<SyncStoreRepository> {
        Arc::clone(&self.sync_repository)
    }

    pub fn secret_store(&self) -> Arc<SqliteSecretStore> {
        Arc::clone(&self.secret_store)
    }

    pub fn credentials(&self) -> CredentialStore {
        CredentialStore::new(self.secret_store())
    }
}

fn poisoned() -> Error {
    Error::Database(DatabaseError::Internal(
        "Local store handle is poisoned".to_string(),
    ))
}

/// Shared handle to the local store, opening it on first use.
///
/// Fails if a handle for a different directory is already open.
pub fn open_local_store(app_data_dir: &str) -> Result<Arc<LocalStore>> {
    let mut slot = LOCAL_STORE.lock().map_err(|_| poisoned())?;
    let requested_path = db::db_path_for(app_data_dir);

    if let Some(existing) = slot.as_ref() {
        if existing.db_path == requested_path {
            return Ok(Arc::clone(existing));
        }
        return Err(Error::Database(DatabaseError::Internal(format!(
            "Local store already open at {}",
            existing.db_path
        ))));
    }

    let store = Arc::new(LocalStore::open(app_data_dir)?);
    info!("Opened local store at {}", store.db_path);
    *slot = Some(Arc::clone(&store));
    Ok(store)
}

/// The open handle, if any.
pub fn local_store() -> Option<Arc<LocalStore>> {
    LOCAL_STORE.lock().ok().and_then(|slot| slot.clone())
}

/// Release the process-wide handle. Returns `false` if none was open.
///
/// Existing clones stay usable; the database closes when the last one drops.
pub fn close_local_store() -> bool {
    match LOCAL_STORE.lock() {
        Ok(mut slot) => slot.take().is_some(),
        Err(_) => false,
    }
}
