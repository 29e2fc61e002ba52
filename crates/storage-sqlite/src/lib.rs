//! SQLite storage for the PocketLedger sync core.

pub mod db;
pub mod errors;
pub mod schema;
pub mod secrets;
pub mod store;
pub mod sync;

pub use errors::StorageError;
pub use secrets::SqliteSecretStore;
pub use store::{close_local_store, local_store, open_local_store, LocalStore};
pub use sync::SyncStoreRepository;
