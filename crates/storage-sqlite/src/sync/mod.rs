//! SQLite storage for the offline-first sync layer.

pub mod data_sync;

pub use data_sync::SyncStoreRepository;
