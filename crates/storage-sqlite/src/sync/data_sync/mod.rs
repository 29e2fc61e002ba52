//! SQLite persistence for the snapshot cache and the pending-change queue.

mod model;
mod repository;

pub use repository::SyncStoreRepository;
