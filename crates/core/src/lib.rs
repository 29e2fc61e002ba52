//! Core domain of the PocketLedger offline-first sync layer.
//!
//! Storage and transport live in sibling crates and plug in through the
//! traits in [`sync`] and [`secrets`].

pub mod errors;
pub mod secrets;
pub mod sync;

pub use errors::{DatabaseError, Error, Result};
