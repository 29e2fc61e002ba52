//! Offline-first sync domain models and services.

mod connectivity;
mod engine;
mod model;
mod remote;
mod retry;
mod traits;
mod trigger;

pub use connectivity::*;
pub use engine::*;
pub use model::*;
pub use remote::*;
pub use retry::*;
pub use traits::*;
pub use trigger::*;
