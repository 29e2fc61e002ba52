//! HTTP client for the PocketLedger financial-data API.

mod client;
mod error;
mod types;

pub use client::DataApiClient;
pub use error::{DataApiError, Result};
pub use types::{ApiErrorResponse, FINANCIAL_DATA_PATH};
