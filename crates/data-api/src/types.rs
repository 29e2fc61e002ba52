//! Wire types for the data API.

use serde::{Deserialize, Serialize};

/// Error body returned by the API on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
    pub code: String,
    pub message: String,
}

/// Path of the financial-data resource.
pub const FINANCIAL_DATA_PATH: &str = "/api/data";
