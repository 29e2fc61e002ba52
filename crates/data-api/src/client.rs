//! HTTP client for the financial-data resource.
//!
//! The resource is a single JSON document per user, read with `GET` and
//! overwritten with `POST`. Requests are authenticated with a bearer token.

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONNECTION, CONTENT_TYPE};
use std::time::Duration;

use pocketledger_core::sync::{
    FetchOutcome, FinancialDocument, RemoteDataApi, SendOptions, SendOutcome,
};

use crate::error::{DataApiError, Result};
use crate::types::{ApiErrorResponse, FINANCIAL_DATA_PATH};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const PROBE_TIMEOUT_SECS: u64 = 5;
const MAX_LOG_BODY_CHARS: usize = 512;

/// Client for the financial-data API.
#[derive(Debug, Clone)]
pub struct DataApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl DataApiClient {
    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("API response error ({}): {}", status, preview);
    }

    /// Create a new data API client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the API (e.g., "https://api.pocketledger.app")
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn data_url(&self) -> String {
        format!("{}{}", self.base_url, FINANCIAL_DATA_PATH)
    }

    /// Create headers for an API request.
    fn headers(&self, token: &str, keepalive: bool) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| DataApiError::auth("Invalid access token format"))?;
        headers.insert(AUTHORIZATION, auth_value);

        if keepalive {
            headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        }

        Ok(headers)
    }

    fn error_from_body(status: reqwest::StatusCode, body: &str) -> DataApiError {
        if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(body) {
            return DataApiError::api(
                status.as_u16(),
                format!("{}: {}", error.code, error.message),
            );
        }
        DataApiError::api(status.as_u16(), format!("Request failed: {}", body))
    }

    /// Parse a JSON response body.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            return Err(Self::error_from_body(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            log::error!("Failed to deserialize financial data: {}", e);
            DataApiError::from(e)
        })
    }

    /// Check the status of a response whose body is not needed.
    async fn expect_success(response: reqwest::Response) -> Result<()> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            return Err(Self::error_from_body(status, &body));
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Financial data
    // ─────────────────────────────────────────────────────────────────────────

    /// Fetch the user's financial document.
    pub async fn get_data(&self, token: &str) -> Result<FinancialDocument> {
        let url = self.data_url();
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .headers(self.headers(token, false)?)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Overwrite the user's financial document.
    pub async fn post_data(
        &self,
        data: &FinancialDocument,
        token: &str,
        keepalive: bool,
    ) -> Result<()> {
        let url = self.data_url();
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .headers(self.headers(token, keepalive)?)
            .json(data)
            .send()
            .await?;

        Self::expect_success(response).await
    }

    /// Post on a detached task so the request completes even if the caller
    /// is dropped mid-flight.
    async fn post_data_detached(&self, data: &FinancialDocument, token: &str) -> Result<()> {
        let client = self.clone();
        let data = data.clone();
        let token = token.to_string();

        tokio::spawn(async move { client.post_data(&data, &token, true).await })
            .await
            .map_err(|e| {
                DataApiError::invalid_request(format!("Keepalive request aborted: {}", e))
            })?
    }

    /// Whether the API host answers at all.
    ///
    /// Any HTTP response counts, including auth failures; only transport
    /// errors mean the host is unreachable.
    pub async fn probe(&self) -> bool {
        match self
            .client
            .get(self.data_url())
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .send()
            .await
        {
            Ok(response) => {
                debug!("Connectivity probe answered with {}", response.status());
                true
            }
            Err(err) => {
                debug!("Connectivity probe failed: {}", err);
                false
            }
        }
    }
}

#[async_trait]
impl RemoteDataApi for DataApiClient {
    async fn fetch_data(&self, token: &str) -> FetchOutcome {
        match self.get_data(token).await {
            Ok(data) => FetchOutcome::Fetched(data),
            Err(err) => {
                debug!(
                    "Fetching financial data failed ({:?}): {}",
                    err.retry_class(),
                    err
                );
                err.into_fetch_outcome()
            }
        }
    }

    async fn send_data(
        &self,
        data: &FinancialDocument,
        token: &str,
        options: SendOptions,
    ) -> SendOutcome {
        let result = if options.keepalive {
            self.post_data_detached(data, token).await
        } else {
            self.post_data(data, token, false).await
        };

        match result {
            Ok(()) => SendOutcome::Delivered,
            Err(err) => {
                let class = err.retry_class();
                if options.suppress_errors {
                    debug!("Sending financial data failed ({:?}): {}", class, err);
                } else {
                    warn!("Sending financial data failed ({:?}): {}", class, err);
                }
                err.into_send_outcome()
            }
        }
    }
}
