//! Transport contract for the remote financial-data resource.

use async_trait::async_trait;

use super::model::FinancialDocument;

/// Result of reading the remote document.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Fetched(FinancialDocument),
    NotFound,
    /// Any other non-success status.
    Rejected { status: u16 },
    /// Network failure or an unreadable body.
    TransportFailure(String),
}

/// Result of writing the remote document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    Rejected { status: u16 },
    TransportFailure(String),
}

impl SendOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Let the request finish even if the caller goes away.
    pub keepalive: bool,
    /// Log failures at debug level only. Used during automated replay.
    pub suppress_errors: bool,
}

/// Authenticated access to the remote financial-data resource.
///
/// Implementations never return errors: every failure is folded into the
/// outcome so callers can fall back to the cache or the queue.
#[async_trait]
pub trait RemoteDataApi: Send + Sync {
    async fn fetch_data(&self, token: &str) -> FetchOutcome;

    async fn send_data(
        &self,
        data: &FinancialDocument,
        token: &str,
        options: SendOptions,
    ) -> SendOutcome;
}
