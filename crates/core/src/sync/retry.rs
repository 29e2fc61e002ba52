//! Retry classification and backoff helpers for queue replay.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Retry policy classification for remote failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRetryClass {
    Retryable,
    Permanent,
    ReauthRequired,
}

/// Classify HTTP status into retry behavior.
pub fn classify_http_status(status: u16) -> SyncRetryClass {
    match status {
        401 | 403 => SyncRetryClass::ReauthRequired,
        408 | 409 | 423 | 425 | 429 => SyncRetryClass::Retryable,
        500..=599 => SyncRetryClass::Retryable,
        _ => SyncRetryClass::Permanent,
    }
}

/// Exponential backoff in seconds with cap.
pub fn backoff_seconds(consecutive_failures: i32) -> i64 {
    const MAX_EXPONENT: i32 = 8;
    const BASE_DELAY_SECONDS: i64 = 5;

    let capped = i64::from(consecutive_failures.clamp(0, MAX_EXPONENT));
    2_i64.pow(capped as u32) * BASE_DELAY_SECONDS
}

/// Backoff delay plus up to `max_jitter` of random spread.
pub fn backoff_with_jitter(consecutive_failures: i32, max_jitter: Duration) -> Duration {
    let base = Duration::from_secs(backoff_seconds(consecutive_failures).unsigned_abs());
    let jitter_bound = max_jitter.as_millis() as u64;
    if jitter_bound == 0 {
        return base;
    }
    let jitter = rand::thread_rng().gen_range(0..=jitter_bound);
    base + Duration::from_millis(jitter)
}
