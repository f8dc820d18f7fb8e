/// Retry presets for the external systems Vidvault talks to
use crate::retry::RetryConfig;
use std::time::Duration;

/// Object storage reads (GET through presigned URLs)
///
/// - 3 retries, 100ms → 2s, jittered
pub fn object_storage_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 3,
        initial_backoff: Duration::from_millis(100),
        max_backoff: Duration::from_secs(2),
        backoff_multiplier: 2.0,
        jitter: true,
    }
}

/// Transcode job API calls (submit / status)
///
/// - 4 retries, 250ms → 5s, jittered
pub fn job_api_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 4,
        initial_backoff: Duration::from_millis(250),
        max_backoff: Duration::from_secs(5),
        backoff_multiplier: 2.0,
        jitter: true,
    }
}
