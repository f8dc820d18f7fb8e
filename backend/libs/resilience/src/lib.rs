/// Resilience helpers for calls to external collaborators
///
/// - **Retry**: bounded exponential backoff with jitter, with a predicate that
///   separates transient failures (retried) from permanent ones (returned at once)
///
/// # Example
///
/// ```rust,no_run
/// use resilience::{presets, with_retry_if};
///
/// # async fn run() {
/// let result = with_retry_if(
///     presets::object_storage_retry(),
///     || async { Err::<(), _>("503 Slow Down") },
///     |err: &&str| err.starts_with('5'),
/// )
/// .await;
/// # }
/// ```

pub mod presets;
pub mod retry;

pub use retry::{with_retry, with_retry_if, RetryConfig, RetryError};
