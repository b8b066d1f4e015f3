//! Retry-with-backoff helper (§4.A retry policy, §5 timeouts).
//!
//! Grounded in the teacher's jitter/backoff conventions (`utils::jitter`,
//! `fastrand` for jitter) but scoped to exactly what the retry policy
//! specifies: 3 attempts, 250ms/1s/4s base delays, ±20% jitter, and only
//! [`PortalError::is_retryable`] kinds retried.

use std::time::Duration;

use crate::config::defaults::{DEFAULT_RETRY_BASE_DELAYS_MS, DEFAULT_RETRY_JITTER_PCT};
use crate::errors::PortalError;

/// Runs `attempt` up to 3 times, retrying only on retryable [`PortalError`]s
/// with exponential backoff and ±20% jitter between attempts.
pub async fn with_retry<T, F, Fut>(mut attempt: F) -> Result<T, PortalError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, PortalError>>,
{
    let mut last_err = None;
    for (i, base_delay_ms) in DEFAULT_RETRY_BASE_DELAYS_MS.iter().enumerate() {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() => {
                last_err = Some(err);
                if i + 1 < DEFAULT_RETRY_BASE_DELAYS_MS.len() {
                    tokio::time::sleep(jittered_delay(*base_delay_ms)).await;
                }
            }
            Err(err) => return Err(err),
        }
    }
    Err(last_err.expect("at least one attempt was made"))
}

fn jittered_delay(base_ms: u64) -> Duration {
    let jitter_range = (base_ms as f64 * DEFAULT_RETRY_JITTER_PCT) as i64;
    let jitter = fastrand::i64(-jitter_range..=jitter_range);
    let millis = (base_ms as i64 + jitter).max(0) as u64;
    Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_retryable_errors_up_to_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<(), PortalError> = with_retry(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(PortalError::Unreachable("down".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn auth_failed_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), PortalError> = with_retry(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(PortalError::AuthFailed("bad mac".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let result = with_retry(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 1 {
                    Err(PortalError::Throttled("429".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }
}
