//! Backoff for idempotent requests.
//!
//! List, detail and badge GETs go through `with_retry`; mutations never do,
//! since a POST that timed out may still have been applied.

use std::future::Future;
use std::time::Duration;

use crate::constants::{MAX_RETRIES, MAX_RETRY_DELAY_SECS, RETRY_INITIAL_DELAY_MS};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            initial_delay: Duration::from_millis(RETRY_INITIAL_DELAY_MS),
            max_delay: Duration::from_secs(MAX_RETRY_DELAY_SECS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
        }
    }

    /// Single attempt, no backoff.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the policy is exhausted. Delays double after each failure, capped at
/// `max_delay`.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, what: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    let mut delay = policy.initial_delay;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() || attempt >= policy.max_retries => {
                if attempt > 0 {
                    tracing::warn!("{} failed after {} attempts: {}", what, attempt + 1, e);
                }
                return Err(e);
            }
            Err(e) => {
                attempt += 1;
                tracing::warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {:?}...",
                    what,
                    attempt,
                    policy.max_retries + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(policy.max_delay);
            }
        }
    }
}

/// Whether an error should be surfaced to the user with a retry affordance.
pub fn offers_retry(error: &Error) -> bool {
    matches!(error, Error::Network(_) | Error::Http { .. })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(100))
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let attempts = AtomicU32::new(0);
        let result = with_retry(&fast(), "fetch", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_network_failures() {
        let attempts = AtomicU32::new(0);
        let result = with_retry(&fast(), "fetch", || {
            let count = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if count < 3 {
                    Err(Error::Network("connection reset".into()))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted() {
        let attempts = AtomicU32::new(0);
        let result: Result<()> = with_retry(&fast(), "fetch", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::Network("down".into())) }
        })
        .await;

        assert!(matches!(result, Err(Error::Network(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 4); // 1 initial + 3 retries
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let attempts = AtomicU32::new(0);
        let result: Result<()> = with_retry(&fast(), "fetch", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async {
                Err(Error::Http {
                    status: 404,
                    url: "/messages/9/json/".into(),
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_offers_retry() {
        assert!(offers_retry(&Error::Network("x".into())));
        assert!(!offers_retry(&Error::Decode("x".into())));
    }
}
