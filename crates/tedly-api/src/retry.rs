// Bounded fixed-delay retry.
//
// Every vendor call is wrapped in a `RetryPolicy`. Each attempt re-runs the
// whole operation from the top (token check, request, polling), so the
// closure passed to `run` must build a fresh future per call.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::Error;

/// Fixed-delay retry budget.
///
/// `max_retries` counts the attempts made *after* the first one, so a
/// budget of 3 allows up to four attempts in total. No jitter and no
/// exponential growth: request volume is one poll every few seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Default policy for the token endpoint: 3 retries, 2 s apart.
    pub const TOKEN: Self = Self {
        max_retries: 3,
        delay: Duration::from_millis(2000),
    };

    /// Default policy for API calls: 3 retries, 5 s apart.
    pub const API: Self = Self {
        max_retries: 3,
        delay: Duration::from_millis(5000),
    };

    pub const fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Run `op` until it succeeds, fails fatally, or the budget is spent.
    ///
    /// The error of the last attempt is returned on exhaustion. Fatal
    /// errors (see [`Error::is_fatal`]) are returned immediately.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let mut retries_left = self.max_retries;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_fatal() || retries_left == 0 => return Err(e),
                Err(e) => {
                    retries_left -= 1;
                    warn!(
                        error = %e,
                        retries_left,
                        delay_ms = self.delay.as_millis(),
                        "{what} failed, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn api_error() -> Error {
        Error::Api {
            status: 503,
            message: "unavailable".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_the_attempt_after_budget_failures() {
        let policy = RetryPolicy::new(3, Duration::from_secs(5));
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let value = policy
            .run("flaky", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 3 {
                    Err(api_error())
                } else {
                    Ok(42)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn surfaces_last_error_when_budget_is_spent() {
        let policy = RetryPolicy::new(2, Duration::from_secs(5));
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), Error> = policy
            .run("broken", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(api_error())
            })
            .await;

        assert!(matches!(result, Err(Error::Api { status: 503, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_fixed_delay_between_attempts() {
        let policy = RetryPolicy::new(2, Duration::from_secs(5));
        let start = tokio::time::Instant::now();

        let _ = policy
            .run("broken", || async { Err::<(), _>(api_error()) })
            .await;

        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_errors_are_not_retried() {
        let policy = RetryPolicy::API;
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), Error> = policy
            .run("auth", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::Authentication {
                    message: "rejected".into(),
                })
            })
            .await;

        assert!(matches!(result, Err(Error::Authentication { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
