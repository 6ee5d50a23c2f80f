//! Retry / fetch / error-classification core (spec.md §4.11).
//!
//! Every outbound I/O call in the workspace (LLM, price oracle, simulator,
//! security APIs, chain RPC) goes through [`retry_async`] or
//! [`fetch_with_retry`] so backoff, jitter, cancellation, and the error
//! taxonomy are applied uniformly rather than re-implemented per caller.

use std::future::Future;
use std::time::Duration;

use chainclaw_types::error::{classify_io_message, is_retryable_status, ErrorClass};
use rand::Rng;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Backoff policy (spec.md §4.11): `delay = min(initial * factor^(n-1) *
/// (1 + jitter * U[0,1]), max)`, attempts 1-based.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub initial_ms: u64,
    pub factor: f64,
    pub max_ms: u64,
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self { initial_ms: 250, factor: 2.0, max_ms: 30_000, jitter: 0.2 }
    }
}

impl BackoffPolicy {
    /// `attempt` is 1-based. With `jitter = 0` this is exactly
    /// `initial * factor^(attempt-1)` clamped to `max` (spec.md §8:
    /// `computeBackoff(policy, 1)` with jitter 0 equals `initialMs`).
    pub fn delay(&self, attempt: u32, jitter_sample: f64) -> Duration {
        let exp = self.factor.powi((attempt.max(1) - 1) as i32);
        let base = self.initial_ms as f64 * exp;
        let jittered = base * (1.0 + self.jitter * jitter_sample);
        Duration::from_millis(jittered.min(self.max_ms as f64).max(0.0) as u64)
    }
}

/// A classified error returned by [`retry_async`]/[`fetch_with_retry`].
#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("operation aborted")]
    Aborted,
    #[error(transparent)]
    Inner(E),
}

impl<E> RetryError<E> {
    pub fn class(&self) -> ErrorClass
    where
        E: AsRef<str>,
    {
        match self {
            RetryError::Aborted => ErrorClass::Abort,
            RetryError::Inner(e) => classify_io_message(e.as_ref()),
        }
    }
}

/// Options for [`retry_async`].
pub struct RetryOptions<'a, E> {
    pub max_attempts: u32,
    pub policy: BackoffPolicy,
    /// Overrides the computed delay for the next wait (e.g. a server's
    /// `Retry-After` header), consumed once per call.
    pub retry_after: Option<Duration>,
    pub cancellation: Option<&'a CancellationToken>,
    pub should_retry: Option<Box<dyn Fn(&E, u32) -> bool + Send + Sync + 'a>>,
    pub on_retry: Option<Box<dyn Fn(&E, u32, Duration) + Send + Sync + 'a>>,
}

impl<'a, E> Default for RetryOptions<'a, E> {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            policy: BackoffPolicy::default(),
            retry_after: None,
            cancellation: None,
            should_retry: None,
            on_retry: None,
        }
    }
}

/// Runs `fn(attempt)` up to `opts.max_attempts` times (spec.md §4.11,
/// §8: "`fn` is called at most N times; if all fail, the last error is
/// returned; if any succeeds, its value is returned and no further calls
/// are made").
pub async fn retry_async<T, E, F, Fut>(
    mut f: F,
    mut opts: RetryOptions<'_, E>,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        if let Some(token) = opts.cancellation {
            if token.is_cancelled() {
                return Err(RetryError::Aborted);
            }
        }
        match f(attempt).await {
            Ok(v) => return Ok(v),
            Err(err) => {
                let retryable = opts
                    .should_retry
                    .as_ref()
                    .map(|p| p(&err, attempt))
                    .unwrap_or(true);
                if !retryable || attempt >= opts.max_attempts {
                    return Err(RetryError::Inner(err));
                }
                let jitter_sample: f64 = rand::thread_rng().gen_range(0.0..1.0);
                let delay = opts
                    .retry_after
                    .take()
                    .unwrap_or_else(|| opts.policy.delay(attempt, jitter_sample));
                if let Some(cb) = &opts.on_retry {
                    cb(&err, attempt, delay);
                }
                if wait_or_cancel(delay, opts.cancellation).await.is_err() {
                    return Err(RetryError::Aborted);
                }
            }
        }
    }
}

async fn wait_or_cancel(delay: Duration, token: Option<&CancellationToken>) -> Result<(), ()> {
    match token {
        None => {
            tokio::time::sleep(delay).await;
            Ok(())
        }
        Some(token) => tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = token.cancelled() => Err(()),
        },
    }
}

/// Outbound HTTP call wrapped with retry on transient network errors and on
/// the retryable status set `{429, 502, 503, 504}` (spec.md §4.11).
/// Non-retryable statuses (4xx except 429) pass through untouched; the
/// caller still inspects the response.
pub async fn fetch_with_retry<F, Fut>(
    mut send: F,
    max_attempts: u32,
    policy: BackoffPolicy,
    cancellation: Option<&CancellationToken>,
) -> Result<reqwest::Response, RetryError<reqwest::Error>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        if let Some(token) = cancellation {
            if token.is_cancelled() {
                return Err(RetryError::Aborted);
            }
        }
        match send().await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                if is_retryable_status(status) && attempt < max_attempts {
                    let retry_after = resp
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .map(Duration::from_secs);
                    let jitter_sample: f64 = rand::thread_rng().gen_range(0.0..1.0);
                    let delay = retry_after.unwrap_or_else(|| policy.delay(attempt, jitter_sample));
                    tracing::debug!(status, attempt, "fetch_with_retry: retrying on status");
                    if wait_or_cancel(delay, cancellation).await.is_err() {
                        return Err(RetryError::Aborted);
                    }
                    continue;
                }
                return Ok(resp);
            }
            Err(err) => {
                let class = classify_io_message(&err.to_string());
                if attempt >= max_attempts || class != ErrorClass::Transient {
                    return Err(RetryError::Inner(err));
                }
                let jitter_sample: f64 = rand::thread_rng().gen_range(0.0..1.0);
                let delay = policy.delay(attempt, jitter_sample);
                if wait_or_cancel(delay, cancellation).await.is_err() {
                    return Err(RetryError::Aborted);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn zero_jitter_backoff_attempt_one_equals_initial() {
        let policy = BackoffPolicy { jitter: 0.0, ..Default::default() };
        assert_eq!(policy.delay(1, 0.0), Duration::from_millis(policy.initial_ms));
    }

    #[test]
    fn backoff_clamps_to_max() {
        let policy = BackoffPolicy { initial_ms: 1000, factor: 10.0, max_ms: 5000, jitter: 0.0 };
        assert_eq!(policy.delay(5, 0.0), Duration::from_millis(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_async_succeeds_after_failures_without_extra_calls() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, RetryError<&str>> = retry_async(
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err("transient")
                    } else {
                        Ok(attempt)
                    }
                }
            },
            RetryOptions { max_attempts: 5, ..Default::default() },
        )
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_async_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), RetryError<&str>> = retry_async(
            |_attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err("still failing") }
            },
            RetryOptions { max_attempts: 3, ..Default::default() },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn cancellation_aborts_mid_wait() {
        let token = CancellationToken::new();
        token.cancel();
        let result: Result<(), RetryError<&str>> = retry_async(
            |_attempt| async move { Err("transient") },
            RetryOptions { max_attempts: 3, cancellation: Some(&token), ..Default::default() },
        )
        .await;
        assert!(matches!(result, Err(RetryError::Aborted)));
    }
}
