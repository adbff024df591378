//! Exponential backoff for synchronous engine calls.
//!
//! The envelope is bounded by elapsed time rather than attempt count: the
//! operation is retried until `max_elapsed` has passed since the first
//! attempt, then the last error is returned.

use std::future::Future;
use std::time::Duration;

use ac_domain::config::BackoffConfig;
use ac_domain::error::Result;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub max_elapsed: Duration,
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from(&BackoffConfig::default())
    }
}

impl From<&BackoffConfig> for BackoffPolicy {
    fn from(cfg: &BackoffConfig) -> Self {
        Self {
            initial_interval: Duration::from_millis(cfg.initial_interval_ms),
            max_interval: Duration::from_millis(cfg.max_interval_ms),
            max_elapsed: Duration::from_millis(cfg.max_elapsed_ms),
            multiplier: cfg.multiplier.max(1.0),
        }
    }
}

/// Successful result of [`retry`] with the number of attempts it took.
#[derive(Debug)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
}

/// Run `op` until it succeeds or the elapsed-time envelope is exhausted.
pub async fn retry<T, F, Fut>(policy: &BackoffPolicy, label: &str, mut op: F) -> Result<Retried<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let mut interval = policy.initial_interval;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match op().await {
            Ok(value) => return Ok(Retried { value, attempts }),
            Err(e) => {
                let elapsed = started.elapsed();
                if elapsed >= policy.max_elapsed {
                    tracing::warn!(
                        label,
                        attempts,
                        elapsed_ms = elapsed.as_millis() as u64,
                        error = %e,
                        "retries exhausted"
                    );
                    return Err(e);
                }
                tracing::debug!(
                    label,
                    attempt = attempts,
                    retry_in_ms = interval.as_millis() as u64,
                    error = %e,
                    "attempt failed, backing off"
                );
                tokio::time::sleep(interval).await;
                interval = interval.mul_f64(policy.multiplier).min(policy.max_interval);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_domain::error::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn always_failing_call_retries_for_about_a_minute() {
        let policy = BackoffPolicy::default();
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let res: Result<Retried<()>> = retry(&policy, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::Http("503".into())) }
        })
        .await;

        let elapsed = started.elapsed();
        match res {
            Err(Error::Http(msg)) => assert_eq!(msg, "503"),
            other => panic!("expected the underlying error, got {other:?}"),
        }
        assert!(elapsed >= Duration::from_secs(60), "gave up after {elapsed:?}");
        assert!(elapsed <= Duration::from_secs(71), "kept going until {elapsed:?}");
        let n = calls.load(Ordering::SeqCst);
        assert!((10..=13).contains(&n), "unexpected attempt count {n}");
    }

    #[tokio::test(start_paused = true)]
    async fn interval_is_capped() {
        let policy = BackoffPolicy {
            initial_interval: Duration::from_secs(4),
            max_interval: Duration::from_secs(5),
            max_elapsed: Duration::from_secs(20),
            multiplier: 3.0,
        };
        let started = Instant::now();
        let calls = AtomicU32::new(0);
        let _ = retry(&policy, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(Error::Http("down".into())) }
        })
        .await;
        // Sleeps: 4, 5, 5, 5, 5 -> last attempt at t=24s.
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(24) && elapsed < Duration::from_secs(25));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let policy = BackoffPolicy::default();
        let calls = AtomicU32::new(0);
        let res = retry(&policy, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::Timeout("slow".into()))
                } else {
                    Ok("reply")
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(res.value, "reply");
        assert_eq!(res.attempts, 3);
    }
}
