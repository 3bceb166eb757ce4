use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff settings for connecting to Postgres at job startup.
///
/// The job runs once and exits, so the defaults lean patient: the usual
/// reason a connect fails here is the database (or its sidecar proxy) not
/// being ready yet, and giving up early just turns a slow start into a
/// failed run.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the initial attempt
    pub max_retries: u32,

    /// Delay before the first retry, in milliseconds
    pub initial_delay_ms: u64,

    /// Ceiling for the backoff delay, in milliseconds
    pub max_delay_ms: u64,

    /// Multiplier applied to the delay after each failed attempt
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Defaults: 5 retries, 250ms initial delay, doubling up to 10s
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay_ms: u64) -> Self {
        self.initial_delay_ms = delay_ms;
        self
    }

    /// The delay that follows `delay`: multiplied, capped at the ceiling
    fn next_delay(&self, delay: u64) -> u64 {
        ((delay as f64 * self.backoff_multiplier) as u64).min(self.max_delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay_ms: 250,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
        }
    }
}

/// Retry an async operation with exponential backoff and jitter.
///
/// Returns the first success, or the last error once `max_retries` is
/// exhausted.
///
/// # Example
/// ```ignore
/// use database::common::retry::{retry_with_backoff, RetryConfig};
///
/// let config = RetryConfig::new().with_max_retries(8);
///
/// let db = retry_with_backoff(
///     || async { database::postgres::connect(&db_url).await },
///     config
/// ).await?;
/// ```
pub async fn retry_with_backoff<F, Fut, T, E>(mut operation: F, config: RetryConfig) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = config.initial_delay_ms;

    for attempt in 0..=config.max_retries {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(attempt = attempt, "Operation succeeded after retrying");
                }
                return Ok(result);
            }
            Err(e) if attempt == config.max_retries => {
                warn!(
                    attempts = config.max_retries + 1,
                    error = %e,
                    "Operation failed; retries exhausted"
                );
                return Err(e);
            }
            Err(e) => {
                let pause = jittered(delay);
                debug!(
                    attempt = attempt + 1,
                    max = config.max_retries + 1,
                    error = %e,
                    pause_ms = pause,
                    "Operation failed; backing off"
                );
                tokio::time::sleep(Duration::from_millis(pause)).await;
                delay = config.next_delay(delay);
            }
        }
    }

    unreachable!("loop returns on the final attempt")
}

/// Randomize a delay to between 50% and 100% of its value.
///
/// Uses `RandomState` hashing of the current time rather than a full RNG;
/// the spread does not need to be uniform, just non-synchronized.
fn jittered(delay: u64) -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::BuildHasher;

    let factor = (RandomState::new().hash_one(std::time::SystemTime::now()) % 50) as f64 / 100.0;
    (delay as f64 * (0.5 + factor)) as u64
}

/// Retry with the startup-connect defaults
///
/// # Example
/// ```ignore
/// use database::common::retry::retry;
///
/// let db = retry(|| async {
///     database::postgres::connect(&db_url).await
/// }).await?;
/// ```
pub async fn retry<F, Fut, T, E>(operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    retry_with_backoff(operation, RetryConfig::default()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick(max_retries: u32) -> RetryConfig {
        RetryConfig::new()
            .with_max_retries(max_retries)
            .with_initial_delay(1)
    }

    #[tokio::test]
    async fn test_first_attempt_success_never_retries() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = retry(|| {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>("connected")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "connected");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = retry_with_backoff(
            || {
                let counter = counter_clone.clone();
                async move {
                    let count = counter.fetch_add(1, Ordering::SeqCst);
                    if count < 2 {
                        Err(format!("not ready yet ({})", count + 1))
                    } else {
                        Ok("connected")
                    }
                }
            },
            quick(5),
        )
        .await;

        assert_eq!(result.unwrap(), "connected");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_return_last_error() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = retry_with_backoff(
            || {
                let counter = counter_clone.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<String, _>("connection refused")
                }
            },
            quick(2),
        )
        .await;

        assert_eq!(result.unwrap_err(), "connection refused");
        assert_eq!(counter.load(Ordering::SeqCst), 3); // 1 initial + 2 retries
    }

    #[test]
    fn test_defaults_favor_patience() {
        let config = RetryConfig::default();

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.initial_delay_ms, 250);
        assert_eq!(config.max_delay_ms, 10_000);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = RetryConfig::default();

        let mut delay = config.initial_delay_ms;
        let mut seen = Vec::new();
        for _ in 0..8 {
            delay = config.next_delay(delay);
            seen.push(delay);
        }

        assert_eq!(&seen[..6], &[500, 1000, 2000, 4000, 8000, 10_000]);
        assert!(seen.iter().all(|&d| d <= config.max_delay_ms));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        for _ in 0..10 {
            let value = jittered(1000);
            assert!((500..=1000).contains(&value));
        }
    }
}
