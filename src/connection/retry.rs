//! Bounded fixed-interval retry for readiness probes.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::errors::{Error, Result};

/// Delay between two probe attempts.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Probe attempts before giving up.
pub const MAX_ATTEMPTS: u32 = 10;

/// Outcome of one probe attempt.
#[derive(Debug)]
pub enum Probe<T> {
    /// Target is ready
    Ready(T),
    /// Not ready yet, worth asking again
    Retry(String),
    /// Terminal answer, retrying cannot change it
    Permanent(Error),
}

/// Retry schedule: fixed interval, bounded attempts, bounded by a deadline.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { interval: RETRY_INTERVAL, max_attempts: MAX_ATTEMPTS }
    }
}

impl RetryPolicy {
    /// Run `probe` until it reports ready or permanent, attempts run out, or
    /// `timeout` elapses.
    ///
    /// A probe still in flight when the deadline passes is abandoned.
    pub async fn run<T, F, Fut>(&self, operation: &str, timeout: Duration, mut probe: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Probe<T>>,
    {
        let deadline = Instant::now() + timeout;
        let timed_out = || Error::timeout(operation, timeout.as_millis() as u64);
        let mut last_reason = String::new();

        for attempt in 1..=self.max_attempts {
            let outcome = tokio::time::timeout_at(deadline, probe()).await.map_err(|_| timed_out())?;

            match outcome {
                Probe::Ready(value) => {
                    debug!(operation, attempt, "Probe succeeded");
                    return Ok(value);
                }
                Probe::Permanent(error) => {
                    warn!(operation, attempt, error = %error, "Probe failed permanently");
                    return Err(error);
                }
                Probe::Retry(reason) => {
                    debug!(operation, attempt, reason = %reason, "Not ready, retrying");
                    last_reason = reason;
                }
            }

            if attempt < self.max_attempts {
                if Instant::now() + self.interval > deadline {
                    return Err(timed_out());
                }
                tokio::time::sleep(self.interval).await;
            }
        }

        Err(Error::connection(format!(
            "{} not ready after {} attempts: {}",
            operation, self.max_attempts, last_reason
        )))
    }
}
