//! Polling for conditions that become true asynchronously.

use anyhow::Result;
use std::{future::Future, time::Duration};
use thiserror::Error;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, trace};

pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(10);
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// Retries a check until it succeeds or `max_wait` has elapsed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Poller {
    max_wait: Duration,
    interval: Duration,
}

impl Default for Poller {
    fn default() -> Self {
        Poller::new(DEFAULT_MAX_WAIT, DEFAULT_INTERVAL)
    }
}

/// No check completed before the deadline, so there is no failure to report.
#[derive(Debug, Error)]
#[error("no check completed within {waited:?} ({attempts} attempts)")]
pub struct WaitTimeout {
    pub waited: Duration,
    pub attempts: u32,
}

impl Poller {
    pub fn new(max_wait: Duration, interval: Duration) -> Self {
        Poller { max_wait, interval }
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs `check` until it returns `Ok`, pausing `interval` between attempts.
    ///
    /// Any error returned by `check` is treated as "not yet": assertion
    /// failures and transient driver errors alike. Once `max_wait` is used
    /// up, the error of the last completed attempt is returned unchanged. A
    /// check still running at the deadline is abandoned; if none ever
    /// completed, a [`WaitTimeout`] is returned instead.
    ///
    /// `check` always runs at least once, even with a zero `max_wait`.
    pub async fn until<T, F, Fut>(&self, mut check: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let start = Instant::now();
        let deadline = start + self.max_wait;
        let mut attempts = 0;
        let mut last_failure = None;

        loop {
            attempts += 1;
            let budget = deadline.saturating_duration_since(Instant::now());
            match timeout(budget, check()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) => {
                    trace!(attempt = attempts, error = %err, "condition not met yet");
                    last_failure = Some(err);
                }
                Err(_) => break,
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            sleep(self.interval.min(remaining)).await;
        }

        debug!(attempts, waited = ?start.elapsed(), "giving up on condition");
        Err(last_failure.unwrap_or_else(|| {
            WaitTimeout {
                waited: self.max_wait,
                attempts,
            }
            .into()
        }))
    }
}
