use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::client::error::FetchError;

/// Bounded linear-backoff retry shared by every outbound read.
///
/// The defaults mirror the observed production values: at most 3 attempts,
/// waiting 3s, then 4s, between them.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub increment: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(3000),
            increment: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempt ceiling is reached.
    ///
    /// Rate-limit and client-error failures surface immediately. Transient
    /// failures sleep `base_delay + (attempt - 1) * increment` and run again;
    /// once `max_attempts` transient failures have accumulated the caller gets
    /// [`FetchError::Unreachable`]. Dropping the returned future while it is
    /// waiting abandons the scheduled retry, so a torn-down consumer never
    /// observes a late attempt.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("succeeded on attempt {attempt}");
                    }
                    return Ok(value);
                }
                Err(FetchError::Transient { message }) => {
                    if attempt >= self.max_attempts {
                        warn!("giving up after {attempt} attempts: {message}");
                        return Err(FetchError::Unreachable {
                            attempts: attempt,
                            last: message,
                        });
                    }
                    let delay = self.base_delay + self.increment * (attempt - 1);
                    warn!(
                        "attempt {attempt} failed ({message}), retrying in {}ms",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(other) => return Err(other),
            }
        }
    }
}
