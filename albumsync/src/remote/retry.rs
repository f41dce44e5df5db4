use std::future::Future;
use std::time::Duration;

use albumsync_disk::DiskError;
use rand::Rng;

/// Errors that say whether repeating the same request may succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for DiskError {
    fn is_retryable(&self) -> bool {
        DiskError::is_retryable(self)
    }
}

/// How often, and how patiently, a remote call is repeated.
///
/// The wait before retry `n` doubles from `first_delay` up to `max_delay`.
/// Half of it is always waited and the other half is random, so parallel
/// uploads hitting the same rate limit spread out without retrying
/// immediately.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    first_delay: Duration,
    max_delay: Duration,
    max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            first_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            max_attempts: 4,
        }
    }
}

impl RetryPolicy {
    pub fn new(first_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            first_delay,
            max_delay: max_delay.max(first_delay),
            max_attempts: max_attempts.max(1),
        }
    }

    fn ceiling(&self, retry: u32) -> Duration {
        self.first_delay
            .saturating_mul(2u32.saturating_pow(retry))
            .min(self.max_delay)
    }

    fn wait_before<R: Rng + ?Sized>(&self, retry: u32, rng: &mut R) -> Duration {
        let ceiling = self.ceiling(retry);
        let fixed = ceiling / 2;
        fixed + rng.gen_range(Duration::ZERO..=ceiling - fixed)
    }

    fn wait(&self, retry: u32) -> Duration {
        self.wait_before(retry, &mut rand::thread_rng())
    }

    /// Runs `call` until it succeeds, fails with a non-retryable error, or
    /// the attempts are used up. The last error is returned as is.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut call: F) -> Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let wait = self.wait(attempt - 1);
                    tracing::warn!(%what, attempt, ?wait, %err, "retrying disk request");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
