use crate::error::{PaymentError, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Upper bound for the doubled backoff.
pub const MAX_BACKOFF: Duration = Duration::from_millis(2_000);

const MIN_BACKOFF: Duration = Duration::from_millis(1);

#[derive(Error, Debug, PartialEq)]
pub enum RetryError<E> {
    /// Cancellation was observed; no further attempts were made.
    #[error("retry cancelled")]
    Cancelled,
    /// Every attempt failed. Holds the failure of the last attempt.
    #[error("{0}")]
    Exhausted(E),
}

/// Bounded attempts with exponential backoff and jitter.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Result<Self> {
        if max_attempts == 0 {
            return Err(PaymentError::ConfigError(
                "max_attempts must be >= 1".to_string(),
            ));
        }
        Ok(Self {
            max_attempts,
            initial_backoff: initial_backoff.max(MIN_BACKOFF),
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Runs `action` until it succeeds or the attempts run out.
    ///
    /// A running attempt is never interrupted; `cancel` is checked before each
    /// attempt, after a failed one, and while sleeping between attempts.
    pub async fn execute<T, E, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut action: F,
    ) -> std::result::Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut backoff = self.initial_backoff;
        let mut attempt = 1;
        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled);
            }
            let error = match action(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled);
            }
            if attempt >= self.max_attempts {
                return Err(RetryError::Exhausted(error));
            }

            let pause = jittered(backoff, &mut rand::thread_rng());
            debug!(attempt, error = %error, ?pause, "Attempt failed, backing off");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                _ = tokio::time::sleep(pause) => {}
            }
            backoff = next_backoff(backoff);
            attempt += 1;
        }
    }
}

/// Picks a pause uniformly in `[backoff / 2, backoff]`.
pub fn jittered<R: Rng>(backoff: Duration, rng: &mut R) -> Duration {
    let upper = backoff.as_millis().max(1) as u64;
    let lower = (upper / 2).max(1);
    Duration::from_millis(rng.gen_range(lower..=upper))
}

pub fn next_backoff(backoff: Duration) -> Duration {
    (backoff * 2).min(MAX_BACKOFF)
}
