use crate::error::{PaymentError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Caps the number of gateway calls in flight at once.
pub struct AdmissionLimiter {
    permits: Arc<Semaphore>,
    max_concurrent: usize,
}

/// Proof of admission. The permit goes back to the pool when this is dropped,
/// which makes release happen exactly once on every exit path.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionLimiter {
    pub fn new(max_concurrent: usize) -> Result<Self> {
        if max_concurrent == 0 {
            return Err(PaymentError::ConfigError(
                "max_concurrent must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        })
    }

    /// Tries to obtain a permit within `max_wait`.
    ///
    /// A zero wait makes a single non-blocking attempt.
    pub async fn acquire(&self, max_wait: Duration) -> Option<AdmissionPermit> {
        let permit = if max_wait.is_zero() {
            self.permits.clone().try_acquire_owned().ok()
        } else {
            tokio::time::timeout(max_wait, self.permits.clone().acquire_owned())
                .await
                .ok()
                .and_then(|acquired| acquired.ok())
        };
        permit.map(|permit| AdmissionPermit { _permit: permit })
    }

    /// Number of free permits. Racy by nature; use for observation only.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}
