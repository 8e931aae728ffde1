use crate::error::{PaymentError, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// A capacity-limited FIFO handoff between producers and consumers.
///
/// `put` waits while the queue is full and `take` waits while it is empty.
/// Every state change wakes all waiters on the opposite side, and each waiter
/// re-checks its condition under the lock before acting, so spurious or
/// stolen wake-ups only cost another loop iteration.
pub struct BoundedQueue<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
    not_full: Notify,
    not_empty: Notify,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(PaymentError::ConfigError(
                "Queue capacity must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            not_full: Notify::new(),
            not_empty: Notify::new(),
        })
    }

    /// Inserts `item`, waiting for space if the queue is full.
    ///
    /// Returns `PaymentError::Cancelled` if `cancel` fires first; the item is
    /// dropped and the queue is left as it was.
    pub async fn put(&self, item: T, cancel: &CancellationToken) -> Result<()> {
        let mut item = Some(item);
        loop {
            let notified = self.not_full.notified();
            tokio::pin!(notified);
            // Register before checking so a wake-up between the check and
            // the await is not lost.
            notified.as_mut().enable();

            {
                let mut items = self.items.lock();
                if items.len() < self.capacity {
                    if let Some(item) = item.take() {
                        items.push_back(item);
                    }
                    drop(items);
                    self.not_empty.notify_waiters();
                    return Ok(());
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PaymentError::Cancelled),
                _ = &mut notified => {}
            }
        }
    }

    /// Inserts `item` without waiting. Hands the item back when full.
    pub fn try_put(&self, item: T) -> std::result::Result<(), T> {
        let mut items = self.items.lock();
        if items.len() >= self.capacity {
            return Err(item);
        }
        items.push_back(item);
        drop(items);
        self.not_empty.notify_waiters();
        Ok(())
    }

    /// Removes the oldest item, waiting for one if the queue is empty.
    ///
    /// Once `cancel` has fired nothing more is handed out, even if items are
    /// still queued.
    pub async fn take(&self, cancel: &CancellationToken) -> Result<T> {
        loop {
            if cancel.is_cancelled() {
                return Err(PaymentError::Cancelled);
            }
            let notified = self.not_empty.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let taken = self.items.lock().pop_front();
            if let Some(item) = taken {
                self.not_full.notify_waiters();
                return Ok(item);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PaymentError::Cancelled),
                _ = &mut notified => {}
            }
        }
    }

    /// Removes and returns everything still queued.
    pub fn drain(&self) -> Vec<T> {
        let drained: Vec<T> = self.items.lock().drain(..).collect();
        if !drained.is_empty() {
            self.not_full.notify_waiters();
        }
        drained
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
