use super::queue::BoundedQueue;
use crate::domain::payment::Payment;
use crate::error::{PaymentError, Result};
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type JobAction =
    Box<dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// A unit of work: the payment it advances and the action that advances it.
///
/// The action receives the pool's cancellation token so it can abandon
/// waits (such as a retry backoff) when the pool shuts down.
pub struct Job {
    payment: Payment,
    action: JobAction,
}

impl Job {
    pub fn new<F, Fut>(payment: Payment, action: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            payment,
            action: Box::new(move |cancel| Box::pin(action(cancel))),
        }
    }

    pub fn payment(&self) -> &Payment {
        &self.payment
    }

    pub fn into_payment(self) -> Payment {
        self.payment
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("payment_id", &self.payment.id)
            .finish_non_exhaustive()
    }
}

/// A fixed set of long-lived workers draining one shared bounded queue.
pub struct WorkerPool {
    queue: Arc<BoundedQueue<Job>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
    cancel: CancellationToken,
}

impl WorkerPool {
    /// Creates the queue and spawns `worker_count` workers immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(worker_count: usize, queue_capacity: usize) -> Result<Self> {
        if worker_count == 0 {
            return Err(PaymentError::ConfigError(
                "Worker count must be greater than 0".to_string(),
            ));
        }
        let queue = Arc::new(BoundedQueue::new(queue_capacity)?);
        let cancel = CancellationToken::new();

        let workers: Vec<_> = (0..worker_count)
            .map(|i| {
                let name = format!("pay-worker-{i}");
                tokio::spawn(run_worker(name, queue.clone(), cancel.clone()))
            })
            .collect();

        info!(
            workers = worker_count,
            queue_capacity, "Started worker pool"
        );

        Ok(Self {
            queue,
            workers: Mutex::new(workers),
            worker_count,
            cancel,
        })
    }

    /// Enqueues a job, waiting for space when the queue is saturated.
    ///
    /// `interrupt` aborts the wait, and a pool that is shutting down refuses
    /// new work; either way the job's payment is handed back inside the error
    /// so the caller can settle it.
    pub async fn submit(
        &self,
        job: Job,
        interrupt: &CancellationToken,
    ) -> std::result::Result<(), (PaymentError, Payment)> {
        if self.cancel.is_cancelled() {
            return Err((PaymentError::Cancelled, job.into_payment()));
        }
        let payment = job.payment.clone();
        self.queue
            .put(job, interrupt)
            .await
            .map_err(|e| (e, payment))
    }

    /// Enqueues a job only if there is room right now.
    pub fn try_submit(&self, job: Job) -> std::result::Result<(), (PaymentError, Payment)> {
        if self.cancel.is_cancelled() {
            return Err((PaymentError::Cancelled, job.into_payment()));
        }
        self.queue
            .try_put(job)
            .map_err(|job| (PaymentError::QueueFull, job.into_payment()))
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Stops every worker after its current job and waits for them to exit.
    ///
    /// Jobs still waiting in the queue are not run; they are returned so the
    /// caller can decide what happens to their payments. Calling it again
    /// finds no workers left and returns an empty list.
    pub async fn shutdown(&self) -> Vec<Job> {
        self.cancel.cancel();
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if let Err(e) = worker.await {
                error!(error = %e, "Worker task ended abnormally");
            }
        }
        let abandoned = self.queue.drain();
        if !abandoned.is_empty() {
            warn!(count = abandoned.len(), "Abandoned queued jobs at shutdown");
        }
        abandoned
    }
}

async fn run_worker(name: String, queue: Arc<BoundedQueue<Job>>, cancel: CancellationToken) {
    debug!(worker = %name, "Worker started");
    while !cancel.is_cancelled() {
        let Ok(job) = queue.take(&cancel).await else {
            break;
        };
        let payment_id = job.payment.id;

        // Each job runs on its own task so a panic is contained and reported
        // here instead of killing the worker.
        let handle = tokio::spawn((job.action)(cancel.clone()));
        if let Err(e) = handle.await {
            error!(
                worker = %name,
                %payment_id,
                panicked = e.is_panic(),
                "Job failed, worker continues"
            );
        }
    }
    debug!(worker = %name, "Worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::Amount;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use uuid::Uuid;

    fn payment() -> Payment {
        Payment::processing(Uuid::new_v4(), Amount::new(dec!(1)).unwrap(), "USD", "stripe")
    }

    async fn wait_for(counter: &AtomicUsize, expected: usize) {
        for _ in 0..200 {
            if counter.load(Ordering::SeqCst) >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {expected} completed jobs");
    }

    #[tokio::test]
    async fn test_invalid_construction() {
        assert!(matches!(
            WorkerPool::new(0, 10),
            Err(PaymentError::ConfigError(_))
        ));
        assert!(matches!(
            WorkerPool::new(2, 0),
            Err(PaymentError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_runs_submitted_jobs() {
        let pool = WorkerPool::new(3, 10).unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        let interrupt = CancellationToken::new();

        for _ in 0..10 {
            let done = done.clone();
            let job = Job::new(payment(), move |_| async move {
                done.fetch_add(1, Ordering::SeqCst);
            });
            pool.submit(job, &interrupt).await.unwrap();
        }

        wait_for(&done, 10).await;
        assert!(pool.shutdown().await.is_empty());
    }

    #[tokio::test]
    async fn test_panicking_job_does_not_shrink_pool() {
        let pool = WorkerPool::new(1, 10).unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        let interrupt = CancellationToken::new();

        let bad_job = Job::new(payment(), |_| async {
            panic!("bad job");
        });
        pool.submit(bad_job, &interrupt).await.unwrap();
        {
            let done = done.clone();
            pool.submit(
                Job::new(payment(), move |_| async move {
                    done.fetch_add(1, Ordering::SeqCst);
                }),
                &interrupt,
            )
            .await
            .unwrap();
        }

        wait_for(&done, 1).await;
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_try_submit_rejects_when_full() {
        let pool = WorkerPool::new(1, 1).unwrap();
        let gate = Arc::new(tokio::sync::Notify::new());
        let interrupt = CancellationToken::new();

        // Occupy the single worker, then fill the single slot.
        let started = Arc::new(AtomicUsize::new(0));
        {
            let gate = gate.clone();
            let started = started.clone();
            pool.submit(
                Job::new(payment(), move |_| async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    gate.notified().await;
                }),
                &interrupt,
            )
            .await
            .unwrap();
        }
        wait_for(&started, 1).await;
        pool.try_submit(Job::new(payment(), |_| async {})).unwrap();

        let rejected = payment();
        let result = pool.try_submit(Job::new(rejected.clone(), |_| async {}));
        match result {
            Err((PaymentError::QueueFull, returned)) => assert_eq!(returned.id, rejected.id),
            other => panic!("expected QueueFull, got {:?}", other.map_err(|(e, _)| e)),
        }

        gate.notify_one();
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_no_job_starts_once_cancelled() {
        let pool = WorkerPool::new(1, 5).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        let interrupt = CancellationToken::new();

        // The first job fires the pool's token while it runs, so the second
        // is still queued when cancellation lands.
        pool.submit(
            Job::new(payment(), |cancel| async move { cancel.cancel() }),
            &interrupt,
        )
        .await
        .unwrap();
        let queued = payment();
        {
            let ran = ran.clone();
            pool.submit(
                Job::new(queued.clone(), move |_| async move {
                    ran.fetch_add(1, Ordering::SeqCst);
                }),
                &interrupt,
            )
            .await
            .unwrap();
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        let abandoned = pool.shutdown().await;

        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(abandoned.len(), 1);
        assert_eq!(abandoned[0].payment().id, queued.id);
    }

    #[tokio::test]
    async fn test_shutdown_returns_undrawn_jobs() {
        let pool = WorkerPool::new(1, 5).unwrap();
        let gate = Arc::new(tokio::sync::Notify::new());
        let started = Arc::new(AtomicUsize::new(0));
        let interrupt = CancellationToken::new();

        {
            let gate = gate.clone();
            let started = started.clone();
            pool.submit(
                Job::new(payment(), move |_| async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    gate.notified().await;
                }),
                &interrupt,
            )
            .await
            .unwrap();
        }
        wait_for(&started, 1).await;

        let queued = payment();
        pool.submit(Job::new(queued.clone(), |_| async {}), &interrupt)
            .await
            .unwrap();
        assert_eq!(pool.queue_len(), 1);

        // Let the in-flight job finish once shutdown has been requested.
        let releaser = {
            let gate = gate.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                gate.notify_one();
            })
        };
        let abandoned = pool.shutdown().await;
        releaser.await.unwrap();

        assert_eq!(abandoned.len(), 1);
        assert_eq!(abandoned[0].payment().id, queued.id);
    }
}
