use super::processor::{GatewayLane, ProcessingContext, process_payment, settle};
use crate::concurrency::idempotency::IdempotencyCache;
use crate::concurrency::pool::{Job, WorkerPool};
use crate::config::{PipelineConfig, SubmitPolicy};
use crate::domain::payment::{Amount, Payment, PaymentRequest, PaymentResult, reason};
use crate::domain::ports::{PaymentGatewayRef, PaymentRepositoryRef};
use crate::error::{PaymentError, Result};
use crate::resilience::breaker::{CircuitBreaker, CircuitThresholds};
use crate::resilience::limiter::AdmissionLimiter;
use crate::resilience::retry::RetryPolicy;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Accepts payments and settles them asynchronously.
///
/// `submit` persists a `Processing` payment, queues it and returns at once;
/// workers then take it through the gateway lane chosen by its method.
/// Callers follow up with `status`, which always reads the repository.
pub struct PaymentService {
    repository: PaymentRepositoryRef,
    lanes: HashMap<String, Arc<GatewayLane>>,
    default_lane: Arc<GatewayLane>,
    context: Arc<ProcessingContext>,
    pool: WorkerPool,
    idempotency: IdempotencyCache<String, Uuid>,
    submit_policy: SubmitPolicy,
    interrupt: CancellationToken,
}

impl PaymentService {
    /// Builds the pipeline and starts its workers.
    ///
    /// Each gateway is selected by its lowercased `name()` and gets its own
    /// breaker and limiter. The first gateway is the fallback for unknown
    /// methods.
    pub fn new(
        config: &PipelineConfig,
        repository: PaymentRepositoryRef,
        gateways: Vec<PaymentGatewayRef>,
    ) -> Result<Self> {
        config.validate()?;

        let thresholds = CircuitThresholds {
            failure_threshold: config.failure_threshold,
            open_timeout: config.open_timeout(),
            success_threshold: config.success_threshold,
        };

        let mut lanes = HashMap::new();
        let mut default_lane = None;
        for gateway in gateways {
            let key = gateway.name().to_lowercase();
            let lane = Arc::new(GatewayLane {
                breaker: CircuitBreaker::new(key.clone(), thresholds)?,
                limiter: AdmissionLimiter::new(config.max_concurrent)?,
                gateway,
            });
            default_lane.get_or_insert_with(|| lane.clone());
            lanes.insert(key, lane);
        }
        let default_lane = default_lane.ok_or_else(|| {
            PaymentError::ConfigError("At least one gateway is required".to_string())
        })?;

        let context = Arc::new(ProcessingContext {
            repository: repository.clone(),
            retry: RetryPolicy::new(config.retry_attempts, config.retry_backoff())?,
            admission_wait: config.admission_wait(),
        });
        let pool = WorkerPool::new(config.workers, config.queue_capacity)?;

        info!(
            gateways = lanes.len(),
            default_gateway = default_lane.gateway.name(),
            submit_policy = ?config.submit_policy,
            "Payment service ready"
        );

        Ok(Self {
            repository,
            lanes,
            default_lane,
            context,
            pool,
            idempotency: IdempotencyCache::new(),
            submit_policy: config.submit_policy,
            interrupt: CancellationToken::new(),
        })
    }

    /// Accepts a payment for asynchronous processing.
    ///
    /// A blocked submission is interrupted by `shutdown`.
    pub async fn submit(&self, request: PaymentRequest) -> Result<PaymentResult> {
        let interrupt = self.interrupt.clone();
        self.submit_until(request, &interrupt).await
    }

    /// Like `submit`, but a blocked enqueue also gives up when `interrupt`
    /// fires.
    pub async fn submit_until(
        &self,
        request: PaymentRequest,
        interrupt: &CancellationToken,
    ) -> Result<PaymentResult> {
        let amount = request.validate()?;

        // The PROCESSING record is saved while the key is being bound, so a
        // failed save leaves the key free for the next attempt.
        let payment = match &request.idempotency_key {
            Some(key) => {
                let mut created = None;
                let slot = &mut created;
                let request = &request;
                let id = self
                    .idempotency
                    .try_remember(key.clone(), || async move {
                        let payment = self.persist_new(amount, request).await?;
                        let id = payment.id;
                        *slot = Some(payment);
                        Ok::<_, PaymentError>(id)
                    })
                    .await?;
                // Only the submission that bound the key enqueues work for it.
                let Some(payment) = created else {
                    debug!(payment_id = %id, "Idempotent resubmission");
                    return self.status(id).await;
                };
                payment
            }
            None => self.persist_new(amount, &request).await?,
        };
        let id = payment.id;

        let lane = self.lane_for(&payment.method).clone();
        let context = self.context.clone();
        let job = Job::new(payment.clone(), move |cancel| {
            process_payment(context, lane, payment, cancel)
        });

        let enqueued = match self.submit_policy {
            SubmitPolicy::Block => self.pool.submit(job, interrupt).await,
            SubmitPolicy::Reject => self.pool.try_submit(job),
        };

        match enqueued {
            Ok(()) => {
                debug!(payment_id = %id, queued = self.pool.queue_len(), "Payment accepted");
                Ok(PaymentResult::accepted(id))
            }
            Err((PaymentError::QueueFull, payment)) => {
                warn!(payment_id = %id, "Work queue full, rejecting payment");
                settle(self.repository.as_ref(), payment.fail(reason::QUEUE_FULL)).await;
                Ok(PaymentResult::failed(id, "Queue full"))
            }
            Err((e, payment)) => {
                warn!(payment_id = %id, error = %e, "Submission interrupted");
                settle(
                    self.repository.as_ref(),
                    payment.fail(reason::QUEUE_INTERRUPTED),
                )
                .await;
                Ok(PaymentResult::failed(id, "System interrupted"))
            }
        }
    }

    async fn persist_new(&self, amount: Amount, request: &PaymentRequest) -> Result<Payment> {
        let payment = Payment::processing(
            Uuid::new_v4(),
            amount,
            &request.currency,
            &request.method,
        );
        self.repository.save(payment).await
    }

    /// Reads the latest stored state of a payment.
    pub async fn status(&self, id: Uuid) -> Result<PaymentResult> {
        Ok(match self.repository.find_by_id(id).await? {
            Some(payment) => PaymentResult::from(&payment),
            None => PaymentResult::failed(id, reason::NOT_FOUND),
        })
    }

    /// Polls `status` until the payment is terminal or `timeout` passes, and
    /// returns the last result seen.
    pub async fn wait_for_terminal(&self, id: Uuid, timeout: Duration) -> Result<PaymentResult> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let result = self.status(id).await?;
            if result.status.is_terminal() || tokio::time::Instant::now() >= deadline {
                return Ok(result);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Breaker of the lane that serves `method`.
    pub fn breaker(&self, method: &str) -> &CircuitBreaker {
        &self.lane_for(method).breaker
    }

    /// Limiter of the lane that serves `method`.
    pub fn limiter(&self, method: &str) -> &AdmissionLimiter {
        &self.lane_for(method).limiter
    }

    pub fn queue_len(&self) -> usize {
        self.pool.queue_len()
    }

    /// Stops accepting work, lets in-flight jobs finish, and fails every
    /// payment that was still queued with `SHUTDOWN`.
    pub async fn shutdown(&self) {
        self.interrupt.cancel();
        let abandoned = self.pool.shutdown().await;
        for job in abandoned {
            let payment = job.into_payment();
            warn!(payment_id = %payment.id, "Payment abandoned at shutdown");
            settle(self.repository.as_ref(), payment.fail(reason::SHUTDOWN)).await;
        }
        info!("Payment service stopped");
    }

    fn lane_for(&self, method: &str) -> &Arc<GatewayLane> {
        self.lanes
            .get(&method.trim().to_lowercase())
            .unwrap_or(&self.default_lane)
    }
}
