use crate::domain::payment::{Payment, reason};
use crate::domain::ports::{PaymentGatewayRef, PaymentRepository, PaymentRepositoryRef};
use crate::resilience::breaker::CircuitBreaker;
use crate::resilience::limiter::AdmissionLimiter;
use crate::resilience::retry::{RetryError, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// One downstream gateway together with the breaker and limiter guarding it.
pub struct GatewayLane {
    pub gateway: PaymentGatewayRef,
    pub breaker: CircuitBreaker,
    pub limiter: AdmissionLimiter,
}

/// Everything a job needs besides its lane and payment.
pub(crate) struct ProcessingContext {
    pub repository: PaymentRepositoryRef,
    pub retry: RetryPolicy,
    pub admission_wait: Duration,
}

/// Drives one payment from `Processing` to a terminal state.
///
/// Steps, in order: breaker check, admission permit, retried gateway call,
/// breaker report, permit release, final save.
pub(crate) async fn process_payment(
    ctx: Arc<ProcessingContext>,
    lane: Arc<GatewayLane>,
    payment: Payment,
    cancel: CancellationToken,
) {
    let gateway = lane.gateway.name().to_string();

    if !lane.breaker.allow_request() {
        info!(payment_id = %payment.id, %gateway, "Circuit open, rejecting payment");
        settle(ctx.repository.as_ref(), payment.fail(reason::CIRCUIT_OPEN)).await;
        return;
    }

    let Some(permit) = lane.limiter.acquire(ctx.admission_wait).await else {
        warn!(payment_id = %payment.id, %gateway, "No gateway slot within admission wait");
        lane.breaker.record_failure();
        settle(ctx.repository.as_ref(), payment.fail(reason::RATE_LIMIT)).await;
        return;
    };

    // The retried call runs on its own task so a panicking gateway surfaces
    // as a join error instead of unwinding through this job.
    let charge = {
        let lane = lane.clone();
        let payment = payment.clone();
        let retry = ctx.retry;
        let cancel = cancel.clone();
        tokio::spawn(async move {
            retry
                .execute(&cancel, |attempt| {
                    debug!(payment_id = %payment.id, gateway = lane.gateway.name(), attempt, "Charging");
                    lane.gateway.charge(&payment)
                })
                .await
        })
    };

    let settled = match charge.await {
        Ok(Ok(reference)) => {
            info!(payment_id = %payment.id, %gateway, %reference, "Payment succeeded");
            lane.breaker.record_success();
            payment.succeed()
        }
        Ok(Err(RetryError::Exhausted(e))) => {
            warn!(payment_id = %payment.id, %gateway, error = %e, "Payment failed after retries");
            lane.breaker.record_failure();
            payment.fail(e.message)
        }
        Ok(Err(RetryError::Cancelled)) => {
            warn!(payment_id = %payment.id, %gateway, "Payment interrupted");
            lane.breaker.record_failure();
            payment.fail(reason::INTERRUPTED)
        }
        Err(e) => {
            let category = if e.is_panic() { "panic" } else { "aborted" };
            error!(payment_id = %payment.id, %gateway, category, "Unexpected failure during charge");
            lane.breaker.record_failure();
            payment.fail(format!("UNEXPECTED: {category}"))
        }
    };

    // Breaker and slot are settled before the status becomes visible.
    drop(permit);
    settle(ctx.repository.as_ref(), settled).await;
}

/// Persists a payment's new state, logging rather than propagating failures:
/// a job has no caller to report to.
pub(crate) async fn settle(repository: &dyn PaymentRepository, payment: Payment) {
    let id = payment.id;
    let status = payment.status;
    if let Err(e) = repository.save(payment).await {
        error!(payment_id = %id, %status, error = %e, "Failed to persist payment");
    }
}
