#![allow(dead_code)]

use async_trait::async_trait;
use payflow::application::service::PaymentService;
use payflow::config::PipelineConfig;
use payflow::domain::payment::Payment;
use payflow::domain::ports::{
    GatewayError, PaymentGateway, PaymentGatewayRef, PaymentRepository, PaymentRepositoryRef,
};
use payflow::error::{PaymentError, Result as StoreResult};
use payflow::infrastructure::in_memory::InMemoryPaymentRepository;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::NamedTempFile;
use uuid::Uuid;

pub const SETTLE: Duration = Duration::from_secs(5);

/// A gateway with fixed behaviour that counts its calls.
pub struct ScriptedGateway {
    name: String,
    failures_before_success: usize,
    always_fail: bool,
    panics: bool,
    latency: Duration,
    calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn ok(name: &str) -> Self {
        Self {
            name: name.to_string(),
            failures_before_success: 0,
            always_fail: false,
            panics: false,
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_first(mut self, failures: usize) -> Self {
        self.failures_before_success = failures;
        self
    }

    pub fn always_failing(mut self) -> Self {
        self.always_fail = true;
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    fn name(&self) -> &str {
        &self.name
    }

    async fn charge(&self, payment: &Payment) -> Result<String, GatewayError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.panics {
            panic!("gateway exploded");
        }
        if self.always_fail || call <= self.failures_before_success {
            return Err(GatewayError::new(format!("{} unavailable", self.name)));
        }
        Ok(format!("{}-{}", self.name, payment.id))
    }
}

/// Small, fast settings.
pub fn fast_config() -> PipelineConfig {
    PipelineConfig {
        workers: 2,
        queue_capacity: 10,
        failure_threshold: 5,
        open_timeout_ms: 10_000,
        success_threshold: 1,
        max_concurrent: 4,
        admission_wait_ms: 200,
        retry_attempts: 3,
        retry_backoff_ms: 1,
        ..PipelineConfig::default()
    }
}

/// An in-memory repository whose first `save` fails.
#[derive(Default)]
pub struct FlakyRepository {
    inner: InMemoryPaymentRepository,
    failed_once: AtomicBool,
}

impl FlakyRepository {
    pub fn inner(&self) -> &InMemoryPaymentRepository {
        &self.inner
    }
}

#[async_trait]
impl PaymentRepository for FlakyRepository {
    async fn save(&self, payment: Payment) -> StoreResult<Payment> {
        if !self.failed_once.swap(true, Ordering::SeqCst) {
            return Err(PaymentError::InternalError("store unavailable".into()));
        }
        self.inner.save(payment).await
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Payment>> {
        self.inner.find_by_id(id).await
    }
}

pub fn build_service(
    config: &PipelineConfig,
    gateways: &[Arc<ScriptedGateway>],
) -> (PaymentService, InMemoryPaymentRepository) {
    let repository = InMemoryPaymentRepository::new();
    let service = build_service_with(config, Arc::new(repository.clone()), gateways);
    (service, repository)
}

pub fn build_service_with(
    config: &PipelineConfig,
    repository: PaymentRepositoryRef,
    gateways: &[Arc<ScriptedGateway>],
) -> PaymentService {
    let gateways: Vec<PaymentGatewayRef> = gateways
        .iter()
        .map(|g| g.clone() as PaymentGatewayRef)
        .collect();
    PaymentService::new(config, repository, gateways).expect("valid pipeline")
}

pub fn write_csv(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write csv");
    file.flush().expect("flush csv");
    file
}
