use crate::domain::payment::Payment;
use crate::domain::ports::{GatewayError, PaymentGateway};
use async_trait::async_trait;
use rand::Rng;
use std::ops::RangeInclusive;
use std::time::Duration;

/// A stand-in for a remote gateway with random latency and random failures.
#[derive(Debug, Clone)]
pub struct SimulatedGateway {
    name: String,
    latency_ms: RangeInclusive<u64>,
    failure_rate: f64,
    failure_message: String,
}

impl SimulatedGateway {
    pub fn new(
        name: impl Into<String>,
        latency_ms: RangeInclusive<u64>,
        failure_rate: f64,
        failure_message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            latency_ms,
            failure_rate: failure_rate.clamp(0.0, 1.0),
            failure_message: failure_message.into(),
        }
    }

    pub fn stripe() -> Self {
        Self::new("stripe", 50..=200, 0.25, "Stripe temporary failure")
    }

    pub fn paypal() -> Self {
        Self::new("paypal", 80..=250, 0.15, "PayPal network glitch")
    }

    /// Same gateway, never failing.
    pub fn reliable(mut self) -> Self {
        self.failure_rate = 0.0;
        self
    }

    /// Same gateway, always failing.
    pub fn broken(mut self) -> Self {
        self.failure_rate = 1.0;
        self
    }

    pub fn with_latency(mut self, latency_ms: RangeInclusive<u64>) -> Self {
        self.latency_ms = latency_ms;
        self
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    fn name(&self) -> &str {
        &self.name
    }

    async fn charge(&self, payment: &Payment) -> Result<String, GatewayError> {
        let (delay, fails) = {
            let mut rng = rand::thread_rng();
            (
                rng.gen_range(self.latency_ms.clone()),
                rng.gen_bool(self.failure_rate),
            )
        };
        tokio::time::sleep(Duration::from_millis(delay)).await;

        if fails {
            Err(GatewayError::new(self.failure_message.clone()))
        } else {
            Ok(format!("{}_{}", self.name, payment.id.simple()))
        }
    }
}
