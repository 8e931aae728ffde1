use super::payment::Payment;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// A failure reported by a downstream gateway.
///
/// The pipeline treats every `GatewayError` as retryable.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct GatewayError {
    pub message: String,
}

impl GatewayError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &str;

    /// Charges the payment and returns the gateway's reference for it.
    async fn charge(&self, payment: &Payment) -> std::result::Result<String, GatewayError>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn save(&self, payment: Payment) -> Result<Payment>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>>;
}

pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
pub type PaymentRepositoryRef = Arc<dyn PaymentRepository>;
