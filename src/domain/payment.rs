use crate::error::PaymentError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Represents a positive monetary amount for a payment.
///
/// Ensures that charged amounts are always strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, PaymentError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(PaymentError::ValidationError(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = PaymentError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Processing,
    Success,
    Failed,
}

impl PaymentStatus {
    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Success | PaymentStatus::Failed)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PaymentStatus::Processing => "PROCESSING",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

/// Failure reasons written by the pipeline itself (gateway failures carry
/// the gateway's own message instead).
pub mod reason {
    pub const CIRCUIT_OPEN: &str = "CIRCUIT_OPEN";
    pub const RATE_LIMIT: &str = "RATE_LIMIT";
    pub const INTERRUPTED: &str = "INTERRUPTED";
    pub const QUEUE_INTERRUPTED: &str = "QUEUE_INTERRUPTED";
    pub const QUEUE_FULL: &str = "QUEUE_FULL";
    pub const SHUTDOWN: &str = "SHUTDOWN";
    pub const NOT_FOUND: &str = "Not found";
}

/// A payment as it moves through the pipeline.
///
/// Values are immutable: `succeed` and `fail` return a new `Payment` with the
/// updated status, so a stored record is never changed behind a reader's back.
#[derive(Debug, PartialEq, Clone)]
pub struct Payment {
    pub id: Uuid,
    pub amount: Amount,
    pub currency: String,
    pub method: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub failure_reason: Option<String>,
}

impl Payment {
    /// Creates a new payment in the `Processing` state.
    pub fn processing(id: Uuid, amount: Amount, currency: &str, method: &str) -> Self {
        Self {
            id,
            amount,
            currency: currency.to_string(),
            method: method.to_string(),
            status: PaymentStatus::Processing,
            created_at: Utc::now(),
            failure_reason: None,
        }
    }

    pub fn succeed(&self) -> Self {
        Self {
            status: PaymentStatus::Success,
            failure_reason: None,
            ..self.clone()
        }
    }

    pub fn fail(&self, reason: impl Into<String>) -> Self {
        Self {
            status: PaymentStatus::Failed,
            failure_reason: Some(reason.into()),
            ..self.clone()
        }
    }
}

/// Caller input for a new payment.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct PaymentRequest {
    pub amount: Decimal,
    pub currency: String,
    pub method: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub idempotency_key: Option<String>,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

impl PaymentRequest {
    pub fn new(amount: Decimal, currency: &str, method: &str) -> Self {
        Self {
            amount,
            currency: currency.to_string(),
            method: method.to_string(),
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Checks the request and returns the validated amount.
    pub fn validate(&self) -> Result<Amount, PaymentError> {
        if self.currency.trim().is_empty() {
            return Err(PaymentError::ValidationError(
                "Currency must not be blank".to_string(),
            ));
        }
        if self.method.trim().is_empty() {
            return Err(PaymentError::ValidationError(
                "Method must not be blank".to_string(),
            ));
        }
        Amount::new(self.amount)
    }
}

/// The answer handed back for submissions and status queries.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct PaymentResult {
    pub payment_id: Uuid,
    pub status: PaymentStatus,
    pub message: String,
}

impl PaymentResult {
    pub fn accepted(id: Uuid) -> Self {
        Self {
            payment_id: id,
            status: PaymentStatus::Processing,
            message: "Payment accepted, processing".to_string(),
        }
    }

    pub fn success(id: Uuid) -> Self {
        Self {
            payment_id: id,
            status: PaymentStatus::Success,
            message: "Payment successful".to_string(),
        }
    }

    pub fn failed(id: Uuid, reason: impl Into<String>) -> Self {
        Self {
            payment_id: id,
            status: PaymentStatus::Failed,
            message: reason.into(),
        }
    }
}

impl From<&Payment> for PaymentResult {
    fn from(payment: &Payment) -> Self {
        match payment.status {
            PaymentStatus::Processing => Self::accepted(payment.id),
            PaymentStatus::Success => Self::success(payment.id),
            PaymentStatus::Failed => Self::failed(
                payment.id,
                payment.failure_reason.clone().unwrap_or_default(),
            ),
        }
    }
}
