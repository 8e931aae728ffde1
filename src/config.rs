use crate::error::{PaymentError, Result};
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What a submission does when the work queue is saturated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitPolicy {
    /// Wait for space (backpressure on the caller).
    #[default]
    Block,
    /// Fail the payment immediately with `QUEUE_FULL`.
    Reject,
}

/// Tuning for one payment pipeline. Fixed once the service is built.
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of long-lived workers draining the queue
    #[arg(long, env = "PAYFLOW_WORKERS", default_value_t = 4)]
    pub workers: usize,

    /// Capacity of the bounded work queue
    #[arg(long, env = "PAYFLOW_QUEUE_CAPACITY", default_value_t = 100)]
    pub queue_capacity: usize,

    /// Consecutive failures that open a gateway's circuit
    #[arg(long, env = "PAYFLOW_FAILURE_THRESHOLD", default_value_t = 5)]
    pub failure_threshold: u32,

    /// How long an open circuit rejects calls before probing (ms)
    #[arg(long, env = "PAYFLOW_OPEN_TIMEOUT_MS", default_value_t = 5_000)]
    pub open_timeout_ms: u64,

    /// Successful probes needed to close a half-open circuit
    #[arg(long, env = "PAYFLOW_SUCCESS_THRESHOLD", default_value_t = 2)]
    pub success_threshold: u32,

    /// Maximum concurrent calls per gateway
    #[arg(long, env = "PAYFLOW_MAX_CONCURRENT", default_value_t = 8)]
    pub max_concurrent: usize,

    /// How long a job waits for a gateway slot (ms)
    #[arg(long, env = "PAYFLOW_ADMISSION_WAIT_MS", default_value_t = 250)]
    pub admission_wait_ms: u64,

    /// Attempts per gateway call, including the first
    #[arg(long, env = "PAYFLOW_RETRY_ATTEMPTS", default_value_t = 3)]
    pub retry_attempts: u32,

    /// Initial retry backoff, doubled after each failure (ms)
    #[arg(long, env = "PAYFLOW_RETRY_BACKOFF_MS", default_value_t = 50)]
    pub retry_backoff_ms: u64,

    /// Behaviour when the work queue is full
    #[arg(long, env = "PAYFLOW_SUBMIT_POLICY", value_enum, default_value_t = SubmitPolicy::Block)]
    pub submit_policy: SubmitPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 100,
            failure_threshold: 5,
            open_timeout_ms: 5_000,
            success_threshold: 2,
            max_concurrent: 8,
            admission_wait_ms: 250,
            retry_attempts: 3,
            retry_backoff_ms: 50,
            submit_policy: SubmitPolicy::Block,
        }
    }
}

impl PipelineConfig {
    /// Rejects values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("workers", self.workers as u64),
            ("queue_capacity", self.queue_capacity as u64),
            ("failure_threshold", self.failure_threshold as u64),
            ("open_timeout_ms", self.open_timeout_ms),
            ("success_threshold", self.success_threshold as u64),
            ("max_concurrent", self.max_concurrent as u64),
            ("retry_attempts", self.retry_attempts as u64),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(PaymentError::ConfigError(format!(
                    "{name} must be greater than 0"
                )));
            }
        }
        Ok(())
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    pub fn admission_wait(&self) -> Duration {
        Duration::from_millis(self.admission_wait_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}
