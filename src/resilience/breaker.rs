use crate::error::{PaymentError, Result};
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// A point-in-time copy of the breaker's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure: Option<Instant>,
}

/// Immutable thresholds of a breaker.
#[derive(Debug, Clone, Copy)]
pub struct CircuitThresholds {
    pub failure_threshold: u32,
    pub open_timeout: Duration,
    pub success_threshold: u32,
}

impl CircuitThresholds {
    fn validate(&self) -> Result<()> {
        if self.failure_threshold == 0 {
            return Err(PaymentError::ConfigError(
                "failure_threshold must be greater than 0".to_string(),
            ));
        }
        if self.open_timeout.is_zero() {
            return Err(PaymentError::ConfigError(
                "open_timeout must be greater than 0".to_string(),
            ));
        }
        if self.success_threshold == 0 {
            return Err(PaymentError::ConfigError(
                "success_threshold must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Tracks downstream health and fails fast while a gateway looks unhealthy.
///
/// `Closed` lets everything through and counts failures. Reaching the failure
/// threshold opens the circuit; once the open timeout has passed the next
/// request moves it to `HalfOpen`, where probes are allowed until either one
/// fails (back to `Open`) or enough succeed (back to `Closed`).
///
/// Every operation runs under one mutex, so concurrent reports are never
/// lost or double counted.
pub struct CircuitBreaker {
    name: String,
    thresholds: CircuitThresholds,
    inner: Mutex<CircuitSnapshot>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, thresholds: CircuitThresholds) -> Result<Self> {
        thresholds.validate()?;
        Ok(Self {
            name: name.into(),
            thresholds,
            inner: Mutex::new(CircuitSnapshot {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure: None,
            }),
        })
    }

    /// Decides whether a call may go out now.
    pub fn allow_request(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed >= self.thresholds.open_timeout {
                    inner.state = CircuitState::HalfOpen;
                    inner.success_count = 0;
                    info!(breaker = %self.name, "Circuit half-open, probing");
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => inner.failure_count = 0,
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.thresholds.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    info!(breaker = %self.name, "Circuit closed");
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.success_count = 0;
                inner.last_failure = Some(now);
                warn!(breaker = %self.name, "Probe failed, circuit re-opened");
            }
            CircuitState::Closed => {
                inner.failure_count += 1;
                inner.last_failure = Some(now);
                if inner.failure_count >= self.thresholds.failure_threshold {
                    inner.state = CircuitState::Open;
                    warn!(
                        breaker = %self.name,
                        failures = inner.failure_count,
                        "Circuit opened"
                    );
                }
            }
            CircuitState::Open => {
                inner.failure_count += 1;
                inner.last_failure = Some(now);
            }
        }
    }

    /// Forces the circuit open as if the failure threshold had just been hit.
    pub fn trip(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Open;
        inner.success_count = 0;
        inner.last_failure = Some(Instant::now());
        warn!(breaker = %self.name, "Circuit tripped manually");
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        *self.inner.lock()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
