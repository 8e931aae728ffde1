//! Per-call guards around downstream gateways.

pub mod breaker;
pub mod limiter;
pub mod retry;
