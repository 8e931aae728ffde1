//! Application layer orchestrating the payment pipeline.
//!
//! `PaymentService` is the entry point: it accepts submissions, answers
//! status queries, and hands each payment to the worker pool, where
//! `processor` drives it through the breaker, the admission limiter and the
//! retried gateway call.

pub mod processor;
pub mod service;
