//! Blocking coordination primitives: the bounded work queue, the worker pool
//! draining it, and the compute-once idempotency cache.

pub mod idempotency;
pub mod pool;
pub mod queue;
