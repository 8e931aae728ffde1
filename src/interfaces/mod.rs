//! Adapters between the outside world and the payment service.

pub mod csv;
