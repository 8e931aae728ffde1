pub mod application;
pub mod concurrency;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
pub mod resilience;
