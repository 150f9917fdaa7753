//! Common utilities shared across the crate

pub mod retry;

pub use retry::RetryConfig;
