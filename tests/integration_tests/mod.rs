//! Integration tests module

pub mod api_test;
pub mod orchestrator_test;
pub mod startup_test;
