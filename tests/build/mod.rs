//! Reference model build tests
//!
//! End-to-end builds through the scheduler:
//! - XML, annotation and transactional aspects
//! - Failure markers
//! - Rebuilds, supersession and cancellation

pub mod tests_lifecycle;
pub mod tests_scenarios;
