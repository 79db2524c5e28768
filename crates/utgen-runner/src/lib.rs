//! Jest runner for utgen
//!
//! Writes candidate test files (through the default
//! [`TestRunner::write_candidate`](utgen_core::TestRunner::write_candidate))
//! and runs them with Jest, turning the JSON report into a pass/fail result
//! with a failure digest the model can act on.

pub mod jest;
pub mod report;

pub use jest::{JestConfig, JestRunner};
pub use report::{AssertionResult, FailureSummary, JestReport, Location, SuiteResult};
