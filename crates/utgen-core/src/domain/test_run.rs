//! Candidate test source and test run outcomes.

use serde::{Deserialize, Serialize};

/// Test code returned by the model, as extracted code blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSource {
    pub blocks: Vec<String>,
}

impl TestSource {
    pub fn new(blocks: Vec<String>) -> Self {
        Self { blocks }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|b| b.trim().is_empty())
    }

    /// Blocks separated by a blank line, in order.
    pub fn joined(&self) -> String {
        self.blocks.join("\n\n")
    }
}

/// Outcome of one execution attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRunResult {
    pub success: bool,
    /// Diagnostics handed verbatim to the model on failure.
    pub raw_results: String,
}

impl TestRunResult {
    pub fn passed(raw_results: impl Into<String>) -> Self {
        Self {
            success: true,
            raw_results: raw_results.into(),
        }
    }

    pub fn failed(raw_results: impl Into<String>) -> Self {
        Self {
            success: false,
            raw_results: raw_results.into(),
        }
    }
}
