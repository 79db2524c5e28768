//! Jest `--json` report model and the failure digest sent back to the model.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Top level of Jest's JSON output (only the fields utgen reads).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JestReport {
    pub success: bool,
    #[serde(default)]
    pub num_total_tests: u32,
    #[serde(default)]
    pub num_passed_tests: u32,
    #[serde(default)]
    pub num_failed_tests: u32,
    #[serde(default)]
    pub test_results: Vec<SuiteResult>,
}

/// One test file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteResult {
    pub name: String,
    #[serde(default)]
    pub status: String,
    /// Suite-level failure (syntax error, failed import, ...).
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub assertion_results: Vec<AssertionResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResult {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub title: String,
    pub status: String,
    #[serde(default)]
    pub failure_messages: Vec<String>,
    #[serde(default)]
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

/// One entry of the digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureSummary {
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    pub messages: Vec<String>,
}

impl JestReport {
    pub fn parse(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Failing assertions plus suites that failed before running any test.
    pub fn failures(&self) -> Vec<FailureSummary> {
        let mut out = Vec::new();
        for suite in &self.test_results {
            let failed: Vec<&AssertionResult> = suite
                .assertion_results
                .iter()
                .filter(|a| a.status == "failed")
                .collect();

            if failed.is_empty() && !suite.message.trim().is_empty() {
                out.push(FailureSummary {
                    file: suite.name.clone(),
                    test: None,
                    location: None,
                    messages: vec![strip_ansi(suite.message.trim())],
                });
            }

            for assertion in failed {
                let test = if assertion.full_name.is_empty() {
                    assertion.title.clone()
                } else {
                    assertion.full_name.clone()
                };
                out.push(FailureSummary {
                    file: suite.name.clone(),
                    test: Some(test),
                    location: assertion.location,
                    messages: assertion
                        .failure_messages
                        .iter()
                        .map(|m| strip_ansi(m.trim()))
                        .collect(),
                });
            }
        }
        out
    }

    /// Pretty JSON of [`failures`](Self::failures), or `None` if there are none.
    pub fn failure_digest(&self) -> Option<String> {
        let failures = self.failures();
        if failures.is_empty() {
            return None;
        }
        serde_json::to_string_pretty(&failures).ok()
    }

    pub fn summary_line(&self) -> String {
        format!(
            "Tests: {} passed, {} failed, {} total",
            self.num_passed_tests, self.num_failed_tests, self.num_total_tests
        )
    }
}

static ANSI_ESCAPE: OnceLock<Regex> = OnceLock::new();

/// Jest colors its messages even in JSON output.
fn strip_ansi(s: &str) -> String {
    // CSI sequences, OSC strings and two-byte escapes.
    let escape = ANSI_ESCAPE.get_or_init(|| {
        Regex::new(r"\x1b(?:\[[0-?]*[ -/]*[@-~]|\][^\x07\x1b]*(?:\x07|\x1b\\)|[0-~])")
            .expect("ANSI escape pattern is a valid regex")
    });
    escape.replace_all(s, "").into_owned()
}
