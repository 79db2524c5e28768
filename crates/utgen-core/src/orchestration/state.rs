//! Per-unit states and retry bookkeeping.

use serde::{Deserialize, Serialize};

use crate::domain::{TestRunResult, UtgenError};

/// States of one unit's generate-run-fix loop.
///
/// ```text
/// Start ──► Generating ──► Running ──► Passed
///   │          ▲  │           │
///   ▼          │  ▼           ▼
/// Fatal        │ Exhausted  Feedback ──► Aborted
///              └─────────────┘
/// ```
#[derive(Debug)]
pub enum UnitState {
    Start,
    Generating,
    Running,
    Feedback(TestRunResult),
    Passed,
    Exhausted,
    /// Opening the conversation or the first generation failed.
    Fatal(UtgenError),
    /// A run or feedback step failed; only this unit is abandoned.
    Aborted(UtgenError),
}

impl UnitState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Passed | Self::Exhausted | Self::Fatal(_) | Self::Aborted(_)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Generating => "generating",
            Self::Running => "running",
            Self::Feedback(_) => "feedback",
            Self::Passed => "passed",
            Self::Exhausted => "exhausted",
            Self::Fatal(_) => "fatal",
            Self::Aborted(_) => "aborted",
        }
    }

    /// Outcome for a terminal state, `None` otherwise.
    pub fn outcome(&self) -> Option<UnitOutcome> {
        match self {
            Self::Passed => Some(UnitOutcome::Passed),
            Self::Exhausted => Some(UnitOutcome::Exhausted),
            Self::Fatal(_) => Some(UnitOutcome::Fatal),
            Self::Aborted(_) => Some(UnitOutcome::Aborted),
            _ => None,
        }
    }
}

/// Terminal result of a unit, as recorded in the run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitOutcome {
    Passed,
    Exhausted,
    Aborted,
    Fatal,
}

impl std::fmt::Display for UnitOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Passed => "passed",
            Self::Exhausted => "exhausted",
            Self::Aborted => "aborted",
            Self::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

/// Attempt counter for one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryState {
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub passed: bool,
}

impl RetryState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt_count: 0,
            max_attempts,
            passed: false,
        }
    }

    /// Count a new attempt. Returns `false` once the budget is spent.
    pub fn begin_attempt(&mut self) -> bool {
        self.attempt_count += 1;
        self.attempt_count <= self.max_attempts
    }

    pub fn is_first_attempt(&self) -> bool {
        self.attempt_count == 1
    }

    pub fn is_last_attempt(&self) -> bool {
        self.attempt_count >= self.max_attempts
    }

    /// Attempts that actually ran, excluding a final over-budget check.
    pub fn attempts_used(&self) -> u32 {
        self.attempt_count.min(self.max_attempts)
    }
}
