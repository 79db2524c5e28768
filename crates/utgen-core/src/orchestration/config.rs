//! Loop configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{ExportedUnit, Language, Result, UtgenError};

/// Whether feedback is requested for the failing attempt that uses up the
/// budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionPolicy {
    /// Every failing run gets feedback; exhaustion is detected by the next
    /// budget check. N failing attempts cost N feedback calls.
    #[default]
    FeedbackThenCheck,
    /// The last failing run skips feedback. N failing attempts cost N-1
    /// feedback calls.
    CheckBeforeFeedback,
}

/// What a fatal unit failure does to the rest of the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FatalPolicy {
    /// Propagate the error and stop the run.
    #[default]
    Abort,
    /// Record the unit as fatal and continue with the next one.
    SkipUnit,
}

/// Configuration for [`Orchestrator`](super::Orchestrator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Attempt budget per unit. Must be at least 1.
    pub max_attempts: u32,

    /// Pause after every attempt, to respect provider rate limits.
    pub attempt_delay_ms: u64,

    /// Upper bound for each provider call and each test run.
    pub attempt_timeout_ms: Option<u64>,

    /// Upper bound for the whole run. Checked between attempts so that an
    /// open conversation is always stopped.
    pub run_timeout_ms: Option<u64>,

    pub exhaustion_policy: ExhaustionPolicy,

    pub fatal_policy: FatalPolicy,

    /// Middle part of generated test file names: `<unit>.<suffix>.<ext>`.
    pub test_suffix: String,

    /// Directory the test runner executes from.
    pub root_dir: PathBuf,

    pub language: Language,

    /// Run the export-all transform on every file before analysis.
    pub export_all: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            attempt_delay_ms: 1_000,
            attempt_timeout_ms: Some(300_000),
            run_timeout_ms: None,
            exhaustion_policy: ExhaustionPolicy::default(),
            fatal_policy: FatalPolicy::default(),
            test_suffix: "ut.test".to_string(),
            root_dir: PathBuf::from("./"),
            language: Language::TypeScript,
            export_all: false,
        }
    }
}

impl LoopConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(UtgenError::InvalidConfig(
                "max attempts must be at least 1".to_string(),
            ));
        }
        let suffix = self.test_suffix.trim_matches('.');
        if suffix.is_empty() || suffix.contains(['/', '\\']) {
            return Err(UtgenError::InvalidConfig(format!(
                "invalid test suffix: {:?}",
                self.test_suffix
            )));
        }
        if self.attempt_timeout_ms == Some(0) {
            return Err(UtgenError::InvalidConfig(
                "attempt timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn attempt_delay(&self) -> Duration {
        Duration::from_millis(self.attempt_delay_ms)
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_ms.map(Duration::from_millis)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_ms.map(Duration::from_millis)
    }

    /// Deterministic test file location: next to the source file, named
    /// after the unit.
    pub fn test_path_for(&self, source_file: &Path, unit: &ExportedUnit) -> PathBuf {
        let dir = source_file.parent().unwrap_or_else(|| Path::new(""));
        dir.join(format!(
            "{}.{}.{}",
            unit.file_stem(),
            self.test_suffix.trim_matches('.'),
            self.language.test_extension()
        ))
    }
}
