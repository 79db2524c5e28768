use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::orchestration::UnitOutcome;

/// Result of one unit's loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitReport {
    pub file: PathBuf,
    pub unit: String,
    pub test_file: PathBuf,
    pub outcome: UnitOutcome,
    pub attempts: u32,
    pub feedback_rounds: u32,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A discovered file that could not be analyzed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkippedFile {
    pub file: PathBuf,
    pub reason: String,
}

/// Everything a run did, in processing order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub schema_version: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    pub files_scanned: usize,
    #[serde(default)]
    pub skipped_files: Vec<SkippedFile>,
    pub units: Vec<UnitReport>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            schema_version: "1".to_string(),
            started_at: Utc::now(),
            finished_at: None,
            files_scanned: 0,
            skipped_files: Vec::new(),
            units: Vec::new(),
        }
    }

    pub fn count(&self, outcome: UnitOutcome) -> usize {
        self.units.iter().filter(|u| u.outcome == outcome).count()
    }

    pub fn passed_count(&self) -> usize {
        self.count(UnitOutcome::Passed)
    }

    pub fn exhausted_count(&self) -> usize {
        self.count(UnitOutcome::Exhausted)
    }

    pub fn aborted_count(&self) -> usize {
        self.count(UnitOutcome::Aborted)
    }

    pub fn fatal_count(&self) -> usize {
        self.count(UnitOutcome::Fatal)
    }

    pub fn duration_ms(&self) -> u64 {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds().max(0) as u64)
            .unwrap_or(0)
    }
}

/// Plain-text summary printed at the end of a run.
pub fn render_run_summary(report: &RunReport) -> String {
    let mut out = String::new();
    for unit in &report.units {
        let mark = match unit.outcome {
            UnitOutcome::Passed => "✓",
            UnitOutcome::Exhausted => "✗",
            UnitOutcome::Aborted | UnitOutcome::Fatal => "!",
        };
        out.push_str(&format!(
            "  {} {} ({}) [{}, {} attempt(s)]\n",
            mark,
            unit.unit,
            unit.file.display(),
            unit.outcome,
            unit.attempts
        ));
        if let Some(err) = &unit.error {
            out.push_str(&format!("      {}\n", err));
        }
    }
    for skipped in &report.skipped_files {
        out.push_str(&format!(
            "  - skipped {}: {}\n",
            skipped.file.display(),
            skipped.reason
        ));
    }
    out.push_str(&format!(
        "\nSummary: {}/{} units passed ({} exhausted, {} aborted, {} fatal) across {} file(s)\n",
        report.passed_count(),
        report.units.len(),
        report.exhausted_count(),
        report.aborted_count(),
        report.fatal_count(),
        report.files_scanned
    ));
    out
}

/// Write the run report as pretty JSON.
pub fn write_run_report_json(path: &Path, report: &RunReport) -> Result<()> {
    let content = serde_json::to_string_pretty(report).context("serialize run report")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}
