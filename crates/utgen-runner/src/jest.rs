//! Jest execution.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use utgen_core::{RunnerError, RunnerResult, TestRunResult, TestRunner};

use crate::report::JestReport;

const RESULTS_FILE: &str = "jest-results.json";

/// How Jest is invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JestConfig {
    pub program: String,
    /// Arguments before the test file.
    pub args: Vec<String>,
    /// Kill the run after this long.
    pub timeout: Duration,
}

impl Default for JestConfig {
    fn default() -> Self {
        Self {
            program: "npx".to_string(),
            args: vec!["jest".to_string()],
            timeout: Duration::from_secs(300),
        }
    }
}

/// Runs one test file per call:
///
/// `<program> <args..> <test file> --json --outputFile=<scratch>/jest-results.json --testLocationInResults`
///
/// The scratch directory is created on first use and reused until
/// [`cleanup`](TestRunner::cleanup).
pub struct JestRunner {
    config: JestConfig,
    scratch: Mutex<Option<TempDir>>,
}

impl Default for JestRunner {
    fn default() -> Self {
        Self::new(JestConfig::default())
    }
}

impl JestRunner {
    pub fn new(config: JestConfig) -> Self {
        Self {
            config,
            scratch: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &JestConfig {
        &self.config
    }

    /// Location of the JSON report, creating the scratch directory if needed.
    async fn results_path(&self) -> RunnerResult<PathBuf> {
        let mut scratch = self.scratch.lock().await;
        if scratch.is_none() {
            let dir = tempfile::Builder::new().prefix("utgen-").tempdir()?;
            debug!(path = %dir.path().display(), "created runner scratch directory");
            *scratch = Some(dir);
        }
        let dir = scratch
            .as_ref()
            .ok_or_else(|| RunnerError::Spawn("scratch directory unavailable".to_string()))?;
        Ok(dir.path().join(RESULTS_FILE))
    }

    fn spawn_error(&self, err: std::io::Error) -> RunnerError {
        match err.kind() {
            ErrorKind::NotFound => RunnerError::NotFound {
                program: self.config.program.clone(),
            },
            ErrorKind::PermissionDenied => RunnerError::PermissionDenied {
                program: self.config.program.clone(),
            },
            _ => RunnerError::Spawn(format!("{}: {}", self.config.program, err)),
        }
    }
}

/// `path` made absolute against the current directory, so it survives the
/// change of working directory to `root_dir`.
fn absolute(path: &Path) -> RunnerResult<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

async fn read_report(path: &Path) -> Option<JestReport> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not read jest report");
            return None;
        }
    };
    match JestReport::parse(&content) {
        Ok(report) => Some(report),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not parse jest report");
            None
        }
    }
}

fn combined_output(stdout: &str, stderr: &str) -> String {
    [stderr.trim(), stdout.trim()]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl TestRunner for JestRunner {
    async fn run(&self, root_dir: &Path, test_file: &Path) -> RunnerResult<TestRunResult> {
        let start = Instant::now();
        let results_path = self.results_path().await?;
        match tokio::fs::remove_file(&results_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        let test_path = absolute(test_file)?;

        let child = Command::new(&self.config.program)
            .args(&self.config.args)
            .arg(&test_path)
            .arg("--json")
            .arg(format!("--outputFile={}", results_path.display()))
            .arg("--testLocationInResults")
            .current_dir(root_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let output = tokio::time::timeout(self.config.timeout, child.wait_with_output())
            .await
            .map_err(|_| RunnerError::TimedOut {
                path: test_path.clone(),
                timeout_secs: self.config.timeout.as_secs(),
            })??;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let report = read_report(&results_path).await;
        let success = report
            .as_ref()
            .map(|r| r.success)
            .unwrap_or_else(|| output.status.success());

        debug!(
            test_file = %test_path.display(),
            exit_code = output.status.code().unwrap_or(-1),
            has_report = report.is_some(),
            success = success,
            duration_ms = start.elapsed().as_millis() as u64,
            "jest finished"
        );

        let output_text = combined_output(&stdout, &stderr);
        if success {
            let raw = report
                .as_ref()
                .map(JestReport::summary_line)
                .unwrap_or(output_text);
            return Ok(TestRunResult::passed(raw));
        }

        let raw = report
            .as_ref()
            .and_then(JestReport::failure_digest)
            .unwrap_or(output_text);
        Ok(TestRunResult::failed(raw))
    }

    async fn cleanup(&self) -> RunnerResult<()> {
        if let Some(dir) = self.scratch.lock().await.take() {
            let path = dir.path().to_path_buf();
            dir.close()?;
            debug!(path = %path.display(), "removed runner scratch directory");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_invokes_npx_jest() {
        let cfg = JestConfig::default();
        assert_eq!(cfg.program, "npx");
        assert_eq!(cfg.args, vec!["jest"]);
        assert_eq!(cfg.timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_combined_output_skips_empty_streams() {
        assert_eq!(combined_output("out\n", ""), "out");
        assert_eq!(combined_output(" out ", "err"), "err\nout");
        assert_eq!(combined_output("", ""), "");
    }

    #[test]
    fn test_absolute_keeps_absolute_paths() {
        let abs = std::env::temp_dir().join("a.ut.test.ts");
        assert_eq!(absolute(&abs).unwrap(), abs);
        assert!(absolute(Path::new("src/a.ut.test.ts")).unwrap().is_absolute());
    }
}
