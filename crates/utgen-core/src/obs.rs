//! Structured lifecycle events for the generate-run-fix loop.
//!
//! Every phase transition is logged with an `event` field so runs can be
//! followed in JSON logs (`--json`) as well as on the console.

use std::path::Path;

use tracing::{info, warn};

use crate::orchestration::UnitOutcome;

/// Span scoping every log line of one unit's loop.
///
/// Attach with `tracing::Instrument::instrument`; entering it across an
/// `.await` would leak into unrelated tasks.
pub fn unit_span(file: &Path, unit: &str) -> tracing::Span {
    tracing::info_span!("utgen.unit", file = %file.display(), unit = %unit)
}

/// Emit event: a file was analyzed.
pub fn emit_units_found(file: &Path, exported: usize, skipped: usize) {
    info!(
        event = "file.analyzed",
        file = %file.display(),
        exported = exported,
        skipped = skipped,
        "found {} exported unit(s)",
        exported
    );
}

/// Emit event: an attempt begins (1-based).
pub fn emit_attempt(unit: &str, attempt: u32, max_attempts: u32) {
    info!(
        event = "unit.attempt",
        unit = %unit,
        attempt = attempt,
        max_attempts = max_attempts,
        "trying attempt {} of {}",
        attempt,
        max_attempts
    );
}

/// Emit event: a test run finished.
pub fn emit_test_run(unit: &str, attempt: u32, success: bool) {
    if success {
        info!(event = "unit.tests_passed", unit = %unit, attempt = attempt, "tests passed");
    } else {
        info!(event = "unit.tests_failed", unit = %unit, attempt = attempt, "tests failed");
    }
}

/// Emit event: the attempt budget ran out.
pub fn emit_exhausted(unit: &str, max_attempts: u32) {
    warn!(
        event = "unit.exhausted",
        unit = %unit,
        max_attempts = max_attempts,
        "exceeded max tries"
    );
}

/// Emit event: a unit reached a terminal state.
pub fn emit_unit_finished(unit: &str, outcome: UnitOutcome, attempts: u32, duration_ms: u64) {
    info!(
        event = "unit.finished",
        unit = %unit,
        outcome = %outcome,
        attempts = attempts,
        duration_ms = duration_ms,
    );
}

/// Emit event: stopping a conversation failed (warning level).
pub fn emit_conversation_stop_error(conversation_id: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "conversation.stop_error",
        conversation_id = %conversation_id,
        error = %error,
    );
}

/// Emit event: the whole run finished.
pub fn emit_run_finished(passed: usize, total: usize, files: usize, duration_ms: u64) {
    info!(
        event = "run.finished",
        passed = passed,
        total = total,
        files = files,
        duration_ms = duration_ms,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_span_create() {
        let span = unit_span(Path::new("src/math.ts"), "add");
        let _guard = span.enter();
        emit_attempt("add", 1, 5);
    }
}
