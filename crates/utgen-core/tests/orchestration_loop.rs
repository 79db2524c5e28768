//! End-to-end behavior of the generate-run-fix loop against in-memory fakes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use utgen_core::fakes::{FakeConversationClient, ScriptedRun, ScriptedTestRunner, StaticAnalyzer};
use utgen_core::{
    ExhaustionPolicy, ExportedUnit, FatalPolicy, FileAnalysis, LoopConfig, Orchestrator,
    RunReport, UnitKind, UnitOutcome, UtgenError,
};

fn config(max_attempts: u32) -> LoopConfig {
    LoopConfig {
        max_attempts,
        attempt_delay_ms: 0,
        ..LoopConfig::default()
    }
}

fn file(path: &str, units: &[&str]) -> FileAnalysis {
    FileAnalysis {
        path: PathBuf::from(path),
        import_statements: vec!["import { round } from './util';".to_string()],
        exported_units: units
            .iter()
            .map(|name| {
                ExportedUnit::new(
                    *name,
                    format!("export function {name}(a: number, b: number) {{ return a; }}"),
                    UnitKind::Function,
                )
            })
            .collect(),
        skipped_units: Vec::new(),
    }
}

fn orchestrator(
    analyzer: StaticAnalyzer,
    client: &Arc<FakeConversationClient>,
    runner: &Arc<ScriptedTestRunner>,
    config: LoopConfig,
) -> Orchestrator {
    Orchestrator::new(Arc::new(analyzer), client.clone(), runner.clone(), config)
        .expect("valid config")
}

#[tokio::test]
async fn test_pass_on_first_attempt() {
    let client = Arc::new(FakeConversationClient::new());
    let runner = Arc::new(ScriptedTestRunner::new([ScriptedRun::Pass]));
    let analyzer = StaticAnalyzer::new().with_file(file("src/math.ts", &["add"]));

    let report = orchestrator(analyzer, &client, &runner, config(5))
        .run(Path::new("src"))
        .await
        .expect("run");

    let calls = client.calls();
    assert_eq!(calls.start, 1);
    assert_eq!(calls.generate, 1);
    assert_eq!(calls.feedback, 0);
    assert_eq!(calls.stop, 1);
    assert_eq!(runner.runs().len(), 1);
    assert_eq!(runner.cleanup_count(), 1);

    assert_eq!(report.units.len(), 1);
    let unit = &report.units[0];
    assert_eq!(unit.outcome, UnitOutcome::Passed);
    assert_eq!(unit.attempts, 1);
    assert_eq!(unit.test_file, PathBuf::from("src/add.ut.test.ts"));
    assert!(report.finished_at.is_some());
}

#[tokio::test]
async fn test_always_failing_exhausts_after_feedback_for_every_attempt() {
    let client = Arc::new(FakeConversationClient::new());
    let runner = Arc::new(ScriptedTestRunner::always_failing());
    let analyzer = StaticAnalyzer::new().with_file(file("src/math.ts", &["add"]));

    let report = orchestrator(analyzer, &client, &runner, config(2))
        .run(Path::new("src"))
        .await
        .expect("run");

    let calls = client.calls();
    assert_eq!(runner.runs().len(), 2);
    assert_eq!(calls.generate, 1);
    assert_eq!(calls.feedback, 2);
    assert_eq!(calls.stop, 1);
    assert_eq!(client.open_conversations(), 0);

    let unit = &report.units[0];
    assert_eq!(unit.outcome, UnitOutcome::Exhausted);
    assert_eq!(unit.attempts, 2);
    assert_eq!(unit.feedback_rounds, 2);
    assert!(unit.error.is_none());
}

#[tokio::test]
async fn test_check_before_feedback_skips_last_feedback() {
    let client = Arc::new(FakeConversationClient::new());
    let runner = Arc::new(ScriptedTestRunner::always_failing());
    let analyzer = StaticAnalyzer::new().with_file(file("src/math.ts", &["add"]));
    let cfg = LoopConfig {
        exhaustion_policy: ExhaustionPolicy::CheckBeforeFeedback,
        ..config(3)
    };

    let report = orchestrator(analyzer, &client, &runner, cfg)
        .run(Path::new("src"))
        .await
        .expect("run");

    assert_eq!(runner.runs().len(), 3);
    assert_eq!(client.calls().feedback, 2);
    assert_eq!(client.calls().stop, 1);
    assert_eq!(report.units[0].outcome, UnitOutcome::Exhausted);
    assert_eq!(report.units[0].attempts, 3);
}

#[tokio::test]
async fn test_fail_fail_pass_writes_each_revision() {
    let client = Arc::new(FakeConversationClient::new());
    let runner = Arc::new(ScriptedTestRunner::new([
        ScriptedRun::Fail("expected 3, received 4".to_string()),
        ScriptedRun::Fail("expected 5, received 6".to_string()),
        ScriptedRun::Pass,
    ]));
    let analyzer = StaticAnalyzer::new().with_file(file("src/math.ts", &["add"]));

    let report = orchestrator(analyzer, &client, &runner, config(3))
        .run(Path::new("src"))
        .await
        .expect("run");

    assert_eq!(report.units[0].outcome, UnitOutcome::Passed);
    assert_eq!(report.units[0].attempts, 3);
    assert_eq!(client.calls().feedback, 2);
    assert_eq!(
        client.feedback_log(),
        vec!["expected 3, received 4", "expected 5, received 6"]
    );

    let contents: Vec<String> = runner.writes().into_iter().map(|(_, c)| c).collect();
    assert_eq!(
        contents,
        vec![
            "// initial for add",
            "// revision 1 for add",
            "// revision 2 for add"
        ]
    );
    let test_file = PathBuf::from("src/add.ut.test.ts");
    assert!(runner.runs().iter().all(|p| *p == test_file));
    assert!(runner.writes().iter().all(|(p, _)| *p == test_file));
}

#[tokio::test]
async fn test_zero_files_still_cleans_up() {
    let client = Arc::new(FakeConversationClient::new());
    let runner = Arc::new(ScriptedTestRunner::always_passing());

    let report = orchestrator(StaticAnalyzer::new(), &client, &runner, config(5))
        .run(Path::new("empty"))
        .await
        .expect("run");

    assert!(report.units.is_empty());
    assert_eq!(report.files_scanned, 0);
    assert_eq!(client.calls().start, 0);
    assert_eq!(runner.cleanup_count(), 1);
}

#[tokio::test]
async fn test_only_exported_units_are_processed() {
    let client = Arc::new(FakeConversationClient::new());
    let runner = Arc::new(ScriptedTestRunner::always_passing());
    let mut analysis = file("src/math.ts", &["add"]);
    analysis.skipped_units = vec!["helper".to_string()];
    let analyzer = StaticAnalyzer::new().with_file(analysis);

    let report = orchestrator(analyzer, &client, &runner, config(5))
        .run(Path::new("src"))
        .await
        .expect("run");

    assert_eq!(report.units.len(), 1);
    assert_eq!(report.units[0].unit, "add");
    assert_eq!(client.calls().start, 1);
}

#[tokio::test]
async fn test_units_processed_in_file_then_declaration_order() {
    let client = Arc::new(FakeConversationClient::new());
    let runner = Arc::new(ScriptedTestRunner::always_passing());
    let analyzer = StaticAnalyzer::new()
        .with_file(file("src/math.ts", &["add", "sub"]))
        .with_file(file("src/geometry/area.ts", &["circle"]));

    let report = orchestrator(analyzer, &client, &runner, config(5))
        .run(Path::new("src"))
        .await
        .expect("run");

    let names: Vec<&str> = report.units.iter().map(|u| u.unit.as_str()).collect();
    assert_eq!(names, vec!["add", "sub", "circle"]);
    assert_eq!(
        runner.runs(),
        vec![
            PathBuf::from("src/add.ut.test.ts"),
            PathBuf::from("src/sub.ut.test.ts"),
            PathBuf::from("src/geometry/circle.ut.test.ts"),
        ]
    );
    assert_eq!(client.calls().stop, 3);
    assert_eq!(report.files_scanned, 2);
}

#[tokio::test]
async fn test_unparsable_file_is_skipped() {
    let client = Arc::new(FakeConversationClient::new());
    let runner = Arc::new(ScriptedTestRunner::always_passing());
    let analyzer = StaticAnalyzer::new()
        .with_file(file("src/math.ts", &["add"]))
        .with_unparsable("src/broken.ts");

    let report = orchestrator(analyzer, &client, &runner, config(5))
        .run(Path::new("src"))
        .await
        .expect("run");

    assert_eq!(report.units.len(), 1);
    assert_eq!(report.skipped_files.len(), 1);
    assert_eq!(report.skipped_files[0].file, PathBuf::from("src/broken.ts"));
    assert_eq!(report.files_scanned, 2);
}

#[tokio::test]
async fn test_export_all_runs_before_analysis() {
    let client = Arc::new(FakeConversationClient::new());
    let runner = Arc::new(ScriptedTestRunner::always_passing());
    let analyzer = Arc::new(StaticAnalyzer::new().with_file(file("src/math.ts", &["add"])));
    let cfg = LoopConfig {
        export_all: true,
        ..config(5)
    };

    Orchestrator::new(analyzer.clone(), client.clone(), runner.clone(), cfg)
        .expect("valid config")
        .run(Path::new("src"))
        .await
        .expect("run");

    assert_eq!(analyzer.export_all_calls(), vec![PathBuf::from("src/math.ts")]);
}

#[tokio::test]
async fn test_start_failure_aborts_run_by_default() {
    let client = Arc::new(FakeConversationClient::new().failing_start());
    let runner = Arc::new(ScriptedTestRunner::always_passing());
    let analyzer = StaticAnalyzer::new().with_file(file("src/math.ts", &["add", "sub"]));
    let orch = orchestrator(analyzer, &client, &runner, config(5));

    let mut report = RunReport::new();
    let err = orch
        .run_into(Path::new("src"), &mut report)
        .await
        .expect_err("fatal unit aborts the run");

    match err {
        UtgenError::UnitFatal { unit, .. } => assert_eq!(unit, "add"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(client.calls().start, 1);
    assert_eq!(client.calls().stop, 0);
    assert_eq!(runner.cleanup_count(), 1);
    assert_eq!(report.units.len(), 1);
    assert_eq!(report.units[0].outcome, UnitOutcome::Fatal);
    assert!(report.finished_at.is_some());
}

#[tokio::test]
async fn test_generation_failure_stops_conversation() {
    let client = Arc::new(FakeConversationClient::new().failing_generation());
    let runner = Arc::new(ScriptedTestRunner::always_passing());
    let analyzer = StaticAnalyzer::new().with_file(file("src/math.ts", &["add"]));

    let err = orchestrator(analyzer, &client, &runner, config(5))
        .run(Path::new("src"))
        .await
        .expect_err("fatal");

    assert!(matches!(err, UtgenError::UnitFatal { .. }));
    assert_eq!(client.calls().stop, 1);
    assert_eq!(client.open_conversations(), 0);
    assert!(runner.runs().is_empty());
}

#[tokio::test]
async fn test_skip_unit_policy_continues_after_fatal() {
    let client = Arc::new(FakeConversationClient::new().failing_generation());
    let runner = Arc::new(ScriptedTestRunner::always_passing());
    let analyzer = StaticAnalyzer::new().with_file(file("src/math.ts", &["add", "sub"]));
    let cfg = LoopConfig {
        fatal_policy: FatalPolicy::SkipUnit,
        ..config(5)
    };

    let report = orchestrator(analyzer, &client, &runner, cfg)
        .run(Path::new("src"))
        .await
        .expect("run continues");

    assert_eq!(report.units.len(), 2);
    assert_eq!(report.fatal_count(), 2);
    assert_eq!(client.calls().start, 2);
    assert_eq!(client.calls().stop, 2);
    assert!(report.units[0].error.as_deref().unwrap_or("").contains("rate limited"));
}

#[tokio::test]
async fn test_runner_error_aborts_only_that_unit() {
    let client = Arc::new(FakeConversationClient::new());
    let runner = Arc::new(ScriptedTestRunner::new([
        ScriptedRun::Error,
        ScriptedRun::Pass,
    ]));
    let analyzer = StaticAnalyzer::new().with_file(file("src/math.ts", &["add", "sub"]));

    let report = orchestrator(analyzer, &client, &runner, config(5))
        .run(Path::new("src"))
        .await
        .expect("run");

    assert_eq!(report.units[0].outcome, UnitOutcome::Aborted);
    assert!(report.units[0]
        .error
        .as_deref()
        .unwrap_or("")
        .contains("not found"));
    assert_eq!(report.units[1].outcome, UnitOutcome::Passed);
    assert_eq!(client.calls().feedback, 0);
    assert_eq!(client.calls().stop, 2);
}

#[tokio::test]
async fn test_feedback_failure_aborts_unit_and_stops_conversation() {
    let client = Arc::new(FakeConversationClient::new().failing_feedback());
    let runner = Arc::new(ScriptedTestRunner::always_failing());
    let analyzer = StaticAnalyzer::new().with_file(file("src/math.ts", &["add"]));

    let report = orchestrator(analyzer, &client, &runner, config(5))
        .run(Path::new("src"))
        .await
        .expect("run");

    assert_eq!(report.units[0].outcome, UnitOutcome::Aborted);
    assert_eq!(report.units[0].feedback_rounds, 0);
    assert_eq!(runner.runs().len(), 1);
    assert_eq!(client.calls().stop, 1);
    assert_eq!(client.open_conversations(), 0);
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let client = Arc::new(FakeConversationClient::new());
    let runner = Arc::new(ScriptedTestRunner::always_passing());
    let result = Orchestrator::new(
        Arc::new(StaticAnalyzer::new()),
        client,
        runner,
        config(0),
    );
    assert!(matches!(result, Err(UtgenError::InvalidConfig(_))));
}

#[tokio::test(start_paused = true)]
async fn test_delay_follows_every_run() {
    let client = Arc::new(FakeConversationClient::new());
    let runner = Arc::new(ScriptedTestRunner::always_failing());
    let analyzer = StaticAnalyzer::new().with_file(file("src/math.ts", &["add"]));
    let cfg = LoopConfig {
        attempt_delay_ms: 1_000,
        ..config(3)
    };

    let started = tokio::time::Instant::now();
    orchestrator(analyzer, &client, &runner, cfg)
        .run(Path::new("src"))
        .await
        .expect("run");

    assert_eq!(runner.runs().len(), 3);
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn test_attempt_timeout_is_fatal_and_stops_conversation() {
    let client =
        Arc::new(FakeConversationClient::new().with_generation_delay(Duration::from_secs(60)));
    let runner = Arc::new(ScriptedTestRunner::always_passing());
    let analyzer = StaticAnalyzer::new().with_file(file("src/math.ts", &["add"]));
    let cfg = LoopConfig {
        attempt_timeout_ms: Some(1_000),
        fatal_policy: FatalPolicy::SkipUnit,
        ..config(5)
    };

    let report = orchestrator(analyzer, &client, &runner, cfg)
        .run(Path::new("src"))
        .await
        .expect("run");

    let unit = &report.units[0];
    assert_eq!(unit.outcome, UnitOutcome::Fatal);
    assert!(unit.error.as_deref().unwrap_or("").contains("timed out"));
    assert_eq!(client.calls().stop, 1);
    assert!(runner.runs().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_run_timeout_stops_between_attempts() {
    let client = Arc::new(FakeConversationClient::new());
    let runner = Arc::new(ScriptedTestRunner::always_failing());
    let analyzer = StaticAnalyzer::new().with_file(file("src/math.ts", &["add", "sub"]));
    let cfg = LoopConfig {
        attempt_delay_ms: 1_000,
        run_timeout_ms: Some(1_500),
        ..config(5)
    };

    let mut report = RunReport::new();
    let err = orchestrator(analyzer, &client, &runner, cfg)
        .run_into(Path::new("src"), &mut report)
        .await
        .expect_err("run timeout");

    assert!(matches!(err, UtgenError::Timeout { ref operation, .. } if operation == "run"));
    assert_eq!(runner.runs().len(), 2);
    assert_eq!(report.units.len(), 1);
    assert_eq!(report.units[0].outcome, UnitOutcome::Aborted);
    assert_eq!(client.calls().stop, 1);
    assert_eq!(runner.cleanup_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_timeout_inside_last_unit_is_an_error() {
    let client = Arc::new(FakeConversationClient::new());
    let runner = Arc::new(ScriptedTestRunner::always_failing());
    let analyzer = StaticAnalyzer::new().with_file(file("src/math.ts", &["add"]));
    let cfg = LoopConfig {
        attempt_delay_ms: 1_000,
        run_timeout_ms: Some(1_500),
        ..config(5)
    };

    let mut report = RunReport::new();
    let err = orchestrator(analyzer, &client, &runner, cfg)
        .run_into(Path::new("src"), &mut report)
        .await
        .expect_err("run timeout");

    assert!(matches!(err, UtgenError::Timeout { ref operation, .. } if operation == "run"));
    assert_eq!(runner.runs().len(), 2);
    assert_eq!(report.units.len(), 1);
    assert_eq!(report.units[0].outcome, UnitOutcome::Aborted);
    assert_eq!(client.calls().stop, 1);
    assert_eq!(runner.cleanup_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_attempt_timeout_abort_does_not_end_the_run() {
    let client = Arc::new(FakeConversationClient::new());
    let runner = Arc::new(
        ScriptedTestRunner::new([ScriptedRun::Pass, ScriptedRun::Pass])
            .with_run_delay(Duration::from_secs(10)),
    );
    let analyzer = StaticAnalyzer::new().with_file(file("src/math.ts", &["add", "sub"]));
    let cfg = LoopConfig {
        attempt_timeout_ms: Some(1_000),
        ..config(2)
    };

    let report = orchestrator(analyzer, &client, &runner, cfg)
        .run(Path::new("src"))
        .await
        .expect("attempt timeouts abort units only");

    assert_eq!(report.units.len(), 2);
    assert!(report
        .units
        .iter()
        .all(|unit| unit.outcome == UnitOutcome::Aborted));
}
