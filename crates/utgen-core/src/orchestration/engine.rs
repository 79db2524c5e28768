//! The generate-run-fix loop.
//!
//! [`Orchestrator`] walks every discovered file and drives one
//! [`UnitDriver`] per exported unit. A driver is a small state machine
//! advanced by a single dispatch function (`step`); whatever terminal state
//! it reaches, the conversation it opened is stopped before the driver
//! returns.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info, warn, Instrument};

use super::config::{ExhaustionPolicy, FatalPolicy, LoopConfig};
use super::state::{RetryState, UnitOutcome, UnitState};
use crate::collaborators::{ConversationClient, SourceAnalyzer, TestRunner};
use crate::domain::{
    ConversationError, ConversationId, ExportedUnit, Result, TestRunResult, TestSource, UnitContext,
    UtgenError,
};
use crate::obs;
use crate::report::{RunReport, SkippedFile, UnitReport};

/// `operation` of the timeout raised when the run deadline passes.
const RUN_OPERATION: &str = "run";

/// Sequential driver for the whole run.
pub struct Orchestrator {
    analyzer: Arc<dyn SourceAnalyzer>,
    client: Arc<dyn ConversationClient>,
    runner: Arc<dyn TestRunner>,
    config: LoopConfig,
}

impl Orchestrator {
    pub fn new(
        analyzer: Arc<dyn SourceAnalyzer>,
        client: Arc<dyn ConversationClient>,
        runner: Arc<dyn TestRunner>,
        config: LoopConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            analyzer,
            client,
            runner,
            config,
        })
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Process every exported unit under `target` and return the report.
    pub async fn run(&self, target: &Path) -> Result<RunReport> {
        let mut report = RunReport::new();
        self.run_into(target, &mut report).await?;
        Ok(report)
    }

    /// Like [`run`](Self::run), but fills a caller-owned report so partial
    /// results survive a fatal error.
    ///
    /// The runner's `cleanup` is called exactly once, whatever happens.
    pub async fn run_into(&self, target: &Path, report: &mut RunReport) -> Result<()> {
        let deadline = self.config.run_timeout().map(|limit| Instant::now() + limit);

        let result = self.process_target(target, report, deadline).await;

        if let Err(e) = self.runner.cleanup().await {
            warn!(error = %e, "failed to clean up test runner scratch space");
        }

        report.finished_at = Some(Utc::now());
        obs::emit_run_finished(
            report.passed_count(),
            report.units.len(),
            report.files_scanned,
            report.duration_ms(),
        );
        result
    }

    async fn process_target(
        &self,
        target: &Path,
        report: &mut RunReport,
        deadline: Option<Instant>,
    ) -> Result<()> {
        let files = self.analyzer.discover(target)?;
        info!(target = %target.display(), files = files.len(), "discovered source files");

        for file in files {
            report.files_scanned += 1;

            if self.config.export_all {
                match self.analyzer.export_all(&file) {
                    Ok(true) => info!(file = %file.display(), "exported all top-level declarations"),
                    Ok(false) => {}
                    Err(e) => {
                        warn!(file = %file.display(), error = %e, "export transform failed");
                        report.skipped_files.push(SkippedFile {
                            file: file.clone(),
                            reason: e.to_string(),
                        });
                        continue;
                    }
                }
            }

            let analysis = match self.analyzer.analyze(&file) {
                Ok(analysis) => analysis,
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "skipping file that failed analysis");
                    report.skipped_files.push(SkippedFile {
                        file: file.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            obs::emit_units_found(
                &file,
                analysis.exported_units.len(),
                analysis.skipped_units.len(),
            );
            for name in &analysis.skipped_units {
                debug!(file = %file.display(), unit = %name, "skipping non-exported unit");
            }

            for unit in analysis.exported_units {
                if let Some(limit) = self.run_deadline_error(deadline) {
                    return Err(limit);
                }

                let unit_name = unit.name.clone();
                let (unit_report, terminal) = self.process_unit(&file, unit, deadline).await;
                report.units.push(unit_report);

                match terminal {
                    UnitState::Fatal(err) => match self.config.fatal_policy {
                        FatalPolicy::Abort => {
                            return Err(UtgenError::UnitFatal {
                                file: file.clone(),
                                unit: unit_name,
                                source: Box::new(err),
                            });
                        }
                        FatalPolicy::SkipUnit => {
                            warn!(unit = %unit_name, error = %err, "continuing after fatal unit");
                        }
                    },
                    // The deadline passed inside the unit, possibly the last one.
                    UnitState::Aborted(err) if is_run_timeout(&err) => return Err(err),
                    _ => {}
                }
            }
        }

        Ok(())
    }

    /// Drive one unit to a terminal state. The returned state is always
    /// terminal.
    pub async fn process_unit(
        &self,
        file: &Path,
        unit: ExportedUnit,
        deadline: Option<Instant>,
    ) -> (UnitReport, UnitState) {
        let span = obs::unit_span(file, &unit.name);
        let context = UnitContext {
            source_file: file.to_path_buf(),
            test_file: self.config.test_path_for(file, &unit),
            language: self.config.language,
            unit,
        };
        UnitDriver::new(self, context, deadline)
            .drive()
            .instrument(span)
            .await
    }

    fn run_deadline_error(&self, deadline: Option<Instant>) -> Option<UtgenError> {
        match (deadline, self.config.run_timeout_ms) {
            (Some(deadline), Some(timeout_ms)) if Instant::now() >= deadline => {
                Some(UtgenError::Timeout {
                    operation: RUN_OPERATION.to_string(),
                    timeout_ms,
                })
            }
            _ => None,
        }
    }

    /// Await a collaborator call under the per-attempt timeout.
    async fn bounded<T, E, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        UtgenError: From<E>,
    {
        match self.config.attempt_timeout() {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result.map_err(UtgenError::from),
                Err(_elapsed) => Err(UtgenError::Timeout {
                    operation: operation.to_string(),
                    timeout_ms: limit.as_millis() as u64,
                }),
            },
            None => fut.await.map_err(UtgenError::from),
        }
    }
}

fn is_run_timeout(err: &UtgenError) -> bool {
    matches!(err, UtgenError::Timeout { operation, .. } if operation == RUN_OPERATION)
}

/// State machine for one unit.
struct UnitDriver<'a> {
    orchestrator: &'a Orchestrator,
    context: UnitContext,
    retry: RetryState,
    conversation: Option<ConversationId>,
    feedback_rounds: u32,
    deadline: Option<Instant>,
}

impl<'a> UnitDriver<'a> {
    fn new(orchestrator: &'a Orchestrator, context: UnitContext, deadline: Option<Instant>) -> Self {
        Self {
            orchestrator,
            retry: RetryState::new(orchestrator.config.max_attempts),
            context,
            conversation: None,
            feedback_rounds: 0,
            deadline,
        }
    }

    async fn drive(mut self) -> (UnitReport, UnitState) {
        let started = Instant::now();
        let mut state = UnitState::Start;

        while !state.is_terminal() {
            state = self.step(state).await;
            debug!(state = state.name(), attempt = self.retry.attempt_count, "unit state");
        }

        self.release().await;

        let outcome = state.outcome().unwrap_or(UnitOutcome::Aborted);
        let error = match &state {
            UnitState::Fatal(e) | UnitState::Aborted(e) => {
                warn!(outcome = %outcome, error = %e, "unit did not complete");
                Some(e.to_string())
            }
            UnitState::Exhausted => {
                obs::emit_exhausted(&self.context.unit.name, self.retry.max_attempts);
                None
            }
            _ => None,
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        obs::emit_unit_finished(
            &self.context.unit.name,
            outcome,
            self.retry.attempts_used(),
            duration_ms,
        );

        let report = UnitReport {
            file: self.context.source_file.clone(),
            unit: self.context.unit.name.clone(),
            test_file: self.context.test_file.clone(),
            outcome,
            attempts: self.retry.attempts_used(),
            feedback_rounds: self.feedback_rounds,
            duration_ms,
            error,
        };
        (report, state)
    }

    /// Single dispatch point for every transition.
    async fn step(&mut self, state: UnitState) -> UnitState {
        match state {
            UnitState::Start => match self.open().await {
                Ok(id) => {
                    debug!(conversation_id = %id, "conversation opened");
                    self.conversation = Some(id);
                    UnitState::Generating
                }
                Err(e) => UnitState::Fatal(e),
            },

            UnitState::Generating => {
                if let Some(e) = self.orchestrator.run_deadline_error(self.deadline) {
                    return UnitState::Aborted(e);
                }
                if !self.retry.begin_attempt() {
                    return UnitState::Exhausted;
                }
                obs::emit_attempt(
                    &self.context.unit.name,
                    self.retry.attempt_count,
                    self.retry.max_attempts,
                );
                if !self.retry.is_first_attempt() {
                    // The revision from the feedback step is already on disk.
                    return UnitState::Running;
                }
                match self.generate().await {
                    Ok(()) => UnitState::Running,
                    Err(e) => UnitState::Fatal(e),
                }
            }

            UnitState::Running => {
                let result = self.run_tests().await;
                self.pause().await;
                match result {
                    Ok(run) => {
                        obs::emit_test_run(
                            &self.context.unit.name,
                            self.retry.attempt_count,
                            run.success,
                        );
                        if run.success {
                            self.retry.passed = true;
                            UnitState::Passed
                        } else {
                            UnitState::Feedback(run)
                        }
                    }
                    Err(e) => UnitState::Aborted(e),
                }
            }

            UnitState::Feedback(run) => {
                if self.orchestrator.config.exhaustion_policy
                    == ExhaustionPolicy::CheckBeforeFeedback
                    && self.retry.is_last_attempt()
                {
                    return UnitState::Exhausted;
                }
                match self.revise(&run.raw_results).await {
                    Ok(()) => UnitState::Generating,
                    Err(e) => UnitState::Aborted(e),
                }
            }

            terminal => terminal,
        }
    }

    async fn open(&self) -> Result<ConversationId> {
        let client = &self.orchestrator.client;
        self.orchestrator
            .bounded("start conversation", client.start_conversation(&self.context))
            .await
    }

    async fn generate(&mut self) -> Result<()> {
        let id = self.open_conversation()?;
        let client = &self.orchestrator.client;
        let source = self
            .orchestrator
            .bounded("generate initial tests", client.generate_initial_tests(&id))
            .await?;
        self.write(&source).await
    }

    async fn revise(&mut self, feedback: &str) -> Result<()> {
        let id = self.open_conversation()?;
        let client = &self.orchestrator.client;
        let source = self
            .orchestrator
            .bounded("provide feedback", client.provide_feedback(&id, feedback))
            .await?;
        self.feedback_rounds += 1;
        self.write(&source).await
    }

    async fn run_tests(&self) -> Result<TestRunResult> {
        let runner = &self.orchestrator.runner;
        self.orchestrator
            .bounded(
                "run tests",
                runner.run(&self.orchestrator.config.root_dir, &self.context.test_file),
            )
            .await
    }

    async fn write(&self, source: &TestSource) -> Result<()> {
        if source.is_empty() {
            warn!(
                language = %self.context.language,
                "model response contained no code block; writing an empty candidate"
            );
        }
        self.orchestrator
            .runner
            .write_candidate(&self.context.test_file, source)
            .await?;
        debug!(path = %self.context.test_file.display(), "candidate written");
        Ok(())
    }

    async fn pause(&self) {
        let delay = self.orchestrator.config.attempt_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn open_conversation(&self) -> Result<ConversationId> {
        self.conversation.clone().ok_or_else(|| {
            UtgenError::Conversation(ConversationError::StartFailed(
                "conversation is not open".to_string(),
            ))
        })
    }

    /// Stop the conversation if one is open. Errors are logged, never raised.
    async fn release(&mut self) {
        let Some(id) = self.conversation.take() else {
            return;
        };
        let client = &self.orchestrator.client;
        match self
            .orchestrator
            .bounded("stop conversation", client.stop_conversation(&id))
            .await
        {
            Ok(()) => debug!(conversation_id = %id, "conversation stopped"),
            Err(e) => obs::emit_conversation_stop_error(&id.to_string(), &e),
        }
    }
}

impl Drop for UnitDriver<'_> {
    fn drop(&mut self) {
        if let Some(id) = &self.conversation {
            warn!(conversation_id = %id, "unit loop dropped with an open conversation");
        }
    }
}
