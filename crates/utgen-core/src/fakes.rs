//! In-memory fakes for the collaborator traits (testing only)
//!
//! Provides `FakeConversationClient`, `ScriptedTestRunner` and
//! `StaticAnalyzer`, which satisfy the trait contracts without a model
//! provider, a JavaScript toolchain or a parser.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::collaborators::*;
use crate::domain::{
    AnalyzerError, ConversationError, ConversationId, FileAnalysis, RunnerError, TestRunResult,
    TestSource, UnitContext,
};

// ---------------------------------------------------------------------------
// FakeConversationClient
// ---------------------------------------------------------------------------

/// Number of calls each client operation received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub start: u32,
    pub generate: u32,
    pub feedback: u32,
    pub stop: u32,
}

#[derive(Debug)]
struct FakeConversation {
    unit: String,
    revisions: u32,
}

/// Conversation client with a real id registry and canned responses.
///
/// The initial candidate is `// initial for <unit>`, the n-th revision is
/// `// revision <n> for <unit>`.
#[derive(Debug, Default)]
pub struct FakeConversationClient {
    conversations: Mutex<HashMap<ConversationId, FakeConversation>>,
    calls: Mutex<CallCounts>,
    feedback_log: Mutex<Vec<String>>,
    fail_start: bool,
    fail_generation: bool,
    fail_feedback: bool,
    generation_delay: Option<Duration>,
}

impl FakeConversationClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn failing_generation(mut self) -> Self {
        self.fail_generation = true;
        self
    }

    pub fn failing_feedback(mut self) -> Self {
        self.fail_feedback = true;
        self
    }

    /// Sleep before answering `generate_initial_tests`.
    pub fn with_generation_delay(mut self, delay: Duration) -> Self {
        self.generation_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> CallCounts {
        *self.calls.lock().unwrap()
    }

    /// Feedback payloads in the order they were received.
    pub fn feedback_log(&self) -> Vec<String> {
        self.feedback_log.lock().unwrap().clone()
    }

    pub fn open_conversations(&self) -> usize {
        self.conversations.lock().unwrap().len()
    }

    fn unit_of(&self, id: &ConversationId) -> ConversationResult<String> {
        let conversations = self.conversations.lock().unwrap();
        conversations
            .get(id)
            .map(|c| c.unit.clone())
            .ok_or_else(|| ConversationError::NotFound(id.clone()))
    }
}

#[async_trait]
impl ConversationClient for FakeConversationClient {
    async fn start_conversation(&self, context: &UnitContext) -> ConversationResult<ConversationId> {
        self.calls.lock().unwrap().start += 1;
        if self.fail_start {
            return Err(ConversationError::StartFailed(
                "provider unavailable".to_string(),
            ));
        }
        let id = ConversationId::new();
        self.conversations.lock().unwrap().insert(
            id.clone(),
            FakeConversation {
                unit: context.unit.name.clone(),
                revisions: 0,
            },
        );
        Ok(id)
    }

    async fn generate_initial_tests(&self, id: &ConversationId) -> ConversationResult<TestSource> {
        self.calls.lock().unwrap().generate += 1;
        if let Some(delay) = self.generation_delay {
            tokio::time::sleep(delay).await;
        }
        let unit = self.unit_of(id)?;
        if self.fail_generation {
            return Err(ConversationError::GenerationFailed {
                attempts: 3,
                reason: "rate limited".to_string(),
            });
        }
        Ok(TestSource::new(vec![format!("// initial for {unit}")]))
    }

    async fn provide_feedback(
        &self,
        id: &ConversationId,
        feedback: &str,
    ) -> ConversationResult<TestSource> {
        self.calls.lock().unwrap().feedback += 1;
        self.feedback_log.lock().unwrap().push(feedback.to_string());
        if self.fail_feedback {
            self.unit_of(id)?;
            return Err(ConversationError::FeedbackFailed {
                attempts: 3,
                reason: "context length exceeded".to_string(),
            });
        }
        let mut conversations = self.conversations.lock().unwrap();
        let conversation = conversations
            .get_mut(id)
            .ok_or_else(|| ConversationError::NotFound(id.clone()))?;
        conversation.revisions += 1;
        Ok(TestSource::new(vec![format!(
            "// revision {} for {}",
            conversation.revisions, conversation.unit
        )]))
    }

    async fn stop_conversation(&self, id: &ConversationId) -> ConversationResult<()> {
        self.calls.lock().unwrap().stop += 1;
        self.conversations
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ConversationError::NotFound(id.clone()))
    }
}

// ---------------------------------------------------------------------------
// ScriptedTestRunner
// ---------------------------------------------------------------------------

/// One scripted answer of [`ScriptedTestRunner::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedRun {
    Pass,
    Fail(String),
    /// The runner binary is missing.
    Error,
}

/// Test runner answering from a script. Once the script is used up every
/// run fails.
///
/// Candidates are recorded in memory instead of written to disk.
#[derive(Debug, Default)]
pub struct ScriptedTestRunner {
    script: Mutex<VecDeque<ScriptedRun>>,
    runs: Mutex<Vec<PathBuf>>,
    writes: Mutex<Vec<(PathBuf, String)>>,
    cleanups: Mutex<u32>,
    run_delay: Option<Duration>,
}

impl ScriptedTestRunner {
    pub fn new(script: impl IntoIterator<Item = ScriptedRun>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Self::default()
        }
    }

    /// A runner whose every run fails.
    pub fn always_failing() -> Self {
        Self::default()
    }

    /// A runner whose every run passes.
    pub fn always_passing() -> Self {
        Self::new(std::iter::repeat(ScriptedRun::Pass).take(1_000))
    }

    /// Sleep before answering each run.
    pub fn with_run_delay(mut self, delay: Duration) -> Self {
        self.run_delay = Some(delay);
        self
    }

    /// Test files passed to `run`, in call order.
    pub fn runs(&self) -> Vec<PathBuf> {
        self.runs.lock().unwrap().clone()
    }

    /// `(path, content)` of every candidate written, in call order.
    pub fn writes(&self) -> Vec<(PathBuf, String)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn cleanup_count(&self) -> u32 {
        *self.cleanups.lock().unwrap()
    }
}

#[async_trait]
impl TestRunner for ScriptedTestRunner {
    async fn write_candidate(&self, path: &Path, source: &TestSource) -> RunnerResult<()> {
        self.writes
            .lock()
            .unwrap()
            .push((path.to_path_buf(), source.joined()));
        Ok(())
    }

    async fn run(&self, _root_dir: &Path, test_file: &Path) -> RunnerResult<TestRunResult> {
        self.runs.lock().unwrap().push(test_file.to_path_buf());
        if let Some(delay) = self.run_delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(ScriptedRun::Pass) => Ok(TestRunResult::passed("")),
            Some(ScriptedRun::Fail(raw)) => Ok(TestRunResult::failed(raw)),
            Some(ScriptedRun::Error) => Err(RunnerError::NotFound {
                program: "npx".to_string(),
            }),
            None => Ok(TestRunResult::failed("expect(received).toBe(expected)")),
        }
    }

    async fn cleanup(&self) -> RunnerResult<()> {
        *self.cleanups.lock().unwrap() += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StaticAnalyzer
// ---------------------------------------------------------------------------

/// Analyzer serving pre-built analyses, in insertion order.
#[derive(Debug, Default)]
pub struct StaticAnalyzer {
    files: Vec<FileAnalysis>,
    unparsable: Vec<PathBuf>,
    export_all_calls: Mutex<Vec<PathBuf>>,
}

impl StaticAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, analysis: FileAnalysis) -> Self {
        self.files.push(analysis);
        self
    }

    /// Discovered, but `analyze` fails with a parse error.
    pub fn with_unparsable(mut self, path: impl Into<PathBuf>) -> Self {
        self.unparsable.push(path.into());
        self
    }

    pub fn export_all_calls(&self) -> Vec<PathBuf> {
        self.export_all_calls.lock().unwrap().clone()
    }
}

impl SourceAnalyzer for StaticAnalyzer {
    fn discover(&self, _target: &Path) -> AnalyzerResult<Vec<PathBuf>> {
        Ok(self
            .files
            .iter()
            .map(|f| f.path.clone())
            .chain(self.unparsable.iter().cloned())
            .collect())
    }

    fn analyze(&self, path: &Path) -> AnalyzerResult<FileAnalysis> {
        if self.unparsable.iter().any(|p| p == path) {
            return Err(AnalyzerError::Parse {
                path: path.to_path_buf(),
            });
        }
        self.files
            .iter()
            .find(|f| f.path == path)
            .cloned()
            .ok_or_else(|| AnalyzerError::Read {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
    }

    fn export_all(&self, path: &Path) -> AnalyzerResult<bool> {
        self.export_all_calls
            .lock()
            .unwrap()
            .push(path.to_path_buf());
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExportedUnit, Language, UnitKind};

    fn context(unit: &str) -> UnitContext {
        UnitContext {
            source_file: PathBuf::from("src/math.ts"),
            test_file: PathBuf::from(format!("src/{unit}.ut.test.ts")),
            language: Language::TypeScript,
            unit: ExportedUnit::new(unit, "export function add() {}", UnitKind::Function),
        }
    }

    #[tokio::test]
    async fn test_stop_twice_is_not_found() {
        let client = FakeConversationClient::new();
        let id = client.start_conversation(&context("add")).await.unwrap();

        client.stop_conversation(&id).await.unwrap();
        let err = client.stop_conversation(&id).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(client.open_conversations(), 0);
    }

    #[tokio::test]
    async fn test_generate_after_stop_is_not_found() {
        let client = FakeConversationClient::new();
        let id = client.start_conversation(&context("add")).await.unwrap();
        client.stop_conversation(&id).await.unwrap();

        let err = client.generate_initial_tests(&id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_revisions_are_numbered_per_conversation() {
        let client = FakeConversationClient::new();
        let a = client.start_conversation(&context("add")).await.unwrap();
        let b = client.start_conversation(&context("sub")).await.unwrap();
        assert_ne!(a, b);

        client.provide_feedback(&a, "fail 1").await.unwrap();
        let second = client.provide_feedback(&a, "fail 2").await.unwrap();
        let other = client.provide_feedback(&b, "fail").await.unwrap();

        assert_eq!(second.joined(), "// revision 2 for add");
        assert_eq!(other.joined(), "// revision 1 for sub");
        assert_eq!(client.feedback_log(), vec!["fail 1", "fail 2", "fail"]);
    }

    #[tokio::test]
    async fn test_scripted_runner_falls_back_to_failing() {
        let runner = ScriptedTestRunner::new([ScriptedRun::Pass]);
        let root = Path::new(".");
        let file = Path::new("add.ut.test.ts");

        assert!(runner.run(root, file).await.unwrap().success);
        assert!(!runner.run(root, file).await.unwrap().success);
        assert_eq!(runner.runs().len(), 2);
    }

    #[test]
    fn test_static_analyzer_serves_in_insertion_order() {
        let analyzer = StaticAnalyzer::new()
            .with_file(FileAnalysis {
                path: PathBuf::from("b.ts"),
                ..FileAnalysis::default()
            })
            .with_file(FileAnalysis {
                path: PathBuf::from("a.ts"),
                ..FileAnalysis::default()
            });

        let files = analyzer.discover(Path::new(".")).unwrap();
        assert_eq!(files, vec![PathBuf::from("b.ts"), PathBuf::from("a.ts")]);
        assert!(analyzer.analyze(Path::new("missing.ts")).is_err());
    }
}
