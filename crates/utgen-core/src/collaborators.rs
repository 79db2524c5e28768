//! Collaborator traits driven by the orchestration loop.
//!
//! - `SourceAnalyzer`: discovers files and extracts exported units
//! - `ConversationClient`: stateful chat sessions with a model provider
//! - `TestRunner`: writes candidate tests and executes them
//!
//! The loop only ever sees these traits. In-memory fakes live in
//! [`crate::fakes`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::{
    AnalyzerError, ConversationError, ConversationId, FileAnalysis, RunnerError, TestRunResult,
    TestSource, UnitContext,
};

pub type AnalyzerResult<T> = std::result::Result<T, AnalyzerError>;
pub type ConversationResult<T> = std::result::Result<T, ConversationError>;
pub type RunnerResult<T> = std::result::Result<T, RunnerError>;

// ---------------------------------------------------------------------------
// SourceAnalyzer
// ---------------------------------------------------------------------------

/// Finds source files and the exported units inside them.
pub trait SourceAnalyzer: Send + Sync {
    /// Files under `target` worth analyzing, depth-first in directory order.
    /// A file path yields just that file.
    fn discover(&self, target: &Path) -> AnalyzerResult<Vec<PathBuf>>;

    /// Exported units of one file, in declaration order.
    fn analyze(&self, path: &Path) -> AnalyzerResult<FileAnalysis>;

    /// Rewrite `path` in place so every top-level declaration is exported.
    /// Returns `true` if the file changed.
    fn export_all(&self, path: &Path) -> AnalyzerResult<bool>;
}

// ---------------------------------------------------------------------------
// ConversationClient
// ---------------------------------------------------------------------------

/// Stateful conversations with a completion provider.
///
/// Guarantees:
/// - `start_conversation` returns an id that was never issued before.
/// - Every other operation fails with `ConversationError::NotFound` once the
///   id has been stopped, including a second `stop_conversation`.
/// - Transient provider errors are retried inside the client.
#[async_trait]
pub trait ConversationClient: Send + Sync {
    async fn start_conversation(&self, context: &UnitContext) -> ConversationResult<ConversationId>;

    /// First candidate for the conversation's unit.
    async fn generate_initial_tests(&self, id: &ConversationId) -> ConversationResult<TestSource>;

    /// Revised candidate after sending `feedback` (raw test results).
    async fn provide_feedback(
        &self,
        id: &ConversationId,
        feedback: &str,
    ) -> ConversationResult<TestSource>;

    async fn stop_conversation(&self, id: &ConversationId) -> ConversationResult<()>;
}

// ---------------------------------------------------------------------------
// TestRunner
// ---------------------------------------------------------------------------

/// Writes and executes candidate test files.
#[async_trait]
pub trait TestRunner: Send + Sync {
    /// Overwrite `path` with the joined candidate. An empty candidate writes
    /// an empty file.
    async fn write_candidate(&self, path: &Path, source: &TestSource) -> RunnerResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, source.joined()).await?;
        Ok(())
    }

    /// Execute `test_file` from `root_dir`. Failing tests are `Ok` with
    /// `success == false`; only infrastructure problems are errors.
    async fn run(&self, root_dir: &Path, test_file: &Path) -> RunnerResult<TestRunResult>;

    /// Release scratch resources at the end of a run.
    async fn cleanup(&self) -> RunnerResult<()> {
        Ok(())
    }
}
