//! Error taxonomy shared by the loop and its collaborators.

use std::path::PathBuf;

use super::conversation::ConversationId;

/// Errors surfaced by an AI conversation client.
#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    #[error("conversation not found: {0}")]
    NotFound(ConversationId),

    #[error("failed to start conversation: {0}")]
    StartFailed(String),

    #[error("failed to generate tests after {attempts} attempt(s): {reason}")]
    GenerationFailed { attempts: u32, reason: String },

    #[error("failed to provide feedback after {attempts} attempt(s): {reason}")]
    FeedbackFailed { attempts: u32, reason: String },
}

impl ConversationError {
    /// True for misuse of an unknown or already-stopped id.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Infrastructure failures of the test runner.
///
/// A failing test is never one of these; it is reported through
/// [`TestRunResult::success`](super::test_run::TestRunResult).
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("test runner not found: {program}")]
    NotFound { program: String },

    #[error("permission denied while running {program}")]
    PermissionDenied { program: String },

    #[error("test run for {path:?} timed out after {timeout_secs}s")]
    TimedOut { path: PathBuf, timeout_secs: u64 },

    #[error("test runner error: {0}")]
    Spawn(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced while discovering or analyzing source files.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path:?}")]
    Parse { path: PathBuf },

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("failed to walk {path:?}: {reason}")]
    Walk { path: PathBuf, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// utgen errors.
#[derive(Debug, thiserror::Error)]
pub enum UtgenError {
    #[error("conversation error: {0}")]
    Conversation(#[from] ConversationError),

    #[error("runner error: {0}")]
    Runner(#[from] RunnerError),

    #[error("analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unit {unit} in {file:?} failed: {source}")]
    UnitFatal {
        file: PathBuf,
        unit: String,
        #[source]
        source: Box<UtgenError>,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for utgen operations.
pub type Result<T> = std::result::Result<T, UtgenError>;
