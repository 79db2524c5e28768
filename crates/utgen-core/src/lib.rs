//! utgen core library
//!
//! Domain model, collaborator traits and the generate-run-fix loop that
//! turns exported TypeScript units into passing Jest tests.

pub mod collaborators;
pub mod domain;
pub mod extract;
pub mod fakes;
pub mod obs;
pub mod orchestration;
pub mod report;
pub mod telemetry;

pub use collaborators::{
    AnalyzerResult, ConversationClient, ConversationResult, RunnerResult, SourceAnalyzer,
    TestRunner,
};

pub use domain::{
    AnalyzerError, ChatMessage, ConversationError, ConversationId, ExportBinding, ExportedUnit,
    FileAnalysis, Language, Result, Role, RunnerError, TestRunResult, TestSource, TypeDeclaration,
    UnitContext, UnitKind, UtgenError,
};

pub use extract::{extract_code_blocks, extract_test_source};

pub use orchestration::{
    ExhaustionPolicy, FatalPolicy, LoopConfig, Orchestrator, RetryState, UnitOutcome, UnitState,
};

pub use report::{render_run_summary, write_run_report_json, RunReport, SkippedFile, UnitReport};

pub use telemetry::init_tracing;

/// utgen version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
