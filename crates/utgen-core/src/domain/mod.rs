//! Domain model for test generation.

pub mod conversation;
pub mod error;
pub mod language;
pub mod test_run;
pub mod unit;

pub use conversation::{ChatMessage, ConversationId, Role, UnitContext};
pub use error::{AnalyzerError, ConversationError, Result, RunnerError, UtgenError};
pub use language::Language;
pub use test_run::{TestRunResult, TestSource};
pub use unit::{ExportBinding, ExportedUnit, FileAnalysis, TypeDeclaration, UnitKind};
