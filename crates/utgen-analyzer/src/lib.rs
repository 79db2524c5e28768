//! TypeScript source analysis for utgen
//!
//! Discovers source files, extracts exported functions, bindings and class
//! methods with tree-sitter, and attaches the type declarations and imports
//! each unit needs.

pub mod analyzer;
pub mod discover;
pub mod export_all;
pub mod parser;
pub mod types;
pub mod typescript;

pub use analyzer::TypeScriptAnalyzer;
pub use discover::{discover_source_files, is_candidate};
pub use export_all::export_all_declarations;
pub use types::{TypeResolver, WholeWordResolver};
pub use typescript::analyze_source;
