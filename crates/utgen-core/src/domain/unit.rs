//! Exported units and per-file analysis results.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How a unit is declared in its source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// `export function f() {}`
    Function,
    /// `export const f = () => {}` or `export const f = function () {}`
    Binding,
    /// Public method of an exported class.
    Method,
}

/// A type, interface or enum declaration a unit refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDeclaration {
    pub name: String,
    pub source_text: String,
}

/// How a test file binds the unit's top-level declaration.
///
/// For methods this is the binding of the enclosing class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "form", content = "name", rename_all = "snake_case")]
pub enum ExportBinding {
    /// `export function add`, `export { add }` or `export { sum as add }`:
    /// holds the public name.
    Named(String),
    /// `export default function main` or `export default main;`: holds the
    /// local name, used as the default import's identifier.
    Default(String),
}

impl ExportBinding {
    pub fn name(&self) -> &str {
        match self {
            Self::Named(name) | Self::Default(name) => name,
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default(_))
    }

    /// `import { add } from './math';` or `import main from './main';`
    pub fn import_statement(&self, specifier: &str) -> String {
        match self {
            Self::Named(name) => format!("import {{ {name} }} from '{specifier}';"),
            Self::Default(name) => format!("import {name} from '{specifier}';"),
        }
    }
}

/// One exported callable discovered in a source file.
///
/// Immutable once produced by the analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedUnit {
    /// Unique within its file. Methods are named `Class.method`.
    pub name: String,
    pub kind: UnitKind,
    pub export: ExportBinding,
    /// Verbatim declaration text.
    pub source_text: String,
    /// Ordered, deduplicated by name.
    pub referenced_types: Vec<TypeDeclaration>,
    /// Import/require statements of the enclosing file, in file order.
    pub import_context: Vec<String>,
}

impl ExportedUnit {
    /// The binding defaults to a named export of the top-level name
    /// (`Stack` for `Stack.push`).
    pub fn new(name: impl Into<String>, source_text: impl Into<String>, kind: UnitKind) -> Self {
        let name = name.into();
        let top_level = name.split('.').next().unwrap_or(&name).to_string();
        Self {
            name,
            kind,
            export: ExportBinding::Named(top_level),
            source_text: source_text.into(),
            referenced_types: Vec::new(),
            import_context: Vec::new(),
        }
    }

    pub fn with_export(mut self, export: ExportBinding) -> Self {
        self.export = export;
        self
    }

    pub fn with_referenced_types(mut self, types: Vec<TypeDeclaration>) -> Self {
        self.referenced_types = types;
        self
    }

    pub fn with_import_context(mut self, imports: Vec<String>) -> Self {
        self.import_context = imports;
        self
    }

    /// Name usable as a file name component (`Class.method` -> `Class_method`).
    pub fn file_stem(&self) -> String {
        self.name
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '_' || c == '$' { c } else { '_' })
            .collect()
    }
}

/// What the analyzer found in one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAnalysis {
    pub path: PathBuf,
    pub import_statements: Vec<String>,
    pub exported_units: Vec<ExportedUnit>,
    /// Names of callables that were found but are not exported.
    pub skipped_units: Vec<String>,
}
