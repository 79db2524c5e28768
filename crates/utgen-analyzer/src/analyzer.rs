//! [`SourceAnalyzer`] implementation for TypeScript.

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use utgen_core::{AnalyzerError, AnalyzerResult, FileAnalysis, Language, SourceAnalyzer};

use crate::discover::discover_source_files;
use crate::export_all::export_all_declarations;
use crate::types::{TypeResolver, WholeWordResolver};
use crate::typescript::analyze_source;

/// tree-sitter backed analyzer with a pluggable [`TypeResolver`].
pub struct TypeScriptAnalyzer {
    resolver: Box<dyn TypeResolver>,
}

impl Default for TypeScriptAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeScriptAnalyzer {
    pub fn new() -> Self {
        Self::with_resolver(Box::new(WholeWordResolver))
    }

    pub fn with_resolver(resolver: Box<dyn TypeResolver>) -> Self {
        Self { resolver }
    }

    fn read(path: &Path) -> AnalyzerResult<String> {
        std::fs::read_to_string(path).map_err(|source| AnalyzerError::Read {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl SourceAnalyzer for TypeScriptAnalyzer {
    fn discover(&self, target: &Path) -> AnalyzerResult<Vec<PathBuf>> {
        discover_source_files(target, Language::TypeScript)
    }

    fn analyze(&self, path: &Path) -> AnalyzerResult<FileAnalysis> {
        let content = Self::read(path)?;
        let analysis = analyze_source(path, &content, self.resolver.as_ref())?;
        debug!(
            file = %path.display(),
            exported = analysis.exported_units.len(),
            imports = analysis.import_statements.len(),
            "analyzed file"
        );
        Ok(analysis)
    }

    fn export_all(&self, path: &Path) -> AnalyzerResult<bool> {
        let content = Self::read(path)?;
        match export_all_declarations(path, &content)? {
            Some(rewritten) => {
                std::fs::write(path, rewritten)?;
                info!(file = %path.display(), "rewrote file with all declarations exported");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
