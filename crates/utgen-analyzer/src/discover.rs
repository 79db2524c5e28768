//! Source file discovery.

use std::path::{Path, PathBuf};

use utgen_core::{AnalyzerError, AnalyzerResult, Language};
use walkdir::{DirEntry, WalkDir};

const IGNORED_DIRS: &[&str] = &["node_modules", "dist", "build", "coverage"];

/// Files under `target` that may contain units, depth-first with entries of
/// each directory in file-name order.
///
/// Skips dependency and build output directories, hidden directories,
/// declaration files and existing test files. A file `target` is returned
/// as is.
pub fn discover_source_files(target: &Path, language: Language) -> AnalyzerResult<Vec<PathBuf>> {
    if target.is_file() {
        return Ok(vec![target.to_path_buf()]);
    }
    if !target.is_dir() {
        return Err(AnalyzerError::Walk {
            path: target.to_path_buf(),
            reason: "no such file or directory".to_string(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(target)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !should_ignore(e))
    {
        let entry = entry.map_err(|e| AnalyzerError::Walk {
            path: e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| target.to_path_buf()),
            reason: e.to_string(),
        })?;
        if entry.file_type().is_file() && is_candidate(entry.path(), language) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn should_ignore(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.') || IGNORED_DIRS.contains(&name))
        .unwrap_or(false)
}

/// Source file of `language` that is neither a declaration file nor a test.
pub fn is_candidate(path: &Path, language: Language) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let Some((stem, ext)) = name.rsplit_once('.') else {
        return false;
    };
    if !language.source_extensions().contains(&ext) {
        return false;
    }
    !(stem.ends_with(".d") || stem.ends_with(".test") || stem.ends_with(".spec"))
}
