//! Target languages.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::AnalyzerError;

/// Language of the code under test. TypeScript is the only one implemented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    TypeScript,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TypeScript => "typescript",
        }
    }

    /// Info-string labels accepted on fenced code blocks.
    pub fn fence_labels(&self) -> &'static [&'static str] {
        match self {
            Self::TypeScript => &["typescript", "ts"],
        }
    }

    /// Extensions of source files worth analyzing.
    pub fn source_extensions(&self) -> &'static [&'static str] {
        match self {
            Self::TypeScript => &["ts", "tsx"],
        }
    }

    /// Extension given to generated test files.
    pub fn test_extension(&self) -> &'static str {
        match self {
            Self::TypeScript => "ts",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = AnalyzerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "typescript" | "ts" => Ok(Self::TypeScript),
            other => Err(AnalyzerError::UnsupportedLanguage(other.to_string())),
        }
    }
}
