//! Fenced code block extraction from model completions.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{Language, TestSource};

static TYPESCRIPT_FENCE: OnceLock<Regex> = OnceLock::new();

fn fence_pattern(language: Language) -> Regex {
    let labels = language
        .fence_labels()
        .iter()
        .map(|label| regex::escape(label))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(r"(?s)```[ \t]*(?i:{labels})\b[^\n]*\n(.*?)```");
    Regex::new(&pattern).expect("fence pattern is a valid regex")
}

fn fence_regex(language: Language) -> &'static Regex {
    match language {
        Language::TypeScript => TYPESCRIPT_FENCE.get_or_init(|| fence_pattern(language)),
    }
}

/// Contents of every fenced block labeled for `language`, trimmed, in the
/// order they appear. Unlabeled or other-language blocks are ignored.
pub fn extract_code_blocks(response: &str, language: Language) -> Vec<String> {
    fence_regex(language)
        .captures_iter(response)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

/// Extracted blocks as a [`TestSource`].
pub fn extract_test_source(response: &str, language: Language) -> TestSource {
    TestSource::new(extract_code_blocks(response, language))
}
