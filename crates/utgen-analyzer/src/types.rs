//! Attaching type declarations to units.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use utgen_core::TypeDeclaration;

/// Decides which of a file's type declarations a unit refers to.
pub trait TypeResolver: Send + Sync {
    /// `declarations` are in file order; the result keeps that order and
    /// holds each name at most once.
    fn resolve(&self, unit_source: &str, declarations: &[TypeDeclaration]) -> Vec<TypeDeclaration>;
}

/// Whole-word match of each declaration name in the unit's source text.
#[derive(Debug, Clone, Copy, Default)]
pub struct WholeWordResolver;

impl TypeResolver for WholeWordResolver {
    fn resolve(&self, unit_source: &str, declarations: &[TypeDeclaration]) -> Vec<TypeDeclaration> {
        let words = identifiers(unit_source);
        let mut seen = HashSet::new();
        declarations
            .iter()
            .filter(|decl| seen.insert(decl.name.as_str()))
            .filter(|decl| words.contains(decl.name.as_str()))
            .cloned()
            .collect()
    }
}

static IDENTIFIER: OnceLock<Regex> = OnceLock::new();

/// Every identifier-like word in `source`. `$` is an identifier character,
/// so `$Shape` does not contain `Shape`.
fn identifiers(source: &str) -> HashSet<&str> {
    let word = IDENTIFIER
        .get_or_init(|| Regex::new(r"[\w$]+").expect("identifier pattern is a valid regex"));
    word.find_iter(source).map(|m| m.as_str()).collect()
}
