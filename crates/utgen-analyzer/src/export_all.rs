//! The export-all transform: prefix every unexported top-level declaration
//! with `export`.

use std::path::Path;

use tree_sitter::Node;
use utgen_core::{AnalyzerError, AnalyzerResult};

use crate::parser::{self, node_text};
use crate::typescript::{export_clause_names, is_require};

const EXPORTABLE: &[&str] = &[
    "function_declaration",
    "generator_function_declaration",
    "lexical_declaration",
    "variable_declaration",
    "class_declaration",
    "abstract_class_declaration",
    "interface_declaration",
    "type_alias_declaration",
    "enum_declaration",
];

/// Rewritten content, or `None` when every declaration is already exported.
///
/// `require` bindings stay untouched, as do declarations already exported
/// through `export { .. }` or `export default name;`.
pub fn export_all_declarations(path: &Path, content: &str) -> AnalyzerResult<Option<String>> {
    let tree = parser::parse(content, path).ok_or_else(|| AnalyzerError::Parse {
        path: path.to_path_buf(),
    })?;
    let root = tree.root_node();
    let exported = export_clause_names(&root, content);

    let mut cursor = root.walk();
    let offsets: Vec<usize> = root
        .named_children(&mut cursor)
        .filter(|node| EXPORTABLE.contains(&node.kind()))
        .filter(|node| {
            let binding = matches!(node.kind(), "lexical_declaration" | "variable_declaration");
            !(binding && is_require(node, content))
        })
        .filter(|node| {
            !declared_names(node, content)
                .iter()
                .any(|name| exported.contains_key(*name))
        })
        .map(|node| node.start_byte())
        .collect();

    if offsets.is_empty() {
        return Ok(None);
    }

    let mut rewritten = content.to_string();
    // Back to front so earlier offsets stay valid.
    for offset in offsets.into_iter().rev() {
        rewritten.insert_str(offset, "export ");
    }
    Ok(Some(rewritten))
}

/// Names a top-level declaration introduces.
fn declared_names<'a>(decl: &Node, content: &'a str) -> Vec<&'a str> {
    if let Some(name) = decl.child_by_field_name("name") {
        return vec![node_text(&name, content)];
    }
    let mut cursor = decl.walk();
    let names = decl
        .named_children(&mut cursor)
        .filter(|child| child.kind() == "variable_declarator")
        .filter_map(|declarator| declarator.child_by_field_name("name"))
        .map(|name| node_text(&name, content))
        .collect();
    names
}
