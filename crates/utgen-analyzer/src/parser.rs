//! Thread-local tree-sitter parsers.

use std::cell::RefCell;
use std::path::Path;

use tree_sitter::{Node, Parser, Tree};

thread_local! {
    static TS_PARSER: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        // A grammar/runtime mismatch surfaces as `None` from `parse`.
        let _ = p.set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into());
        p
    });

    static TSX_PARSER: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        let _ = p.set_language(&tree_sitter_typescript::LANGUAGE_TSX.into());
        p
    });
}

/// Parse `content` with the grammar matching `path`'s extension.
pub fn parse(content: &str, path: &Path) -> Option<Tree> {
    let tsx = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("tsx"))
        .unwrap_or(false);
    if tsx {
        TSX_PARSER.with(|p| p.borrow_mut().parse(content, None))
    } else {
        TS_PARSER.with(|p| p.borrow_mut().parse(content, None))
    }
}

pub fn node_text<'a>(node: &Node, content: &'a str) -> &'a str {
    &content[node.byte_range()]
}
