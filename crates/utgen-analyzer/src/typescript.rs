//! Exported-unit extraction from a TypeScript syntax tree.
//!
//! Only top-level declarations are considered. A declaration is exported
//! when it sits in an `export` statement (including `export default
//! function f`) or when its name appears in a local `export { .. }` clause
//! or `export default name;`.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::debug;
use tree_sitter::Node;
use utgen_core::{
    AnalyzerError, AnalyzerResult, ExportBinding, ExportedUnit, FileAnalysis, TypeDeclaration,
    UnitKind,
};

use crate::parser::{self, node_text};
use crate::types::TypeResolver;

const FUNCTION_VALUES: &[&str] = &["arrow_function", "function_expression", "function"];
const CLASS_KINDS: &[&str] = &["class_declaration", "abstract_class_declaration"];
const TYPE_KINDS: &[&str] = &[
    "interface_declaration",
    "type_alias_declaration",
    "enum_declaration",
];

/// Analyze one file's content.
pub fn analyze_source(
    path: &Path,
    content: &str,
    resolver: &dyn TypeResolver,
) -> AnalyzerResult<FileAnalysis> {
    let tree = parser::parse(content, path).ok_or_else(|| AnalyzerError::Parse {
        path: path.to_path_buf(),
    })?;
    let root = tree.root_node();
    if root.has_error() {
        debug!(file = %path.display(), "syntax errors in file, analyzing the parts that parsed");
    }

    let mut collector = Collector {
        content,
        clause_exports: export_clause_names(&root, content),
        seen: HashSet::new(),
        imports: Vec::new(),
        types: Vec::new(),
        units: Vec::new(),
        skipped: Vec::new(),
    };

    let mut cursor = root.walk();
    for node in root.named_children(&mut cursor) {
        match node.kind() {
            "import_statement" => collector.imports.push(node_text(&node, content).to_string()),
            "export_statement" => {
                let form = if has_child(&node, "default") {
                    Statement::ExportDefault
                } else {
                    Statement::Export
                };
                if let Some(declaration) = node.child_by_field_name("declaration") {
                    collector.declaration(declaration, node, form);
                } else if let Some(value) = node.child_by_field_name("value") {
                    collector.default_function(value, node);
                }
            }
            _ => collector.declaration(node, node, Statement::Plain),
        }
    }

    let Collector {
        imports,
        types,
        units,
        skipped,
        ..
    } = collector;

    let exported_units = units
        .into_iter()
        .map(|unit| {
            let referenced = resolver.resolve(&unit.source_text, &types);
            unit.with_referenced_types(referenced)
                .with_import_context(imports.clone())
        })
        .collect();

    Ok(FileAnalysis {
        path: path.to_path_buf(),
        import_statements: imports,
        exported_units,
        skipped_units: skipped,
    })
}

/// The top-level statement a declaration sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Statement {
    Plain,
    Export,
    ExportDefault,
}

struct Collector<'a> {
    content: &'a str,
    clause_exports: HashMap<String, ExportBinding>,
    seen: HashSet<String>,
    imports: Vec<String>,
    types: Vec<TypeDeclaration>,
    units: Vec<ExportedUnit>,
    skipped: Vec<String>,
}

impl<'a> Collector<'a> {
    fn text(&self, node: &Node) -> &'a str {
        node_text(node, self.content)
    }

    /// How `name` is exported, if at all.
    fn binding(&self, name: &str, statement: Statement) -> Option<ExportBinding> {
        match statement {
            Statement::Export => Some(ExportBinding::Named(name.to_string())),
            Statement::ExportDefault => Some(ExportBinding::Default(name.to_string())),
            Statement::Plain => self.clause_exports.get(name).cloned(),
        }
    }

    /// `outer` is the node whose text becomes the unit's source: the export
    /// statement when there is one, else the declaration itself.
    fn declaration(&mut self, decl: Node, outer: Node, statement: Statement) {
        let kind = decl.kind();
        match kind {
            "function_declaration" | "generator_function_declaration" => {
                if let Some(name) = decl.child_by_field_name("name") {
                    let name = self.text(&name);
                    let binding = self.binding(name, statement);
                    self.callable(name.to_string(), &outer, UnitKind::Function, binding);
                }
            }
            "lexical_declaration" | "variable_declaration" => {
                if is_require(&decl, self.content) {
                    self.imports.push(self.text(&outer).to_string());
                    return;
                }
                let mut cursor = decl.walk();
                for declarator in decl.named_children(&mut cursor) {
                    if declarator.kind() != "variable_declarator" {
                        continue;
                    }
                    let (Some(name), Some(value)) = (
                        declarator.child_by_field_name("name"),
                        declarator.child_by_field_name("value"),
                    ) else {
                        continue;
                    };
                    if name.kind() != "identifier" || !FUNCTION_VALUES.contains(&value.kind()) {
                        continue;
                    }
                    let name = self.text(&name);
                    let binding = self.binding(name, statement);
                    self.callable(name.to_string(), &outer, UnitKind::Binding, binding);
                }
            }
            _ if CLASS_KINDS.contains(&kind) => self.class(decl, outer, statement),
            _ if TYPE_KINDS.contains(&kind) => {
                if let Some(name) = decl.child_by_field_name("name") {
                    self.types.push(TypeDeclaration {
                        name: self.text(&name).to_string(),
                        source_text: self.text(&decl).to_string(),
                    });
                }
            }
            _ => {}
        }
    }

    /// `export default function name() {}` parsed as an expression.
    fn default_function(&mut self, value: Node, outer: Node) {
        if !FUNCTION_VALUES.contains(&value.kind()) {
            return;
        }
        if let Some(name) = value.child_by_field_name("name") {
            let name = self.text(&name).to_string();
            let binding = ExportBinding::Default(name.clone());
            self.callable(name, &outer, UnitKind::Function, Some(binding));
        }
    }

    fn class(&mut self, decl: Node, outer: Node, statement: Statement) {
        let (Some(name), Some(body)) = (
            decl.child_by_field_name("name"),
            decl.child_by_field_name("body"),
        ) else {
            return;
        };
        let class_name = self.text(&name);
        let binding = self.binding(class_name, statement);

        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            if member.kind() != "method_definition" || !is_public_method(&member, self.content) {
                continue;
            }
            let Some(method) = member.child_by_field_name("name") else {
                continue;
            };
            let unit_name = format!("{}.{}", class_name, self.text(&method));
            self.callable(unit_name, &outer, UnitKind::Method, binding.clone());
        }
    }

    fn callable(
        &mut self,
        name: String,
        outer: &Node,
        kind: UnitKind,
        binding: Option<ExportBinding>,
    ) {
        let Some(binding) = binding else {
            self.skipped.push(name);
            return;
        };
        if !self.seen.insert(name.clone()) {
            return;
        }
        let source = self.text(outer);
        self.units.push(ExportedUnit::new(name, source, kind).with_export(binding));
    }
}

/// Local names exported by `export { a, b as c }` clauses and
/// `export default name;`, with the binding a test file imports them by.
/// A named export wins over a default one. Re-exports from other modules are
/// ignored.
pub(crate) fn export_clause_names(root: &Node, content: &str) -> HashMap<String, ExportBinding> {
    let mut names = HashMap::new();
    let mut record = |local: &str, binding: ExportBinding| {
        if !matches!(names.get(local), Some(ExportBinding::Named(_))) {
            names.insert(local.to_string(), binding);
        }
    };

    let mut cursor = root.walk();
    for node in root.named_children(&mut cursor) {
        if node.kind() != "export_statement" || node.child_by_field_name("source").is_some() {
            continue;
        }
        if let Some(value) = node.child_by_field_name("value") {
            if value.kind() == "identifier" {
                let local = node_text(&value, content);
                record(local, ExportBinding::Default(local.to_string()));
            }
        }
        let mut inner = node.walk();
        for child in node.named_children(&mut inner) {
            if child.kind() != "export_clause" {
                continue;
            }
            let mut spec_cursor = child.walk();
            for spec in child.named_children(&mut spec_cursor) {
                let Some(name) = spec.child_by_field_name("name") else {
                    continue;
                };
                let local = node_text(&name, content);
                let public = spec
                    .child_by_field_name("alias")
                    .map(|alias| node_text(&alias, content))
                    .unwrap_or(local);
                let binding = if public == "default" {
                    ExportBinding::Default(local.to_string())
                } else {
                    ExportBinding::Named(public.to_string())
                };
                record(local, binding);
            }
        }
    }
    names
}

fn has_child(node: &Node, kind: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|child| child.kind() == kind);
    found
}

/// `const x = require('..')`, possibly among several declarators.
pub(crate) fn is_require(decl: &Node, content: &str) -> bool {
    let mut cursor = decl.walk();
    let found = decl.named_children(&mut cursor).any(|declarator| {
        declarator
            .child_by_field_name("value")
            .filter(|value| value.kind() == "call_expression")
            .and_then(|call| call.child_by_field_name("function"))
            .map(|function| node_text(&function, content) == "require")
            .unwrap_or(false)
    });
    found
}

/// Not a constructor, accessor, `private`/`protected` or `#private` member.
fn is_public_method(member: &Node, content: &str) -> bool {
    let Some(name) = member.child_by_field_name("name") else {
        return false;
    };
    if name.kind() == "private_property_identifier" || node_text(&name, content) == "constructor" {
        return false;
    }
    let mut cursor = member.walk();
    let restricted = member.children(&mut cursor).any(|child| match child.kind() {
        "get" | "set" => true,
        "accessibility_modifier" => {
            matches!(node_text(&child, content), "private" | "protected")
        }
        _ => false,
    });
    !restricted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WholeWordResolver;

    fn analyze(content: &str) -> FileAnalysis {
        analyze_source(Path::new("src/sample.ts"), content, &WholeWordResolver).expect("analyze")
    }

    fn names(analysis: &FileAnalysis) -> Vec<&str> {
        analysis
            .exported_units
            .iter()
            .map(|u| u.name.as_str())
            .collect()
    }

    #[test]
    fn test_exported_functions_and_bindings() {
        let analysis = analyze(
            r#"
export function add(a: number, b: number): number { return a + b; }
function helper() { return 1; }
export const sub = (a: number, b: number) => a - b;
export const mul = function (a: number, b: number) { return a * b; };
export const LIMIT = 10;
"#,
        );
        assert_eq!(names(&analysis), vec!["add", "sub", "mul"]);
        assert_eq!(analysis.skipped_units, vec!["helper"]);

        let add = &analysis.exported_units[0];
        assert_eq!(add.kind, UnitKind::Function);
        assert!(add.source_text.starts_with("export function add"));
        assert_eq!(analysis.exported_units[1].kind, UnitKind::Binding);
    }

    #[test]
    fn test_export_clause_and_default() {
        let analysis = analyze(
            r#"
function add(a: number, b: number) { return a + b; }
const neg = (a: number) => -a;
function hidden() {}
export default function main() {}
export { add, neg as negate };
export { other } from './other';
"#,
        );
        assert_eq!(names(&analysis), vec!["add", "neg", "main"]);
        assert_eq!(analysis.skipped_units, vec!["hidden"]);

        let exports: Vec<&ExportBinding> =
            analysis.exported_units.iter().map(|u| &u.export).collect();
        assert_eq!(
            exports,
            vec![
                &ExportBinding::Named("add".into()),
                &ExportBinding::Named("negate".into()),
                &ExportBinding::Default("main".into()),
            ]
        );
    }

    #[test]
    fn test_default_export_forms() {
        let run = analyze("function run() {}\nexport default run;\n");
        assert_eq!(run.exported_units[0].export, ExportBinding::Default("run".into()));

        let aliased = analyze("function sum() {}\nexport { sum as default };\n");
        assert_eq!(aliased.exported_units[0].export, ExportBinding::Default("sum".into()));

        let both = analyze("const both = () => 1;\nexport { both as default, both };\n");
        assert_eq!(both.exported_units[0].export, ExportBinding::Named("both".into()));

        let class = analyze("export default class Shape { area() { return 0; } }\n");
        assert_eq!(names(&class), vec!["Shape.area"]);
        assert_eq!(class.exported_units[0].export, ExportBinding::Default("Shape".into()));
    }

    #[test]
    fn test_public_methods_of_exported_classes() {
        let analysis = analyze(
            r#"
export class Stack<T> {
  private items: T[] = [];
  constructor() {}
  push(item: T): void { this.items.push(item); }
  pop(): T | undefined { return this.items.pop(); }
  private grow() {}
  #secret() {}
  get size(): number { return this.items.length; }
}
class Internal { run() {} }
"#,
        );
        assert_eq!(names(&analysis), vec!["Stack.push", "Stack.pop"]);
        assert_eq!(analysis.skipped_units, vec!["Internal.run"]);
        let push = &analysis.exported_units[0];
        assert_eq!(push.kind, UnitKind::Method);
        assert!(push.source_text.contains("pop(): T | undefined"));
    }

    #[test]
    fn test_referenced_types_and_import_context() {
        let analysis = analyze(
            r#"
import { round } from './util';
const path = require('path');
interface Point { x: number; y: number }
type Shape = { points: Point[] };
enum Unit { Cm, In }
export function distance(a: Point, b: Point): number { return round(a.x - b.x); }
export const unitName = (u: Unit) => Unit[u];
"#,
        );
        assert_eq!(
            analysis.import_statements,
            vec![
                "import { round } from './util';".to_string(),
                "const path = require('path');".to_string()
            ]
        );

        let distance = &analysis.exported_units[0];
        let types: Vec<&str> = distance
            .referenced_types
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(types, vec!["Point"]);
        assert_eq!(distance.import_context, analysis.import_statements);

        let unit_name = &analysis.exported_units[1];
        assert_eq!(unit_name.referenced_types[0].name, "Unit");
        assert!(unit_name.referenced_types[0]
            .source_text
            .starts_with("enum Unit"));
    }

    #[test]
    fn test_file_without_exports() {
        let analysis = analyze("function a() {}\nconst b = () => 2;\n");
        assert!(analysis.exported_units.is_empty());
        assert_eq!(analysis.skipped_units, vec!["a", "b"]);
    }
}
