//! Python grammar handler.
//!
//! Recognizes functions, classes (including decorated ones), imports and
//! module- or class-level assignments. Docstrings come from the first string
//! literal of a body.

use std::sync::OnceLock;

use tree_sitter::{Node, Query, Tree};

use super::{
    Depth, Extraction, LanguageHandler, MAX_VISIT_DEPTH, cached_query, collect_calls, compile_query, enclose, field_text,
    line_of, node_text, simple_type_name,
};
use crate::element::{CodeElement, ElementKind};
use crate::error::ParseError;
use crate::relationship::{Reference, RelationshipKind};

const CALLS_QUERY: &str = r#"
(call function: (identifier) @callee)
(call function: (attribute attribute: (identifier) @callee))
"#;

fn calls_query() -> Result<&'static Query, ParseError> {
    static QUERY: OnceLock<Result<Query, String>> = OnceLock::new();
    cached_query(QUERY.get_or_init(|| {
        compile_query(&tree_sitter_python::LANGUAGE.into(), CALLS_QUERY)
    }))
}

fn is_scope(node: &Node) -> bool {
    matches!(node.kind(), "function_definition" | "class_definition")
}

/// Python grammar handler.
pub struct PythonHandler;

impl LanguageHandler for PythonHandler {
    fn language(&self) -> &'static str {
        "python"
    }

    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_python::LANGUAGE.into()
    }

    fn extract(
        &self,
        tree: &Tree,
        source: &str,
        file_path: &str,
    ) -> Result<Extraction, ParseError> {
        let visitor = Visitor {
            source,
            file_path,
            calls: calls_query()?,
            depth: Depth::default(),
        };
        Ok(visitor.visit_children(&tree.root_node(), None, false))
    }
}

struct Visitor<'a> {
    source: &'a str,
    file_path: &'a str,
    calls: &'static Query,
    depth: Depth,
}

impl Visitor<'_> {
    fn visit_children(&self, node: &Node, parent: Option<&str>, in_function: bool) -> Extraction {
        let Some(_level) = self.depth.enter() else {
            tracing::debug!(
                "{}: nesting deeper than {} levels at line {}, not descending",
                self.file_path,
                MAX_VISIT_DEPTH,
                line_of(node)
            );
            return Extraction::new();
        };
        let mut out = Extraction::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            out.merge(self.visit(&child, parent, in_function));
        }
        out
    }

    fn visit(&self, node: &Node, parent: Option<&str>, in_function: bool) -> Extraction {
        match node.kind() {
            "function_definition" => self.function(node, parent),
            "class_definition" => self.class(node, parent),
            "decorated_definition" => match node.child_by_field_name("definition") {
                Some(definition) => self.visit(&definition, parent, in_function),
                None => Extraction::new(),
            },
            "import_statement" => self.import(node),
            "import_from_statement" => self.import_from(node),
            "expression_statement" if !in_function => self.assignment(node, parent),
            _ => self.visit_children(node, parent, in_function),
        }
    }

    fn function(&self, node: &Node, parent: Option<&str>) -> Extraction {
        let Some(name) = field_text(node, "name", self.source) else {
            return Extraction::new();
        };

        let mut element = CodeElement::new(name, ElementKind::Function, self.file_path)
            .with_node_span(node)
            .with_parent(parent.map(str::to_string));
        if let Some(params) = node.child_by_field_name("parameters") {
            element = element.with_parameters(self.parameters(&params));
        }
        if let Some(return_type) = field_text(node, "return_type", self.source) {
            element = element.with_return_type(return_type);
        }

        let id = element.id();
        let mut body = Extraction::new();
        if let Some(block) = node.child_by_field_name("body") {
            if let Some(doc) = extract_docstring(&block, self.source) {
                element = element.with_docstring(doc);
            }
            body.references =
                collect_calls(self.calls, node, self.source, &id, is_scope);
            body.merge(self.visit_children(&block, Some(&id), true));
        }

        enclose(element, body)
    }

    fn class(&self, node: &Node, parent: Option<&str>) -> Extraction {
        let Some(name) = field_text(node, "name", self.source) else {
            return Extraction::new();
        };

        let mut element = CodeElement::new(name, ElementKind::Class, self.file_path)
            .with_node_span(node)
            .with_parent(parent.map(str::to_string));
        let id = element.id();

        let mut body = Extraction::new();
        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            let mut cursor = superclasses.walk();
            for base in superclasses.named_children(&mut cursor) {
                if !matches!(base.kind(), "identifier" | "attribute") {
                    continue;
                }
                body.references.push(Reference::new(
                    id.clone(),
                    simple_type_name(&base, self.source),
                    RelationshipKind::Inherits,
                    line_of(&base),
                ));
            }
        }
        if let Some(block) = node.child_by_field_name("body") {
            if let Some(doc) = extract_docstring(&block, self.source) {
                element = element.with_docstring(doc);
            }
            body.merge(self.visit_children(&block, Some(&id), false));
        }

        enclose(element, body)
    }

    fn import(&self, node: &Node) -> Extraction {
        let mut out = Extraction::new();
        let mut cursor = node.walk();
        for name in node.children_by_field_name("name", &mut cursor) {
            let module = match name.kind() {
                "aliased_import" => field_text(&name, "name", self.source),
                _ => Some(node_text(&name, self.source)),
            };
            if let Some(module) = module {
                out.push(
                    CodeElement::new(module, ElementKind::Import, self.file_path)
                        .with_node_span(node),
                );
            }
        }
        out
    }

    fn import_from(&self, node: &Node) -> Extraction {
        let mut out = Extraction::new();
        if let Some(module) = field_text(node, "module_name", self.source) {
            out.push(CodeElement::new(module, ElementKind::Import, self.file_path).with_node_span(node));
        }
        out
    }

    fn assignment(&self, node: &Node, parent: Option<&str>) -> Extraction {
        let mut out = Extraction::new();
        let Some(assignment) = node.named_child(0) else {
            return out;
        };
        if assignment.kind() != "assignment" {
            return out;
        }
        let Some(left) = assignment.child_by_field_name("left") else {
            return out;
        };
        if left.kind() == "identifier" {
            out.push(
                CodeElement::new(node_text(&left, self.source), ElementKind::Variable, self.file_path)
                    .with_node_span(node)
                    .with_parent(parent.map(str::to_string)),
            );
        }
        out
    }

    fn parameters(&self, params: &Node) -> Vec<String> {
        let mut names = Vec::new();
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            let name = match param.kind() {
                "identifier" | "list_splat_pattern" | "dictionary_splat_pattern" => {
                    Some(node_text(&param, self.source))
                }
                "default_parameter" | "typed_default_parameter" => {
                    field_text(&param, "name", self.source)
                }
                "typed_parameter" => param.named_child(0).map(|n| node_text(&n, self.source)),
                _ => None,
            };
            names.extend(name);
        }
        names
    }
}

/// Extract the docstring from a block (its leading string literal).
fn extract_docstring(block: &Node, source: &str) -> Option<String> {
    let first = block.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string = first.named_child(0)?;
    if string.kind() != "string" {
        return None;
    }

    let text = node_text(&string, source);
    let trimmed = text
        .trim_start_matches(['r', 'R', 'u', 'U', 'b', 'B', 'f', 'F'])
        .trim_start_matches("\"\"\"")
        .trim_end_matches("\"\"\"")
        .trim_start_matches("'''")
        .trim_end_matches("'''")
        .trim_start_matches('"')
        .trim_end_matches('"')
        .trim_start_matches('\'')
        .trim_end_matches('\'')
        .trim();
    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::test_support::{extract, referenced};
    use crate::relationship::Relationship;

    const SAMPLE: &str = r#"import os
from typing import List

LIMIT = 10


class Foo(Base, mixins.Loggable):
    """A foo."""

    count = 0

    def bar(self, x: int, y=2, *args, **kwargs) -> List[int]:
        """Do bar."""
        helper(x)
        self.baz()

        def inner():
            deep()

        return inner()


@decorator
def helper(value):
    return value
"#;

    #[test]
    fn test_extracts_elements_in_source_order() {
        let extraction = extract(&PythonHandler, SAMPLE, "a.py");
        let ids: Vec<_> = extraction.elements.iter().map(|e| e.id()).collect();
        assert_eq!(
            ids,
            vec![
                "a.py:import:os",
                "a.py:import:typing",
                "a.py:LIMIT",
                "a.py:Foo",
                "a.py:Foo:count",
                "a.py:Foo:bar",
                "a.py:Foo:bar:inner",
                "a.py:helper",
            ]
        );
    }

    #[test]
    fn test_function_details() {
        let extraction = extract(&PythonHandler, SAMPLE, "a.py");
        let bar = extraction.element("a.py:Foo:bar").expect("bar");

        assert_eq!(bar.kind, ElementKind::Function);
        assert_eq!(bar.docstring.as_deref(), Some("Do bar."));
        assert_eq!(bar.return_type.as_deref(), Some("List[int]"));
        assert_eq!(
            bar.parameters,
            Some(vec![
                "self".to_string(),
                "x".to_string(),
                "y".to_string(),
                "*args".to_string(),
                "**kwargs".to_string(),
            ])
        );
        assert_eq!(bar.parent.as_deref(), Some("a.py:Foo"));
        assert_eq!(bar.children, Some(vec!["a.py:Foo:bar:inner".to_string()]));
        assert_eq!(bar.line_start, 12);
        assert_eq!(bar.column_start, 4);
    }

    #[test]
    fn test_contains_edges() {
        let extraction = extract(&PythonHandler, SAMPLE, "a.py");
        assert!(
            extraction
                .relationships
                .contains(&Relationship::contains("a.py:Foo", "a.py:Foo:bar"))
        );
        assert!(
            extraction
                .relationships
                .contains(&Relationship::contains("a.py:Foo:bar", "a.py:Foo:bar:inner"))
        );

        let foo = extraction.element("a.py:Foo").expect("Foo");
        assert_eq!(foo.docstring.as_deref(), Some("A foo."));
        assert_eq!(
            foo.children,
            Some(vec!["a.py:Foo:count".to_string(), "a.py:Foo:bar".to_string()])
        );
    }

    #[test]
    fn test_call_references_exclude_nested_scopes() {
        let extraction = extract(&PythonHandler, SAMPLE, "a.py");
        assert_eq!(
            referenced(&extraction, "a.py:Foo:bar", RelationshipKind::Calls),
            vec!["helper", "baz", "inner"]
        );
        assert_eq!(
            referenced(&extraction, "a.py:Foo:bar:inner", RelationshipKind::Calls),
            vec!["deep"]
        );
    }

    #[test]
    fn test_inheritance_references() {
        let extraction = extract(&PythonHandler, SAMPLE, "a.py");
        assert_eq!(
            referenced(&extraction, "a.py:Foo", RelationshipKind::Inherits),
            vec!["Base", "Loggable"]
        );
    }

    #[test]
    fn test_decorated_span_starts_at_def() {
        let extraction = extract(&PythonHandler, SAMPLE, "a.py");
        let helper = extraction.element("a.py:helper").expect("helper");
        let line = SAMPLE.lines().nth(helper.line_start - 1).expect("line");
        assert!(line[helper.column_start..].starts_with("def helper(value):"));
    }

    #[test]
    fn test_function_locals_are_not_variables() {
        let source = "def f():\n    x = 1\n    return x\n";
        let extraction = extract(&PythonHandler, source, "f.py");
        assert_eq!(extraction.elements.len(), 1);
        assert!(extraction.element("f.py:f").is_some());
    }

    #[test]
    fn test_property_setter_listed_once() {
        let source = "class C:\n    @property\n    def x(self):\n        return self._x\n\n    @x.setter\n    def x(self, v):\n        self._x = v\n";
        let extraction = extract(&PythonHandler, source, "p.py");

        let class = extraction.element("p.py:C").expect("C");
        assert_eq!(class.children, Some(vec!["p.py:C:x".to_string()]));
        let contains: Vec<_> = extraction
            .relationships
            .iter()
            .filter(|r| r.from == "p.py:C")
            .collect();
        assert_eq!(contains.len(), 1);

        // The setter is the later declaration
        let last = extraction
            .elements
            .iter()
            .rfind(|e| e.id() == "p.py:C:x")
            .expect("x");
        assert_eq!(last.line_start, 7);
    }

    #[test]
    fn test_deeply_nested_expression_is_bounded() {
        let depth = 10_000;
        let source = format!(
            "def f():\n    return {}1{}\n\ndef g():\n    pass\n",
            "[".repeat(depth),
            "]".repeat(depth)
        );
        let extraction = extract(&PythonHandler, &source, "f.py");
        assert!(extraction.element("f.py:f").is_some());
        assert!(extraction.element("f.py:g").is_some());
    }
}
