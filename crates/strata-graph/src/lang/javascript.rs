//! JavaScript grammar handler.
//!
//! Functions declared with `function`, arrow functions and function
//! expressions bound to a variable, classes with their methods and fields,
//! ES module imports and top-level bindings. Docstrings are `/** */` blocks.

use std::sync::OnceLock;

use tree_sitter::{Node, Query, Tree};

use super::{
    Depth, Extraction, LanguageHandler, MAX_VISIT_DEPTH, block_doc_comment, cached_query, collect_calls, compile_query,
    enclose, field_text, line_of, node_text, simple_type_name,
};
use crate::element::{CodeElement, ElementKind};
use crate::error::ParseError;
use crate::relationship::{Reference, RelationshipKind};

const CALLS_QUERY: &str = r#"
(call_expression function: (identifier) @callee)
(call_expression function: (member_expression property: (property_identifier) @callee))
"#;

fn calls_query() -> Result<&'static Query, ParseError> {
    static QUERY: OnceLock<Result<Query, String>> = OnceLock::new();
    cached_query(QUERY.get_or_init(|| {
        compile_query(&tree_sitter_javascript::LANGUAGE.into(), CALLS_QUERY)
    }))
}

fn is_function_value(node: &Node) -> bool {
    matches!(
        node.kind(),
        "arrow_function" | "function_expression" | "function" | "generator_function"
    )
}

fn is_scope(node: &Node) -> bool {
    match node.kind() {
        "function_declaration" | "generator_function_declaration" | "method_definition"
        | "class_declaration" => true,
        _ if is_function_value(node) => node
            .parent()
            .is_some_and(|p| p.kind() == "variable_declarator"),
        _ => false,
    }
}

/// JavaScript grammar handler.
pub struct JavaScriptHandler;

impl LanguageHandler for JavaScriptHandler {
    fn language(&self) -> &'static str {
        "javascript"
    }

    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_javascript::LANGUAGE.into()
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
            "function_declaration" | "generator_function_declaration" | "method_definition" => {
                match field_text(node, "name", self.source) {
                    Some(name) => self.function(node, node, name, parent),
                    None => self.visit_children(node, parent, in_function),
                }
            }
            "class_declaration" => self.class(node, parent),
            "field_definition" if !in_function => self.field(node, parent),
            "lexical_declaration" | "variable_declaration" => {
                self.declarators(node, parent, in_function)
            }
            "import_statement" => self.import(node),
            _ => self.visit_children(node, parent, in_function),
        }
    }

    /// Emit a function element spanning `span`, whose signature and body
    /// live on `function`.
    fn function(&self, span: &Node, function: &Node, name: String, parent: Option<&str>) -> Extraction {
        let mut element = CodeElement::new(name, ElementKind::Function, self.file_path)
            .with_node_span(span)
            .with_parent(parent.map(str::to_string))
            .with_parameters(self.parameters(function));
        if let Some(doc) = doc_comment(span, self.source) {
            element = element.with_docstring(doc);
        }

        let id = element.id();
        let mut body = Extraction::new();
        if let Some(block) = function.child_by_field_name("body") {
            body.references = collect_calls(self.calls, function, self.source, &id, is_scope);
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
        if let Some(doc) = doc_comment(node, self.source) {
            element = element.with_docstring(doc);
        }
        let id = element.id();

        let mut body = Extraction::new();
        let mut cursor = node.walk();
        for heritage in node
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "class_heritage")
        {
            if let Some(base) = heritage.named_child(0) {
                body.references.push(Reference::new(
                    id.clone(),
                    simple_type_name(&base, self.source),
                    RelationshipKind::Inherits,
                    line_of(&base),
                ));
            }
        }
        if let Some(class_body) = node.child_by_field_name("body") {
            body.merge(self.visit_children(&class_body, Some(&id), false));
        }

        enclose(element, body)
    }

    fn field(&self, node: &Node, parent: Option<&str>) -> Extraction {
        let mut out = Extraction::new();
        if let Some(name) = field_text(node, "property", self.source) {
            out.push(
                CodeElement::new(name, ElementKind::Variable, self.file_path)
                    .with_node_span(node)
                    .with_parent(parent.map(str::to_string)),
            );
        }
        out
    }

    fn declarators(&self, node: &Node, parent: Option<&str>, in_function: bool) -> Extraction {
        let mut out = Extraction::new();
        let mut cursor = node.walk();
        for declarator in node.named_children(&mut cursor) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(name_node) = declarator.child_by_field_name("name") else {
                continue;
            };
            let value = declarator.child_by_field_name("value");
            let named = name_node.kind() == "identifier";
            let name = node_text(&name_node, self.source);

            match value {
                Some(value) if named && is_function_value(&value) => {
                    out.merge(self.function(&declarator, &value, name, parent));
                }
                _ => {
                    if named && !in_function {
                        out.push(
                            CodeElement::new(name, ElementKind::Variable, self.file_path)
                                .with_node_span(&declarator)
                                .with_parent(parent.map(str::to_string)),
                        );
                    }
                    if let Some(value) = value {
                        out.merge(self.visit(&value, parent, in_function));
                    }
                }
            }
        }
        out
    }

    fn import(&self, node: &Node) -> Extraction {
        let mut out = Extraction::new();
        if let Some(source) = field_text(node, "source", self.source) {
            let module = source.trim_matches(['"', '\'', '`']).to_string();
            out.push(CodeElement::new(module, ElementKind::Import, self.file_path).with_node_span(node));
        }
        out
    }

    fn parameters(&self, function: &Node) -> Vec<String> {
        if let Some(single) = function.child_by_field_name("parameter") {
            return vec![node_text(&single, self.source)];
        }
        let Some(params) = function.child_by_field_name("parameters") else {
            return Vec::new();
        };

        let mut names = Vec::new();
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            let name = match param.kind() {
                "comment" => None,
                "assignment_pattern" => field_text(&param, "left", self.source),
                "rest_pattern" => param
                    .named_child(0)
                    .map(|n| node_text(&n, self.source)),
                _ => Some(node_text(&param, self.source)),
            };
            names.extend(name);
        }
        names
    }
}

/// Doc comment for a declaration, looking through `export` and variable
/// declaration wrappers.
fn doc_comment(node: &Node, source: &str) -> Option<String> {
    let mut anchor = *node;
    loop {
        if let Some(doc) = block_doc_comment(&anchor, source) {
            return Some(doc);
        }
        match anchor.parent() {
            Some(parent)
                if matches!(
                    parent.kind(),
                    "export_statement" | "lexical_declaration" | "variable_declaration"
                ) =>
            {
                anchor = parent;
            }
            _ => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::test_support::{extract, referenced};
    use crate::relationship::Relationship;

    const SAMPLE: &str = r#"import { readFile } from "fs";
import path from 'path';

const VERSION = "1.0";

/**
 * Base shape.
 */
class Shape {
  area() {
    return 0;
  }
}

export class Circle extends Shape {
  constructor(radius) {
    super();
    this.radius = radius;
  }

  /** Circle area. */
  area() {
    return square(this.radius) * Math.PI;
  }
}

function square(x, y = 2, ...rest) {
  return x * x;
}

/** Entry. */
export const run = async (args) => {
  const c = new Circle(1);
  log(c.area());
};
"#;

    #[test]
    fn test_extracts_elements_in_source_order() {
        let extraction = extract(&JavaScriptHandler, SAMPLE, "app.js");
        let ids: Vec<_> = extraction.elements.iter().map(|e| e.id()).collect();
        assert_eq!(
            ids,
            vec![
                "app.js:import:fs",
                "app.js:import:path",
                "app.js:VERSION",
                "app.js:Shape",
                "app.js:Shape:area",
                "app.js:Circle",
                "app.js:Circle:constructor",
                "app.js:Circle:area",
                "app.js:square",
                "app.js:run",
            ]
        );
    }

    #[test]
    fn test_docstrings() {
        let extraction = extract(&JavaScriptHandler, SAMPLE, "app.js");
        let doc = |id: &str| extraction.element(id).and_then(|e| e.docstring.clone());
        assert_eq!(doc("app.js:Shape").as_deref(), Some("Base shape."));
        assert_eq!(doc("app.js:Circle:area").as_deref(), Some("Circle area."));
        assert_eq!(doc("app.js:run").as_deref(), Some("Entry."));
        assert_eq!(doc("app.js:square"), None);
    }

    #[test]
    fn test_parameters() {
        let extraction = extract(&JavaScriptHandler, SAMPLE, "app.js");
        let square = extraction.element("app.js:square").expect("square");
        assert_eq!(
            square.parameters,
            Some(vec!["x".to_string(), "y".to_string(), "rest".to_string()])
        );
        let run = extraction.element("app.js:run").expect("run");
        assert_eq!(run.parameters, Some(vec!["args".to_string()]));
    }

    #[test]
    fn test_structure_and_references() {
        let extraction = extract(&JavaScriptHandler, SAMPLE, "app.js");
        assert!(
            extraction
                .relationships
                .contains(&Relationship::contains("app.js:Circle", "app.js:Circle:area"))
        );
        assert_eq!(
            referenced(&extraction, "app.js:Circle", RelationshipKind::Inherits),
            vec!["Shape"]
        );
        assert_eq!(
            referenced(&extraction, "app.js:Circle:area", RelationshipKind::Calls),
            vec!["square"]
        );

        let mut run_calls = referenced(&extraction, "app.js:run", RelationshipKind::Calls);
        run_calls.sort();
        assert_eq!(run_calls, vec!["area", "log"]);
    }

    #[test]
    fn test_function_span_round_trip() {
        let extraction = extract(&JavaScriptHandler, SAMPLE, "app.js");
        let square = extraction.element("app.js:square").expect("square");
        let line = SAMPLE.lines().nth(square.line_start - 1).expect("line");
        assert!(line[square.column_start..].starts_with("function square("));
    }
}
