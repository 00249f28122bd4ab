//! Java grammar handler.

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
(method_invocation name: (identifier) @callee)
"#;

fn calls_query() -> Result<&'static Query, ParseError> {
    static QUERY: OnceLock<Result<Query, String>> = OnceLock::new();
    cached_query(QUERY.get_or_init(|| {
        compile_query(&tree_sitter_java::LANGUAGE.into(), CALLS_QUERY)
    }))
}

const TYPE_DECLARATIONS: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "enum_declaration",
    "record_declaration",
    "annotation_type_declaration",
];

const METHOD_DECLARATIONS: &[&str] = &[
    "method_declaration",
    "constructor_declaration",
    "compact_constructor_declaration",
];

fn is_scope(node: &Node) -> bool {
    TYPE_DECLARATIONS.contains(&node.kind()) || METHOD_DECLARATIONS.contains(&node.kind())
}

/// Java grammar handler.
pub struct JavaHandler;

impl LanguageHandler for JavaHandler {
    fn language(&self) -> &'static str {
        "java"
    }

    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_java::LANGUAGE.into()
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
        let kind = node.kind();
        if TYPE_DECLARATIONS.contains(&kind) {
            return self.type_declaration(node, parent);
        }
        if METHOD_DECLARATIONS.contains(&kind) {
            return self.method(node, parent);
        }
        match kind {
            "field_declaration" if !in_function => self.fields(node, parent),
            "import_declaration" => self.import(node),
            _ => self.visit_children(node, parent, in_function),
        }
    }

    fn type_declaration(&self, node: &Node, parent: Option<&str>) -> Extraction {
        let Some(name) = field_text(node, "name", self.source) else {
            return Extraction::new();
        };

        let mut element = CodeElement::new(name, ElementKind::Class, self.file_path)
            .with_node_span(node)
            .with_parent(parent.map(str::to_string));
        if let Some(doc) = block_doc_comment(node, self.source) {
            element = element.with_docstring(doc);
        }
        let id = element.id();

        let mut body = Extraction::new();
        if let Some(superclass) = node.child_by_field_name("superclass") {
            body.references
                .extend(self.type_references(&superclass, &id, RelationshipKind::Inherits));
        }
        if let Some(interfaces) = node.child_by_field_name("interfaces") {
            body.references
                .extend(self.type_references(&interfaces, &id, RelationshipKind::Implements));
        }
        let mut cursor = node.walk();
        for extends in node
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "extends_interfaces")
        {
            body.references
                .extend(self.type_references(&extends, &id, RelationshipKind::Inherits));
        }

        if let Some(class_body) = node.child_by_field_name("body") {
            body.merge(self.visit_children(&class_body, Some(&id), false));
        }

        enclose(element, body)
    }

    /// References to every type named under `node` (a `superclass`,
    /// `super_interfaces` or `extends_interfaces` clause).
    fn type_references(&self, node: &Node, from: &str, kind: RelationshipKind) -> Vec<Reference> {
        let mut types = Vec::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() == "type_list" {
                let mut inner = child.walk();
                types.extend(child.named_children(&mut inner));
            } else {
                types.push(child);
            }
        }

        types
            .iter()
            .map(|t| Reference::new(from, simple_type_name(t, self.source), kind, line_of(t)))
            .collect()
    }

    fn method(&self, node: &Node, parent: Option<&str>) -> Extraction {
        let Some(name) = field_text(node, "name", self.source) else {
            return Extraction::new();
        };

        let mut element = CodeElement::new(name, ElementKind::Function, self.file_path)
            .with_node_span(node)
            .with_parent(parent.map(str::to_string));
        if let Some(params) = node.child_by_field_name("parameters") {
            element = element.with_parameters(self.parameters(&params));
        }
        if let Some(return_type) = field_text(node, "type", self.source) {
            element = element.with_return_type(return_type);
        }
        if let Some(doc) = block_doc_comment(node, self.source) {
            element = element.with_docstring(doc);
        }

        let id = element.id();
        let mut body = Extraction::new();
        if let Some(block) = node.child_by_field_name("body") {
            body.references = collect_calls(self.calls, node, self.source, &id, is_scope);
            body.merge(self.visit_children(&block, Some(&id), true));
        }

        enclose(element, body)
    }

    fn fields(&self, node: &Node, parent: Option<&str>) -> Extraction {
        let mut out = Extraction::new();
        let mut cursor = node.walk();
        for declarator in node.children_by_field_name("declarator", &mut cursor) {
            if let Some(name) = field_text(&declarator, "name", self.source) {
                out.push(
                    CodeElement::new(name, ElementKind::Variable, self.file_path)
                        .with_node_span(node)
                        .with_parent(parent.map(str::to_string)),
                );
            }
        }
        out
    }

    fn import(&self, node: &Node) -> Extraction {
        let mut out = Extraction::new();
        let mut module = None;
        let mut wildcard = false;
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "scoped_identifier" | "identifier" => module = Some(node_text(&child, self.source)),
                "asterisk" => wildcard = true,
                _ => {}
            }
        }

        if let Some(mut module) = module {
            if wildcard {
                module.push_str(".*");
            }
            out.push(CodeElement::new(module, ElementKind::Import, self.file_path).with_node_span(node));
        }
        out
    }

    fn parameters(&self, params: &Node) -> Vec<String> {
        let mut names = Vec::new();
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            let name = match param.kind() {
                "formal_parameter" => field_text(&param, "name", self.source),
                "spread_parameter" => {
                    let mut inner = param.walk();
                    let declarator = param
                        .named_children(&mut inner)
                        .find(|c| c.kind() == "variable_declarator");
                    declarator.and_then(|d| field_text(&d, "name", self.source))
                }
                _ => None,
            };
            names.extend(name);
        }
        names
    }
}
