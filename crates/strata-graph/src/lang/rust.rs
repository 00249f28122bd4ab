//! Rust grammar handler.
//!
//! Structs, enums, unions and traits are reported as classes; `impl` blocks
//! attach their functions to the implemented type, and `impl Trait for Type`
//! produces an `implements` reference. Docstrings are `///` line comments.

use std::collections::HashMap;
use std::sync::OnceLock;

use tree_sitter::{Node, Query, Tree};

use super::{
    Depth, Extraction, LanguageHandler, MAX_VISIT_DEPTH, cached_query, clean_block_doc, collect_calls, compile_query,
    enclose, field_text, line_of, node_text, simple_type_name,
};
use crate::element::{CodeElement, ElementKind};
use crate::error::ParseError;
use crate::relationship::{Reference, Relationship, RelationshipKind};

const CALLS_QUERY: &str = r#"
(call_expression function: (identifier) @callee)
(call_expression function: (scoped_identifier name: (identifier) @callee))
(call_expression function: (field_expression field: (field_identifier) @callee))
"#;

fn calls_query() -> Result<&'static Query, ParseError> {
    static QUERY: OnceLock<Result<Query, String>> = OnceLock::new();
    cached_query(QUERY.get_or_init(|| {
        compile_query(&tree_sitter_rust::LANGUAGE.into(), CALLS_QUERY)
    }))
}

fn is_scope(node: &Node) -> bool {
    node.kind() == "function_item"
}

/// Rust grammar handler.
pub struct RustHandler;

impl LanguageHandler for RustHandler {
    fn language(&self) -> &'static str {
        "rust"
    }

    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_rust::LANGUAGE.into()
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
        let mut extraction = visitor.visit_children(&tree.root_node(), None, false);
        link_impl_members(&mut extraction);
        Ok(extraction)
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
            "function_item" | "function_signature_item" => self.function(node, parent),
            "struct_item" | "enum_item" | "union_item" | "trait_item" => self.type_item(node, parent),
            "impl_item" => self.impl_block(node, parent),
            "mod_item" => self.module(node, parent),
            "use_declaration" => self.import(node),
            "const_item" | "static_item" if !in_function => self.constant(node, parent),
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
        if let Some(doc) = doc_comment(node, self.source) {
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

    fn type_item(&self, node: &Node, parent: Option<&str>) -> Extraction {
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
        if node.kind() == "trait_item" {
            if let Some(items) = node.child_by_field_name("body") {
                body = self.visit_children(&items, Some(&id), false);
            }
        }

        enclose(element, body)
    }

    /// Attach an impl block's items to the implemented type's identifier.
    fn impl_block(&self, node: &Node, parent: Option<&str>) -> Extraction {
        let Some(type_node) = node.child_by_field_name("type") else {
            return Extraction::new();
        };
        let scope = parent.unwrap_or(self.file_path);
        let owner = format!("{}:{}", scope, simple_type_name(&type_node, self.source));

        let mut out = Extraction::new();
        if let Some(trait_node) = node.child_by_field_name("trait") {
            out.references.push(Reference::new(
                owner.clone(),
                simple_type_name(&trait_node, self.source),
                RelationshipKind::Implements,
                line_of(&trait_node),
            ));
        }

        let Some(items) = node.child_by_field_name("body") else {
            return out;
        };
        let body = self.visit_children(&items, Some(&owner), false);
        for member in body
            .elements
            .iter()
            .filter(|e| e.parent.as_deref() == Some(owner.as_str()))
        {
            out.relationships
                .push(Relationship::contains(owner.clone(), member.id()));
        }
        out.merge(body);
        out
    }

    fn module(&self, node: &Node, parent: Option<&str>) -> Extraction {
        let Some(name) = field_text(node, "name", self.source) else {
            return Extraction::new();
        };

        let mut element = CodeElement::new(name, ElementKind::Module, self.file_path)
            .with_node_span(node)
            .with_parent(parent.map(str::to_string));
        if let Some(doc) = doc_comment(node, self.source) {
            element = element.with_docstring(doc);
        }
        let id = element.id();

        let body = match node.child_by_field_name("body") {
            Some(items) => self.visit_children(&items, Some(&id), false),
            None => Extraction::new(),
        };
        enclose(element, body)
    }

    fn import(&self, node: &Node) -> Extraction {
        let mut out = Extraction::new();
        if let Some(argument) = field_text(node, "argument", self.source) {
            out.push(CodeElement::new(argument, ElementKind::Import, self.file_path).with_node_span(node));
        }
        out
    }

    fn constant(&self, node: &Node, parent: Option<&str>) -> Extraction {
        let mut out = Extraction::new();
        if let Some(name) = field_text(node, "name", self.source) {
            let mut element = CodeElement::new(name, ElementKind::Variable, self.file_path)
                .with_node_span(node)
                .with_parent(parent.map(str::to_string));
            if let Some(doc) = doc_comment(node, self.source) {
                element = element.with_docstring(doc);
            }
            out.push(element);
        }
        out
    }

    fn parameters(&self, params: &Node) -> Vec<String> {
        let mut names = Vec::new();
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            let name = match param.kind() {
                "self_parameter" => Some("self".to_string()),
                "parameter" => field_text(&param, "pattern", self.source),
                _ => None,
            };
            names.extend(name);
        }
        names
    }
}

/// `///` comments (or a `/** */` block) directly above an item, looking
/// past attributes.
fn doc_comment(node: &Node, source: &str) -> Option<String> {
    let mut lines = Vec::new();
    let mut current = node.prev_sibling();
    while let Some(sibling) = current {
        match sibling.kind() {
            "attribute_item" => {}
            "line_comment" => {
                let text = node_text(&sibling, source);
                let Some(doc) = text.strip_prefix("///") else {
                    break;
                };
                if doc.starts_with('/') {
                    break;
                }
                lines.push(doc.trim().to_string());
            }
            "block_comment" if lines.is_empty() => {
                return clean_block_doc(&node_text(&sibling, source));
            }
            _ => break,
        }
        current = sibling.prev_sibling();
    }

    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    Some(lines.join("\n"))
}

/// Record impl-block members in the `children` of their type when the type
/// is declared in the same file.
fn link_impl_members(extraction: &mut Extraction) {
    let mut members: HashMap<&str, Vec<&str>> = HashMap::new();
    for rel in &extraction.relationships {
        if rel.kind == RelationshipKind::Contains {
            members.entry(rel.from.as_str()).or_default().push(rel.to.as_str());
        }
    }

    let mut linked: Vec<(usize, Vec<String>)> = Vec::new();
    for (index, element) in extraction.elements.iter().enumerate() {
        if element.kind != ElementKind::Class {
            continue;
        }
        let Some(ids) = members.get(element.id().as_str()) else {
            continue;
        };
        let mut children = element.children.clone().unwrap_or_default();
        for id in ids {
            if !children.iter().any(|c| c == id) {
                children.push(id.to_string());
            }
        }
        linked.push((index, children));
    }

    for (index, children) in linked {
        extraction.elements[index].children = Some(children);
    }
}
