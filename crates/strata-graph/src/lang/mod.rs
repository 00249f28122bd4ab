//! Language-specific grammar handlers.
//!
//! Each handler walks a tree-sitter syntax tree for one language and returns
//! the elements, local relationships and unresolved references it found.
//! Traversal is return-and-merge: every visit returns its own
//! [`Extraction`] and the caller merges it into its own.

pub mod java;
pub mod javascript;
pub mod python;
pub mod rust;

pub use java::JavaHandler;
pub use javascript::JavaScriptHandler;
pub use python::PythonHandler;
pub use rust::RustHandler;

use std::cell::Cell;
use std::collections::HashSet;

use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Query, QueryCursor, Tree};

use crate::element::CodeElement;
use crate::error::ParseError;
use crate::relationship::{Reference, Relationship, RelationshipKind};

/// A grammar-based extraction strategy for one language.
pub trait LanguageHandler: Send + Sync {
    /// The canonical language tag this handler serves.
    fn language(&self) -> &'static str;

    /// The tree-sitter grammar for this language.
    fn grammar(&self) -> tree_sitter::Language;

    /// Extract elements, relationships and references from a parsed tree.
    fn extract(&self, tree: &Tree, source: &str, file_path: &str)
    -> Result<Extraction, ParseError>;
}

/// Everything one strategy discovered in one file (or one subtree).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Elements in source order
    pub elements: Vec<CodeElement>,
    /// Local relationships (`contains`) in discovery order
    pub relationships: Vec<Relationship>,
    /// Name references awaiting resolution by the assembler
    pub references: Vec<Reference>,
}

impl Extraction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append another extraction, preserving order.
    pub fn merge(&mut self, other: Extraction) {
        self.elements.extend(other.elements);
        self.relationships.extend(other.relationships);
        self.references.extend(other.references);
    }

    /// Add a single leaf element.
    pub fn push(&mut self, element: CodeElement) {
        self.elements.push(element);
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.relationships.is_empty() && self.references.is_empty()
    }

    /// Find an element by identifier.
    pub fn element(&self, id: &str) -> Option<&CodeElement> {
        self.elements.iter().find(|e| e.id() == id)
    }
}

/// Wrap a scope element around the extraction of its body.
///
/// Direct children of `parent` become its `children` list and each gets a
/// `contains` edge. The parent precedes its body in the result.
///
/// Same-name declarations in one scope share an identifier: the child is
/// listed once and the assembler keeps the last declaration. The pattern
/// fallback instead keeps the first.
pub(crate) fn enclose(parent: CodeElement, body: Extraction) -> Extraction {
    let parent_id = parent.id();
    let mut seen = HashSet::new();
    let children: Vec<String> = body
        .elements
        .iter()
        .filter(|e| e.parent.as_deref() == Some(parent_id.as_str()))
        .map(CodeElement::id)
        .filter(|id| seen.insert(id.clone()))
        .collect();

    let mut out = Extraction::new();
    for child in &children {
        out.relationships
            .push(Relationship::contains(parent_id.clone(), child.clone()));
    }
    out.elements.push(parent.with_children(children));
    out.merge(body);
    out
}

/// Syntax depth past which visitors stop descending.
pub(crate) const MAX_VISIT_DEPTH: usize = 512;

/// Current recursion depth of a tree visitor.
#[derive(Debug, Default)]
pub(crate) struct Depth(Cell<usize>);

impl Depth {
    /// Enter one level, or `None` once [`MAX_VISIT_DEPTH`] is reached.
    /// The level is left when the guard drops.
    pub(crate) fn enter(&self) -> Option<DepthGuard<'_>> {
        let depth = self.0.get();
        if depth >= MAX_VISIT_DEPTH {
            return None;
        }
        self.0.set(depth + 1);
        Some(DepthGuard(&self.0))
    }
}

pub(crate) struct DepthGuard<'a>(&'a Cell<usize>);

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

/// Source text covered by a node.
pub(crate) fn node_text(node: &Node, source: &str) -> String {
    source.get(node.byte_range()).unwrap_or_default().to_string()
}

/// Text of a named field, if present.
pub(crate) fn field_text(node: &Node, field: &str, source: &str) -> Option<String> {
    node.child_by_field_name(field).map(|n| node_text(&n, source))
}

/// 1-indexed start line of a node.
pub(crate) fn line_of(node: &Node) -> usize {
    node.start_position().row + 1
}

/// Compile a query, keeping the error as text so it can be cached.
pub(crate) fn compile_query(language: &tree_sitter::Language, source: &str) -> Result<Query, String> {
    Query::new(language, source).map_err(|e| e.to_string())
}

/// Borrow a cached query or report why it failed to compile.
pub(crate) fn cached_query(query: &Result<Query, String>) -> Result<&Query, ParseError> {
    query
        .as_ref()
        .map_err(|e| ParseError::QueryError(e.clone()))
}

/// Collect `calls` references for the `@callee` captures of `query` inside
/// `function`.
///
/// A capture only counts when `function` is its nearest enclosing scope, so
/// calls made by nested declarations are attributed to those instead.
pub(crate) fn collect_calls(
    query: &Query,
    function: &Node,
    source: &str,
    from_id: &str,
    is_scope: fn(&Node) -> bool,
) -> Vec<Reference> {
    let mut references = Vec::new();
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, *function, source.as_bytes());

    while let Some(match_) = matches.next() {
        for capture in match_.captures {
            if query.capture_names()[capture.index as usize] != "callee" {
                continue;
            }
            let node = capture.node;
            let owner = enclosing_scope(&node, is_scope);
            if owner.map(|n| n.id()) != Some(function.id()) {
                continue;
            }
            references.push(Reference::new(
                from_id,
                node_text(&node, source),
                RelationshipKind::Calls,
                line_of(&node),
            ));
        }
    }

    references
}

fn enclosing_scope<'t>(node: &Node<'t>, is_scope: fn(&Node) -> bool) -> Option<Node<'t>> {
    let mut current = node.parent();
    while let Some(n) = current {
        if is_scope(&n) {
            return Some(n);
        }
        current = n.parent();
    }
    None
}

/// The `/** ... */` comment immediately preceding `node`, cleaned up.
pub(crate) fn block_doc_comment(node: &Node, source: &str) -> Option<String> {
    let comment = node.prev_sibling()?;
    if !matches!(comment.kind(), "comment" | "block_comment") {
        return None;
    }
    if comment.end_position().row + 1 < node.start_position().row {
        return None;
    }
    clean_block_doc(&node_text(&comment, source))
}

/// Strip the delimiters and leading `*` of a `/** ... */` comment.
pub(crate) fn clean_block_doc(text: &str) -> Option<String> {
    if !text.starts_with("/**") {
        return None;
    }

    let body = text.trim_start_matches("/**").trim_end_matches("*/");
    let lines: Vec<&str> = body
        .lines()
        .map(|l| l.trim().trim_start_matches('*').trim())
        .filter(|l| !l.is_empty())
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Simple name of a possibly qualified or generic type reference.
pub(crate) fn simple_type_name(node: &Node, source: &str) -> String {
    match node.kind() {
        "generic_type" => node
            .child_by_field_name("type")
            .or_else(|| node.named_child(0))
            .map(|n| simple_type_name(&n, source))
            .unwrap_or_else(|| node_text(node, source)),
        "scoped_type_identifier" | "scoped_identifier" => node
            .child_by_field_name("name")
            .map(|n| node_text(&n, source))
            .unwrap_or_else(|| node_text(node, source)),
        "member_expression" => field_text(node, "property", source)
            .unwrap_or_else(|| node_text(node, source)),
        "attribute" => field_text(node, "attribute", source)
            .unwrap_or_else(|| node_text(node, source)),
        _ => node_text(node, source),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementKind;

    #[test]
    fn test_enclose_links_direct_children() {
        let parent = CodeElement::new("Foo", ElementKind::Class, "a.py");
        let mut body = Extraction::new();
        body.push(
            CodeElement::new("bar", ElementKind::Function, "a.py")
                .with_parent(Some("a.py:Foo".to_string())),
        );
        body.push(
            CodeElement::new("inner", ElementKind::Function, "a.py")
                .with_parent(Some("a.py:Foo:bar".to_string())),
        );

        let out = enclose(parent, body);
        assert_eq!(out.elements[0].id(), "a.py:Foo");
        assert_eq!(
            out.elements[0].children,
            Some(vec!["a.py:Foo:bar".to_string()])
        );
        assert_eq!(
            out.relationships,
            vec![Relationship::contains("a.py:Foo", "a.py:Foo:bar")]
        );
        assert_eq!(out.elements.len(), 3);
    }

    #[test]
    fn test_enclose_deduplicates_children() {
        let parent = CodeElement::new("C", ElementKind::Class, "p.py");
        let mut body = Extraction::new();
        for _ in 0..2 {
            body.push(
                CodeElement::new("x", ElementKind::Function, "p.py")
                    .with_parent(Some("p.py:C".to_string())),
            );
        }

        let out = enclose(parent, body);
        assert_eq!(out.elements[0].children, Some(vec!["p.py:C:x".to_string()]));
        assert_eq!(
            out.relationships,
            vec![Relationship::contains("p.py:C", "p.py:C:x")]
        );
        assert_eq!(out.elements.len(), 3);
    }

    #[test]
    fn test_depth_guard_limits_and_releases() {
        let depth = Depth::default();
        {
            let mut guards = Vec::new();
            while let Some(guard) = depth.enter() {
                guards.push(guard);
            }
            assert_eq!(guards.len(), MAX_VISIT_DEPTH);
            assert!(depth.enter().is_none());
        }
        assert_eq!(depth.0.get(), 0);
        assert!(depth.enter().is_some());
    }

    #[test]
    fn test_merge_preserves_order() {
        let mut a = Extraction::new();
        a.push(CodeElement::new("x", ElementKind::Variable, "a.py"));
        let mut b = Extraction::new();
        b.push(CodeElement::new("y", ElementKind::Variable, "a.py"));
        a.merge(b);

        let names: Vec<_> = a.elements.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y"]);
        assert!(a.element("a.py:y").is_some());
        assert!(!a.is_empty());
    }
}
