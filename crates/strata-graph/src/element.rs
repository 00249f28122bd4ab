//! Code element types.
//!
//! A [`CodeElement`] is one structural unit discovered in a file: a function,
//! class, variable, import or module. Elements are created once per parse
//! pass and never mutated afterwards; re-analysing a file replaces its slice
//! of elements wholesale.

use serde::{Deserialize, Serialize};

/// The kind of structural unit an element represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// A function, method or constructor
    Function,
    /// A class-like type (class, struct, enum, interface, trait)
    Class,
    /// A module- or class-level binding
    Variable,
    /// An import of another module
    Import,
    /// A named module or namespace block
    Module,
}

impl ElementKind {
    /// Returns the string representation used in exports and queries.
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Function => "function",
            ElementKind::Class => "class",
            ElementKind::Variable => "variable",
            ElementKind::Import => "import",
            ElementKind::Module => "module",
        }
    }

    /// Returns true if elements of this kind can be the target of a call.
    pub fn is_callable(&self) -> bool {
        matches!(self, ElementKind::Function)
    }

    /// Returns true if elements of this kind can own nested declarations.
    pub fn is_scope(&self) -> bool {
        matches!(
            self,
            ElementKind::Function | ElementKind::Class | ElementKind::Module
        )
    }
}

/// A structural unit discovered in a source file.
///
/// Lines are 1-indexed and inclusive; columns are 0-indexed byte offsets
/// within their line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeElement {
    /// The declared name (module path for imports)
    pub name: String,

    /// The kind of element
    #[serde(rename = "type")]
    pub kind: ElementKind,

    /// Repository-relative path of the owning file
    pub file_path: String,

    pub line_start: usize,
    pub line_end: usize,
    pub column_start: usize,
    pub column_end: usize,

    /// Documentation attached to the declaration
    pub docstring: Option<String>,

    /// Parameter names, for callables
    pub parameters: Option<Vec<String>>,

    /// Declared return type, as written in source
    pub return_type: Option<String>,

    /// Identifier of the lexically enclosing element
    pub parent: Option<String>,

    /// Identifiers of directly nested elements
    pub children: Option<Vec<String>>,
}

impl CodeElement {
    /// Create a new element with a zero-width span at the start of the file.
    pub fn new(name: impl Into<String>, kind: ElementKind, file_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            file_path: file_path.into(),
            line_start: 1,
            line_end: 1,
            column_start: 0,
            column_end: 0,
            docstring: None,
            parameters: None,
            return_type: None,
            parent: None,
            children: None,
        }
    }

    /// Set the span from 1-indexed lines and 0-indexed columns.
    pub fn with_span(
        mut self,
        line_start: usize,
        column_start: usize,
        line_end: usize,
        column_end: usize,
    ) -> Self {
        self.line_start = line_start;
        self.column_start = column_start;
        self.line_end = line_end;
        self.column_end = column_end;
        self
    }

    /// Set the span from a tree-sitter node.
    pub fn with_node_span(self, node: &tree_sitter::Node) -> Self {
        let start = node.start_position();
        let end = node.end_position();
        self.with_span(start.row + 1, start.column, end.row + 1, end.column)
    }

    /// Set the docstring.
    pub fn with_docstring(mut self, docstring: impl Into<String>) -> Self {
        self.docstring = Some(docstring.into());
        self
    }

    /// Set the parameter names.
    pub fn with_parameters(mut self, parameters: Vec<String>) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// Set the declared return type.
    pub fn with_return_type(mut self, return_type: impl Into<String>) -> Self {
        self.return_type = Some(return_type.into());
        self
    }

    /// Set the enclosing element identifier.
    pub fn with_parent(mut self, parent: Option<String>) -> Self {
        self.parent = parent;
        self
    }

    /// Set the nested element identifiers. An empty list is stored as `None`.
    pub fn with_children(mut self, children: Vec<String>) -> Self {
        self.children = if children.is_empty() {
            None
        } else {
            Some(children)
        };
        self
    }

    /// The stable identifier of this element.
    ///
    /// Top-level elements are `{file_path}:{name}`, nested ones extend their
    /// parent's identifier (`{parent_id}:{name}`), and imports are
    /// `{file_path}:import:{module}`. The same file content and path always
    /// produce the same identifiers.
    pub fn id(&self) -> String {
        if self.kind == ElementKind::Import {
            return format!("{}:import:{}", self.file_path, self.name);
        }
        match &self.parent {
            Some(parent) => format!("{}:{}", parent, self.name),
            None => format!("{}:{}", self.file_path, self.name),
        }
    }

    /// Returns the number of lines this element spans.
    pub fn line_count(&self) -> usize {
        self.line_end.saturating_sub(self.line_start) + 1
    }

    /// Returns a location string for display (file:line-line).
    pub fn location(&self) -> String {
        format!("{}:{}-{}", self.file_path, self.line_start, self.line_end)
    }
}
