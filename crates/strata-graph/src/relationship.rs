//! Relationship types connecting code elements.
//!
//! Relationships are append-only facts produced alongside element discovery.
//! Duplicates are permitted, so consumers must treat relationship lists as
//! multisets.

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The kind of relationship between two elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    /// Enclosing scope contains a nested declaration (Class -> Method)
    Contains,
    /// A function invokes another function
    Calls,
    /// A class derives from another class
    Inherits,
    /// A type implements an interface or trait
    Implements,
}

impl RelationshipKind {
    /// Returns the string representation used in exports and queries.
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::Contains => "contains",
            RelationshipKind::Calls => "calls",
            RelationshipKind::Inherits => "inherits",
            RelationshipKind::Implements => "implements",
        }
    }

    /// Parse the string representation.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "contains" => Some(RelationshipKind::Contains),
            "calls" => Some(RelationshipKind::Calls),
            "inherits" => Some(RelationshipKind::Inherits),
            "implements" => Some(RelationshipKind::Implements),
            _ => None,
        }
    }

    /// Returns true if this relationship represents lexical nesting.
    pub fn is_structural(&self) -> bool {
        matches!(self, RelationshipKind::Contains)
    }

    /// Returns true if this relationship is a type relationship.
    pub fn is_type_relationship(&self) -> bool {
        matches!(
            self,
            RelationshipKind::Inherits | RelationshipKind::Implements
        )
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed, typed fact: `from` relates to `to` by `kind`.
///
/// Serializes as the triple `[from, to, kind]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Relationship {
    pub from: String,
    pub to: String,
    pub kind: RelationshipKind,
}

impl Relationship {
    /// Create a new relationship.
    pub fn new(from: impl Into<String>, to: impl Into<String>, kind: RelationshipKind) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            kind,
        }
    }

    /// Create a CONTAINS relationship (parent contains child).
    pub fn contains(parent_id: impl Into<String>, child_id: impl Into<String>) -> Self {
        Self::new(parent_id, child_id, RelationshipKind::Contains)
    }

    /// Create a CALLS relationship.
    pub fn calls(caller_id: impl Into<String>, callee_id: impl Into<String>) -> Self {
        Self::new(caller_id, callee_id, RelationshipKind::Calls)
    }

    /// Create an INHERITS relationship (child class -> base class).
    pub fn inherits(child_id: impl Into<String>, base_id: impl Into<String>) -> Self {
        Self::new(child_id, base_id, RelationshipKind::Inherits)
    }

    /// Create an IMPLEMENTS relationship.
    pub fn implements(implementor_id: impl Into<String>, interface_id: impl Into<String>) -> Self {
        Self::new(implementor_id, interface_id, RelationshipKind::Implements)
    }
}

impl Serialize for Relationship {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.from, &self.to, self.kind.as_str()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Relationship {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (from, to, kind) = <(String, String, String)>::deserialize(deserializer)?;
        let kind = RelationshipKind::from_name(&kind)
            .ok_or_else(|| D::Error::custom(format!("unknown relationship kind: {kind}")))?;
        Ok(Self { from, to, kind })
    }
}

/// An unresolved reference by simple name, produced by a grammar handler.
///
/// The assembler turns references into relationships once the target name
/// can be looked up among discovered elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Identifier of the referencing element
    pub from: String,
    /// Simple name of the referenced element
    pub name: String,
    /// The relationship to emit when the name resolves
    pub kind: RelationshipKind,
    /// Line of the reference (1-indexed)
    pub line: usize,
}

impl Reference {
    pub fn new(
        from: impl Into<String>,
        name: impl Into<String>,
        kind: RelationshipKind,
        line: usize,
    ) -> Self {
        Self {
            from: from.into(),
            name: name.into(),
            kind,
            line,
        }
    }
}
