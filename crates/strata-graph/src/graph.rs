//! Code Context Graph assembly and queries.
//!
//! [`CcgAssembler`] merges per-file extractions in merge order (entry
//! points first), resolves name references against the elements merged so
//! far and produces an immutable [`CodeContextGraph`]. The graph keeps the
//! flat relationship list exactly as discovered and derives a petgraph view
//! holding only edges whose endpoints both exist.

use std::collections::{BTreeMap, HashMap};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::element::{CodeElement, ElementKind};
use crate::lang::Extraction;
use crate::relationship::{Reference, Relationship, RelationshipKind};

/// One relationship returned by [`CodeContextGraph::query`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryMatch {
    pub from: String,
    pub to: String,
    pub relationship: String,
}

/// Plain serializable form of a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CcgExport {
    pub elements: BTreeMap<String, CodeElement>,
    pub relationships: Vec<Relationship>,
    pub graph_nodes: Vec<String>,
    pub graph_edges: Vec<Relationship>,
}

/// The assembled graph of one repository snapshot.
#[derive(Debug, Clone, Default)]
pub struct CodeContextGraph {
    elements: BTreeMap<String, CodeElement>,
    relationships: Vec<Relationship>,
    graph: DiGraph<String, RelationshipKind>,
    node_index: HashMap<String, NodeIndex>,
}

impl CodeContextGraph {
    /// Build the graph view over a fixed element mapping and relationship list.
    pub fn new(elements: BTreeMap<String, CodeElement>, relationships: Vec<Relationship>) -> Self {
        let mut graph = DiGraph::new();
        let mut node_index = HashMap::with_capacity(elements.len());
        for id in elements.keys() {
            node_index.insert(id.clone(), graph.add_node(id.clone()));
        }

        for rel in &relationships {
            if let (Some(&from), Some(&to)) = (node_index.get(&rel.from), node_index.get(&rel.to)) {
                graph.add_edge(from, to, rel.kind);
            }
        }

        Self {
            elements,
            relationships,
            graph,
            node_index,
        }
    }

    /// Point lookup by element identifier.
    pub fn get(&self, id: &str) -> Option<&CodeElement> {
        self.elements.get(id)
    }

    pub fn elements(&self) -> &BTreeMap<String, CodeElement> {
        &self.elements
    }

    /// All relationships in discovery order, including those whose
    /// endpoints are missing from the graph view.
    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Relationships of one kind, in discovery order.
    pub fn relationships_of_kind(&self, kind: RelationshipKind) -> Vec<&Relationship> {
        self.relationships.iter().filter(|r| r.kind == kind).collect()
    }

    /// Free-text query.
    ///
    /// Recognizes `calls` and `inherits` (case-insensitive, checked in that
    /// order) and returns every relationship of that kind. Anything else
    /// matches nothing.
    pub fn query(&self, text: &str) -> Vec<QueryMatch> {
        let text = text.to_lowercase();
        let kind = if text.contains("calls") {
            RelationshipKind::Calls
        } else if text.contains("inherits") {
            RelationshipKind::Inherits
        } else {
            return Vec::new();
        };

        self.relationships_of_kind(kind)
            .into_iter()
            .map(|r| QueryMatch {
                from: r.from.clone(),
                to: r.to.clone(),
                relationship: r.kind.as_str().to_string(),
            })
            .collect()
    }

    /// Targets of `kind` edges leaving `id` in the graph view.
    pub fn outgoing(&self, id: &str, kind: RelationshipKind) -> Vec<&str> {
        self.neighbors(id, kind, Direction::Outgoing)
    }

    /// Sources of `kind` edges arriving at `id` in the graph view.
    pub fn incoming(&self, id: &str, kind: RelationshipKind) -> Vec<&str> {
        self.neighbors(id, kind, Direction::Incoming)
    }

    fn neighbors(&self, id: &str, kind: RelationshipKind, direction: Direction) -> Vec<&str> {
        let Some(&node) = self.node_index.get(id) else {
            return Vec::new();
        };

        // petgraph yields edges newest first
        let mut found: Vec<_> = self
            .graph
            .edges_directed(node, direction)
            .filter(|e| *e.weight() == kind)
            .map(|e| {
                let other = match direction {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                (e.id(), self.graph[other].as_str())
            })
            .collect();
        found.sort_by_key(|(edge, _)| *edge);
        found.into_iter().map(|(_, id)| id).collect()
    }

    /// Node identifiers of the graph view.
    pub fn graph_nodes(&self) -> Vec<&str> {
        self.graph
            .node_indices()
            .map(|n| self.graph[n].as_str())
            .collect()
    }

    /// Edges of the graph view, in insertion order.
    pub fn graph_edges(&self) -> Vec<Relationship> {
        self.graph
            .edge_references()
            .map(|e| {
                Relationship::new(
                    self.graph[e.source()].clone(),
                    self.graph[e.target()].clone(),
                    *e.weight(),
                )
            })
            .collect()
    }

    /// Serializable snapshot of the whole graph.
    pub fn export(&self) -> CcgExport {
        CcgExport {
            elements: self.elements.clone(),
            relationships: self.relationships.clone(),
            graph_nodes: self.graph_nodes().into_iter().map(str::to_string).collect(),
            graph_edges: self.graph_edges(),
        }
    }
}

/// Merges per-file extractions into a [`CodeContextGraph`].
///
/// Single writer: extractions must be pushed in merge order.
#[derive(Debug, Default)]
pub struct CcgAssembler {
    elements: BTreeMap<String, CodeElement>,
    relationships: Vec<Relationship>,
    /// Simple name -> element ids, in merge order
    by_name: HashMap<String, Vec<String>>,
    dropped_references: usize,
}

impl CcgAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one file's extraction and resolve its references.
    ///
    /// Elements sharing an identifier replace earlier ones, within one
    /// extraction and across re-pushed files, so the last declaration wins.
    pub fn push(&mut self, file_path: &str, extraction: Extraction) {
        for element in extraction.elements {
            let id = element.id();
            if !self.elements.contains_key(&id) {
                self.by_name
                    .entry(element.name.clone())
                    .or_default()
                    .push(id.clone());
            }
            self.elements.insert(id, element);
        }

        self.relationships.extend(extraction.relationships);

        for reference in extraction.references {
            match self.resolve(file_path, &reference) {
                Some(target) => self
                    .relationships
                    .push(Relationship::new(reference.from, target, reference.kind)),
                None => {
                    tracing::trace!(
                        "Unresolved {} reference to {} from {}",
                        reference.kind,
                        reference.name,
                        reference.from
                    );
                    self.dropped_references += 1;
                }
            }
        }
    }

    /// Look up a reference target by simple name: same file first, then
    /// files merged earlier.
    fn resolve(&self, file_path: &str, reference: &Reference) -> Option<String> {
        let wanted = match reference.kind {
            RelationshipKind::Calls => ElementKind::Function,
            RelationshipKind::Inherits | RelationshipKind::Implements => ElementKind::Class,
            RelationshipKind::Contains => return None,
        };

        let candidates: Vec<&CodeElement> = self
            .by_name
            .get(&reference.name)?
            .iter()
            .filter_map(|id| self.elements.get(id))
            .filter(|e| e.kind == wanted)
            .collect();

        candidates
            .iter()
            .find(|e| e.file_path == file_path)
            .or_else(|| candidates.first())
            .map(|e| e.id())
    }

    /// References that could not be resolved so far.
    pub fn dropped_references(&self) -> usize {
        self.dropped_references
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    /// Freeze the merged state into a graph.
    pub fn finish(self) -> CodeContextGraph {
        CodeContextGraph::new(self.elements, self.relationships)
    }
}
